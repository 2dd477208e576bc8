use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable error codes returned to clients over REST and WS.
///
/// Wire representation is the literal lower snake_case string — these are
/// compared and logged verbatim by clients, so the `serde` rename must
/// match exactly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // --- Auth ---
    Unauthorized,
    WsAuthFailed,
    InitDataEmpty,
    HashMissing,
    AuthDateMissing,
    AuthDateInvalid,
    AuthDateExpired,
    SignatureInvalid,
    UserMissing,
    UserInvalid,

    // --- Validation ---
    InvalidRoomId,
    InvalidPayload,
    InvalidMode,
    InvalidScore,
    CapacityInvalid,
    RoomCodeRequired,
    ReadyInvalid,
    InvalidNickname,
    InvalidDisplayName,
    InvalidUsername,
    QRequired,
    CodeRequired,
    SkuRequired,

    // --- Lobby state ---
    RoomNotFound,
    RoomFull,
    RoomClosed,
    RoomStarted,
    NotAMember,
    Forbidden,
    NotRoomOwner,
    NotEnoughPlayers,
    NotAllReady,
    RoomCodeConflict,
    WrongPassword,
    RoomNotJoined,

    // --- Match runtime ---
    NotInRoom,
    NotEnoughWsPlayers,
    RestartVoteAlreadyActive,
    RestartProposeNotAllowed,
    RestartProposeCooldown,

    // --- Economy / social (persisted-store error surface, out of core scope
    //     but part of the shared taxonomy table) ---
    InsufficientFunds,
    AlreadyOwned,
    NotPurchasable,
    SkuNotFound,
    AlreadyFriends,
    AlreadyRequested,
    UserNotFound,
    InvalidTarget,
    RequestNotFound,
    NicknameTaken,
    RateLimited,
    SelfReferralNotAllowed,
    AlreadyRedeemed,
    InvalidCode,
    LimitReached,

    // --- Transport ---
    InvalidMessage,
    InvalidJson,

    // --- Server ---
    InternalError,
}

impl ErrorCode {
    /// The exact wire string sent to clients; equal to the `serde` rename.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::WsAuthFailed => "ws_auth_failed",
            Self::InitDataEmpty => "initData_empty",
            Self::HashMissing => "hash_missing",
            Self::AuthDateMissing => "auth_date_missing",
            Self::AuthDateInvalid => "auth_date_invalid",
            Self::AuthDateExpired => "auth_date_expired",
            Self::SignatureInvalid => "signature_invalid",
            Self::UserMissing => "user_missing",
            Self::UserInvalid => "user_invalid",

            Self::InvalidRoomId => "invalid_room_id",
            Self::InvalidPayload => "invalid_payload",
            Self::InvalidMode => "invalid_mode",
            Self::InvalidScore => "invalid_score",
            Self::CapacityInvalid => "capacity_invalid",
            Self::RoomCodeRequired => "room_code_required",
            Self::ReadyInvalid => "ready_invalid",
            Self::InvalidNickname => "invalid_nickname",
            Self::InvalidDisplayName => "invalid_display_name",
            Self::InvalidUsername => "invalid_username",
            Self::QRequired => "q_required",
            Self::CodeRequired => "code_required",
            Self::SkuRequired => "sku_required",

            Self::RoomNotFound => "room_not_found",
            Self::RoomFull => "room_full",
            Self::RoomClosed => "room_closed",
            Self::RoomStarted => "room_started",
            Self::NotAMember => "not_a_member",
            Self::Forbidden => "forbidden",
            Self::NotRoomOwner => "not_room_owner",
            Self::NotEnoughPlayers => "not_enough_players",
            Self::NotAllReady => "not_all_ready",
            Self::RoomCodeConflict => "room_code_conflict",
            Self::WrongPassword => "wrong_password",
            Self::RoomNotJoined => "room_not_joined",

            Self::NotInRoom => "not_in_room",
            Self::NotEnoughWsPlayers => "not_enough_ws_players",
            Self::RestartVoteAlreadyActive => "restart_vote_already_active",
            Self::RestartProposeNotAllowed => "restart_propose_not_allowed",
            Self::RestartProposeCooldown => "restart_propose_cooldown",

            Self::InsufficientFunds => "insufficient_funds",
            Self::AlreadyOwned => "already_owned",
            Self::NotPurchasable => "not_purchasable",
            Self::SkuNotFound => "sku_not_found",
            Self::AlreadyFriends => "already_friends",
            Self::AlreadyRequested => "already_requested",
            Self::UserNotFound => "user_not_found",
            Self::InvalidTarget => "invalid_target",
            Self::RequestNotFound => "request_not_found",
            Self::NicknameTaken => "nickname_taken",
            Self::RateLimited => "rate_limited",
            Self::SelfReferralNotAllowed => "self_referral_not_allowed",
            Self::AlreadyRedeemed => "already_redeemed",
            Self::InvalidCode => "invalid_code",
            Self::LimitReached => "limit_reached",

            Self::InvalidMessage => "invalid_message",
            Self::InvalidJson => "invalid_json",

            Self::InternalError => "internal_error",
        }
    }

    /// A `room_started:<reason>` qualified variant, used when the lobby
    /// service surfaces a more specific reason than the bare code
    /// (e.g. `room_started:rejoin_grace_expired`).
    #[must_use]
    pub fn qualified(&self, reason: &str) -> String {
        format!("{}:{reason}", self.as_str())
    }

    /// Maps this error code onto the REST/WS status families
    /// (401/400/409/403/404/429/500, or close codes for WS).
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::Unauthorized
            | Self::WsAuthFailed
            | Self::InitDataEmpty
            | Self::HashMissing
            | Self::AuthDateMissing
            | Self::AuthDateInvalid
            | Self::AuthDateExpired
            | Self::SignatureInvalid
            | Self::UserMissing
            | Self::UserInvalid => 401,

            Self::Forbidden | Self::NotRoomOwner => 403,

            Self::RoomNotFound
            | Self::UserNotFound
            | Self::SkuNotFound
            | Self::RequestNotFound => 404,

            Self::RateLimited => 429,

            Self::RoomFull
            | Self::RoomClosed
            | Self::RoomStarted
            | Self::NotAMember
            | Self::NotEnoughPlayers
            | Self::NotAllReady
            | Self::RoomCodeConflict
            | Self::WrongPassword
            | Self::RoomNotJoined
            | Self::NotInRoom
            | Self::NotEnoughWsPlayers
            | Self::RestartVoteAlreadyActive
            | Self::RestartProposeNotAllowed
            | Self::RestartProposeCooldown
            | Self::AlreadyOwned
            | Self::AlreadyFriends
            | Self::AlreadyRequested
            | Self::AlreadyRedeemed => 409,

            Self::InternalError => 500,

            _ => 400,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_strings_match_spec_literals() {
        assert_eq!(ErrorCode::RoomNotFound.as_str(), "room_not_found");
        assert_eq!(ErrorCode::WrongPassword.as_str(), "wrong_password");
        assert_eq!(ErrorCode::InitDataEmpty.as_str(), "initData_empty");
        assert_eq!(ErrorCode::HashMissing.as_str(), "hash_missing");
        assert_eq!(ErrorCode::AuthDateExpired.as_str(), "auth_date_expired");
    }

    #[test]
    fn serialization_matches_as_str() {
        let json = serde_json::to_string(&ErrorCode::RoomFull).unwrap();
        assert_eq!(json, "\"room_full\"");
    }

    #[test]
    fn qualified_reason_is_colon_joined() {
        assert_eq!(
            ErrorCode::RoomStarted.qualified("rejoin_grace_expired"),
            "room_started:rejoin_grace_expired"
        );
    }

    #[test]
    fn status_families_match_taxonomy() {
        assert_eq!(ErrorCode::Unauthorized.http_status(), 401);
        assert_eq!(ErrorCode::Forbidden.http_status(), 403);
        assert_eq!(ErrorCode::RoomNotFound.http_status(), 404);
        assert_eq!(ErrorCode::RateLimited.http_status(), 429);
        assert_eq!(ErrorCode::RoomFull.http_status(), 409);
        assert_eq!(ErrorCode::InvalidPayload.http_status(), 400);
        assert_eq!(ErrorCode::InternalError.http_status(), 500);
    }
}
