//! Restart Vote FSM (C7): post-match unanimous-restart proposal, one active
//! vote per room, with cooldown/timeout and spam-kick penalties.
//!
//! Modeled on `rate_limit::RateLimitEntry`'s window-reset idiom (a
//! window-start timestamp plus lazy reset) for the per-proposer cooldown,
//! and `coordination::room_coordinator`'s `DashMap<RoomCode, _>` ownership
//! shape for the one-vote-per-room index.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use thiserror::Error;

use crate::protocol::ErrorCode;

#[derive(Debug, Error)]
pub enum RestartVoteError {
    #[error("a restart vote is already active for this room")]
    AlreadyActive,
    #[error("proposer is in restart cooldown until {retry_at_ms}")]
    Cooldown { retry_at_ms: i64 },
    #[error("no restart vote is active for this room")]
    NoActiveVote,
    #[error("caller already voted")]
    AlreadyVoted,
}

impl RestartVoteError {
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::AlreadyActive => ErrorCode::RestartVoteAlreadyActive,
            Self::Cooldown { .. } => ErrorCode::RestartProposeCooldown,
            Self::NoActiveVote | Self::AlreadyVoted => ErrorCode::RestartProposeNotAllowed,
        }
    }
}

/// One room's in-flight restart vote.
#[derive(Debug, Clone)]
struct ActiveVote {
    proposer_user_id: String,
    yes: HashSet<String>,
    no: HashSet<String>,
    total: usize,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct Penalty {
    cooldown_until: Option<DateTime<Utc>>,
    ignored_count: u32,
}

/// Outcome of a `vote` call.
#[derive(Debug, Clone)]
pub enum VoteOutcome {
    /// Still collecting votes; broadcast `room:restart_vote_state`.
    Pending { yes_count: u32, total: u32 },
    /// Every member voted yes; broadcast `room:restart_accepted` and start a
    /// fresh match.
    Accepted,
    /// A `no` vote cancelled the proposal.
    Cancelled { retry_at_ms: i64 },
}

/// A vote that expired without being accepted, returned by [`RestartVoteFsm::sweep_timeouts`].
#[derive(Debug, Clone)]
pub struct TimedOutVote {
    pub room_code: String,
    pub proposer_user_id: String,
    pub retry_at_ms: i64,
    /// Set once `ignoredCount` reaches the configured strike limit; the
    /// gateway should terminate the proposer's socket with `restart_spam`.
    pub should_kick: bool,
}

/// Post-match restart proposal/voting state machine (C7).
pub struct RestartVoteFsm {
    votes: DashMap<String, ActiveVote>,
    penalties: DashMap<String, Penalty>,
    timeout_secs: i64,
    cooldown_secs: i64,
    spam_strikes: u32,
}

impl RestartVoteFsm {
    #[must_use]
    pub fn new(timeout_secs: u64, cooldown_secs: u64, spam_strikes: u32) -> Self {
        Self {
            votes: DashMap::new(),
            penalties: DashMap::new(),
            timeout_secs: timeout_secs as i64,
            cooldown_secs: cooldown_secs as i64,
            spam_strikes,
        }
    }

    fn penalty_key(room_code: &str, user_id: &str) -> String {
        format!("{room_code}|{user_id}")
    }

    /// `room:restart_propose`. The proposer implicitly votes yes.
    pub fn propose(
        &self,
        room_code: &str,
        proposer_user_id: &str,
        member_ids: &[String],
    ) -> Result<DateTime<Utc>, RestartVoteError> {
        if self.votes.contains_key(room_code) {
            return Err(RestartVoteError::AlreadyActive);
        }

        let key = Self::penalty_key(room_code, proposer_user_id);
        if let Some(penalty) = self.penalties.get(&key) {
            if let Some(until) = penalty.cooldown_until {
                if until > Utc::now() {
                    return Err(RestartVoteError::Cooldown { retry_at_ms: until.timestamp_millis() });
                }
            }
        }

        let expires_at = Utc::now() + Duration::seconds(self.timeout_secs);
        let mut yes = HashSet::new();
        yes.insert(proposer_user_id.to_string());
        self.votes.insert(
            room_code.to_string(),
            ActiveVote {
                proposer_user_id: proposer_user_id.to_string(),
                yes,
                no: HashSet::new(),
                total: member_ids.len(),
                expires_at,
            },
        );
        Ok(expires_at)
    }

    /// `room:restart_vote{vote}`.
    pub fn vote(&self, room_code: &str, user_id: &str, yes: bool) -> Result<VoteOutcome, RestartVoteError> {
        let mut entry = self.votes.get_mut(room_code).ok_or(RestartVoteError::NoActiveVote)?;

        if yes {
            if !entry.yes.insert(user_id.to_string()) {
                return Err(RestartVoteError::AlreadyVoted);
            }
            if entry.yes.len() >= entry.total {
                let proposer = entry.proposer_user_id.clone();
                drop(entry);
                self.votes.remove(room_code);
                self.penalties.remove(&Self::penalty_key(room_code, &proposer));
                return Ok(VoteOutcome::Accepted);
            }
            Ok(VoteOutcome::Pending { yes_count: entry.yes.len() as u32, total: entry.total as u32 })
        } else {
            entry.no.insert(user_id.to_string());
            let proposer = entry.proposer_user_id.clone();
            drop(entry);
            let retry_at_ms = self.apply_cooldown(room_code, &proposer);
            self.votes.remove(room_code);
            Ok(VoteOutcome::Cancelled { retry_at_ms })
        }
    }

    fn apply_cooldown(&self, room_code: &str, proposer_user_id: &str) -> i64 {
        let key = Self::penalty_key(room_code, proposer_user_id);
        let until = Utc::now() + Duration::seconds(self.cooldown_secs);
        self.penalties.entry(key).or_default().cooldown_until = Some(until);
        until.timestamp_millis()
    }

    /// Removes every active vote whose `expiresAtMs` has passed, applying the
    /// `timeout` cancellation penalty (cooldown + `ignoredCount++`, kicking
    /// the proposer at the configured strike count).
    pub fn sweep_timeouts(&self, now: DateTime<Utc>) -> Vec<TimedOutVote> {
        let expired: Vec<(String, String)> = self
            .votes
            .iter()
            .filter(|e| e.expires_at <= now)
            .map(|e| (e.key().clone(), e.proposer_user_id.clone()))
            .collect();

        let mut results = Vec::new();
        for (room_code, proposer_user_id) in expired {
            self.votes.remove(&room_code);
            let retry_at_ms = self.apply_cooldown(&room_code, &proposer_user_id);

            let key = Self::penalty_key(&room_code, &proposer_user_id);
            let mut penalty = self.penalties.entry(key.clone()).or_default();
            penalty.ignored_count += 1;
            let should_kick = penalty.ignored_count >= self.spam_strikes;
            if should_kick {
                penalty.ignored_count = 0;
            }
            drop(penalty);

            results.push(TimedOutVote { room_code, proposer_user_id, retry_at_ms, should_kick });
        }
        results
    }

    #[must_use]
    pub fn has_active_vote(&self, room_code: &str) -> bool {
        self.votes.contains_key(room_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members() -> Vec<String> {
        vec!["a".into(), "b".into()]
    }

    #[test]
    fn unanimous_yes_accepts() {
        let fsm = RestartVoteFsm::new(10, 60, 3);
        fsm.propose("R1", "a", &members()).unwrap();
        let outcome = fsm.vote("R1", "b", true).unwrap();
        assert!(matches!(outcome, VoteOutcome::Accepted));
        assert!(!fsm.has_active_vote("R1"));
    }

    #[test]
    fn no_vote_cancels_and_applies_cooldown() {
        let fsm = RestartVoteFsm::new(10, 60, 3);
        fsm.propose("R1", "a", &members()).unwrap();
        let outcome = fsm.vote("R1", "b", false).unwrap();
        assert!(matches!(outcome, VoteOutcome::Cancelled { .. }));

        let err = fsm.propose("R1", "a", &members()).unwrap_err();
        assert!(matches!(err, RestartVoteError::Cooldown { .. }));
    }

    #[test]
    fn second_proposal_while_active_is_rejected() {
        let fsm = RestartVoteFsm::new(10, 60, 3);
        fsm.propose("R1", "a", &members()).unwrap();
        let err = fsm.propose("R1", "b", &members()).unwrap_err();
        assert!(matches!(err, RestartVoteError::AlreadyActive));
    }

    #[test]
    fn third_timeout_triggers_kick() {
        let fsm = RestartVoteFsm::new(0, 0, 3);
        for i in 0..3 {
            fsm.propose("R1", "c", &members()).unwrap();
            let timeouts = fsm.sweep_timeouts(Utc::now() + Duration::seconds(1));
            assert_eq!(timeouts.len(), 1);
            let kicked = timeouts[0].should_kick;
            assert_eq!(kicked, i == 2, "strike {i}");
        }
    }
}
