//! Session Oracle (C2): resolves a bearer token to a `tgUserId` with TTL.

pub mod session;

pub use session::{mint_session_token, SessionOracle};
