//! Errors surfaced by the peer synchronizer.

/// Transport failures are logged and absorbed by the synchronizer, one
/// per-peer failure does not abort the round. Auth failures are always
/// surfaced — the core never swallows them.
#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("authentication error: {0}")]
    Auth(String),
}
