use chrono::NaiveDateTime;
use derive_more::Display;

/// Rejected attendance transitions. Every variant is a local validation
/// failure; nothing here is worth retrying.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[display(fmt = "Please check out from your current session before checking in again")]
    InvalidTransition,

    #[display(fmt = "No active check-in record found")]
    NoActiveSession,

    #[display(fmt = "Attendance record {} not found", _0)]
    RecordNotFound(u64),

    #[display(fmt = "Attendance record {} is already checked out", _0)]
    AlreadyClosed(u64),

    #[display(fmt = "Timestamp {} is out of order with {}", timestamp, bound)]
    InvalidTimestamp {
        timestamp: NaiveDateTime,
        bound: NaiveDateTime,
    },
}

impl std::error::Error for SessionError {}

impl SessionError {
    /// Stable machine-readable identifier for API payloads.
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::InvalidTransition => "invalid_transition",
            SessionError::NoActiveSession => "no_active_session",
            SessionError::RecordNotFound(_) => "record_not_found",
            SessionError::AlreadyClosed(_) => "already_closed",
            SessionError::InvalidTimestamp { .. } => "invalid_timestamp",
        }
    }
}
