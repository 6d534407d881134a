//! # Dispatcher Errors

use thiserror::Error;

use super::ticket::TicketNumber;

/// Runtime errors returned to callers of the dispatcher.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// Admission after `shutdown()`.
    #[error("dispatcher is shut down")]
    ShutDown,

    /// No retained ticket with this number.
    #[error("ticket {0} not found")]
    NotFound(TicketNumber),

    /// The requester does not own the ticket.
    #[error("ticket {0} belongs to another caller")]
    Unauthorized(TicketNumber),

    /// `clear` on a ticket that is still queued or running.
    #[error("ticket {0} has not completed")]
    NotCompleted(TicketNumber),

    /// The caller stopped waiting; the job keeps running.
    #[error("gave up waiting for ticket {0}")]
    WaitTimedOut(TicketNumber),

    /// The job was dropped before reporting (runtime shutting down).
    #[error("ticket {0} was dropped before completion")]
    Lost(TicketNumber),
}

/// Configuration errors, fatal at startup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid timeout or interval
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
}
