//! # Ticket Entities
//!
//! Value types describing one unit of queued work and the queue as a whole.

use std::fmt;

use aim_01_protocol::Address;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ticket number. The first ticket of a dispatcher is 1.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketNumber(pub u64);

impl TicketNumber {
    pub const FIRST: TicketNumber = TicketNumber(1);

    pub fn value(self) -> u64 {
        self.0
    }

    /// The number after this one.
    pub fn next(self) -> TicketNumber {
        TicketNumber(self.0 + 1)
    }
}

impl fmt::Display for TicketNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TicketNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Ticket lifecycle.
///
/// ```text
/// [Queued] ──promote──→ [Running] ──finish──→ [Completed]
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed,
}

/// Why a job did not produce a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The work returned an error.
    Failed,
    /// The work panicked.
    Panicked,
    /// The work overran the configured job timeout.
    TimedOut,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Failed => "failed",
            FailureKind::Panicked => "panicked",
            FailureKind::TimedOut => "timed_out",
        }
    }
}

/// Captured execution failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// Tagged result of a completed ticket.
///
/// Serialized as `{"ok": true, "value": ..}` or
/// `{"ok": false, "error": {"kind": .., "message": ..}}` so a captured failure
/// is never confused with a value that merely looks like an error.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(into = "OutcomeEnvelope", try_from = "OutcomeEnvelope")]
pub enum JobOutcome {
    Succeeded(Value),
    Failed(JobFailure),
}

impl JobOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::failure(FailureKind::Failed, message)
    }

    pub fn panicked(message: impl Into<String>) -> Self {
        Self::failure(FailureKind::Panicked, message)
    }

    pub fn timed_out(message: impl Into<String>) -> Self {
        Self::failure(FailureKind::TimedOut, message)
    }

    fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        JobOutcome::Failed(JobFailure {
            kind,
            message: message.into(),
        })
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, JobOutcome::Succeeded(_))
    }

    /// Metric label: `succeeded`, `failed`, `panicked` or `timed_out`.
    pub fn label(&self) -> &'static str {
        match self {
            JobOutcome::Succeeded(_) => "succeeded",
            JobOutcome::Failed(failure) => failure.kind.as_str(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct OutcomeEnvelope {
    ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<JobFailure>,
}

impl From<JobOutcome> for OutcomeEnvelope {
    fn from(outcome: JobOutcome) -> Self {
        match outcome {
            JobOutcome::Succeeded(value) => OutcomeEnvelope {
                ok: true,
                value: Some(value),
                error: None,
            },
            JobOutcome::Failed(failure) => OutcomeEnvelope {
                ok: false,
                value: None,
                error: Some(failure),
            },
        }
    }
}

impl TryFrom<OutcomeEnvelope> for JobOutcome {
    type Error = String;

    fn try_from(envelope: OutcomeEnvelope) -> Result<Self, Self::Error> {
        match (envelope.ok, envelope.error) {
            // A JSON null value arrives as `None`.
            (true, _) => Ok(JobOutcome::Succeeded(envelope.value.unwrap_or(Value::Null))),
            (false, Some(failure)) => Ok(JobOutcome::Failed(failure)),
            (false, None) => Err("failed outcome without an error".to_string()),
        }
    }
}

/// Retrieval view of a ticket.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TicketView {
    pub ticket_number: TicketNumber,
    pub owner: Option<Address>,
    pub state: JobState,
    pub completed: bool,
    pub result: Option<JobOutcome>,
}

/// Queue counters, serialized with the field names existing clients read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    /// Number of completed tickets; with FIFO order this is the last completed number.
    #[serde(rename = "current_job_number")]
    pub current_number: u64,
    /// Number the next admitted ticket will get.
    #[serde(rename = "next_job_number")]
    pub next_number: u64,
    /// Tickets queued or running.
    #[serde(rename = "queue_length")]
    pub pending_length: usize,
    /// Tickets running.
    pub running: usize,
}
