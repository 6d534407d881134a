//! Domain layer: ticket model and the pure queue state machine.

pub mod config;
pub mod errors;
pub mod queue;
pub mod ticket;
pub mod work;

pub use config::{DispatcherConfig, RetentionPolicy};
pub use errors::{ConfigError, DispatchError};
pub use queue::{JobQueue, Timestamp};
pub use ticket::{FailureKind, JobFailure, JobOutcome, JobState, QueueStatus, TicketNumber, TicketView};
pub use work::{CompletionSink, Work, WorkResult};
