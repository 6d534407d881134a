//! # Job Dispatcher (AIM-02)
//!
//! Serializes expensive work submitted concurrently by many HTTP callers,
//! with a configurable degree of parallelism.
//!
//! ## Ticket Lifecycle
//!
//! ```text
//! submit ──→ [Queued] ──promote──→ [Running] ──finish──→ [Completed] ──evict──→ gone
//!                                                           │
//!                                     waiter / sink notified┘
//! ```
//!
//! | Mode | Method | Caller sees |
//! |------|--------|-------------|
//! | Fire and forget | `submit()` | ticket number |
//! | Blocking | `submit_and_wait()` | the outcome; ticket evicted after reporting |
//! | Poll by handle | `submit_async()` | ticket number; `fetch()` later |
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Numbers strictly increase, no gaps | `domain/queue.rs` - `admit()` |
//! | FIFO promotion | `domain/queue.rs` - `promote()` walks the pending sequence in order |
//! | At most `concurrency` running | `domain/queue.rs` - `promote()` |
//! | Pending = Queued + Running | `domain/queue.rs` - `complete()` removes from pending |
//! | One failing job never stalls the queue | `service.rs` - outcomes captured from `JoinError` |
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  service.rs - Dispatcher: scheduling cycle, blocking bridge     │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ports/inbound.rs  - JobDispatcher trait                        │
//! │  ports/outbound.rs - TimeSource trait                           │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  domain/ticket.rs - TicketNumber, JobOutcome, QueueStatus       │
//! │  domain/queue.rs  - JobQueue state machine                      │
//! │  domain/work.rs   - Work (blocking | future), CompletionSink    │
//! │  domain/config.rs - DispatcherConfig, RetentionPolicy           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::{
    CompletionSink, ConfigError, DispatchError, DispatcherConfig, FailureKind, JobFailure,
    JobOutcome, JobState, QueueStatus, RetentionPolicy, TicketNumber, TicketView, Work,
    WorkResult,
};
pub use ports::{JobDispatcher, SystemTimeSource, TimeSource};
pub use service::{Dispatcher, DispatcherStats, StatsSnapshot};
