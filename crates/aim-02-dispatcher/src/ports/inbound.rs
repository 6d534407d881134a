//! # Inbound Port - JobDispatcher
//!
//! Primary driving port used by the HTTP layer.
//!
//! # Example
//!
//! ```rust,ignore
//! use aim_02_dispatcher::{JobDispatcher, Work};
//!
//! async fn example(dispatcher: &impl JobDispatcher) {
//!     let outcome = dispatcher
//!         .submit_and_wait(None, Work::blocking(|| Ok(serde_json::json!({"result": "done"}))))
//!         .await;
//! }
//! ```

use std::time::Duration;

use aim_01_protocol::Address;
use async_trait::async_trait;

use crate::domain::{
    CompletionSink, DispatchError, JobOutcome, QueueStatus, TicketNumber, TicketView, Work,
};

/// Admission, status and retrieval API of a dispatcher.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    /// Append a ticket and return its number without waiting.
    ///
    /// # Errors
    /// - `ShutDown`: admission is closed
    fn submit(&self, owner: Option<Address>, work: Work) -> Result<TicketNumber, DispatchError>;

    /// Submit and wait for the outcome. The ticket is evicted once reported.
    async fn submit_and_wait(
        &self,
        owner: Option<Address>,
        work: Work,
    ) -> Result<JobOutcome, DispatchError>;

    /// [`submit_and_wait`](Self::submit_and_wait) that gives up after `limit`.
    ///
    /// The job keeps running and stays retrievable through `fetch`.
    async fn submit_and_wait_timeout(
        &self,
        owner: Option<Address>,
        work: Work,
        limit: Duration,
    ) -> Result<JobOutcome, DispatchError>;

    /// Submit with an optional completion sink; the caller polls by number.
    fn submit_async(
        &self,
        owner: Option<Address>,
        work: Work,
        on_complete: Option<CompletionSink>,
    ) -> Result<TicketNumber, DispatchError>;

    /// Current counters.
    fn status(&self) -> QueueStatus;

    /// Ticket state for its owner (or anyone, for ownerless tickets).
    ///
    /// # Errors
    /// - `NotFound`: unknown or already evicted
    /// - `Unauthorized`: `requester` is not the owner
    fn fetch(
        &self,
        number: TicketNumber,
        requester: Option<&Address>,
    ) -> Result<TicketView, DispatchError>;

    /// Remove a completed ticket.
    ///
    /// # Errors
    /// - `NotFound`, `Unauthorized`, `NotCompleted`
    fn clear(&self, number: TicketNumber, requester: Option<&Address>)
        -> Result<(), DispatchError>;
}
