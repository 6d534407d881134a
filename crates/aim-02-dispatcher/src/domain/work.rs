//! # Work Items
//!
//! A unit of work is either a blocking closure (run on the blocking pool) or a
//! future (run as a task). The scheduler treats both the same way.

use std::fmt;
use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;

use super::ticket::{JobOutcome, TicketNumber};

/// What a work item produces.
pub type WorkResult = anyhow::Result<Value>;

/// Called once when a ticket completes, outside the queue lock.
pub type CompletionSink = Box<dyn FnOnce(TicketNumber, &JobOutcome) + Send + 'static>;

/// Callable plus captured arguments.
pub enum Work {
    Blocking(Box<dyn FnOnce() -> WorkResult + Send + 'static>),
    Future(BoxFuture<'static, WorkResult>),
}

impl Work {
    /// Wrap a blocking closure.
    pub fn blocking<F>(f: F) -> Self
    where
        F: FnOnce() -> WorkResult + Send + 'static,
    {
        Work::Blocking(Box::new(f))
    }

    /// Wrap a future.
    pub fn future<Fut>(fut: Fut) -> Self
    where
        Fut: Future<Output = WorkResult> + Send + 'static,
    {
        Work::Future(fut.boxed())
    }

    pub fn is_blocking(&self) -> bool {
        matches!(self, Work::Blocking(_))
    }
}

impl fmt::Debug for Work {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Work::Blocking(_) => f.write_str("Work::Blocking"),
            Work::Future(_) => f.write_str("Work::Future"),
        }
    }
}
