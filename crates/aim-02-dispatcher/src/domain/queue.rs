//! # Job Queue State Machine
//!
//! Pure bookkeeping for tickets: admission, FIFO promotion, completion and
//! retention. No clocks, no tasks; the service wraps it in a single lock.
//!
//! ## Invariants
//!
//! - Ticket numbers are assigned 1, 2, 3, ... and never reused
//! - `pending` holds exactly the `Queued` and `Running` tickets, in admission order
//! - A ticket is promoted only after every earlier ticket has been promoted
//! - At most `concurrency` tickets are `Running`

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use aim_01_protocol::Address;

use super::config::RetentionPolicy;
use super::errors::DispatchError;
use super::ticket::{JobOutcome, JobState, QueueStatus, TicketNumber, TicketView};

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

struct TicketRecord<W> {
    owner: Option<Address>,
    state: JobState,
    payload: Option<W>,
    outcome: Option<JobOutcome>,
    completed_at: Option<Timestamp>,
}

impl<W> TicketRecord<W> {
    fn authorize(&self, number: TicketNumber, requester: Option<&Address>) -> Result<(), DispatchError> {
        match &self.owner {
            Some(owner) if requester != Some(owner) => Err(DispatchError::Unauthorized(number)),
            _ => Ok(()),
        }
    }

    fn view(&self, number: TicketNumber) -> TicketView {
        TicketView {
            ticket_number: number,
            owner: self.owner,
            state: self.state,
            completed: self.state == JobState::Completed,
            result: self.outcome.clone(),
        }
    }
}

/// Ticket table plus the pending sequence. `W` is whatever the executor needs
/// to run a ticket; it is handed out exactly once, at promotion.
pub struct JobQueue<W> {
    tickets: HashMap<TicketNumber, TicketRecord<W>>,
    pending: VecDeque<TicketNumber>,
    next_number: TicketNumber,
    completed_count: u64,
    running: usize,
}

impl<W> Default for JobQueue<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> JobQueue<W> {
    pub fn new() -> Self {
        Self {
            tickets: HashMap::new(),
            pending: VecDeque::new(),
            next_number: TicketNumber::FIRST,
            completed_count: 0,
            running: 0,
        }
    }

    /// Append a `Queued` ticket to the tail.
    pub fn admit(&mut self, owner: Option<Address>, payload: W) -> TicketNumber {
        let number = self.next_number;
        self.next_number = number.next();
        self.tickets.insert(
            number,
            TicketRecord {
                owner,
                state: JobState::Queued,
                payload: Some(payload),
                outcome: None,
                completed_at: None,
            },
        );
        self.pending.push_back(number);
        number
    }

    /// Promote head tickets while fewer than `concurrency` are running.
    pub fn promote(&mut self, concurrency: usize) -> Vec<(TicketNumber, W)> {
        let mut promoted = Vec::new();
        if self.running >= concurrency {
            return promoted;
        }

        for number in &self.pending {
            if self.running >= concurrency {
                break;
            }
            let Some(record) = self.tickets.get_mut(number) else {
                continue;
            };
            if record.state != JobState::Queued {
                continue;
            }
            record.state = JobState::Running;
            self.running += 1;
            if let Some(payload) = record.payload.take() {
                promoted.push((*number, payload));
            }
        }
        promoted
    }

    /// Record the outcome of a running ticket. Returns `false` if it was not running.
    pub fn complete(&mut self, number: TicketNumber, outcome: JobOutcome, now: Timestamp) -> bool {
        let Some(record) = self.tickets.get_mut(&number) else {
            return false;
        };
        if record.state != JobState::Running {
            return false;
        }
        record.state = JobState::Completed;
        record.outcome = Some(outcome);
        record.completed_at = Some(now);

        if let Some(position) = self.pending.iter().position(|n| *n == number) {
            self.pending.remove(position);
        }
        self.running -= 1;
        self.completed_count += 1;
        true
    }

    /// Drop a completed ticket from the table.
    pub fn evict(&mut self, number: TicketNumber) -> bool {
        match self.tickets.get(&number) {
            Some(record) if record.state == JobState::Completed => {
                self.tickets.remove(&number);
                true
            }
            _ => false,
        }
    }

    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            current_number: self.completed_count,
            next_number: self.next_number.value(),
            pending_length: self.pending.len(),
            running: self.running,
        }
    }

    /// Read a ticket without side effects.
    pub fn view(&self, number: TicketNumber, requester: Option<&Address>) -> Result<TicketView, DispatchError> {
        let record = self
            .tickets
            .get(&number)
            .ok_or(DispatchError::NotFound(number))?;
        record.authorize(number, requester)?;
        Ok(record.view(number))
    }

    /// Read a ticket, applying the retention policy to completed tickets.
    pub fn fetch(
        &mut self,
        number: TicketNumber,
        requester: Option<&Address>,
        retention: RetentionPolicy,
    ) -> Result<TicketView, DispatchError> {
        let view = self.view(number, requester)?;
        if view.completed && retention == RetentionPolicy::UntilFetched {
            self.tickets.remove(&number);
        }
        Ok(view)
    }

    /// Remove a completed ticket on behalf of its owner.
    pub fn clear(&mut self, number: TicketNumber, requester: Option<&Address>) -> Result<(), DispatchError> {
        let record = self
            .tickets
            .get(&number)
            .ok_or(DispatchError::NotFound(number))?;
        record.authorize(number, requester)?;
        if record.state != JobState::Completed {
            return Err(DispatchError::NotCompleted(number));
        }
        self.tickets.remove(&number);
        Ok(())
    }

    /// Evict completed tickets older than `ttl`. Returns how many were removed.
    pub fn sweep_expired(&mut self, now: Timestamp, ttl: Duration) -> usize {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let before = self.tickets.len();
        self.tickets.retain(|_, record| match record.completed_at {
            Some(at) => now.saturating_sub(at) < ttl_ms,
            None => true,
        });
        before - self.tickets.len()
    }

    /// No ticket is queued or running.
    pub fn is_drained(&self) -> bool {
        self.pending.is_empty()
    }

    /// Tickets in the table, completed ones included.
    pub fn retained(&self) -> usize {
        self.tickets.len()
    }
}
