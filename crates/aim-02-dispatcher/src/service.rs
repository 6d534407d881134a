//! # Dispatcher Service
//!
//! Async wrapper around [`JobQueue`]: owns the scheduling cycle, bridges
//! blocking work onto the blocking pool and reports outcomes to waiters.
//!
//! Flow:
//! 1. `submit*` admits a ticket under the queue lock and wakes the cycle
//! 2. The cycle promotes head tickets while a slot is free (every tick, or
//!    immediately when woken)
//! 3. Each promoted ticket runs in its own task; blocking work goes through
//!    `spawn_blocking` behind a semaphore
//! 4. `finish` records the outcome, wakes the waiter, then calls the sink

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use aim_01_protocol::Address;
use aim_telemetry::{JOBS_COMPLETED, JOBS_SUBMITTED, JOB_DURATION, PENDING_JOBS, RUNNING_JOBS};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{oneshot, watch, Notify, Semaphore};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::domain::{
    CompletionSink, ConfigError, DispatchError, DispatcherConfig, FailureKind, JobOutcome,
    JobQueue, QueueStatus, RetentionPolicy, TicketNumber, TicketView, Work, WorkResult,
};
use crate::ports::{JobDispatcher, SystemTimeSource, TimeSource};

/// What a ticket carries until it is promoted.
struct Job {
    work: Work,
    sink: Option<CompletionSink>,
    waiter: Option<oneshot::Sender<JobOutcome>>,
    /// The caller holds the ticket number and may still fetch the result.
    number_known: bool,
}

const BLOCKING_RUNNING: u8 = 0;
const BLOCKING_DONE: u8 = 1;
const BLOCKING_ABANDONED: u8 = 2;

/// Lives on a blocking thread until its closure returns or unwinds.
struct BlockingGuard {
    state: Arc<AtomicU8>,
    stranded: Arc<AtomicU64>,
}

impl Drop for BlockingGuard {
    fn drop(&mut self) {
        if self.state.swap(BLOCKING_DONE, Ordering::SeqCst) == BLOCKING_ABANDONED {
            self.stranded.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Statistics for the dispatcher
#[derive(Debug, Default)]
pub struct DispatcherStats {
    /// Tickets admitted
    pub submitted: AtomicU64,
    /// Tickets completed, any outcome
    pub completed: AtomicU64,
    /// Tickets whose work errored or panicked
    pub failed: AtomicU64,
    /// Tickets that overran the job timeout
    pub timed_out: AtomicU64,
}

/// Point-in-time copy of [`DispatcherStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
    /// Blocking threads still running after their job timed out. Each holds
    /// one of the `blocking_threads` permits.
    pub stranded_blocking: u64,
}

struct Inner {
    config: DispatcherConfig,
    queue: Mutex<JobQueue<Job>>,
    wake: Notify,
    shut_down: AtomicBool,
    stopped: watch::Sender<bool>,
    stats: DispatcherStats,
    time: Arc<dyn TimeSource>,
    blocking_permits: Arc<Semaphore>,
    stranded_blocking: Arc<AtomicU64>,
}

/// Job dispatcher handle. Cheap to clone; all clones share one queue.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// Validate `config` and spawn the scheduling cycle on the current runtime.
    pub fn start(config: DispatcherConfig) -> Result<Self, ConfigError> {
        Self::start_with_time(config, Arc::new(SystemTimeSource))
    }

    /// [`start`](Self::start) with an explicit clock.
    pub fn start_with_time(
        config: DispatcherConfig,
        time: Arc<dyn TimeSource>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let (stopped, _) = watch::channel(false);
        let inner = Arc::new(Inner {
            blocking_permits: Arc::new(Semaphore::new(config.blocking_threads)),
            stranded_blocking: Arc::new(AtomicU64::new(0)),
            queue: Mutex::new(JobQueue::new()),
            wake: Notify::new(),
            shut_down: AtomicBool::new(false),
            stopped,
            stats: DispatcherStats::default(),
            time,
            config,
        });

        info!(
            concurrency = inner.config.concurrency,
            tick_ms = inner.config.tick_interval.as_millis() as u64,
            blocking_threads = inner.config.blocking_threads,
            retention = ?inner.config.retention,
            "Dispatcher started"
        );

        tokio::spawn(run_cycle(Arc::clone(&inner)));
        Ok(Self { inner })
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.inner.config
    }

    /// Stop admission. Already admitted tickets still run; the cycle exits
    /// once they are done.
    pub fn shutdown(&self) {
        if !self.inner.shut_down.swap(true, Ordering::SeqCst) {
            info!("Dispatcher shutting down, draining admitted tickets");
        }
        self.inner.wake.notify_one();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }

    /// Resolves once the scheduling cycle has exited after `shutdown()`.
    pub async fn closed(&self) {
        let mut stopped = self.inner.stopped.subscribe();
        // Err means the sender is gone, which also means the cycle is gone.
        let _ = stopped.wait_for(|done| *done).await;
    }

    /// Evict completed tickets older than the TTL. No-op for other policies.
    pub fn sweep_expired(&self) -> usize {
        self.inner.sweep_expired()
    }

    /// Tickets currently held, completed ones included.
    pub fn retained_tickets(&self) -> usize {
        self.inner.queue.lock().retained()
    }

    pub fn stats(&self) -> StatsSnapshot {
        let stats = &self.inner.stats;
        StatsSnapshot {
            submitted: stats.submitted.load(Ordering::Relaxed),
            completed: stats.completed.load(Ordering::Relaxed),
            failed: stats.failed.load(Ordering::Relaxed),
            timed_out: stats.timed_out.load(Ordering::Relaxed),
            stranded_blocking: self.inner.stranded_blocking.load(Ordering::SeqCst),
        }
    }

    fn admit(
        &self,
        owner: Option<Address>,
        work: Work,
        sink: Option<CompletionSink>,
        waiter: Option<oneshot::Sender<JobOutcome>>,
        number_known: bool,
    ) -> Result<TicketNumber, DispatchError> {
        let blocking = work.is_blocking();
        let number = {
            let mut queue = self.inner.queue.lock();
            // Checked under the lock so the cycle never exits with an admitted ticket.
            if self.inner.shut_down.load(Ordering::SeqCst) {
                return Err(DispatchError::ShutDown);
            }
            let job = Job {
                work,
                sink,
                waiter,
                number_known,
            };
            let number = queue.admit(owner, job);
            PENDING_JOBS.set(queue.status().pending_length as i64);
            number
        };

        self.inner.stats.submitted.fetch_add(1, Ordering::Relaxed);
        JOBS_SUBMITTED.inc();
        debug!(ticket = %number, owner = ?owner, blocking, "Ticket admitted");

        self.inner.wake.notify_one();
        Ok(number)
    }
}

#[async_trait]
impl JobDispatcher for Dispatcher {
    fn submit(&self, owner: Option<Address>, work: Work) -> Result<TicketNumber, DispatchError> {
        self.admit(owner, work, None, None, true)
    }

    async fn submit_and_wait(
        &self,
        owner: Option<Address>,
        work: Work,
    ) -> Result<JobOutcome, DispatchError> {
        let (tx, rx) = oneshot::channel();
        let number = self.admit(owner, work, None, Some(tx), false)?;
        rx.await.map_err(|_| DispatchError::Lost(number))
    }

    async fn submit_and_wait_timeout(
        &self,
        owner: Option<Address>,
        work: Work,
        limit: Duration,
    ) -> Result<JobOutcome, DispatchError> {
        let (tx, rx) = oneshot::channel();
        let number = self.admit(owner, work, None, Some(tx), true)?;
        match tokio::time::timeout(limit, rx).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(_)) => Err(DispatchError::Lost(number)),
            Err(_) => {
                debug!(ticket = %number, limit_ms = limit.as_millis() as u64, "Caller stopped waiting");
                Err(DispatchError::WaitTimedOut(number))
            }
        }
    }

    fn submit_async(
        &self,
        owner: Option<Address>,
        work: Work,
        on_complete: Option<CompletionSink>,
    ) -> Result<TicketNumber, DispatchError> {
        self.admit(owner, work, on_complete, None, true)
    }

    fn status(&self) -> QueueStatus {
        self.inner.queue.lock().status()
    }

    fn fetch(
        &self,
        number: TicketNumber,
        requester: Option<&Address>,
    ) -> Result<TicketView, DispatchError> {
        let view = self
            .inner
            .queue
            .lock()
            .fetch(number, requester, self.inner.config.retention);
        if let Err(DispatchError::Unauthorized(_)) = &view {
            warn!(ticket = %number, requester = ?requester, "Ticket fetch by non-owner");
        }
        view
    }

    fn clear(
        &self,
        number: TicketNumber,
        requester: Option<&Address>,
    ) -> Result<(), DispatchError> {
        self.inner.queue.lock().clear(number, requester)?;
        debug!(ticket = %number, "Ticket cleared");
        Ok(())
    }
}

impl Inner {
    fn sweep_expired(&self) -> usize {
        let RetentionPolicy::Ttl { ttl } = self.config.retention else {
            return 0;
        };
        let removed = self.queue.lock().sweep_expired(self.time.now(), ttl);
        if removed > 0 {
            debug!(removed = removed, "Swept expired tickets");
        }
        removed
    }

    /// Wait for a job task, applying the job timeout. `blocking` is the
    /// thread state of blocking work.
    async fn await_job(
        &self,
        mut handle: JoinHandle<WorkResult>,
        blocking: Option<&AtomicU8>,
    ) -> JobOutcome {
        let joined = match self.config.job_timeout {
            None => handle.await,
            Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    // Async work is cancelled. A blocking thread runs to the end
                    // holding its pool permit; its result is discarded.
                    handle.abort();
                    if let Some(state) = blocking {
                        self.abandon_blocking(state);
                    }
                    return JobOutcome::timed_out(format!(
                        "job exceeded {}ms",
                        limit.as_millis()
                    ));
                }
            },
        };
        outcome_from_join(joined)
    }

    async fn execute(&self, work: Work) -> JobOutcome {
        match work {
            Work::Blocking(f) => {
                let permit = match Arc::clone(&self.blocking_permits).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return JobOutcome::failed("blocking pool closed"),
                };
                let state = Arc::new(AtomicU8::new(BLOCKING_RUNNING));
                let guard = BlockingGuard {
                    state: Arc::clone(&state),
                    stranded: Arc::clone(&self.stranded_blocking),
                };
                let handle = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    let _guard = guard;
                    f()
                });
                self.await_job(handle, Some(&state)).await
            }
            Work::Future(fut) => self.await_job(tokio::spawn(fut), None).await,
        }
    }

    /// Count a timed-out blocking thread as stranded unless it already returned.
    fn abandon_blocking(&self, state: &AtomicU8) {
        self.stranded_blocking.fetch_add(1, Ordering::SeqCst);
        let abandoned = state
            .compare_exchange(
                BLOCKING_RUNNING,
                BLOCKING_ABANDONED,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();
        if abandoned {
            warn!("Timed-out blocking job still holds a pool thread");
        } else {
            self.stranded_blocking.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn finish(
        &self,
        number: TicketNumber,
        outcome: JobOutcome,
        sink: Option<CompletionSink>,
        waiter: Option<oneshot::Sender<JobOutcome>>,
        number_known: bool,
        elapsed: Duration,
    ) {
        let now = self.time.now();
        {
            let mut queue = self.queue.lock();
            if !queue.complete(number, outcome.clone(), now) {
                warn!(ticket = %number, "Completion for a ticket that was not running");
            }
            if let Some(waiter) = waiter {
                if waiter.send(outcome.clone()).is_ok() {
                    queue.evict(number);
                } else if number_known {
                    debug!(ticket = %number, "Waiter gone, ticket retained for fetch");
                } else {
                    // Nobody can name this ticket any more.
                    queue.evict(number);
                    debug!(ticket = %number, "Waiter gone, ticket dropped");
                }
            }
            let status = queue.status();
            PENDING_JOBS.set(status.pending_length as i64);
            RUNNING_JOBS.set(status.running as i64);
        }

        self.record_completion(number, &outcome, elapsed);
        self.wake.notify_one();

        if let Some(sink) = sink {
            sink(number, &outcome);
        }
    }

    fn record_completion(&self, number: TicketNumber, outcome: &JobOutcome, elapsed: Duration) {
        self.stats.completed.fetch_add(1, Ordering::Relaxed);
        JOBS_COMPLETED.with_label_values(&[outcome.label()]).inc();
        JOB_DURATION.observe(elapsed.as_secs_f64());

        match outcome {
            JobOutcome::Succeeded(_) => {
                debug!(
                    ticket = %number,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Ticket completed"
                );
            }
            JobOutcome::Failed(failure) => {
                if failure.kind == FailureKind::TimedOut {
                    self.stats.timed_out.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                }
                warn!(
                    ticket = %number,
                    kind = failure.kind.as_str(),
                    error = %failure.message,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Ticket failed"
                );
            }
        }
    }
}

/// The scheduling cycle. Runs until shut down and drained.
async fn run_cycle(inner: Arc<Inner>) {
    let mut ticker = tokio::time::interval(inner.config.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = inner.wake.notified() => {}
        }

        inner.sweep_expired();

        let (ready, exit) = {
            let mut queue = inner.queue.lock();
            let ready = queue.promote(inner.config.concurrency);
            RUNNING_JOBS.set(queue.status().running as i64);
            let exit = inner.shut_down.load(Ordering::SeqCst) && queue.is_drained();
            (ready, exit)
        };

        for (number, job) in ready {
            debug!(ticket = %number, "Ticket promoted");
            spawn_job(Arc::clone(&inner), number, job);
        }

        if exit {
            break;
        }
    }

    inner.stopped.send_replace(true);
    info!("Dispatcher drained and stopped");
}

fn spawn_job(inner: Arc<Inner>, number: TicketNumber, job: Job) {
    tokio::spawn(async move {
        let Job {
            work,
            sink,
            waiter,
            number_known,
        } = job;
        let started = Instant::now();
        let outcome = inner.execute(work).await;
        inner.finish(number, outcome, sink, waiter, number_known, started.elapsed());
    });
}

fn outcome_from_join(joined: Result<WorkResult, JoinError>) -> JobOutcome {
    match joined {
        Ok(Ok(value)) => JobOutcome::Succeeded(value),
        Ok(Err(err)) => JobOutcome::failed(format!("{err:#}")),
        Err(err) if err.is_panic() => JobOutcome::panicked(panic_message(err.into_panic())),
        Err(err) => JobOutcome::failed(err.to_string()),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "job panicked".to_string()
    }
}
