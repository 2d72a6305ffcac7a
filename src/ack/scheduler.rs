//! Timer scheduling for redelivery
//!
//! Callers register a job and return immediately; the job fires later on
//! the scheduler's own thread.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::error::Result;

/// A deferred callback
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs jobs after a delay without blocking the caller
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, job: Job);
}

/// Heap entry ordered by due time, then insertion order
struct Timer<T> {
    due: T,
    seq: u64,
    job: Job,
}

impl<T: Ord> PartialEq for Timer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<T: Ord> Eq for Timer<T> {}

impl<T: Ord> PartialOrd for Timer<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Ord> Ord for Timer<T> {
    // Reversed so BinaryHeap pops the earliest timer
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

fn run(job: Job) {
    if catch_unwind(AssertUnwindSafe(job)).is_err() {
        tracing::error!("Scheduled job panicked");
    }
}

// =============================================================================
// ThreadScheduler
// =============================================================================

enum Command {
    Schedule(Instant, Job),
    Shutdown,
}

/// Scheduler backed by one timer thread
///
/// Pending timers are dropped on shutdown.
pub struct ThreadScheduler {
    tx: Sender<Command>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadScheduler {
    pub fn start() -> Result<Self> {
        let (tx, rx) = channel::unbounded();
        let handle = thread::Builder::new()
            .name("switchboard-timers".to_string())
            .spawn(move || Self::run_loop(rx))?;
        Ok(Self {
            tx,
            handle: Mutex::new(Some(handle)),
        })
    }

    fn run_loop(rx: Receiver<Command>) {
        let mut timers: BinaryHeap<Timer<Instant>> = BinaryHeap::new();
        let mut seq = 0u64;

        loop {
            let command = match timers.peek() {
                Some(next) => {
                    let wait = next.due.saturating_duration_since(Instant::now());
                    rx.recv_timeout(wait)
                }
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            match command {
                Ok(Command::Schedule(due, job)) => {
                    seq += 1;
                    timers.push(Timer { due, seq, job });
                }
                Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }

            let now = Instant::now();
            while timers.peek().map_or(false, |t| t.due <= now) {
                if let Some(timer) = timers.pop() {
                    run(timer.job);
                }
            }
        }

        if !timers.is_empty() {
            tracing::debug!("Timer thread exiting with {} pending timers", timers.len());
        }
    }

    /// Stop the timer thread and wait for it
    pub fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                tracing::error!("Timer thread panicked");
            }
        }
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule(&self, delay: Duration, job: Job) {
        if self
            .tx
            .send(Command::Schedule(Instant::now() + delay, job))
            .is_err()
        {
            tracing::warn!("Timer thread gone; dropping scheduled job");
        }
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// =============================================================================
// ManualScheduler
// =============================================================================

/// Scheduler driven by hand: time only moves when [`advance`](Self::advance)
/// is called. Deterministic, for tests and replay tooling.
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    seq: u64,
    timers: BinaryHeap<Timer<Duration>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move virtual time forward, firing every timer that comes due, in order.
    ///
    /// Returns how many jobs ran.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.state.lock().now + by;
        let mut fired = 0;

        loop {
            // Jobs may schedule more jobs, so the lock is released while one runs
            let job = {
                let mut state = self.state.lock();
                match state.timers.peek() {
                    Some(t) if t.due <= target => {
                        let timer = state.timers.pop();
                        if let Some(t) = &timer {
                            state.now = t.due;
                        }
                        timer.map(|t| t.job)
                    }
                    _ => {
                        state.now = target;
                        None
                    }
                }
            };
            match job {
                Some(job) => {
                    run(job);
                    fired += 1;
                }
                None => break,
            }
        }
        fired
    }

    /// Timers not yet fired
    pub fn pending(&self) -> usize {
        self.state.lock().timers.len()
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, job: Job) {
        let mut state = self.state.lock();
        state.seq += 1;
        let timer = Timer {
            due: state.now + delay,
            seq: state.seq,
            job,
        };
        state.timers.push(timer);
    }
}
