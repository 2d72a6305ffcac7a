//! Reload coordination
//!
//! Keeps hot reloads and message processing mutually exclusive with two
//! independent counters. A message waits while a reload is in flight; a
//! reload waits until no message is in flight. Each side bumps its own
//! counter before re-checking the other's, so at least one of two racing
//! parties always backs off.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// Two-counter lock between messages and reloads
#[derive(Debug)]
pub struct ReloadLock {
    in_flight: AtomicUsize,
    reloading: AtomicUsize,
    poll_interval: Duration,
}

impl ReloadLock {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            reloading: AtomicUsize::new(0),
            poll_interval,
        }
    }

    /// Enter message processing, waiting out any reload
    pub fn begin_message(&self) {
        loop {
            while self.reloading.load(Ordering::SeqCst) > 0 {
                thread::sleep(self.poll_interval);
            }
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            if self.reloading.load(Ordering::SeqCst) == 0 {
                return;
            }
            decrement(&self.in_flight);
        }
    }

    pub fn end_message(&self) {
        decrement(&self.in_flight);
    }

    /// Enter a reload, waiting until no message is in flight
    pub fn begin_reload(&self) {
        loop {
            while self.in_flight.load(Ordering::SeqCst) > 0 {
                thread::sleep(self.poll_interval);
            }
            self.reloading.fetch_add(1, Ordering::SeqCst);
            if self.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            decrement(&self.reloading);
        }
    }

    pub fn end_reload(&self) {
        decrement(&self.reloading);
    }

    /// RAII form of [`begin_message`](Self::begin_message)
    pub fn message_guard(&self) -> MessageGuard<'_> {
        self.begin_message();
        MessageGuard { lock: self }
    }

    /// RAII form of [`begin_reload`](Self::begin_reload)
    pub fn reload_guard(&self) -> ReloadGuard<'_> {
        self.begin_reload();
        ReloadGuard { lock: self }
    }

    /// Periodic liveness tick.
    ///
    /// Runs `reload` only when one is wanted and neither a message nor
    /// another reload is in flight. Returns whether it ran.
    pub fn tick<F: FnOnce()>(&self, wanted: bool, reload: F) -> bool {
        if !wanted || !self.is_idle() {
            return false;
        }
        let _guard = self.reload_guard();
        reload();
        true
    }

    /// Neither counter is held
    pub fn is_idle(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) == 0 && self.reloading.load(Ordering::SeqCst) == 0
    }

    pub fn messages_in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn reloads_in_flight(&self) -> usize {
        self.reloading.load(Ordering::SeqCst)
    }
}

impl Default for ReloadLock {
    fn default() -> Self {
        Self::new(Duration::from_millis(10))
    }
}

/// Counters never go below zero
fn decrement(counter: &AtomicUsize) {
    let _ = counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
}

/// Holds the in-flight count for one message
pub struct MessageGuard<'a> {
    lock: &'a ReloadLock,
}

impl Drop for MessageGuard<'_> {
    fn drop(&mut self) {
        self.lock.end_message();
    }
}

/// Holds the reload count for one reload
pub struct ReloadGuard<'a> {
    lock: &'a ReloadLock,
}

impl Drop for ReloadGuard<'_> {
    fn drop(&mut self) {
        self.lock.end_reload();
    }
}
