//! Worker pool
//!
//! Consumes connection events and dispatches them to the engine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use crossbeam::channel::{self, Receiver, Sender};

use crate::engine::Switchboard;
use crate::error::{Result, SwitchboardError};
use crate::transport::Fd;

/// What the WebSocket server reports
#[derive(Debug, Clone)]
pub enum Event {
    /// Handshake completed
    Open(Fd),

    /// Inbound frame
    Frame(Fd, Bytes),

    /// Connection closed
    Close(Fd),
}

/// Counters since startup
#[derive(Debug, Default)]
pub struct ServerStats {
    pub frames: AtomicU64,
    pub faults: AtomicU64,
    pub closes: AtomicU64,
}

/// Worker pool driving a [`Switchboard`]
pub struct Server {
    switchboard: Arc<Switchboard>,
    tx: Option<Sender<Event>>,
    workers: Vec<JoinHandle<()>>,
    stats: Arc<ServerStats>,
}

impl Server {
    /// Start `config.workers` threads
    pub fn start(switchboard: Arc<Switchboard>) -> Result<Self> {
        let count = switchboard.config().workers;
        let (tx, rx) = channel::unbounded();
        let stats = Arc::new(ServerStats::default());

        let mut workers = Vec::with_capacity(count);
        for id in 0..count {
            let rx = rx.clone();
            let switchboard = Arc::clone(&switchboard);
            let stats = Arc::clone(&stats);
            let handle = thread::Builder::new()
                .name(format!("switchboard-worker-{}", id))
                .spawn(move || Self::worker_loop(id, rx, switchboard, stats))?;
            workers.push(handle);
        }

        tracing::info!("Started {} workers", count);
        Ok(Self {
            switchboard,
            tx: Some(tx),
            workers,
            stats,
        })
    }

    fn worker_loop(
        id: usize,
        rx: Receiver<Event>,
        switchboard: Arc<Switchboard>,
        stats: Arc<ServerStats>,
    ) {
        tracing::debug!("Worker {} running", id);

        for event in rx.iter() {
            match event {
                Event::Open(fd) => {
                    tracing::debug!("Worker {}: fd {} opened", id, fd);
                }
                Event::Frame(fd, frame) => {
                    stats.frames.fetch_add(1, Ordering::Relaxed);
                    if switchboard.handle_frame(fd, &frame).is_err() {
                        stats.faults.fetch_add(1, Ordering::Relaxed);
                    }
                }
                Event::Close(fd) => {
                    stats.closes.fetch_add(1, Ordering::Relaxed);
                    if let Err(e) = switchboard.close_connection(fd) {
                        tracing::warn!("Worker {}: cleanup for fd {} failed: {}", id, fd, e);
                    }
                }
            }
        }

        tracing::debug!("Worker {} stopped", id);
    }

    /// Queue an event for the workers
    pub fn submit(&self, event: Event) -> Result<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| SwitchboardError::Transport("server is shut down".to_string()))?;
        tx.send(event)
            .map_err(|_| SwitchboardError::Transport("worker queue closed".to_string()))
    }

    /// Stop accepting events, drain the queue and join every worker
    pub fn shutdown(&mut self) {
        // Dropping the sender ends each worker's loop once the queue is empty
        self.tx.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("Worker thread panicked");
            }
        }
        tracing::info!("Server stopped");
    }

    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    pub fn switchboard(&self) -> &Arc<Switchboard> {
        &self.switchboard
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if self.tx.is_some() {
            self.shutdown();
        }
    }
}
