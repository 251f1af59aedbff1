//! Bounded hand-off from the edge-capture context to the decoder.
//!
//! GPIO interrupt handlers (or the thread standing in for them) only ever
//! touch an [`EdgeSender`]: it never blocks and never allocates. The single
//! poll loop owns the [`EdgeReceiver`] and drains it on every tick. When the
//! queue is full the edge is dropped and counted, so the decoder can fail the
//! frame instead of decoding a truncated one.

use crate::frame::Edge;
use doorman_core::DataLine;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use std::time::Instant;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

/// Constructor for the edge channel pair.
pub struct EdgeQueue;

impl EdgeQueue {
    /// Create a queue holding at most `capacity` pending edges.
    ///
    /// A capacity of zero is raised to one.
    ///
    /// # Examples
    ///
    /// ```
    /// use doorman_core::DataLine;
    /// use doorman_wiegand::EdgeQueue;
    /// use std::time::Instant;
    ///
    /// let (tx, mut rx) = EdgeQueue::bounded(4);
    /// assert!(tx.send(DataLine::D1, Instant::now()));
    /// assert_eq!(rx.try_recv().map(|e| e.line), Some(DataLine::D1));
    /// ```
    pub fn bounded(capacity: usize) -> (EdgeSender, EdgeReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));

        (
            EdgeSender {
                tx,
                dropped: Arc::clone(&dropped),
            },
            EdgeReceiver { rx, dropped },
        )
    }
}

/// Producer side, cloneable and safe to use from any thread.
#[derive(Debug, Clone)]
pub struct EdgeSender {
    tx: mpsc::Sender<Edge>,
    dropped: Arc<AtomicU64>,
}

impl EdgeSender {
    /// Record an edge without blocking.
    ///
    /// Returns `false` if the edge was dropped because the queue is full or
    /// the decoder is gone.
    pub fn send(&self, line: DataLine, at: Instant) -> bool {
        match self.tx.try_send(Edge::new(line, at)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Returns `true` once the receiving decoder has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side, owned by the decoder.
#[derive(Debug)]
pub struct EdgeReceiver {
    rx: mpsc::Receiver<Edge>,
    dropped: Arc<AtomicU64>,
}

impl EdgeReceiver {
    /// Take the next pending edge, if any.
    pub fn try_recv(&mut self) -> Option<Edge> {
        match self.rx.try_recv() {
            Ok(edge) => Some(edge),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Total number of edges dropped since the queue was created.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
