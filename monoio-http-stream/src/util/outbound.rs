//! Ordered, gated outbound writes.
//!
//! Items run one at a time in submission order. Before running an item the
//! queue asks the [`WriteGate`]; a refusal puts the item back at the head and
//! halts the queue until [`OutboundMessageQueue::drain`] is called again.

use std::{collections::VecDeque, fmt};

use parking_lot::Mutex;

use crate::{common::error::StreamError, h2::DEFAULT_OUTBOUND_HIGH_WATERMARK};

/// A queued write operation.
pub trait MessageWrite: Send {
    /// The write will never run, fail its continuation with `cause`.
    fn cancel(self, cause: StreamError);
}

/// Decides whether queued writes may proceed.
pub trait WriteGate<M>: Send + Sync {
    /// Run `msg` if the gate is open, hand it back otherwise.
    fn test(&self, msg: M) -> Result<(), M>;

    /// The queue was halted and has now been fully drained.
    fn write_queue_drained(&self) {}
}

pub struct OutboundMessageQueue<M, G> {
    gate: G,
    inner: Mutex<QueueInner<M>>,
}

struct QueueInner<M> {
    pending: VecDeque<M>,
    high_watermark: usize,
    draining: bool,
    halted: bool,
    closed: Option<StreamError>,
}

impl<M, G> OutboundMessageQueue<M, G>
where
    M: MessageWrite,
    G: WriteGate<M>,
{
    pub fn new(gate: G) -> Self {
        Self::with_high_watermark(gate, DEFAULT_OUTBOUND_HIGH_WATERMARK)
    }

    pub fn with_high_watermark(gate: G, high_watermark: usize) -> Self {
        Self {
            gate,
            inner: Mutex::new(QueueInner {
                pending: VecDeque::new(),
                high_watermark,
                draining: false,
                halted: false,
                closed: None,
            }),
        }
    }

    /// Submit a write. It runs right away when nothing is queued ahead of it
    /// and the gate is open.
    ///
    /// Returns `false` once the queue depth reached the high-watermark.
    pub fn write(&self, msg: M) -> bool {
        let idle = {
            let mut inner = self.inner.lock();
            if let Some(cause) = inner.closed.clone() {
                drop(inner);
                msg.cancel(cause);
                return false;
            }
            inner.pending.push_back(msg);
            !inner.draining && !inner.halted && inner.pending.len() == 1
        };
        if idle {
            self.drain_loop();
        }
        self.is_writable()
    }

    /// Retry the head of the queue and keep going while the gate accepts.
    pub fn drain(&self) {
        self.drain_loop();
    }

    /// Cancel everything still queued with `cause`. Later writes are
    /// cancelled on submission.
    pub fn close(&self, cause: StreamError) {
        let cancelled = {
            let mut inner = self.inner.lock();
            if inner.closed.is_some() {
                return;
            }
            inner.closed = Some(cause.clone());
            inner.halted = false;
            std::mem::take(&mut inner.pending)
        };
        if !cancelled.is_empty() {
            tracing::trace!(count = cancelled.len(), %cause, "cancelling queued writes");
        }
        for msg in cancelled {
            msg.cancel(cause.clone());
        }
    }

    pub fn is_writable(&self) -> bool {
        let inner = self.inner.lock();
        inner.pending.len() < inner.high_watermark
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed.is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().pending.is_empty()
    }

    pub fn gate(&self) -> &G {
        &self.gate
    }

    fn drain_loop(&self) {
        loop {
            let msg = {
                let mut inner = self.inner.lock();
                if inner.draining || inner.closed.is_some() {
                    return;
                }
                match inner.pending.pop_front() {
                    Some(msg) => {
                        inner.draining = true;
                        msg
                    }
                    None => {
                        let was_halted = std::mem::take(&mut inner.halted);
                        drop(inner);
                        if was_halted {
                            tracing::trace!("write queue drained");
                            self.gate.write_queue_drained();
                        }
                        return;
                    }
                }
            };

            if let Err(msg) = self.gate.test(msg) {
                let mut inner = self.inner.lock();
                inner.draining = false;
                if let Some(cause) = inner.closed.clone() {
                    drop(inner);
                    msg.cancel(cause);
                    return;
                }
                inner.pending.push_front(msg);
                inner.halted = true;
                tracing::trace!(queued = inner.pending.len(), "write gate closed");
                return;
            }
            self.inner.lock().draining = false;
        }
    }
}

impl<M, G> fmt::Debug for OutboundMessageQueue<M, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("OutboundMessageQueue")
            .field("pending", &inner.pending.len())
            .field("halted", &inner.halted)
            .field("closed", &inner.closed)
            .finish()
    }
}
