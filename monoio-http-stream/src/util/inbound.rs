//! Demand controlled inbound delivery.
//!
//! The buffer sits between a push based producer (the connection reporting
//! frames) and a single consumer. Delivery is governed by a credit counter:
//! `resume` grants unlimited credit, `fetch(n)` adds `n`, `pause` sets it to
//! zero. The high-watermark is only a signal to the producer, items are never
//! dropped.

use std::{collections::VecDeque, fmt, sync::Arc};

use parking_lot::Mutex;

use crate::{common::error::StreamError, h2::DEFAULT_INBOUND_HIGH_WATERMARK};

type Handler<T> = Arc<dyn Fn(T) -> Result<(), StreamError> + Send + Sync>;
type ExceptionHandler = Arc<dyn Fn(StreamError) + Send + Sync>;
type DrainHandler = Arc<dyn Fn() + Send + Sync>;

const UNLIMITED: u64 = u64::MAX;

pub struct InboundBuffer<T> {
    inner: Mutex<Inner<T>>,
}

struct Inner<T> {
    pending: VecDeque<T>,
    high_watermark: usize,
    demand: u64,
    // Set while an item is handed to the consumer, re-entrant calls only
    // queue and leave the delivery to the outer loop.
    emitting: bool,
    overflow: bool,
    handler: Option<Handler<T>>,
    exception_handler: Option<ExceptionHandler>,
    drain_handler: Option<DrainHandler>,
}

impl<T> InboundBuffer<T> {
    pub fn new(high_watermark: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                pending: VecDeque::new(),
                high_watermark,
                demand: UNLIMITED,
                emitting: false,
                overflow: false,
                handler: None,
                exception_handler: None,
                drain_handler: None,
            }),
        }
    }

    /// Register the consumer.
    pub fn handler<F>(&self, handler: F)
    where
        F: Fn(T) -> Result<(), StreamError> + Send + Sync + 'static,
    {
        self.inner.lock().handler = Some(Arc::new(handler));
    }

    /// Register where consumer errors go.
    pub fn exception_handler<F>(&self, handler: F)
    where
        F: Fn(StreamError) + Send + Sync + 'static,
    {
        self.inner.lock().exception_handler = Some(Arc::new(handler));
    }

    /// Called once the buffer went over its high-watermark and got emptied.
    pub fn drain_handler<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.lock().drain_handler = Some(Arc::new(handler));
    }

    /// Enqueue an item and deliver what the current credit allows.
    ///
    /// Returns `false` once the buffered items reach the high-watermark, the
    /// producer should then stop writing until the drain handler fires.
    pub fn write(&self, item: T) -> bool {
        self.inner.lock().pending.push_back(item);
        self.deliver();
        let mut inner = self.inner.lock();
        let writable = inner.pending.len() < inner.high_watermark;
        if !writable {
            inner.overflow = true;
        }
        writable
    }

    /// Stop delivery. Buffered items stay queued.
    pub fn pause(&self) {
        self.inner.lock().demand = 0;
    }

    /// Switch to unlimited credit and flush what is buffered.
    pub fn resume(&self) {
        self.fetch(UNLIMITED);
    }

    /// Grant `amount` more deliveries. Returns whether items remain buffered.
    pub fn fetch(&self, amount: u64) -> bool {
        {
            let mut inner = self.inner.lock();
            inner.demand = inner.demand.saturating_add(amount);
        }
        self.deliver();
        !self.inner.lock().pending.is_empty()
    }

    /// Drop every buffered item, returning how many were discarded.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let dropped = inner.pending.len();
        inner.pending.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().pending.is_empty()
    }

    pub fn is_paused(&self) -> bool {
        self.inner.lock().demand == 0
    }

    pub fn is_writable(&self) -> bool {
        let inner = self.inner.lock();
        inner.pending.len() < inner.high_watermark
    }

    fn deliver(&self) {
        loop {
            let (item, handler) = {
                let mut inner = self.inner.lock();
                if inner.emitting || inner.demand == 0 {
                    return;
                }
                let handler = match inner.handler.as_ref() {
                    Some(handler) => handler.clone(),
                    None => return,
                };
                let item = match inner.pending.pop_front() {
                    Some(item) => item,
                    None => break,
                };
                if inner.demand != UNLIMITED {
                    inner.demand -= 1;
                }
                inner.emitting = true;
                (item, handler)
            };

            let result = handler(item);

            let exception_handler = {
                let mut inner = self.inner.lock();
                inner.emitting = false;
                inner.exception_handler.clone()
            };
            if let Err(cause) = result {
                match exception_handler {
                    Some(exception_handler) => exception_handler(cause),
                    None => tracing::warn!(%cause, "unhandled inbound handler error"),
                }
            }
        }

        // Queue is empty here.
        let drain_handler = {
            let mut inner = self.inner.lock();
            if inner.overflow {
                inner.overflow = false;
                inner.drain_handler.clone()
            } else {
                None
            }
        };
        if let Some(drain_handler) = drain_handler {
            drain_handler();
        }
    }
}

impl<T> Default for InboundBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_INBOUND_HIGH_WATERMARK)
    }
}

impl<T> fmt::Debug for InboundBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("InboundBuffer")
            .field("pending", &inner.pending.len())
            .field("high_watermark", &inner.high_watermark)
            .field("demand", &inner.demand)
            .finish()
    }
}
