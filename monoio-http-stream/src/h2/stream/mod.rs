//! One HTTP/2 stream on top of a shared connection.
//!
//! [`Http2Stream`] is where connection events and application writes for a
//! single stream meet. Inbound frames go through an [`InboundBuffer`] so the
//! consumer controls the pace, outbound frames go through an
//! [`OutboundMessageQueue`] gated by the stream's writability. All state
//! changes happen on the connection's event loop; calls made from other
//! threads are posted there.

mod handler;
mod state;


use std::{
    fmt,
    sync::{Arc, Weak},
};

use bytes::Bytes;
use http::HeaderMap;
use parking_lot::Mutex;

pub use self::{
    handler::StreamHandler,
    state::{State, StreamSlot},
};
use super::{Connection, CustomFrame, ProtocolStream, StreamConfig, StreamPriority};
use crate::{
    common::error::StreamError,
    util::{
        inbound::InboundBuffer,
        outbound::{MessageWrite, OutboundMessageQueue, WriteGate},
        promise::{promise, Promise, WriteFuture},
    },
};

/// Item of the inbound buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Data(Bytes),
    /// Terminal marker, carries the trailers.
    End(HeaderMap),
}

enum QueuedWrite<Hd> {
    Headers {
        headers: Hd,
        end: bool,
        check_flush: bool,
        promise: Promise,
    },
    Data {
        chunk: Option<Bytes>,
        end: bool,
        promise: Promise,
    },
}

impl<Hd: Send> MessageWrite for QueuedWrite<Hd> {
    fn cancel(self, cause: StreamError) {
        match self {
            Self::Headers { promise, .. } | Self::Data { promise, .. } => promise.fail(cause),
        }
    }
}

/// Queued writes pass when the stream is allocated and writable.
struct StreamGate<C: Connection, H> {
    stream: Weak<Http2Stream<C, H>>,
}

impl<C, H> WriteGate<QueuedWrite<C::Headers>> for StreamGate<C, H>
where
    C: Connection,
    H: StreamHandler<C>,
{
    fn test(&self, msg: QueuedWrite<C::Headers>) -> Result<(), QueuedWrite<C::Headers>> {
        match self.stream.upgrade() {
            Some(stream) => stream.try_write(msg),
            None => Err(msg),
        }
    }

    fn write_queue_drained(&self) {
        if let Some(stream) = self.stream.upgrade() {
            stream.emit(|s| s.handler.handle_write_queue_drained(s));
        }
    }
}

#[derive(Debug)]
struct StreamState {
    writable: bool,
    priority: StreamPriority,
    bytes_read: u64,
    bytes_written: u64,
    end_written: bool,
    reset: Option<u64>,
    closed: bool,
}

impl StreamState {
    fn termination(&self) -> Option<StreamError> {
        match self.reset {
            Some(code) => Some(StreamError::Reset(code)),
            None if self.closed => Some(StreamError::Closed),
            None => None,
        }
    }
}

pub struct Http2Stream<C: Connection, H> {
    conn: Arc<C>,
    handler: H,
    // Identity checks may race allocation, the handle has its own lock.
    stream: Mutex<StreamSlot<C::Stream>>,
    state: Mutex<StreamState>,
    pending: InboundBuffer<Inbound>,
    queue: OutboundMessageQueue<QueuedWrite<C::Headers>, StreamGate<C, H>>,
    is_connect: bool,
}

impl<C, H> Http2Stream<C, H>
where
    C: Connection,
    H: StreamHandler<C>,
{
    pub fn new(conn: Arc<C>, handler: H) -> Arc<Self> {
        Self::with_config(conn, handler, StreamConfig::default())
    }

    /// Create the controller ahead of the protocol stream, [`Http2Stream::init`]
    /// binds it once the connection allocated one.
    pub fn with_config(conn: Arc<C>, handler: H, config: StreamConfig) -> Arc<Self> {
        let stream = Arc::new_cyclic(|weak: &Weak<Self>| Self {
            conn,
            handler,
            stream: Mutex::new(StreamSlot::Unallocated),
            state: Mutex::new(StreamState {
                writable: true,
                priority: StreamPriority::default(),
                bytes_read: 0,
                bytes_written: 0,
                end_written: false,
                reset: None,
                closed: false,
            }),
            pending: InboundBuffer::new(config.inbound_high_watermark),
            queue: OutboundMessageQueue::with_high_watermark(
                StreamGate {
                    stream: weak.clone(),
                },
                config.outbound_high_watermark,
            ),
            is_connect: config.connect,
        });

        let weak = Arc::downgrade(&stream);
        stream.pending.handler(move |item| match weak.upgrade() {
            Some(stream) => stream.deliver(item),
            None => Ok(()),
        });
        let weak = Arc::downgrade(&stream);
        stream.pending.exception_handler(move |cause| {
            if let Some(stream) = weak.upgrade() {
                stream.handler.handle_exception(&stream, cause);
            }
        });
        if config.start_paused {
            stream.pending.pause();
        } else {
            stream.pending.resume();
        }
        stream
    }

    /// Bind the allocated protocol stream. Writes queued so far are released
    /// if the connection lets the stream write.
    pub fn init(self: &Arc<Self>, handle: C::Stream) {
        let id = handle.id();
        let writable = self.conn.is_writable(&handle);
        {
            let mut slot = self.stream.lock();
            if let Some(existing) = slot.id() {
                tracing::warn!(existing, id, "stream already allocated");
                return;
            }
            *slot = StreamSlot::Allocated(handle);
        }
        self.state.lock().writable = writable;
        tracing::debug!(id, writable, "stream allocated");
        self.emit(|s| s.queue.drain());
    }

    // Connection events.

    pub fn on_headers(self: &Arc<Self>, headers: C::Headers, priority: StreamPriority) {
        self.emit(move |s| s.handler.handle_headers(s, headers, priority));
    }

    pub fn on_data(self: &Arc<Self>, data: Bytes) {
        self.conn.report_bytes_read(data.len() as u64);
        self.emit(move |s| {
            if s.is_terminated() {
                let len = data.len();
                tracing::trace!(id = ?s.id(), len, "dropping data on terminated stream");
                return;
            }
            if !s.pending.write(Inbound::Data(data)) {
                tracing::trace!(id = ?s.id(), buffered = s.pending.len(), "inbound buffer full");
            }
        });
    }

    pub fn on_end(self: &Arc<Self>) {
        self.on_end_with_trailers(HeaderMap::new());
    }

    pub fn on_end_with_trailers(self: &Arc<Self>, trailers: HeaderMap) {
        self.conn.flush_bytes_read();
        self.emit(move |s| {
            if s.is_terminated() {
                return;
            }
            let trailers = if s.is_connect && !trailers.is_empty() {
                tracing::trace!(id = ?s.id(), "discarding trailers on CONNECT stream");
                HeaderMap::new()
            } else {
                trailers
            };
            s.pending.write(Inbound::End(trailers));
        });
    }

    pub fn on_reset(self: &Arc<Self>, code: u64) {
        self.emit(move |s| s.reset(code));
    }

    pub fn on_priority_change(self: &Arc<Self>, priority: StreamPriority) {
        self.emit(move |s| {
            let changed = {
                let mut state = s.state.lock();
                if state.priority != priority {
                    state.priority = priority;
                    true
                } else {
                    false
                }
            };
            if changed {
                s.handler.handle_priority_change(s, priority);
            }
        });
    }

    pub fn on_custom_frame(self: &Arc<Self>, frame: CustomFrame) {
        self.emit(move |s| s.handler.handle_custom_frame(s, frame));
    }

    pub fn on_writability_changed(self: &Arc<Self>) {
        self.emit(|s| {
            let writable = {
                let mut state = s.state.lock();
                state.writable = !state.writable;
                state.writable
            };
            tracing::trace!(id = ?s.id(), writable, "writability changed");
            if writable {
                s.queue.drain();
            }
        });
    }

    pub fn on_close(self: &Arc<Self>) {
        self.conn.flush_bytes_written();
        self.emit(|s| {
            {
                let mut state = s.state.lock();
                if state.closed {
                    return;
                }
                state.closed = true;
            }
            s.queue.close(StreamError::Closed);
            tracing::debug!(id = ?s.id(), "stream closed");
            s.handler.handle_close(s);
        });
    }

    pub fn on_exception(self: &Arc<Self>, cause: StreamError) {
        self.emit(move |s| {
            tracing::debug!(id = ?s.id(), %cause, "stream exception");
            s.queue.close(cause.clone());
            s.handler.handle_exception(s, cause);
        });
    }

    // Application writes.

    /// Write a frame right away, ahead of anything queued.
    pub fn write_frame(self: &Arc<Self>, frame_type: u8, flags: u8, payload: Bytes) -> WriteFuture {
        let (promise, fut) = promise();
        self.write_frame_with_promise(frame_type, flags, payload, promise);
        fut
    }

    pub fn write_frame_with_promise(
        self: &Arc<Self>,
        frame_type: u8,
        flags: u8,
        payload: Bytes,
        promise: Promise,
    ) {
        self.emit(move |s| {
            if let Some((handle, promise)) = s.immediate_handle(promise) {
                s.conn.write_frame(&handle, frame_type, flags, payload, promise);
            }
        });
    }

    /// `first` headers open the stream and are written immediately, later
    /// ones (trailers) are ordered after the data queued before them.
    pub fn write_headers(
        self: &Arc<Self>,
        headers: C::Headers,
        first: bool,
        end: bool,
        check_flush: bool,
        promise: Promise,
    ) {
        if first {
            self.emit(move |s| {
                if let Some((handle, promise)) = s.immediate_handle(promise) {
                    s.do_write_headers(&handle, headers, end, check_flush, promise);
                }
            });
        } else {
            self.enqueue(QueuedWrite::Headers {
                headers,
                end,
                check_flush,
                promise,
            });
        }
    }

    /// Queue a DATA frame. `None` with `end` sends an empty terminal frame.
    pub fn write_data(self: &Arc<Self>, chunk: Option<Bytes>, end: bool, promise: Promise) {
        self.enqueue(QueuedWrite::Data {
            chunk,
            end,
            promise,
        });
    }

    /// Reset the stream. Before allocation there is nothing to reset on the
    /// wire, the reset is then only observed locally. Either way the stream is
    /// terminated and later writes fail with [`StreamError::Reset`].
    pub fn write_reset(self: &Arc<Self>, code: u64) {
        self.emit(move |s| {
            let id = s.stream.lock().id();
            match id {
                Some(id) => {
                    {
                        let mut state = s.state.lock();
                        if state.termination().is_some() {
                            return;
                        }
                        state.reset = Some(code);
                    }
                    tracing::debug!(id, code, "writing reset");
                    s.conn.write_reset(id, code);
                    s.pending.clear();
                    s.queue.close(StreamError::Reset(code));
                }
                None => {
                    tracing::debug!(code, "reset before allocation");
                    s.reset(code);
                }
            }
        });
    }

    /// Change the priority, a PRIORITY frame goes out only when the value
    /// changed and the stream is allocated.
    pub fn update_priority(self: &Arc<Self>, priority: StreamPriority) {
        let changed = {
            let mut state = self.state.lock();
            if state.priority != priority {
                state.priority = priority;
                true
            } else {
                false
            }
        };
        if changed {
            self.emit(move |s| {
                let handle = s.stream.lock().handle().cloned();
                if let Some(handle) = handle {
                    s.conn.write_priority(&handle, &priority);
                }
            });
        }
    }

    /// Set the priority without telling the peer.
    pub fn set_priority(&self, priority: StreamPriority) {
        self.state.lock().priority = priority;
    }

    pub fn priority(&self) -> StreamPriority {
        self.state.lock().priority
    }

    // Inbound flow control.

    pub fn do_pause(self: &Arc<Self>) {
        self.emit(|s| s.pending.pause());
    }

    /// Deliveries run on the event loop, whichever thread asked for them.
    pub fn do_fetch(self: &Arc<Self>, amount: u64) {
        self.emit(move |s| {
            s.pending.fetch(amount);
        });
    }

    /// Whether enough writes are queued that the producer should back off
    /// until [`StreamHandler::handle_write_queue_drained`].
    pub fn is_not_writable(&self) -> bool {
        !self.queue.is_writable()
    }

    // Accessors.

    /// `None` until the protocol stream is allocated.
    pub fn id(&self) -> Option<u32> {
        self.stream.lock().id()
    }

    pub fn bytes_read(&self) -> u64 {
        self.state.lock().bytes_read
    }

    pub fn bytes_written(&self) -> u64 {
        self.state.lock().bytes_written
    }

    pub fn is_connect(&self) -> bool {
        self.is_connect
    }

    /// Writability last reported by the connection.
    pub fn is_writable(&self) -> bool {
        self.state.lock().writable
    }

    pub fn state(&self) -> State {
        let (allocated, remote_open) = match self.stream.lock().handle() {
            Some(handle) => (true, handle.remote_side_open()),
            None => (false, true),
        };
        let state = self.state.lock();
        State::derive(
            allocated,
            state.reset.is_some() || state.closed,
            state.end_written,
            remote_open,
        )
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn connection(&self) -> &Arc<C> {
        &self.conn
    }

    // Internals, all running on the event loop.

    fn emit<F>(self: &Arc<Self>, f: F)
    where
        F: FnOnce(&Arc<Self>) + Send + 'static,
    {
        let event_loop = self.conn.event_loop();
        if event_loop.in_event_loop() {
            f(self);
        } else {
            let this = self.clone();
            event_loop.execute(Box::new(move || f(&this)));
        }
    }

    fn enqueue(self: &Arc<Self>, msg: QueuedWrite<C::Headers>) {
        self.emit(move |s| {
            s.queue.write(msg);
        });
    }

    fn is_terminated(&self) -> bool {
        let state = self.state.lock();
        state.reset.is_some() || state.closed
    }

    fn handle(&self) -> Option<C::Stream> {
        self.stream.lock().handle().cloned()
    }

    /// Handle for a write that bypasses the queue. Fails the promise when the
    /// stream is gone or not allocated yet.
    fn immediate_handle(&self, promise: Promise) -> Option<(C::Stream, Promise)> {
        let termination = self.state.lock().termination();
        if let Some(cause) = termination {
            promise.fail(cause);
            return None;
        }
        match self.handle() {
            Some(handle) => Some((handle, promise)),
            None => {
                promise.fail(StreamError::NotAllocated);
                None
            }
        }
    }

    fn reset(self: &Arc<Self>, code: u64) {
        {
            let mut state = self.state.lock();
            if state.reset.is_some() {
                return;
            }
            state.reset = Some(code);
        }
        let dropped = self.pending.clear();
        self.queue.close(StreamError::Reset(code));
        tracing::debug!(id = ?self.id(), code, dropped, "stream reset");
        self.handler.handle_reset(self, code);
    }

    fn deliver(self: &Arc<Self>, item: Inbound) -> Result<(), StreamError> {
        match item {
            Inbound::Data(data) => {
                let len = data.len();
                if let Some(handle) = self.handle() {
                    // Bytes of an upgraded stream arrived over HTTP/1 and
                    // were never charged against the HTTP/2 window.
                    if handle.remote_side_open() {
                        self.conn.consume_credits(&handle, len);
                    }
                }
                self.state.lock().bytes_read += len as u64;
                tracing::trace!(id = ?self.id(), len, "deliver data");
                self.handler.handle_data(self, data)
            }
            Inbound::End(trailers) => {
                tracing::trace!(id = ?self.id(), "deliver end");
                self.handler.handle_end(self, trailers)
            }
        }
    }

    fn try_write(
        self: &Arc<Self>,
        msg: QueuedWrite<C::Headers>,
    ) -> Result<(), QueuedWrite<C::Headers>> {
        let handle = match self.handle() {
            Some(handle) => handle,
            None => return Err(msg),
        };
        if !self.state.lock().writable {
            return Err(msg);
        }
        match msg {
            QueuedWrite::Headers {
                headers,
                end,
                check_flush,
                promise,
            } => self.do_write_headers(&handle, headers, end, check_flush, promise),
            QueuedWrite::Data {
                chunk,
                end,
                promise,
            } => self.do_write_data(&handle, chunk, end, promise),
        }
        Ok(())
    }

    fn do_write_headers(
        self: &Arc<Self>,
        handle: &C::Stream,
        headers: C::Headers,
        end: bool,
        check_flush: bool,
        promise: Promise,
    ) {
        let priority = self.priority();
        self.conn
            .write_headers(handle, headers, end, &priority, check_flush, promise);
        if end {
            self.end_written();
        }
    }

    fn do_write_data(
        self: &Arc<Self>,
        handle: &C::Stream,
        chunk: Option<Bytes>,
        end: bool,
        promise: Promise,
    ) {
        let chunk = chunk.unwrap_or_default();
        let len = chunk.len() as u64;
        self.state.lock().bytes_written += len;
        self.conn.report_bytes_written(len);
        tracing::trace!(id = handle.id(), len, end, "write data");
        self.conn.write_data(handle, chunk, end, promise);
        if end {
            self.end_written();
        }
    }

    fn end_written(self: &Arc<Self>) {
        self.state.lock().end_written = true;
        self.handler.end_written(self);
    }
}

impl<C: Connection, H> fmt::Debug for Http2Stream<C, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Http2Stream")
            .field("id", &self.stream.lock().id())
            .field("state", &*self.state.lock())
            .field("is_connect", &self.is_connect)
            .finish()
    }
}
