//! Recording connection and handler shared by the unit tests.

use std::{
    io,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
};

use bytes::Bytes;
use http::HeaderMap;
use parking_lot::Mutex;

use crate::{
    common::error::StreamError,
    h2::{
        Connection, CustomFrame, Http2Stream, ProtocolStream, StreamConfig, StreamHandler,
        StreamPriority,
    },
    util::{
        event_loop::{task_queue, EventLoop, TaskQueue, TaskRunner},
        promise::Promise,
    },
};

pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone)]
pub(crate) struct MockStream {
    id: u32,
    remote_open: Arc<AtomicBool>,
}

impl MockStream {
    pub(crate) fn new(id: u32) -> Self {
        Self {
            id,
            remote_open: Arc::new(AtomicBool::new(true)),
        }
    }

    pub(crate) fn close_remote(&self) {
        self.remote_open.store(false, Ordering::SeqCst);
    }
}

impl ProtocolStream for MockStream {
    fn id(&self) -> u32 {
        self.id
    }

    fn remote_side_open(&self) -> bool {
        self.remote_open.load(Ordering::SeqCst)
    }
}

/// A frame the mock connection was asked to write.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Wire {
    Frame {
        id: u32,
        frame_type: u8,
        flags: u8,
        payload: Bytes,
    },
    Headers {
        id: u32,
        headers: HeaderMap,
        end: bool,
        priority: StreamPriority,
    },
    Data {
        id: u32,
        data: Bytes,
        end: bool,
    },
    Priority {
        id: u32,
        priority: StreamPriority,
    },
    Reset {
        id: u32,
        code: u64,
    },
}

pub(crate) struct MockConnection {
    queue: TaskQueue,
    writable: AtomicBool,
    fail_writes: AtomicBool,
    pub(crate) wire: Mutex<Vec<Wire>>,
    pub(crate) credits: Mutex<Vec<(u32, usize)>>,
    pub(crate) bytes_read: AtomicU64,
    pub(crate) bytes_written: AtomicU64,
    pub(crate) read_flushes: AtomicUsize,
    pub(crate) write_flushes: AtomicUsize,
    pub(crate) off_loop_writes: AtomicUsize,
}

impl MockConnection {
    pub(crate) fn new() -> (Arc<Self>, TaskRunner) {
        let (queue, runner) = task_queue();
        let conn = Arc::new(Self {
            queue,
            writable: AtomicBool::new(true),
            fail_writes: AtomicBool::new(false),
            wire: Mutex::new(Vec::new()),
            credits: Mutex::new(Vec::new()),
            bytes_read: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            read_flushes: AtomicUsize::new(0),
            write_flushes: AtomicUsize::new(0),
            off_loop_writes: AtomicUsize::new(0),
        });
        (conn, runner)
    }

    pub(crate) fn set_writable(&self, writable: bool) {
        self.writable.store(writable, Ordering::SeqCst);
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn take_wire(&self) -> Vec<Wire> {
        std::mem::take(&mut *self.wire.lock())
    }

    fn record(&self, frame: Wire, promise: Option<Promise>) {
        if !self.queue.in_event_loop() {
            self.off_loop_writes.fetch_add(1, Ordering::SeqCst);
        }
        self.wire.lock().push(frame);
        if let Some(promise) = promise {
            if self.fail_writes.load(Ordering::SeqCst) {
                promise.fail(io::Error::new(io::ErrorKind::BrokenPipe, "transport closed").into());
            } else {
                promise.succeed();
            }
        }
    }
}

impl Connection for MockConnection {
    type Stream = MockStream;
    type Headers = HeaderMap;

    fn event_loop(&self) -> &dyn EventLoop {
        &self.queue
    }

    fn write_frame(
        &self,
        stream: &MockStream,
        frame_type: u8,
        flags: u8,
        payload: Bytes,
        promise: Promise,
    ) {
        let frame = Wire::Frame {
            id: stream.id,
            frame_type,
            flags,
            payload,
        };
        self.record(frame, Some(promise));
    }

    fn write_headers(
        &self,
        stream: &MockStream,
        headers: HeaderMap,
        end: bool,
        priority: &StreamPriority,
        _check_flush: bool,
        promise: Promise,
    ) {
        let frame = Wire::Headers {
            id: stream.id,
            headers,
            end,
            priority: *priority,
        };
        self.record(frame, Some(promise));
    }

    fn write_data(&self, stream: &MockStream, data: Bytes, end: bool, promise: Promise) {
        let frame = Wire::Data {
            id: stream.id,
            data,
            end,
        };
        self.record(frame, Some(promise));
    }

    fn write_priority(&self, stream: &MockStream, priority: &StreamPriority) {
        let frame = Wire::Priority {
            id: stream.id,
            priority: *priority,
        };
        self.record(frame, None);
    }

    fn write_reset(&self, stream_id: u32, code: u64) {
        self.record(
            Wire::Reset {
                id: stream_id,
                code,
            },
            None,
        );
    }

    fn is_writable(&self, _stream: &MockStream) -> bool {
        self.writable.load(Ordering::SeqCst)
    }

    fn consume_credits(&self, stream: &MockStream, len: usize) {
        self.credits.lock().push((stream.id, len));
    }

    fn report_bytes_read(&self, len: u64) {
        self.bytes_read.fetch_add(len, Ordering::SeqCst);
    }

    fn report_bytes_written(&self, len: u64) {
        self.bytes_written.fetch_add(len, Ordering::SeqCst);
    }

    fn flush_bytes_read(&self) {
        self.read_flushes.fetch_add(1, Ordering::SeqCst);
    }

    fn flush_bytes_written(&self) {
        self.write_flushes.fetch_add(1, Ordering::SeqCst);
    }
}

/// What a [`Recorder`] saw, in hook order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    Headers(HeaderMap, StreamPriority),
    Data(Bytes),
    End(HeaderMap),
    Reset(u64),
    Exception(StreamError),
    Close,
    Priority(StreamPriority),
    Custom(CustomFrame),
    Drained,
    EndWritten,
}

#[derive(Default)]
pub(crate) struct Recorder {
    events: Mutex<Vec<Event>>,
    fail_data: AtomicBool,
    fetch_after_data: AtomicBool,
}

impl Recorder {
    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub(crate) fn data(&self) -> Vec<Bytes> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Data(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    /// Reject every data chunk with a handler error.
    pub(crate) fn fail_data(&self) {
        self.fail_data.store(true, Ordering::SeqCst);
    }

    /// Pull the next item from inside the data hook.
    pub(crate) fn fetch_after_data(&self) {
        self.fetch_after_data.store(true, Ordering::SeqCst);
    }

    fn push(&self, event: Event) {
        self.events.lock().push(event);
    }
}

type TestStream = Http2Stream<MockConnection, Recorder>;

impl StreamHandler<MockConnection> for Recorder {
    fn handle_headers(
        &self,
        _stream: &Arc<TestStream>,
        headers: HeaderMap,
        priority: StreamPriority,
    ) {
        self.push(Event::Headers(headers, priority));
    }

    fn handle_data(&self, stream: &Arc<TestStream>, data: Bytes) -> Result<(), StreamError> {
        if self.fail_data.load(Ordering::SeqCst) {
            return Err(StreamError::Handler(format!("rejected {} bytes", data.len())));
        }
        self.push(Event::Data(data));
        if self.fetch_after_data.load(Ordering::SeqCst) {
            stream.do_fetch(1);
        }
        Ok(())
    }

    fn handle_end(
        &self,
        _stream: &Arc<TestStream>,
        trailers: HeaderMap,
    ) -> Result<(), StreamError> {
        self.push(Event::End(trailers));
        Ok(())
    }

    fn handle_reset(&self, _stream: &Arc<TestStream>, code: u64) {
        self.push(Event::Reset(code));
    }

    fn handle_exception(&self, _stream: &Arc<TestStream>, cause: StreamError) {
        self.push(Event::Exception(cause));
    }

    fn handle_close(&self, _stream: &Arc<TestStream>) {
        self.push(Event::Close);
    }

    fn handle_priority_change(&self, _stream: &Arc<TestStream>, priority: StreamPriority) {
        self.push(Event::Priority(priority));
    }

    fn handle_custom_frame(&self, _stream: &Arc<TestStream>, frame: CustomFrame) {
        self.push(Event::Custom(frame));
    }

    fn handle_write_queue_drained(&self, _stream: &Arc<TestStream>) {
        self.push(Event::Drained);
    }

    fn end_written(&self, _stream: &Arc<TestStream>) {
        self.push(Event::EndWritten);
    }
}

pub(crate) struct Fixture {
    pub(crate) conn: Arc<MockConnection>,
    pub(crate) runner: TaskRunner,
    pub(crate) stream: Arc<TestStream>,
}

impl Fixture {
    pub(crate) fn new(config: StreamConfig) -> Self {
        init_tracing();
        let (conn, runner) = MockConnection::new();
        let stream = Http2Stream::with_config(conn.clone(), Recorder::default(), config);
        Self {
            conn,
            runner,
            stream,
        }
    }

    /// A fixture whose stream is already bound to protocol stream `id`.
    pub(crate) fn allocated(id: u32) -> Self {
        let fixture = Self::new(StreamConfig::default());
        fixture.stream.init(MockStream::new(id));
        fixture
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.stream.handler().events()
    }
}
