use bytes::Bytes;

use super::StreamPriority;
use crate::util::{event_loop::EventLoop, promise::Promise};

/// The protocol level stream a [`super::Http2Stream`] gets bound to once the
/// connection allocated it.
pub trait ProtocolStream: Clone + Send + Sync + 'static {
    fn id(&self) -> u32;

    /// Whether the peer may still send on this stream.
    fn remote_side_open(&self) -> bool;
}

/// What a stream needs from the connection it is multiplexed on.
///
/// Frame encoding, HPACK and connection window updates all live behind this
/// trait. Every method is called on the connection's event loop.
pub trait Connection: Send + Sync + 'static {
    type Stream: ProtocolStream;
    type Headers: Send + 'static;

    fn event_loop(&self) -> &dyn EventLoop;

    // Frame writes. The promise completes when the transport took the frame.

    fn write_frame(
        &self,
        stream: &Self::Stream,
        frame_type: u8,
        flags: u8,
        payload: Bytes,
        promise: Promise,
    );

    fn write_headers(
        &self,
        stream: &Self::Stream,
        headers: Self::Headers,
        end: bool,
        priority: &StreamPriority,
        check_flush: bool,
        promise: Promise,
    );

    fn write_data(&self, stream: &Self::Stream, data: Bytes, end: bool, promise: Promise);

    fn write_priority(&self, stream: &Self::Stream, priority: &StreamPriority);

    fn write_reset(&self, stream_id: u32, code: u64);

    /// Whether flow control lets `stream` send data right now.
    fn is_writable(&self, stream: &Self::Stream) -> bool;

    // Byte accounting.

    /// Return `len` bytes of receive window the consumer is done with.
    fn consume_credits(&self, stream: &Self::Stream, len: usize);

    fn report_bytes_read(&self, len: u64);

    fn report_bytes_written(&self, len: u64);

    fn flush_bytes_read(&self);

    fn flush_bytes_written(&self);
}
