use std::sync::Arc;

use bytes::Bytes;
use http::HeaderMap;

use super::Http2Stream;
use crate::{
    common::error::StreamError,
    h2::{Connection, CustomFrame, StreamPriority},
};

/// Hooks the layer above a stream implements.
///
/// Every hook runs on the connection's event loop, at most once per event and
/// in the order the events arrived. No stream lock is held while a hook runs,
/// so hooks may call back into `stream` (pause, fetch, write, reset).
#[allow(unused_variables)]
pub trait StreamHandler<C: Connection>: Sized + Send + Sync + 'static {
    fn handle_headers(
        &self,
        stream: &Arc<Http2Stream<C, Self>>,
        headers: C::Headers,
        priority: StreamPriority,
    ) {
    }

    /// An error is reported through [`StreamHandler::handle_exception`].
    fn handle_data(
        &self,
        stream: &Arc<Http2Stream<C, Self>>,
        data: Bytes,
    ) -> Result<(), StreamError> {
        Ok(())
    }

    /// End of the inbound side, with trailers (empty when there were none).
    fn handle_end(
        &self,
        stream: &Arc<Http2Stream<C, Self>>,
        trailers: HeaderMap,
    ) -> Result<(), StreamError> {
        Ok(())
    }

    fn handle_reset(&self, stream: &Arc<Http2Stream<C, Self>>, code: u64) {}

    fn handle_exception(&self, stream: &Arc<Http2Stream<C, Self>>, cause: StreamError) {}

    fn handle_close(&self, stream: &Arc<Http2Stream<C, Self>>) {}

    fn handle_priority_change(
        &self,
        stream: &Arc<Http2Stream<C, Self>>,
        priority: StreamPriority,
    ) {
    }

    fn handle_custom_frame(&self, stream: &Arc<Http2Stream<C, Self>>, frame: CustomFrame) {}

    /// Writes queued while the stream was not writable have all been sent.
    fn handle_write_queue_drained(&self, stream: &Arc<Http2Stream<C, Self>>) {}

    /// END_STREAM went out on this stream.
    fn end_written(&self, stream: &Arc<Http2Stream<C, Self>>) {}
}

impl<C: Connection> StreamHandler<C> for () {}
