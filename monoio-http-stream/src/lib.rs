//! Per stream flow control and ordering for HTTP/2 on monoio.
//!
//! A connection multiplexes many streams; [`h2::Http2Stream`] is the piece
//! that owns one of them. It buffers inbound DATA until the consumer asks for
//! it, keeps outbound writes in submission order while the stream is not
//! writable, and funnels calls from any thread onto the connection's
//! [`util::event_loop::EventLoop`].

pub mod common;
pub mod h2;
pub mod util;

#[cfg(test)]
mod testing;

pub use common::error::{Result, StreamError};
pub use h2::{
    Connection, CustomFrame, Http2Stream, ProtocolStream, State, StreamConfig, StreamHandler,
    StreamPriority,
};
pub use util::{
    event_loop::{task_queue, EventLoop, TaskQueue, TaskRunner},
    promise::{promise, Promise, WriteFuture},
};
