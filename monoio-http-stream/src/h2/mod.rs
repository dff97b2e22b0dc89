mod config;
mod connection;
mod frame;
mod priority;
pub mod stream;

pub use self::{
    config::StreamConfig,
    connection::{Connection, ProtocolStream},
    frame::CustomFrame,
    priority::StreamPriority,
    stream::{Http2Stream, Inbound, State, StreamHandler, StreamSlot},
};

// Constants
pub const DEFAULT_INBOUND_HIGH_WATERMARK: usize = 5;
pub const DEFAULT_OUTBOUND_HIGH_WATERMARK: usize = 16;
pub const DEFAULT_STREAM_WEIGHT: u16 = 16;
pub const MIN_STREAM_WEIGHT: u16 = 1;
pub const MAX_STREAM_WEIGHT: u16 = 256;
