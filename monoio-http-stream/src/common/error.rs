use std::{io, sync::Arc};

use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum StreamError {
    #[error("stream reset with code {0}")]
    Reset(u64),
    #[error("stream closed")]
    Closed,
    #[error("stream is not allocated yet")]
    NotAllocated,
    #[error("IO error {0}")]
    Io(Arc<io::Error>),
    #[error("handler error {0}")]
    Handler(String),
    #[error("invalid stream weight {0}, expected 1..=256")]
    InvalidWeight(u16),
    #[error("write canceled before completion")]
    Canceled,
}

impl StreamError {
    /// Whether the error terminated the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Reset(_) | Self::Closed)
    }

    /// The reset code carried by the error, if any.
    pub fn reset_code(&self) -> Option<u64> {
        match self {
            Self::Reset(code) => Some(*code),
            _ => None,
        }
    }
}

impl From<io::Error> for StreamError {
    fn from(e: io::Error) -> Self {
        Self::Io(Arc::new(e))
    }
}

// Queued writes are cancelled one by one with the same cause.
impl Clone for StreamError {
    fn clone(&self) -> Self {
        match self {
            Self::Reset(code) => Self::Reset(*code),
            Self::Closed => Self::Closed,
            Self::NotAllocated => Self::NotAllocated,
            Self::Io(e) => Self::Io(e.clone()),
            Self::Handler(msg) => Self::Handler(msg.clone()),
            Self::InvalidWeight(w) => Self::InvalidWeight(*w),
            Self::Canceled => Self::Canceled,
        }
    }
}

impl PartialEq for StreamError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Reset(a), Self::Reset(b)) => a == b,
            (Self::Closed, Self::Closed) => true,
            (Self::NotAllocated, Self::NotAllocated) => true,
            (Self::Io(a), Self::Io(b)) => a.kind() == b.kind(),
            (Self::Handler(a), Self::Handler(b)) => a == b,
            (Self::InvalidWeight(a), Self::InvalidWeight(b)) => a == b,
            (Self::Canceled, Self::Canceled) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;
