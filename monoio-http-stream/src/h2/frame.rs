use bytes::Bytes;

/// An extension frame the connection does not interpret, forwarded to and
/// from the consumer as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomFrame {
    pub frame_type: u8,
    pub flags: u8,
    pub payload: Bytes,
}

impl CustomFrame {
    pub fn new(frame_type: u8, flags: u8, payload: Bytes) -> Self {
        Self {
            frame_type,
            flags,
            payload,
        }
    }
}
