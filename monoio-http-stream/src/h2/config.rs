use super::{DEFAULT_INBOUND_HIGH_WATERMARK, DEFAULT_OUTBOUND_HIGH_WATERMARK};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Inbound items buffered before the producer is told to back off.
    pub inbound_high_watermark: usize,

    /// Queued writes after which the stream reports itself not writable.
    pub outbound_high_watermark: usize,

    /// Whether the stream is a CONNECT tunnel.
    pub connect: bool,

    /// Start with inbound delivery paused, the consumer then pulls with
    /// `do_fetch`.
    pub start_paused: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            inbound_high_watermark: DEFAULT_INBOUND_HIGH_WATERMARK,
            outbound_high_watermark: DEFAULT_OUTBOUND_HIGH_WATERMARK,
            connect: false,
            start_paused: false,
        }
    }
}

impl StreamConfig {
    pub fn inbound_high_watermark(mut self, n: usize) -> Self {
        self.inbound_high_watermark = n;
        self
    }

    pub fn outbound_high_watermark(mut self, n: usize) -> Self {
        self.outbound_high_watermark = n;
        self
    }

    pub fn connect(mut self, connect: bool) -> Self {
        self.connect = connect;
        self
    }

    pub fn start_paused(mut self, paused: bool) -> Self {
        self.start_paused = paused;
        self
    }
}
