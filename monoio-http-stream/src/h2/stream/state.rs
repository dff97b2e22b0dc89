use crate::h2::ProtocolStream;

/// Whether the protocol stream backing a controller exists yet.
#[derive(Debug, Clone, Default)]
pub enum StreamSlot<S> {
    #[default]
    Unallocated,
    Allocated(S),
}

impl<S: ProtocolStream> StreamSlot<S> {
    pub fn handle(&self) -> Option<&S> {
        match self {
            Self::Allocated(stream) => Some(stream),
            Self::Unallocated => None,
        }
    }

    pub fn id(&self) -> Option<u32> {
        self.handle().map(ProtocolStream::id)
    }

    pub fn is_allocated(&self) -> bool {
        matches!(self, Self::Allocated(_))
    }
}

/// Stream state as seen from this end (RFC 7540 Section 5.1).
///
/// Never stored, derived from what has been sent and received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Open,
    /// END_STREAM sent, the peer may still send.
    HalfClosedLocal,
    /// Peer sent END_STREAM, we may still send.
    HalfClosedRemote,
    Closed,
}

impl State {
    pub(crate) fn derive(
        allocated: bool,
        terminated: bool,
        end_written: bool,
        remote_open: bool,
    ) -> Self {
        match (allocated, terminated, end_written, remote_open) {
            (_, true, _, _) => Self::Closed,
            (false, false, _, _) => Self::Idle,
            (true, false, true, false) => Self::Closed,
            (true, false, true, true) => Self::HalfClosedLocal,
            (true, false, false, false) => Self::HalfClosedRemote,
            (true, false, false, true) => Self::Open,
        }
    }

    pub fn is_send_closed(&self) -> bool {
        matches!(self, Self::HalfClosedLocal | Self::Closed)
    }

    pub fn is_recv_closed(&self) -> bool {
        matches!(self, Self::HalfClosedRemote | Self::Closed)
    }
}
