use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use futures_channel::oneshot;

use crate::common::error::StreamError;

/// Create a linked promise and future pair.
pub fn promise() -> (Promise, WriteFuture) {
    let (tx, rx) = oneshot::channel();
    (Promise { tx }, WriteFuture { rx })
}

/// Completion side of a write. The connection completes it once the
/// transport acknowledged (or refused) the write.
///
/// Dropping an uncompleted promise resolves the future with
/// [`StreamError::Canceled`].
#[derive(Debug)]
pub struct Promise {
    tx: oneshot::Sender<Result<(), StreamError>>,
}

impl Promise {
    pub fn succeed(self) {
        self.complete(Ok(()));
    }

    pub fn fail(self, cause: StreamError) {
        self.complete(Err(cause));
    }

    pub fn complete(self, result: Result<(), StreamError>) {
        // The receiver may be gone, nobody is interested in the outcome then.
        let _ = self.tx.send(result);
    }

    /// Whether the future side was dropped.
    pub fn is_canceled(&self) -> bool {
        self.tx.is_canceled()
    }
}

/// Future side of a write, resolved by the matching [`Promise`].
#[derive(Debug)]
pub struct WriteFuture {
    rx: oneshot::Receiver<Result<(), StreamError>>,
}

impl WriteFuture {
    /// Non blocking check. `None` while the write is still pending.
    pub fn try_result(&mut self) -> Option<Result<(), StreamError>> {
        match self.rx.try_recv() {
            Ok(Some(result)) => Some(result),
            Ok(None) => None,
            Err(_) => Some(Err(StreamError::Canceled)),
        }
    }
}

impl Future for WriteFuture {
    type Output = Result<(), StreamError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(StreamError::Canceled)),
            Poll::Pending => Poll::Pending,
        }
    }
}
