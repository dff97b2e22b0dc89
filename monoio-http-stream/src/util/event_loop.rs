//! Execution context of a connection.
//!
//! Every stream of a connection mutates its state on exactly one thread. Work
//! issued from other threads is posted to the connection's [`TaskQueue`] and
//! runs when the owning [`TaskRunner`] gets to it.

use std::{
    fmt,
    future::poll_fn,
    pin::Pin,
    sync::Arc,
    thread::{self, ThreadId},
};

use futures_channel::mpsc;
use futures_core::Stream;
use parking_lot::Mutex;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// The execution context a connection hands to its streams.
pub trait EventLoop: Send + Sync {
    /// Whether the calling thread is the one running this loop.
    fn in_event_loop(&self) -> bool;

    /// Schedule `task` to run on the loop, after the tasks already queued.
    fn execute(&self, task: Task);
}

struct Shared {
    owner: Mutex<Option<ThreadId>>,
}

impl Shared {
    fn bind_current(&self) {
        *self.owner.lock() = Some(thread::current().id());
    }
}

/// Submitting side of a per connection work queue. Cheap to clone, usable
/// from any thread.
#[derive(Clone)]
pub struct TaskQueue {
    shared: Arc<Shared>,
    tx: mpsc::UnboundedSender<Task>,
}

/// Consuming side of the work queue. Runs the tasks on the thread it is
/// driven from.
pub struct TaskRunner {
    shared: Arc<Shared>,
    rx: mpsc::UnboundedReceiver<Task>,
}

/// Create a work queue owned by the calling thread.
pub fn task_queue() -> (TaskQueue, TaskRunner) {
    let shared = Arc::new(Shared {
        owner: Mutex::new(None),
    });
    shared.bind_current();
    let (tx, rx) = mpsc::unbounded();
    (
        TaskQueue {
            shared: shared.clone(),
            tx,
        },
        TaskRunner { shared, rx },
    )
}

impl EventLoop for TaskQueue {
    fn in_event_loop(&self) -> bool {
        *self.shared.owner.lock() == Some(thread::current().id())
    }

    fn execute(&self, task: Task) {
        if self.tx.unbounded_send(task).is_err() {
            tracing::debug!("event loop is gone, dropping task");
        }
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("owner", &*self.shared.owner.lock())
            .finish()
    }
}

impl TaskRunner {
    /// Run every task queued so far, including tasks those tasks queue.
    /// Returns the number of tasks run.
    pub fn run_pending(&mut self) -> usize {
        self.shared.bind_current();
        let mut ran = 0;
        while let Ok(Some(task)) = self.rx.try_next() {
            task();
            ran += 1;
        }
        if ran > 0 {
            tracing::trace!(ran, "event loop tasks run");
        }
        ran
    }

    /// Drive the queue from a monoio task until every [`TaskQueue`] is dropped.
    pub async fn run(mut self) {
        self.shared.bind_current();
        while let Some(task) = poll_fn(|cx| Pin::new(&mut self.rx).poll_next(cx)).await {
            task();
        }
        tracing::debug!("event loop stopped");
    }

    /// Run the queue as a task on the current monoio runtime. Tasks posted
    /// from other threads wake it up, which needs monoio's `sync` feature.
    pub fn spawn(self) -> monoio::task::JoinHandle<()> {
        monoio::spawn(self.run())
    }
}
