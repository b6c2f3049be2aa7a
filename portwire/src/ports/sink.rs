pub(crate) mod queue_sink;
pub(crate) mod stack_sink;

use std::collections::VecDeque;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use super::PortKind;

pub use queue_sink::QueueSink;
pub use stack_sink::StackSink;

/// The buffer of a materialized sink.
///
/// Items are always appended at the back; queue sinks consume from the
/// front and stack sinks from the back.
pub(crate) struct SinkBuffer<T> {
    items: Mutex<VecDeque<T>>,
}

impl<T> SinkBuffer<T> {
    pub(crate) fn push(&self, item: T) {
        self.items.lock().push_back(item);
    }

    pub(crate) fn pop_front(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    pub(crate) fn pop_back(&self) -> Option<T> {
        self.items.lock().pop_back()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub(crate) fn take_all(&self) -> VecDeque<T> {
        std::mem::take(&mut *self.items.lock())
    }
}

/// A shared, lazily materialized sink buffer.
///
/// The buffer is created at most once, the first time a binding to the sink
/// succeeds, and is shared by all clones of the sink.
pub(crate) struct SinkHandle<T> {
    cell: Arc<OnceLock<SinkBuffer<T>>>,
}

impl<T> SinkHandle<T> {
    pub(crate) fn new() -> Self {
        Self {
            cell: Arc::new(OnceLock::new()),
        }
    }

    /// Returns the buffer, creating it if necessary.
    pub(crate) fn materialize(&self) -> &SinkBuffer<T> {
        self.cell.get_or_init(|| SinkBuffer {
            items: Mutex::new(VecDeque::new()),
        })
    }

    /// Returns the buffer if it was already materialized.
    pub(crate) fn get(&self) -> Option<&SinkBuffer<T>> {
        self.cell.get()
    }
}

impl<T> Clone for SinkHandle<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

/// A buffering in-port that can be declared by a component.
pub(crate) trait Sink<T>: Send + Sync + 'static {
    /// The kind of the sink.
    const KIND: PortKind;

    /// Returns a handle to the shared sink buffer.
    fn handle(&self) -> SinkHandle<T>;
}
