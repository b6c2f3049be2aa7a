use std::fmt;

use super::{Sink, SinkHandle};
use crate::ports::PortKind;

/// A first-in-first-out buffering in-port.
///
/// A `QueueSink` receives events from the event out-port it is connected to
/// and stores them until they are consumed by the owning component with
/// [`pop`](QueueSink::pop) or [`drain`](QueueSink::drain). Its buffer is only
/// created once the sink has been successfully connected; until then the sink
/// is empty.
///
/// When a `QueueSink` is cloned, the buffer remains shared.
pub struct QueueSink<T> {
    handle: SinkHandle<T>,
}

impl<T> QueueSink<T> {
    /// Creates an unconnected `QueueSink`.
    pub fn new() -> Self {
        Self {
            handle: SinkHandle::new(),
        }
    }

    /// Returns `true` once the buffer was created by a successful connection.
    pub fn is_materialized(&self) -> bool {
        self.handle.get().is_some()
    }

    /// Removes and returns the oldest buffered event.
    pub fn pop(&self) -> Option<T> {
        self.handle.get().and_then(|buffer| buffer.pop_front())
    }

    /// Removes and returns all buffered events, oldest first.
    pub fn drain(&self) -> Vec<T> {
        self.handle
            .get()
            .map(|buffer| buffer.take_all().into())
            .unwrap_or_default()
    }

    /// Returns the number of buffered events.
    pub fn len(&self) -> usize {
        self.handle.get().map_or(0, |buffer| buffer.len())
    }

    /// Returns `true` if no event is buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Send + 'static> Sink<T> for QueueSink<T> {
    const KIND: PortKind = PortKind::QueueSink;

    fn handle(&self) -> SinkHandle<T> {
        self.handle.clone()
    }
}

impl<T> Clone for QueueSink<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
        }
    }
}

impl<T> Default for QueueSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for QueueSink<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueSink")
            .field("materialized", &self.is_materialized())
            .field("len", &self.len())
            .finish()
    }
}
