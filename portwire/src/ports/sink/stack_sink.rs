use std::fmt;

use super::{Sink, SinkHandle};
use crate::ports::PortKind;

/// A last-in-first-out buffering in-port.
///
/// Same as [`QueueSink`](crate::ports::QueueSink), except that the most
/// recent event is consumed first.
pub struct StackSink<T> {
    handle: SinkHandle<T>,
}

impl<T> StackSink<T> {
    /// Creates an unconnected `StackSink`.
    pub fn new() -> Self {
        Self {
            handle: SinkHandle::new(),
        }
    }

    /// Returns `true` once the buffer was created by a successful connection.
    pub fn is_materialized(&self) -> bool {
        self.handle.get().is_some()
    }

    /// Removes and returns the most recent event.
    pub fn pop(&self) -> Option<T> {
        self.handle.get().and_then(|buffer| buffer.pop_back())
    }

    /// Removes and returns all buffered events, most recent first.
    pub fn drain(&self) -> Vec<T> {
        self.handle
            .get()
            .map(|buffer| buffer.take_all().into_iter().rev().collect())
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

impl<T: Send + 'static> Sink<T> for StackSink<T> {
    const KIND: PortKind = PortKind::StackSink;

    fn handle(&self) -> SinkHandle<T> {
        self.handle.clone()
    }
}

impl<T> Clone for StackSink<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
        }
    }
}

impl<T> Default for StackSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for StackSink<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackSink")
            .field("materialized", &self.is_materialized())
            .field("len", &self.len())
            .finish()
    }
}
