use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use super::binding::{BindingKey, Subscriber};
use super::declare::ErasedOutPort;
use super::{Attachment, Direction, PortDescriptor, PortKind, Signature};
use crate::runtime::dispatch;

/// The shared data of an `EventPort`.
struct Inner<T> {
    subscribers: RwLock<Vec<Subscriber<T>>>,
    attachment: RwLock<Option<Attachment>>,
}

/// An event out-port.
///
/// `EventPort`s broadcast events to all their subscribers, in the order the
/// subscribers were bound. The first successful connection claims the port;
/// further subscribers are only appended when a multicast option is passed to
/// the connection engine.
///
/// When an `EventPort` is cloned, the information on bound subscribers
/// remains shared and therefore all clones use and modify the same list of
/// subscribers.
pub struct EventPort<T: Clone + Send + 'static> {
    inner: Arc<Inner<T>>,
}

impl<T: Clone + Send + 'static> EventPort<T> {
    /// Creates a new, unconnected `EventPort`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if at least one subscriber is bound.
    pub fn is_connected(&self) -> bool {
        !self.inner.subscribers.read().is_empty()
    }

    /// Returns the number of bound subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    /// Broadcasts an event to all subscribers.
    ///
    /// Synchronous subscribers are run on the calling thread before this
    /// method returns; asynchronous subscribers are handed over to their
    /// worker pool. Triggering an unconnected port does nothing.
    pub fn trigger(&self, event: T) {
        let (runtime, origin) = match &*self.inner.attachment.read() {
            Some(a) => (a.runtime.upgrade(), a.owner),
            None => (None, None),
        };

        if let Some(runtime) = &runtime {
            runtime.interceptor().notify_sent(&event, origin);
        }

        // Work on a snapshot so that handlers may rewire this port.
        let mut subscribers = self.inner.subscribers.read().clone();
        let Some(last) = subscribers.pop() else {
            trace!(port = self.name(), "event triggered on an unconnected port");
            return;
        };
        for subscriber in subscribers {
            dispatch::deliver_event(runtime.as_ref(), origin, subscriber, event.clone());
        }
        // Move the event rather than clone it for the last subscriber.
        dispatch::deliver_event(runtime.as_ref(), origin, last, event);
    }

    /// Returns the descriptor of this port.
    ///
    /// The owner is only known once the port has been discovered by the
    /// connection engine.
    pub fn descriptor(&self) -> PortDescriptor {
        let attachment = self.inner.attachment.read();
        PortDescriptor::new(
            attachment.as_ref().and_then(|a| a.owner),
            attachment.as_ref().map_or("<undeclared>", |a| a.name),
            Direction::Out,
            PortKind::Event,
            Signature::event::<T>(),
        )
    }

    fn name(&self) -> &'static str {
        self.inner
            .attachment
            .read()
            .as_ref()
            .map_or("<undeclared>", |a| a.name)
    }

    /// Binds a subscriber.
    ///
    /// An unconnected port is always claimed. A connected port only accepts
    /// additional subscribers in multicast mode, and never twice the same
    /// in-port.
    pub(crate) fn bind(&self, subscriber: Subscriber<T>, multicast: bool) -> bool {
        let mut subscribers = self.inner.subscribers.write();
        if subscribers.is_empty() {
            subscribers.push(subscriber);
            return true;
        }
        if !multicast || subscribers.iter().any(|s| s.key() == subscriber.key()) {
            return false;
        }
        subscribers.push(subscriber);

        true
    }

    /// Removes the subscriber bound to the specified in-port, if any.
    pub(crate) fn unbind(&self, key: BindingKey) -> bool {
        let mut subscribers = self.inner.subscribers.write();
        match subscribers.iter().position(|s| s.key() == key) {
            Some(pos) => {
                // Preserve the registration order of the remaining subscribers.
                subscribers.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Removes all subscribers.
    pub(crate) fn clear(&self) {
        self.inner.subscribers.write().clear();
    }

    pub(crate) fn attach(&self, attachment: Attachment) -> bool {
        attachment.replace(&mut self.inner.attachment.write())
    }
}

impl<T: Clone + Send + 'static> ErasedOutPort for EventPort<T> {
    fn attach(&self, attachment: Attachment) -> bool {
        EventPort::attach(self, attachment)
    }

    fn is_connected(&self) -> bool {
        EventPort::is_connected(self)
    }

    fn bind(&self, binding: Box<dyn Any + Send>, force: bool) -> bool {
        match binding.downcast::<Subscriber<T>>() {
            Ok(subscriber) => EventPort::bind(self, *subscriber, force),
            Err(_) => false,
        }
    }

    fn unbind(&self, key: BindingKey) -> bool {
        EventPort::unbind(self, key)
    }

    fn clear(&self) {
        EventPort::clear(self)
    }
}

impl<T: Clone + Send + 'static> Clone for EventPort<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Default for EventPort<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: RwLock::new(Vec::new()),
                attachment: RwLock::new(None),
            }),
        }
    }
}

impl<T: Clone + Send + 'static> fmt::Debug for EventPort<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EventPort<{}> ({} subscribers)",
            std::any::type_name::<T>(),
            self.subscriber_count()
        )
    }
}
