use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::binding::{BindingKey, ReplierBinding};
use super::declare::ErasedOutPort;
use super::{Attachment, CallError, Direction, PortDescriptor, PortKind, Signature};
use crate::runtime::dispatch;

/// The shared data of a `RequestPort`.
struct Inner<T, R> {
    binding: RwLock<Option<ReplierBinding<T, R>>>,
    attachment: RwLock<Option<Attachment>>,
}

/// A request out-port.
///
/// A `RequestPort` is bound to at most one request handler. Once bound, it
/// can only be rebound to another handler by forcing the connection.
///
/// Calls are always blocking from the caller's point of view, even when the
/// handler runs on a worker thread.
///
/// When a `RequestPort` is cloned, the binding remains shared.
pub struct RequestPort<T: Send + 'static, R: Send + 'static> {
    inner: Arc<Inner<T, R>>,
}

impl<T: Send + 'static, R: Send + 'static> RequestPort<T, R> {
    /// Creates a new, unconnected `RequestPort`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if a handler is bound.
    pub fn is_connected(&self) -> bool {
        self.inner.binding.read().is_some()
    }

    /// Sends a request to the bound handler and returns its reply.
    ///
    /// If the interception harness holds a stashed reply for this request, it
    /// is consumed and returned without invoking the handler.
    ///
    /// # Panics
    ///
    /// A panic raised by the handler is propagated to the caller, including
    /// when the handler runs on a worker thread.
    pub fn call(&self, request: T) -> Result<R, CallError> {
        let (runtime, origin) = match &*self.inner.attachment.read() {
            Some(a) => (a.runtime.upgrade(), a.owner),
            None => (None, None),
        };

        if let Some(runtime) = &runtime {
            let interceptor = runtime.interceptor();
            interceptor.notify_sent(&request, origin);
            if let Some(reply) = interceptor.take_response::<T, R>(origin.map(|o| o.id())) {
                return Ok(reply);
            }
        }

        let binding = self.inner.binding.read().clone();
        match binding {
            Some(binding) => dispatch::call(runtime.as_ref(), origin, binding, request)
                .ok_or_else(|| CallError::NoResponse(self.descriptor())),
            None => Err(CallError::NotConnected(self.descriptor())),
        }
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
            PortKind::Request,
            Signature::request::<T, R>(),
        )
    }

    /// Binds a handler.
    ///
    /// An unconnected port is always bound; a connected port is only rebound
    /// when forced, and only to a different in-port.
    pub(crate) fn bind(&self, binding: ReplierBinding<T, R>, force: bool) -> bool {
        let mut current = self.inner.binding.write();
        match &*current {
            None => {}
            Some(existing) if force && existing.key != binding.key => {}
            Some(_) => return false,
        }
        *current = Some(binding);

        true
    }

    /// Removes the binding if it targets the specified in-port.
    pub(crate) fn unbind(&self, key: BindingKey) -> bool {
        let mut current = self.inner.binding.write();
        if current.as_ref().is_some_and(|b| b.key == key) {
            *current = None;
            return true;
        }

        false
    }
}

impl<T: Send + 'static, R: Send + 'static> ErasedOutPort for RequestPort<T, R> {
    fn attach(&self, attachment: Attachment) -> bool {
        attachment.replace(&mut self.inner.attachment.write())
    }

    fn is_connected(&self) -> bool {
        RequestPort::is_connected(self)
    }

    fn bind(&self, binding: Box<dyn Any + Send>, force: bool) -> bool {
        match binding.downcast::<ReplierBinding<T, R>>() {
            Ok(binding) => RequestPort::bind(self, *binding, force),
            Err(_) => false,
        }
    }

    fn unbind(&self, key: BindingKey) -> bool {
        RequestPort::unbind(self, key)
    }

    fn clear(&self) {
        *self.inner.binding.write() = None;
    }
}

impl<T: Send + 'static, R: Send + 'static> Clone for RequestPort<T, R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + 'static, R: Send + 'static> Default for RequestPort<T, R> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Inner {
                binding: RwLock::new(None),
                attachment: RwLock::new(None),
            }),
        }
    }
}

impl<T: Send + 'static, R: Send + 'static> fmt::Debug for RequestPort<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RequestPort<{}, {}> ({})",
            std::any::type_name::<T>(),
            std::any::type_name::<R>(),
            if self.is_connected() {
                "connected"
            } else {
                "unconnected"
            }
        )
    }
}
