use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use super::binding::{BindingKey, InputBinding, ReplierBinding, SinkBinding, Subscriber, TargetInfo};
use super::sink::{Sink, SinkHandle};
use super::{
    Attachment, Direction, EventPort, InputFn, PortDescriptor, PortKind, QueueSink, ReplierFn,
    RequestPort, Signature, StackSink,
};
use crate::component::{Component, ComponentInfo, Context, Handle, Slot};
use crate::connect::ConnectError;

/// Type-erased out-port, as stored in a port table.
pub(crate) trait ErasedOutPort: Send + Sync + 'static {
    /// Attaches the port to a runtime, unless another live runtime owns it.
    fn attach(&self, attachment: Attachment) -> bool;

    fn is_connected(&self) -> bool;

    /// Binds a `Subscriber<T>` (event ports) or a `ReplierBinding<T, R>`
    /// (request ports).
    fn bind(&self, binding: Box<dyn Any + Send>, force: bool) -> bool;

    fn unbind(&self, key: BindingKey) -> bool;

    fn clear(&self);
}

/// Type-erased in-port, as stored in a port table.
pub(crate) trait ErasedInPort: Send + Sync + 'static {
    /// Creates a binding suitable for an out-port with the same signature.
    ///
    /// Returns `None` if the owning component no longer exists.
    fn binding(&self, key: BindingKey, target: TargetInfo) -> Option<Box<dyn Any + Send>>;

    /// Called once a binding created by this in-port was accepted.
    fn on_bound(&self) {}
}

/// A declared out-port.
pub(crate) struct OutPortEntry {
    pub(crate) name: &'static str,
    pub(crate) kind: PortKind,
    pub(crate) signature: Signature,
    pub(crate) port: Box<dyn ErasedOutPort>,
}

/// A declared in-port.
pub(crate) struct InPortEntry {
    pub(crate) name: &'static str,
    pub(crate) kind: PortKind,
    pub(crate) signature: Signature,
    pub(crate) port: Box<dyn ErasedInPort>,
}

impl InPortEntry {
    /// Returns `true` for handler in-ports, `false` for sinks.
    pub(crate) fn is_handler(&self) -> bool {
        matches!(self.kind, PortKind::Event | PortKind::Request)
    }
}

/// The discovered ports of a component instance.
pub(crate) struct PortTable {
    pub(crate) owner: ComponentInfo,
    pub(crate) outs: Vec<OutPortEntry>,
    pub(crate) ins: Vec<InPortEntry>,
}

impl PortTable {
    pub(crate) fn out_descriptor(&self, index: usize) -> PortDescriptor {
        let entry = &self.outs[index];
        PortDescriptor::new(
            Some(self.owner),
            entry.name,
            Direction::Out,
            entry.kind,
            entry.signature,
        )
    }
}

impl fmt::Debug for PortTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PortTable of {} ({} out-ports, {} in-ports)",
            self.owner,
            self.outs.len(),
            self.ins.len()
        )
    }
}

/// Builder used by components to declare their ports.
///
/// See [`Component::declare_ports`].
pub struct PortDeclarations<C: Component> {
    component: Weak<Slot<C>>,
    outs: Vec<OutPortEntry>,
    ins: Vec<InPortEntry>,
}

impl<C: Component> PortDeclarations<C> {
    pub(crate) fn new(component: Weak<Slot<C>>) -> Self {
        Self {
            component,
            outs: Vec::new(),
            ins: Vec::new(),
        }
    }

    /// Declares an event out-port.
    pub fn event_out<T>(&mut self, name: &'static str, port: &EventPort<T>) -> &mut Self
    where
        T: Clone + Send + 'static,
    {
        self.outs.push(OutPortEntry {
            name,
            kind: PortKind::Event,
            signature: Signature::event::<T>(),
            port: Box::new(port.clone()),
        });

        self
    }

    /// Declares a request out-port.
    pub fn request_out<T, R>(&mut self, name: &'static str, port: &RequestPort<T, R>) -> &mut Self
    where
        T: Send + 'static,
        R: Send + 'static,
    {
        self.outs.push(OutPortEntry {
            name,
            kind: PortKind::Request,
            signature: Signature::request::<T, R>(),
            port: Box::new(port.clone()),
        });

        self
    }

    /// Declares an event in-port served by a handler method.
    pub fn input<F, T, S>(&mut self, name: &'static str, handler: F) -> &mut Self
    where
        F: InputFn<C, T, S>,
        T: Clone + Send + 'static,
        S: 'static,
    {
        self.ins.push(InPortEntry {
            name,
            kind: PortKind::Event,
            signature: Signature::event::<T>(),
            port: Box::new(InputPort {
                component: self.component.clone(),
                handler: Arc::new(handler),
                name,
                _phantom: PhantomData,
            }),
        });

        self
    }

    /// Declares a request in-port served by a handler method.
    pub fn replier<F, T, R, S>(&mut self, name: &'static str, handler: F) -> &mut Self
    where
        F: ReplierFn<C, T, R, S>,
        T: Send + 'static,
        R: Send + 'static,
        S: 'static,
    {
        self.ins.push(InPortEntry {
            name,
            kind: PortKind::Request,
            signature: Signature::request::<T, R>(),
            port: Box::new(ReplierPort {
                component: self.component.clone(),
                handler: Arc::new(handler),
                name,
                _phantom: PhantomData,
            }),
        });

        self
    }

    /// Declares a FIFO buffering in-port.
    pub fn queue_sink<T>(&mut self, name: &'static str, sink: &QueueSink<T>) -> &mut Self
    where
        T: Clone + Send + 'static,
    {
        self.sink(name, sink)
    }

    /// Declares a LIFO buffering in-port.
    pub fn stack_sink<T>(&mut self, name: &'static str, sink: &StackSink<T>) -> &mut Self
    where
        T: Clone + Send + 'static,
    {
        self.sink(name, sink)
    }

    fn sink<T, K>(&mut self, name: &'static str, sink: &K) -> &mut Self
    where
        T: Clone + Send + 'static,
        K: Sink<T>,
    {
        self.ins.push(InPortEntry {
            name,
            kind: K::KIND,
            signature: Signature::event::<T>(),
            port: Box::new(SinkPort { sink: sink.handle() }),
        });

        self
    }

    /// Builds the port table, rejecting in-ports that cannot be told apart.
    pub(crate) fn into_table(self, owner: ComponentInfo) -> Result<PortTable, ConnectError> {
        let mut handlers = HashSet::new();
        let mut sinks = HashSet::new();
        for entry in &self.ins {
            let is_new = if entry.is_handler() {
                handlers.insert(entry.signature)
            } else {
                sinks.insert(entry.signature)
            };
            if !is_new {
                return Err(ConnectError::DuplicateSignature {
                    component: owner,
                    signature: entry.signature,
                });
            }
        }

        Ok(PortTable {
            owner,
            outs: self.outs,
            ins: self.ins,
        })
    }
}

impl<C: Component> fmt::Debug for PortDeclarations<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PortDeclarations ({} out-ports, {} in-ports)",
            self.outs.len(),
            self.ins.len()
        )
    }
}

/// An event handler in-port.
struct InputPort<C: Component, F, T, S> {
    component: Weak<Slot<C>>,
    handler: Arc<F>,
    name: &'static str,
    _phantom: PhantomData<fn(T, S)>,
}

impl<C, F, T, S> ErasedInPort for InputPort<C, F, T, S>
where
    C: Component,
    F: InputFn<C, T, S>,
    T: Clone + Send + 'static,
    S: 'static,
{
    fn binding(&self, key: BindingKey, target: TargetInfo) -> Option<Box<dyn Any + Send>> {
        let handle = Handle::from_slot(self.component.upgrade()?);
        let handler = self.handler.clone();
        let name = self.name;
        let invoke = Arc::new(move |arg: T| {
            let context = Context::new(&handle, name);
            handler.call(&handle, arg, &context);
        });

        Some(Box::new(Subscriber::Input(InputBinding {
            key,
            target,
            invoke,
        })))
    }
}

/// A request handler in-port.
struct ReplierPort<C: Component, F, T, R, S> {
    component: Weak<Slot<C>>,
    handler: Arc<F>,
    name: &'static str,
    _phantom: PhantomData<fn(T, S) -> R>,
}

impl<C, F, T, R, S> ErasedInPort for ReplierPort<C, F, T, R, S>
where
    C: Component,
    F: ReplierFn<C, T, R, S>,
    T: Send + 'static,
    R: Send + 'static,
    S: 'static,
{
    fn binding(&self, key: BindingKey, target: TargetInfo) -> Option<Box<dyn Any + Send>> {
        let handle = Handle::from_slot(self.component.upgrade()?);
        let handler = self.handler.clone();
        let name = self.name;
        let invoke = Arc::new(move |arg: T| {
            let context = Context::new(&handle, name);
            handler.call(&handle, arg, &context)
        });

        Some(Box::new(ReplierBinding {
            key,
            target,
            invoke,
        }))
    }
}

/// A queue or stack sink in-port.
struct SinkPort<T> {
    sink: SinkHandle<T>,
}

impl<T: Clone + Send + 'static> ErasedInPort for SinkPort<T> {
    fn binding(&self, key: BindingKey, target: TargetInfo) -> Option<Box<dyn Any + Send>> {
        Some(Box::new(Subscriber::Sink(SinkBinding {
            key,
            target,
            sink: self.sink.clone(),
        })))
    }

    fn on_bound(&self) {
        self.sink.materialize();
    }
}
