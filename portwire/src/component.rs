//! Components and component handles.
//!
//! A component is any `Send + Sync + 'static` type implementing the
//! [`Component`] trait. Its only obligation is to list its ports in
//! [`Component::declare_ports`]: out-ports are [`EventPort`] and
//! [`RequestPort`] fields, in-ports are handler methods or
//! [`QueueSink`]/[`StackSink`] fields.
//!
//! Components are moved into a [`Handle`], which gives them an identity. Two
//! handles refer to the same component if and only if they share the same
//! [`ComponentId`]. The connection engine only ever sees the type-erased
//! [`ComponentRef`] form, obtained through the [`AsComponent`] trait.
//!
//! Handlers always take `&self`: in-port invocations may run on worker threads
//! and are serialized by the runtime according to the component's
//! [`AsyncConfig`], so mutable state is typically kept behind a lock or in
//! atomics.
//!
//! #### Example
//!
//! ```
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! use portwire::component::Component;
//! use portwire::ports::{EventPort, PortDeclarations};
//!
//! #[derive(Default)]
//! pub struct Counter {
//!     pub total: EventPort<u64>,
//!     count: AtomicU64,
//! }
//!
//! impl Counter {
//!     fn tick(&self) {
//!         let total = self.count.fetch_add(1, Ordering::Relaxed) + 1;
//!         self.total.trigger(total);
//!     }
//! }
//!
//! impl Component for Counter {
//!     fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
//!         ports.event_out("total", &self.total).input("tick", Self::tick);
//!     }
//! }
//! ```
//!
//! [`EventPort`]: crate::ports::EventPort
//! [`RequestPort`]: crate::ports::RequestPort
//! [`QueueSink`]: crate::ports::QueueSink
//! [`StackSink`]: crate::ports::StackSink

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use crate::connect::ConnectError;
use crate::ports::{PortDeclarations, PortTable, TypeInfo};
use crate::runtime::AsyncConfig;

/// Unique identifier for component instances.
static NEXT_COMPONENT_ID: AtomicU64 = AtomicU64::new(0);

/// Trait to be implemented by all components.
pub trait Component: Sized + Send + Sync + 'static {
    /// Declares the out-ports and in-ports of this component.
    ///
    /// This method is called exactly once per instance, the first time the
    /// instance takes part in a connection, registration or verification.
    fn declare_ports(&self, ports: &mut PortDeclarations<Self>);

    /// Returns the asynchronous execution configuration shared by all
    /// instances of this component type.
    ///
    /// By default, in-port invocations run synchronously on the calling
    /// thread.
    fn async_config() -> Option<AsyncConfig> {
        None
    }
}

/// Unique identifier of a component instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(u64);

impl ComponentId {
    pub(crate) fn next() -> Self {
        Self(NEXT_COMPONENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity and type of a component instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ComponentInfo {
    id: ComponentId,
    type_info: TypeInfo,
}

impl ComponentInfo {
    /// Returns the identifier of the instance.
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Returns the type of the component.
    pub fn type_info(&self) -> TypeInfo {
        self.type_info
    }
}

impl fmt::Display for ComponentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.type_info.name(), self.id)
    }
}

/// Storage shared by all handles to a component.
pub(crate) struct Slot<C: Component> {
    info: ComponentInfo,
    component: C,
    this: Weak<Slot<C>>,
    ports: OnceLock<Result<Arc<PortTable>, ConnectError>>,
}

/// An owning handle to a component instance.
///
/// Handles are cheap to clone and dereference to the component.
pub struct Handle<C: Component> {
    slot: Arc<Slot<C>>,
}

impl<C: Component> Handle<C> {
    /// Moves a component into a new handle, allocating a fresh identity.
    pub fn new(component: C) -> Self {
        let info = ComponentInfo {
            id: ComponentId::next(),
            type_info: TypeInfo::of::<C>(),
        };

        Self {
            slot: Arc::new_cyclic(|this| Slot {
                info,
                component,
                this: this.clone(),
                ports: OnceLock::new(),
            }),
        }
    }

    pub(crate) fn from_slot(slot: Arc<Slot<C>>) -> Self {
        Self { slot }
    }

    /// Returns the identifier of the component.
    pub fn id(&self) -> ComponentId {
        self.slot.info.id
    }

    /// Returns the identity and type of the component.
    pub fn info(&self) -> ComponentInfo {
        self.slot.info
    }

    /// Returns the type-erased form of this handle.
    pub fn component_ref(&self) -> ComponentRef {
        ComponentRef(self.slot.clone())
    }
}

impl<C: Component> Deref for Handle<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.slot.component
    }
}

impl<C: Component> Clone for Handle<C> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<C: Component> fmt::Debug for Handle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.slot.info)
    }
}

/// Object-safe view of a component slot used by the connection engine.
pub(crate) trait ErasedComponent: Send + Sync + 'static {
    fn info(&self) -> ComponentInfo;

    fn async_config(&self) -> Option<AsyncConfig>;

    /// Returns the cached port table, discovering the ports on first call.
    fn port_table(&self) -> Result<Arc<PortTable>, ConnectError>;
}

impl<C: Component> ErasedComponent for Slot<C> {
    fn info(&self) -> ComponentInfo {
        self.info
    }

    fn async_config(&self) -> Option<AsyncConfig> {
        C::async_config()
    }

    fn port_table(&self) -> Result<Arc<PortTable>, ConnectError> {
        self.ports
            .get_or_init(|| {
                let mut declarations = PortDeclarations::new(self.this.clone());
                self.component.declare_ports(&mut declarations);

                declarations.into_table(self.info).map(Arc::new)
            })
            .clone()
    }
}

/// A type-erased, reference-counted component.
#[derive(Clone)]
pub struct ComponentRef(Arc<dyn ErasedComponent>);

impl ComponentRef {
    /// Returns the identifier of the component.
    pub fn id(&self) -> ComponentId {
        self.0.info().id
    }

    /// Returns the identity and type of the component.
    pub fn info(&self) -> ComponentInfo {
        self.0.info()
    }

    pub(crate) fn async_config(&self) -> Option<AsyncConfig> {
        self.0.async_config()
    }

    pub(crate) fn port_table(&self) -> Result<Arc<PortTable>, ConnectError> {
        self.0.port_table()
    }
}

impl PartialEq for ComponentRef {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for ComponentRef {}

impl fmt::Debug for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentRef({})", self.info())
    }
}

/// Conversion to a type-erased component, accepted by all runtime methods
/// operating on components.
pub trait AsComponent {
    /// Returns the type-erased component.
    fn as_component(&self) -> ComponentRef;
}

impl<C: Component> AsComponent for Handle<C> {
    fn as_component(&self) -> ComponentRef {
        self.component_ref()
    }
}

impl AsComponent for ComponentRef {
    fn as_component(&self) -> ComponentRef {
        self.clone()
    }
}

/// The local context of an in-port invocation.
///
/// Handlers declared with a trailing `&Context<Self>` argument receive it.
pub struct Context<'a, C: Component> {
    handle: &'a Handle<C>,
    port: &'static str,
}

impl<'a, C: Component> Context<'a, C> {
    pub(crate) fn new(handle: &'a Handle<C>, port: &'static str) -> Self {
        Self { handle, port }
    }

    /// Returns a handle to the invoked component.
    pub fn handle(&self) -> &Handle<C> {
        self.handle
    }

    /// Returns the name of the invoked in-port.
    pub fn port(&self) -> &'static str {
        self.port
    }
}

impl<C: Component> fmt::Debug for Context<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("component", &self.handle.info())
            .field("port", &self.port)
            .finish()
    }
}
