//! Component ports for event and request dispatch.
//!
//! Components communicate exclusively through typed ports:
//!
//! * [`EventPort`] out-ports broadcast fire-and-forget events to all their
//!   subscribers,
//! * [`RequestPort`] out-ports send a request to a single bound handler and
//!   return its reply,
//! * in-ports are either handler methods registered with
//!   [`PortDeclarations::input`] or [`PortDeclarations::replier`], or buffering
//!   sinks ([`QueueSink`], [`StackSink`]) consumed by the owning component.
//!
//! Ports are never connected by name: the connection engine matches an
//! out-port with an in-port when their [`Signature`]s are equal. The signature
//! of an event port is its message type, while the signature of a request port
//! is the pair formed by its message type and its response type.
//!
//! `EventPort` and `RequestPort` are clonable. Their clones are shallow copies,
//! meaning that any modification of the bindings of one clone is immediately
//! reflected in other clones.
//!
//! #### Example
//!
//! ```
//! use portwire::component::Component;
//! use portwire::ports::{EventPort, PortDeclarations, QueueSink, RequestPort};
//!
//! #[derive(Default)]
//! pub struct Thermostat {
//!     pub alarm: EventPort<f64>,
//!     pub setpoint: RequestPort<String, f64>,
//!     pub readings: QueueSink<f64>,
//! }
//!
//! impl Thermostat {
//!     fn reset(&self) {}
//!
//!     fn status(&self, zone: u8) -> bool {
//!         zone < 4
//!     }
//! }
//!
//! impl Component for Thermostat {
//!     fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
//!         ports
//!             .event_out("alarm", &self.alarm)
//!             .request_out("setpoint", &self.setpoint)
//!             .queue_sink("readings", &self.readings)
//!             .input("reset", Self::reset)
//!             .replier("status", Self::status);
//!     }
//! }
//! ```

mod binding;
mod declare;
mod event;
mod input;
mod request;
mod sink;

use std::any::TypeId;
use std::error::Error;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Weak;

use crate::component::ComponentInfo;
use crate::runtime::Shared;

pub(crate) use binding::{BindingKey, ReplierBinding, Subscriber, TargetInfo};
pub(crate) use declare::PortTable;
pub use declare::PortDeclarations;
pub use event::EventPort;
pub use input::markers;
pub use input::{InputFn, ReplierFn};
pub use request::RequestPort;
pub use sink::{QueueSink, StackSink};

/// Runtime identity of a Rust type, with its name for diagnostics.
///
/// Two `TypeInfo`s are equal if and only if they describe the same type.
#[derive(Copy, Clone)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
}

impl TypeInfo {
    /// Returns the `TypeInfo` of `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Returns the `TypeId` of the type.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Returns the name of the type, as returned by `any::type_name()`.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// The type signature used to match out-ports with in-ports.
///
/// Event signatures have no response type; request signatures always have
/// one, possibly `()`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    message: TypeInfo,
    response: Option<TypeInfo>,
}

impl Signature {
    /// Returns the signature of events of type `T`.
    pub fn event<T: 'static>() -> Self {
        Self {
            message: TypeInfo::of::<T>(),
            response: None,
        }
    }

    /// Returns the signature of requests of type `T` with replies of type `R`.
    pub fn request<T: 'static, R: 'static>() -> Self {
        Self {
            message: TypeInfo::of::<T>(),
            response: Some(TypeInfo::of::<R>()),
        }
    }

    /// Returns the message type.
    pub fn message(&self) -> TypeInfo {
        self.message
    }

    /// Returns the response type, or `None` for event signatures.
    pub fn response(&self) -> Option<TypeInfo> {
        self.response
    }

    /// Returns `true` for request signatures.
    pub fn is_request(&self) -> bool {
        self.response.is_some()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.response {
            None => write!(f, "event<{}>", self.message),
            Some(response) => write!(f, "request<{} -> {}>", self.message, response),
        }
    }
}

/// Direction of a port as seen from its owner.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// The owner emits events or issues requests through the port.
    Out,
    /// The owner receives events or answers requests through the port.
    In,
}

/// The closed set of port kinds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PortKind {
    /// One-to-many, fire-and-forget messages.
    Event,
    /// One-to-one messages expecting exactly one response.
    Request,
    /// A FIFO buffer fed by event out-ports.
    QueueSink,
    /// A LIFO buffer fed by event out-ports.
    StackSink,
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PortKind::Event => "event",
            PortKind::Request => "request",
            PortKind::QueueSink => "queue sink",
            PortKind::StackSink => "stack sink",
        })
    }
}

/// Description of a declared port.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PortDescriptor {
    owner: Option<ComponentInfo>,
    name: &'static str,
    direction: Direction,
    kind: PortKind,
    signature: Signature,
}

impl PortDescriptor {
    pub(crate) fn new(
        owner: Option<ComponentInfo>,
        name: &'static str,
        direction: Direction,
        kind: PortKind,
        signature: Signature,
    ) -> Self {
        Self {
            owner,
            name,
            direction,
            kind,
            signature,
        }
    }

    /// Returns the owning component, if the port was ever declared by one.
    pub fn owner(&self) -> Option<ComponentInfo> {
        self.owner
    }

    /// Returns the declared port name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the direction of the port.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns the port kind.
    pub fn kind(&self) -> PortKind {
        self.kind
    }

    /// Returns the port signature.
    pub fn signature(&self) -> Signature {
        self.signature
    }
}

impl fmt::Display for PortDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = match self.direction {
            Direction::Out => "out",
            Direction::In => "in",
        };
        match self.owner {
            Some(owner) => write!(f, "{}.{}", owner, self.name)?,
            None => f.write_str(self.name)?,
        }
        write!(f, " ({} {}-port, {})", self.kind, direction, self.signature)
    }
}

/// Binding of an out-port to its owner and to the runtime that discovered it.
#[derive(Clone)]
pub(crate) struct Attachment {
    pub(crate) owner: Option<ComponentInfo>,
    pub(crate) name: &'static str,
    pub(crate) runtime: Weak<Shared>,
}

impl Attachment {
    /// Returns `true` if the port may be re-attached to `runtime`, that is if
    /// it is already attached to it or if its runtime is gone or shut down.
    pub(crate) fn yields_to(&self, runtime: &Weak<Shared>) -> bool {
        Weak::ptr_eq(&self.runtime, runtime)
            || self
                .runtime
                .upgrade()
                .map_or(true, |runtime| runtime.is_shut_down())
    }

    /// Replaces `current` unless it belongs to another live runtime.
    pub(crate) fn replace(self, current: &mut Option<Attachment>) -> bool {
        if current.as_ref().is_some_and(|a| !a.yields_to(&self.runtime)) {
            return false;
        }
        *current = Some(self);

        true
    }
}

/// Error returned when a request could not be answered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallError {
    /// The request port has no bound handler.
    NotConnected(PortDescriptor),
    /// The handler was torn down before replying, typically because the
    /// runtime was shut down.
    NoResponse(PortDescriptor),
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected(port) => write!(f, "request port {} is not connected", port),
            Self::NoResponse(port) => {
                write!(f, "the request sent from {} did not receive a response", port)
            }
        }
    }
}

impl Error for CallError {}
