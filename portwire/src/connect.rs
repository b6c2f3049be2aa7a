//! Signature-based connection engine.
//!
//! Components are never wired port by port: the engine inspects the ports
//! declared by two components and binds every out-port of one to the in-port
//! of the other that has the same [`Signature`]. The public entry points are
//! methods of [`Runtime`](crate::runtime::Runtime):
//!
//! * [`connect`](crate::runtime::Runtime::connect) and
//!   [`disconnect`](crate::runtime::Runtime::disconnect), which operate in both
//!   directions,
//! * [`connect_directed`](crate::runtime::Runtime::connect_directed) and
//!   [`disconnect_directed`](crate::runtime::Runtime::disconnect_directed),
//! * [`verify`](crate::runtime::Runtime::verify) and
//!   [`verify_requests_only`](crate::runtime::Runtime::verify_requests_only).
//!
//! # Binding rules
//!
//! The first successful connection of an out-port claims it. Connecting an
//! already connected event port is a no-op unless
//! [`ConnectOption::ForceConnectEventPorts`] or
//! [`ConnectOption::ForceConnectAll`] is passed, in which case the new
//! subscriber is appended to the existing ones. Connecting an already
//! connected request port is a no-op unless [`ConnectOption::ForceConnectAll`]
//! is passed, in which case the previous handler is replaced.
//!
//! All matches of a call are resolved before anything is bound, so a failing
//! call never leaves partial bindings behind.

use std::error::Error;
use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

use tracing::debug;

use crate::component::{ComponentInfo, ComponentRef};
use crate::ports::{BindingKey, PortDescriptor, PortKind, PortTable, Signature, TargetInfo, TypeInfo};

/// A connection option.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConnectOption {
    /// Fail with [`ConnectError::PortNotFound`] when an out-port has no
    /// matching in-port.
    RequireAllPortsConnected,
    /// Append to connected event ports and replace bound request handlers.
    ForceConnectAll,
    /// Append to connected event ports.
    ForceConnectEventPorts,
}

impl ConnectOption {
    const fn bit(self) -> u8 {
        match self {
            Self::RequireAllPortsConnected => 1,
            Self::ForceConnectAll => 2,
            Self::ForceConnectEventPorts => 4,
        }
    }
}

/// A set of [`ConnectOption`]s.
///
/// Sets can be built from a single option, or by or-ing options together:
///
/// ```
/// use portwire::connect::{ConnectOption, ConnectOptions};
///
/// let options = ConnectOption::RequireAllPortsConnected | ConnectOption::ForceConnectEventPorts;
/// assert!(options.contains(ConnectOption::ForceConnectEventPorts));
/// assert!(!options.contains(ConnectOption::ForceConnectAll));
/// assert!(ConnectOptions::NONE.is_empty());
/// ```
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectOptions(u8);

impl ConnectOptions {
    /// The empty set.
    pub const NONE: Self = Self(0);

    /// Returns `true` if the option is in the set.
    pub fn contains(self, option: ConnectOption) -> bool {
        self.0 & option.bit() != 0
    }

    /// Returns `true` if the set is empty.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns the set with the option added.
    pub fn with(self, option: ConnectOption) -> Self {
        Self(self.0 | option.bit())
    }

    /// Iterates over the options of the set, in order.
    pub fn iter(self) -> impl Iterator<Item = ConnectOption> {
        [
            ConnectOption::RequireAllPortsConnected,
            ConnectOption::ForceConnectAll,
            ConnectOption::ForceConnectEventPorts,
        ]
        .into_iter()
        .filter(move |o| self.contains(*o))
    }

    fn force(self, kind: PortKind) -> bool {
        match kind {
            PortKind::Request => self.contains(ConnectOption::ForceConnectAll),
            _ => {
                self.contains(ConnectOption::ForceConnectAll)
                    || self.contains(ConnectOption::ForceConnectEventPorts)
            }
        }
    }
}

impl From<ConnectOption> for ConnectOptions {
    fn from(option: ConnectOption) -> Self {
        Self::NONE.with(option)
    }
}

impl<const N: usize> From<[ConnectOption; N]> for ConnectOptions {
    fn from(options: [ConnectOption; N]) -> Self {
        options.into_iter().fold(Self::NONE, Self::with)
    }
}

impl BitOr for ConnectOption {
    type Output = ConnectOptions;

    fn bitor(self, rhs: Self) -> ConnectOptions {
        ConnectOptions::from(self).with(rhs)
    }
}

impl BitOr<ConnectOption> for ConnectOptions {
    type Output = ConnectOptions;

    fn bitor(self, rhs: ConnectOption) -> ConnectOptions {
        self.with(rhs)
    }
}

/// Error returned by the connection engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectError {
    /// Two candidate bindings tie and the engine cannot choose.
    AmbiguousPorts {
        /// The component owning the out-ports.
        from: ComponentInfo,
        /// The component owning the in-ports.
        to: ComponentInfo,
        /// The contested signature.
        signature: Signature,
    },
    /// An out-port has no matching in-port while
    /// [`ConnectOption::RequireAllPortsConnected`] is set.
    PortNotFound {
        /// The component lacking the in-port.
        to: ComponentInfo,
        /// The unmatched signature.
        signature: Signature,
    },
    /// Out-ports without any binding, as reported by verification.
    PortsNotConnected(Vec<PortDescriptor>),
    /// Two in-ports of the same component share a signature.
    DuplicateSignature {
        /// The component declaring the in-ports.
        component: ComponentInfo,
        /// The duplicated signature.
        signature: Signature,
    },
    /// A request port's response type disagrees with the response contract of
    /// its message type.
    ResponseTypeMismatch {
        /// The request message type.
        request: TypeInfo,
        /// The response type(s) declared by the contract.
        expected: String,
        /// The response type of the request port.
        found: TypeInfo,
    },
    /// A request port's response union covers fewer branches than the
    /// response contract of its message type.
    InsufficientResponseTypes {
        /// The request message type.
        request: TypeInfo,
        /// Number of branches declared by the contract.
        declared: usize,
        /// Number of branches of the request port's response type.
        found: usize,
    },
    /// A request port uses an untyped response where the contract declares a
    /// union of response types.
    RawUnionType {
        /// The request message type.
        request: TypeInfo,
    },
    /// A response contract is malformed or missing.
    InvalidResponseDeclaration {
        /// The request message type.
        request: TypeInfo,
        /// Why the declaration was rejected.
        reason: &'static str,
    },
    /// An out-port is attached to another live runtime.
    AttachedElsewhere(PortDescriptor),
    /// The runtime was shut down.
    RuntimeShutDown,
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AmbiguousPorts {
                from,
                to,
                signature,
            } => write!(
                f,
                "ambiguous ports for signature {} between {} and {}",
                signature, from, to
            ),
            Self::PortNotFound { to, signature } => {
                write!(f, "no in-port of {} matches signature {}", to, signature)
            }
            Self::PortsNotConnected(ports) => {
                write!(f, "{} port(s) not connected: ", ports.len())?;
                for (i, port) in ports.iter().enumerate() {
                    if i != 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", port)?;
                }
                Ok(())
            }
            Self::DuplicateSignature {
                component,
                signature,
            } => write!(
                f,
                "{} declares several in-ports with signature {}",
                component, signature
            ),
            Self::ResponseTypeMismatch {
                request,
                expected,
                found,
            } => write!(
                f,
                "request {} expects a response of type {}, found {}",
                request, expected, found
            ),
            Self::InsufficientResponseTypes {
                request,
                declared,
                found,
            } => write!(
                f,
                "request {} declares {} response types but the port only handles {}",
                request, declared, found
            ),
            Self::RawUnionType { request } => write!(
                f,
                "request {} declares a union of response types but the port uses an untyped response",
                request
            ),
            Self::InvalidResponseDeclaration { request, reason } => {
                write!(f, "invalid response declaration for {}: {}", request, reason)
            }
            Self::AttachedElsewhere(port) => {
                write!(f, "port {} is attached to another runtime", port)
            }
            Self::RuntimeShutDown => f.write_str("the runtime was shut down"),
        }
    }
}

impl Error for ConnectError {}

/// A resolved out-port to in-port match.
#[derive(Copy, Clone, Debug)]
struct Link {
    out: usize,
    input: usize,
}

/// The resolved matches between the out-ports of one component and the
/// in-ports of another.
pub(crate) struct Plan {
    from: ComponentRef,
    to: ComponentRef,
    from_ports: Arc<PortTable>,
    to_ports: Arc<PortTable>,
    links: Vec<Link>,
}

impl Plan {
    /// Resolves all matches between `from` and `to`.
    ///
    /// Port tables must have been attached to the runtime beforehand.
    pub(crate) fn resolve(
        from: &ComponentRef,
        from_ports: Arc<PortTable>,
        to: &ComponentRef,
        to_ports: Arc<PortTable>,
        options: ConnectOptions,
    ) -> Result<Self, ConnectError> {
        let mut links = Vec::new();

        for (out_idx, out) in from_ports.outs.iter().enumerate() {
            let mut handler = None;
            let mut sink = None;
            for (in_idx, input) in to_ports.ins.iter().enumerate() {
                if input.signature != out.signature {
                    continue;
                }
                // Duplicates within each group were rejected at discovery.
                if input.is_handler() {
                    handler = Some(in_idx);
                } else {
                    sink = Some(in_idx);
                }
            }

            let input = match (handler, sink) {
                (Some(_), Some(_)) => {
                    return Err(ConnectError::AmbiguousPorts {
                        from: from.info(),
                        to: to.info(),
                        signature: out.signature,
                    })
                }
                (Some(idx), None) | (None, Some(idx)) => idx,
                (None, None) => {
                    if options.contains(ConnectOption::RequireAllPortsConnected) {
                        return Err(ConnectError::PortNotFound {
                            to: to.info(),
                            signature: out.signature,
                        });
                    }
                    continue;
                }
            };

            let shared_signature = from_ports
                .outs
                .iter()
                .enumerate()
                .any(|(idx, other)| idx != out_idx && other.signature == out.signature);
            if shared_signature {
                return Err(ConnectError::AmbiguousPorts {
                    from: from.info(),
                    to: to.info(),
                    signature: out.signature,
                });
            }

            links.push(Link {
                out: out_idx,
                input,
            });
        }

        Ok(Self {
            from: from.clone(),
            to: to.clone(),
            from_ports,
            to_ports,
            links,
        })
    }

    /// Binds all resolved matches, returning `true` if at least one new
    /// binding was created.
    pub(crate) fn bind(&self, options: ConnectOptions) -> bool {
        let mut bound = false;
        for link in &self.links {
            let out = &self.from_ports.outs[link.out];
            let input = &self.to_ports.ins[link.input];
            let key = BindingKey {
                component: self.to.id(),
                port: link.input,
            };
            let target = TargetInfo {
                component: self.to.info(),
                port: input.name,
                async_config: self.to.async_config(),
            };
            let Some(binding) = input.port.binding(key, target) else {
                continue;
            };
            if out.port.bind(binding, options.force(out.kind)) {
                input.port.on_bound();
                debug!(
                    from = %self.from.info(),
                    out_port = out.name,
                    to = %self.to.info(),
                    in_port = input.name,
                    signature = %out.signature,
                    "ports connected"
                );
                bound = true;
            }
        }

        bound
    }

    /// Removes all bindings that `bind` would have created, returning `true`
    /// if at least one binding was removed.
    pub(crate) fn unbind(&self) -> bool {
        let mut unbound = false;
        for link in &self.links {
            let out = &self.from_ports.outs[link.out];
            let key = BindingKey {
                component: self.to.id(),
                port: link.input,
            };
            if out.port.unbind(key) {
                debug!(
                    from = %self.from.info(),
                    out_port = out.name,
                    to = %self.to.info(),
                    in_port = self.to_ports.ins[link.input].name,
                    "ports disconnected"
                );
                unbound = true;
            }
        }

        unbound
    }
}

/// Collects the descriptors of all unconnected out-ports.
pub(crate) fn unconnected_ports(tables: &[Arc<PortTable>], requests_only: bool) -> Vec<PortDescriptor> {
    tables
        .iter()
        .flat_map(|table| {
            table
                .outs
                .iter()
                .enumerate()
                .filter(move |(_, out)| !requests_only || out.kind == PortKind::Request)
                .filter(|(_, out)| !out.port.is_connected())
                .map(move |(idx, _)| table.out_descriptor(idx))
        })
        .collect()
}
