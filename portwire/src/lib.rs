//! An in-process runtime for components communicating through typed ports.
//!
//! Portwire promotes a component-oriented architecture that closely resembles
//! [flow-based programming][FBP]: a component is an isolated entity with a
//! fixed set of typed out-ports and in-ports, communicating with other
//! components exclusively through message passing. Unlike in conventional
//! flow-based programming, components are never wired port by port: a
//! connection engine inspects the ports of two components and binds every
//! out-port of one to the in-port of the other that carries the same message
//! type.
//!
//! [FBP]: https://en.wikipedia.org/wiki/Flow-based_programming
//!
//! # A practical overview
//!
//! Using portwire typically involves three distinct activities:
//!
//! 1. the design of components and the declaration of their ports,
//! 2. the assembly of a system from a set of components, performed by
//!    connecting components pairwise or by registering them for auto-wiring,
//! 3. the exchange of messages, possibly on worker threads.
//!
//! ## Authoring components
//!
//! Components can contain four kinds of ports:
//!
//! * _event ports_, which are instances of the [`EventPort`](ports::EventPort)
//!   type and broadcast fire-and-forget events to all their subscribers,
//! * _request ports_, which are instances of the
//!   [`RequestPort`](ports::RequestPort) type and send a request to a single
//!   handler, blocking until its reply is available,
//! * _handler in-ports_, which are methods that take an `&self` argument, a
//!   message argument and an optional [`&Context`](component::Context)
//!   argument, and that implement the [`InputFn`](ports::InputFn) or
//!   [`ReplierFn`](ports::ReplierFn) traits,
//! * _sink in-ports_, which are [`QueueSink`](ports::QueueSink) or
//!   [`StackSink`](ports::StackSink) fields buffering events for the
//!   component's own consumption.
//!
//! Components must implement the [`Component`](component::Component) trait,
//! whose [`declare_ports`](component::Component::declare_ports) method lists
//! the ports of the component under static names.
//!
//! #### A simple component
//!
//! Let us consider for illustration a component that forwards its input after
//! multiplying it by 2:
//!
//! ```text
//!                ┌────────────┐
//!                │            │
//! Input ●───────▶│ Multiplier ├───────▶ Output
//!          f64   │            │  f64
//!                └────────────┘
//! ```
//!
//! ```
//! use portwire::component::Component;
//! use portwire::ports::{EventPort, PortDeclarations};
//!
//! #[derive(Default)]
//! pub struct Multiplier {
//!     pub output: EventPort<f64>,
//! }
//!
//! impl Multiplier {
//!     pub fn input(&self, value: f64) {
//!         self.output.trigger(2.0 * value);
//!     }
//! }
//!
//! impl Component for Multiplier {
//!     fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
//!         ports.event_out("output", &self.output).input("input", Self::input);
//!     }
//! }
//! ```
//!
//! Handlers take `&self` because the runtime, not the borrow checker, decides
//! which invocations may run concurrently; state that changes over time is
//! kept in atomics or behind locks.
//!
//! ## Assembling a system
//!
//! Components are moved into a [`Handle`](component::Handle), which gives
//! them an identity, and are then connected with a
//! [`Runtime`](runtime::Runtime):
//!
//! ```
//! # use portwire::component::Component;
//! # use portwire::ports::{EventPort, PortDeclarations};
//! # #[derive(Default)]
//! # pub struct Multiplier {
//! #     pub output: EventPort<f64>,
//! # }
//! # impl Multiplier {
//! #     pub fn input(&self, value: f64) {
//! #         self.output.trigger(2.0 * value);
//! #     }
//! # }
//! # impl Component for Multiplier {
//! #     fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
//! #         ports.event_out("output", &self.output).input("input", Self::input);
//! #     }
//! # }
//! use portwire::component::Handle;
//! use portwire::connect::{ConnectOption, ConnectOptions};
//! use portwire::ports::QueueSink;
//! use portwire::runtime::Runtime;
//!
//! #[derive(Default)]
//! pub struct Collector {
//!     pub values: QueueSink<f64>,
//! }
//!
//! impl Component for Collector {
//!     fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
//!         ports.queue_sink("values", &self.values);
//!     }
//! }
//!
//! let runtime = Runtime::new();
//! let multiplier = Handle::new(Multiplier::default());
//! let collector = Handle::new(Collector::default());
//!
//! // The out-port of the multiplier is bound to the sink of the collector.
//! runtime
//!     .connect(&multiplier, &collector, ConnectOption::RequireAllPortsConnected)
//!     .unwrap();
//! runtime.verify(&[&multiplier]).unwrap();
//!
//! multiplier.input(21.0);
//! assert_eq!(collector.values.pop(), Some(42.0));
//!
//! // A second connection does not duplicate the binding.
//! assert!(!runtime.connect(&multiplier, &collector, ConnectOptions::NONE).unwrap());
//! ```
//!
//! The first connection of an out-port claims it: connecting an event port
//! that is already connected does nothing unless a multicast option is
//! passed, and a request port can only be rebound when forced. See the
//! [`connect`] module for the complete binding rules.
//!
//! ## Exchanging messages
//!
//! By default, handlers run synchronously on the thread that triggers the
//! event or calls the request. Component types that declare an
//! [`AsyncConfig`](runtime::AsyncConfig) have their handlers executed on a
//! dedicated worker pool instead, with per-port or per-instance exclusion.
//! Components can also be grouped in [`domain`]s whose policy serializes
//! their handlers or offloads their mutual events to a shared pool.
//!
//! The [`Interceptor`](intercept::Interceptor) of the runtime observes all
//! messages, which lets tests wait for messages handled on worker threads or
//! substitute the replies of requests.
//!
//! # Logging
//!
//! Portwire emits [`tracing`] events: wiring changes at the `debug` level,
//! dispatch details at the `trace` level, handler failures at the `warn`
//! level, and worker pool life cycle at the `info` level. No subscriber is
//! installed by the library.
#![warn(missing_docs, missing_debug_implementations, unreachable_pub)]

pub mod component;
pub mod connect;
pub mod domain;
pub mod intercept;
pub mod ports;
pub mod response;
pub mod runtime;
