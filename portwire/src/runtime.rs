//! Runtime: connection engine front-end, worker pools and lifecycle.
//!
//! A [`Runtime`] owns everything that is shared between components: the
//! wiring lock, the registry of auto-wired components, the worker pools of
//! asynchronous component classes, the domain registry, the response
//! contracts and the [`Interceptor`]. There is no process-wide state besides
//! the component identifier counter, so independent runtimes can coexist,
//! e.g. one per test. A component is attached to the first runtime that
//! discovers its ports; another runtime may only wire it once that runtime is
//! shut down or dropped, and fails with [`ConnectError::AttachedElsewhere`]
//! otherwise.
//!
//! Runtimes are configured with [`RuntimeInit`] and are cheap to clone; all
//! clones refer to the same runtime.
//!
//! # Asynchronous components
//!
//! A component type opts into asynchronous execution by returning an
//! [`AsyncConfig`] from [`Component::async_config`]. A worker pool with
//! `multiplicity` threads is then created for the type the first time one of
//! its instances is seen by the runtime, and all its in-port handlers run on
//! that pool:
//!
//! * with [`SyncLevel::PerPort`], invocations of the same in-port of an
//!   instance are serialized while invocations of different in-ports may run
//!   concurrently,
//! * with [`SyncLevel::PerInstance`], all invocations on an instance are
//!   serialized.
//!
//! In both cases, invocations addressed to the same exclusion unit run in the
//! order they were submitted. Requests to asynchronous components still block
//! the caller until the reply is available. A worker waiting for a reply from
//! its own pool runs other scheduled invocations in the meantime, and a
//! request sent while holding the lock of the target's serialized domain runs
//! on the calling thread.
//!
//! # Handler failures
//!
//! A panic raised by an event handler does not prevent delivery to other
//! subscribers. It is logged and re-broadcast as a [`HandlerFailure`] event to
//! the components connected with [`Runtime::connect_failure_handler`] or
//! registered with [`Runtime::register_component`]. A panic raised by a
//! request handler propagates to the caller.
//!
//! #### Example
//!
//! ```
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! use portwire::component::{Component, Handle};
//! use portwire::connect::ConnectOptions;
//! use portwire::ports::{EventPort, PortDeclarations, RequestPort};
//! use portwire::runtime::{AsyncConfig, Runtime, SyncLevel};
//!
//! #[derive(Default)]
//! struct Producer {
//!     out: EventPort<u32>,
//!     total: RequestPort<(), u32>,
//! }
//!
//! impl Component for Producer {
//!     fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
//!         ports.event_out("out", &self.out).request_out("total", &self.total);
//!     }
//! }
//!
//! #[derive(Default)]
//! struct Accumulator {
//!     sum: AtomicU32,
//! }
//!
//! impl Accumulator {
//!     fn add(&self, value: u32) {
//!         self.sum.fetch_add(value, Ordering::Relaxed);
//!     }
//!
//!     fn total(&self) -> u32 {
//!         self.sum.load(Ordering::Relaxed)
//!     }
//! }
//!
//! impl Component for Accumulator {
//!     fn declare_ports(&self, ports: &mut PortDeclarations<Self>) {
//!         ports.input("add", Self::add).replier("total", Self::total);
//!     }
//!
//!     fn async_config() -> Option<AsyncConfig> {
//!         Some(AsyncConfig::new(1, SyncLevel::PerInstance))
//!     }
//! }
//!
//! let runtime = Runtime::new();
//! let producer = Handle::new(Producer::default());
//! let accumulator = Handle::new(Accumulator::default());
//!
//! assert!(runtime.connect(&producer, &accumulator, ConnectOptions::NONE).unwrap());
//! runtime.verify(&[&producer]).unwrap();
//!
//! producer.out.trigger(3);
//! producer.out.trigger(4);
//! // The accumulator serializes its invocations, so the request is only
//! // handled after both events.
//! assert_eq!(producer.total.call(()), Ok(7));
//!
//! runtime.shutdown();
//! ```
//!
//! [`Component::async_config`]: crate::component::Component::async_config

pub(crate) mod dispatch;
mod pool;

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::component::{AsComponent, ComponentId, ComponentInfo, ComponentRef};
use crate::connect::{unconnected_ports, ConnectError, ConnectOptions, Plan};
use crate::domain::{DispatchPolicy, Domain, DomainError, Domains, SyncPolicy};
use crate::intercept::Interceptor;
use crate::ports::{
    Attachment, BindingKey, Direction, EventPort, PortDescriptor, PortKind, PortTable, Signature,
    Subscriber, TargetInfo, TypeInfo,
};
use crate::response::{ResponseContract, ResponseContracts};

use self::pool::Pool;

/// Exclusion granularity of an asynchronous component instance.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum SyncLevel {
    /// Only invocations of the same in-port are mutually exclusive.
    #[default]
    PerPort,
    /// All invocations on an instance are mutually exclusive.
    PerInstance,
}

/// Asynchronous execution configuration of a component type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct AsyncConfig {
    /// Number of worker threads dedicated to the component type.
    pub multiplicity: usize,
    /// Exclusion granularity of each instance.
    pub sync_level: SyncLevel,
}

impl AsyncConfig {
    /// Creates a configuration.
    ///
    /// A multiplicity of 0 is treated as 1.
    pub const fn new(multiplicity: usize, sync_level: SyncLevel) -> Self {
        Self {
            multiplicity,
            sync_level,
        }
    }
}

/// A failure of an event handler, re-broadcast by the runtime.
///
/// Components receive failures by declaring an event in-port of type
/// `HandlerFailure`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerFailure {
    component: ComponentInfo,
    port: &'static str,
    message: TypeInfo,
    reason: String,
}

impl HandlerFailure {
    /// Returns the component whose handler failed.
    pub fn component(&self) -> ComponentInfo {
        self.component
    }

    /// Returns the name of the failed in-port.
    pub fn port(&self) -> &'static str {
        self.port
    }

    /// Returns the type of the event being handled.
    pub fn message(&self) -> TypeInfo {
        self.message
    }

    /// Returns the panic message.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "handler {}.{} failed on {}: {}",
            self.component, self.port, self.message, self.reason
        )
    }
}

/// Runtime configuration.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Number of threads of the pool shared by parallel domains.
    pub num_threads: usize,
    /// Prefix of the names of worker threads.
    pub thread_name: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            num_threads: num_cpus::get(),
            thread_name: "portwire".to_owned(),
        }
    }
}

/// Builder for a [`Runtime`].
#[derive(Clone, Debug, Default)]
pub struct RuntimeInit {
    config: RuntimeConfig,
}

impl RuntimeInit {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of threads of the pool shared by parallel domains.
    ///
    /// The number of threads defaults to the number of logical CPUs. A value
    /// of 0 is treated as 1.
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.config.num_threads = num_threads.max(1);

        self
    }

    /// Sets the prefix of worker thread names.
    pub fn with_thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.config.thread_name = thread_name.into();

        self
    }

    /// Builds the runtime.
    pub fn init(self) -> Runtime {
        Runtime {
            shared: Shared::new(self.config),
        }
    }
}

/// State mutated by wiring operations.
#[derive(Default)]
struct Wiring {
    /// Port tables attached to this runtime.
    attached: HashMap<ComponentId, Weak<PortTable>>,
    /// Components taking part in auto-wiring, in registration order.
    registered: Vec<ComponentRef>,
}

/// The state shared by all clones of a runtime and by attached ports.
pub(crate) struct Shared {
    config: RuntimeConfig,
    this: Weak<Shared>,
    wiring: Mutex<Wiring>,
    pools: Mutex<HashMap<TypeId, Arc<Pool>>>,
    shared_pool: Mutex<Option<Arc<Pool>>>,
    pub(crate) domains: Arc<Domains>,
    interceptor: Interceptor,
    contracts: RwLock<ResponseContracts>,
    pub(crate) failures: EventPort<HandlerFailure>,
    is_shut_down: AtomicBool,
}

impl Shared {
    pub(crate) fn is_shut_down(&self) -> bool {
        self.is_shut_down.load(Ordering::Acquire)
    }

    fn new(config: RuntimeConfig) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Shared>| {
            let failures = EventPort::new();
            failures.attach(Attachment {
                owner: None,
                name: "failures",
                runtime: this.clone(),
            });

            Self {
                config,
                this: this.clone(),
                wiring: Mutex::new(Wiring::default()),
                pools: Mutex::new(HashMap::new()),
                shared_pool: Mutex::new(None),
                domains: Arc::new(Domains::default()),
                interceptor: Interceptor::new(),
                contracts: RwLock::new(ResponseContracts::default()),
                failures,
                is_shut_down: AtomicBool::new(false),
            }
        })
    }

    pub(crate) fn interceptor(&self) -> &Interceptor {
        &self.interceptor
    }

    /// Returns the pool of an asynchronous component type.
    pub(crate) fn pool_for(&self, component_type: TypeInfo) -> Option<Arc<Pool>> {
        self.pools.lock().get(&component_type.id()).cloned()
    }

    /// Returns the pool of parallel domains, starting it if necessary.
    pub(crate) fn shared_pool(&self) -> Option<Arc<Pool>> {
        if self.is_shut_down.load(Ordering::Acquire) {
            return None;
        }
        let mut pool = self.shared_pool.lock();
        let pool = pool.get_or_insert_with(|| {
            Pool::new(
                &format!("{}-domains", self.config.thread_name),
                self.config.num_threads,
            )
        });

        Some(pool.clone())
    }

    /// Discovers the ports of a component and attaches them to this runtime.
    ///
    /// Response contracts are checked on every call so that contracts declared
    /// after the first discovery are enforced too.
    fn ports_of(
        &self,
        wiring: &mut Wiring,
        component: &ComponentRef,
    ) -> Result<Arc<PortTable>, ConnectError> {
        if self.is_shut_down.load(Ordering::Acquire) {
            return Err(ConnectError::RuntimeShutDown);
        }

        let table = component.port_table()?;
        {
            let contracts = self.contracts.read();
            for out in table.outs.iter().filter(|o| o.kind == PortKind::Request) {
                if let Some(response) = out.signature.response() {
                    contracts.check(out.signature.message(), response)?;
                }
            }
        }

        let info = component.info();
        if wiring.attached.contains_key(&info.id()) {
            return Ok(table);
        }

        for out in &table.outs {
            let attached = out.port.attach(Attachment {
                owner: Some(info),
                name: out.name,
                runtime: self.this.clone(),
            });
            if !attached {
                return Err(ConnectError::AttachedElsewhere(PortDescriptor::new(
                    Some(info),
                    out.name,
                    Direction::Out,
                    out.kind,
                    out.signature,
                )));
            }
        }
        if let Some(config) = component.async_config() {
            self.pools
                .lock()
                .entry(info.type_info().id())
                .or_insert_with(|| {
                    Pool::new(
                        &format!("{}-{}", self.config.thread_name, short_name(info.type_info())),
                        config.multiplicity,
                    )
                });
        }
        wiring.attached.insert(info.id(), Arc::downgrade(&table));
        debug!(
            component = %info,
            out_ports = table.outs.len(),
            in_ports = table.ins.len(),
            "ports discovered"
        );

        Ok(table)
    }

    /// Plans the connection of `from` to `to`.
    fn plan(
        &self,
        wiring: &mut Wiring,
        from: &ComponentRef,
        to: &ComponentRef,
        options: ConnectOptions,
    ) -> Result<Plan, ConnectError> {
        let from_ports = self.ports_of(wiring, from)?;
        let to_ports = self.ports_of(wiring, to)?;

        Plan::resolve(from, from_ports, to, to_ports, options)
    }

    /// Subscribes the failure in-port of a component, if any, to the failure
    /// port.
    fn bind_failure_handler(
        &self,
        component: &ComponentRef,
        table: &PortTable,
    ) -> Result<bool, ConnectError> {
        let Some(idx) = failure_in_port(component, table)? else {
            return Ok(false);
        };
        let input = &table.ins[idx];
        let key = BindingKey {
            component: component.id(),
            port: idx,
        };
        let target = TargetInfo {
            component: component.info(),
            port: input.name,
            async_config: component.async_config(),
        };
        let Some(subscriber) = input
            .port
            .binding(key, target)
            .and_then(|b| b.downcast::<Subscriber<HandlerFailure>>().ok())
        else {
            return Ok(false);
        };
        if !self.failures.bind(*subscriber, true) {
            return Ok(false);
        }
        input.port.on_bound();
        debug!(component = %component.info(), in_port = input.name, "failure handler connected");

        Ok(true)
    }

    fn unbind_failure_handler(&self, component: &ComponentRef, table: &PortTable) {
        if let Ok(Some(idx)) = failure_in_port(component, table) {
            self.failures.unbind(BindingKey {
                component: component.id(),
                port: idx,
            });
        }
    }

    fn shutdown(&self) {
        if self.is_shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(thread_name = %self.config.thread_name, "shutting down runtime");

        {
            let mut wiring = self.wiring.lock();
            for table in wiring.attached.drain().filter_map(|(_, t)| t.upgrade()) {
                for out in &table.outs {
                    out.port.clear();
                }
            }
            wiring.registered.clear();
        }
        self.failures.clear();
        self.domains.close();
        self.interceptor.clear();
        self.contracts.write().clear();

        // Pools are stopped outside the locks since draining may run handlers.
        let pools: Vec<_> = self.pools.lock().drain().map(|(_, p)| p).collect();
        let shared_pool = self.shared_pool.lock().take();
        for pool in pools.iter().chain(shared_pool.iter()) {
            pool.shutdown();
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        // Pools stop themselves when dropped; only log the event.
        if !self.is_shut_down.load(Ordering::Acquire) {
            debug!(thread_name = %self.config.thread_name, "runtime dropped without shutdown");
        }
    }
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("config", &self.config)
            .field("pools", &self.pools.lock().len())
            .field("domains", &self.domains)
            .field("is_shut_down", &self.is_shut_down.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Finds the in-port of a component that accepts `HandlerFailure` events.
fn failure_in_port(
    component: &ComponentRef,
    table: &PortTable,
) -> Result<Option<usize>, ConnectError> {
    let signature = Signature::event::<HandlerFailure>();
    let mut matches = table
        .ins
        .iter()
        .enumerate()
        .filter(|(_, input)| input.signature == signature)
        .map(|(idx, _)| idx);

    match (matches.next(), matches.next()) {
        (Some(_), Some(_)) => Err(ConnectError::AmbiguousPorts {
            from: component.info(),
            to: component.info(),
            signature,
        }),
        (idx, _) => Ok(idx),
    }
}

/// Strips the module path from a type name.
fn short_name(type_info: TypeInfo) -> &'static str {
    let name = type_info.name();
    let base = name.split('<').next().unwrap_or(name);

    base.rsplit("::").next().unwrap_or(base)
}

/// A handle to a runtime.
///
/// See the [module-level documentation](self) for an overview.
#[derive(Clone)]
pub struct Runtime {
    shared: Arc<Shared>,
}

impl Runtime {
    /// Creates a runtime with default settings.
    pub fn new() -> Self {
        RuntimeInit::new().init()
    }

    /// Returns the runtime configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.shared.config
    }

    /// Connects the out-ports of each component to the matching in-ports of
    /// the other.
    ///
    /// Returns `true` if at least one new binding was created. Both directions
    /// are resolved before anything is bound, so on error no port is modified.
    pub fn connect(
        &self,
        a: &dyn AsComponent,
        b: &dyn AsComponent,
        options: impl Into<ConnectOptions>,
    ) -> Result<bool, ConnectError> {
        let options = options.into();
        let (a, b) = (a.as_component(), b.as_component());

        let mut wiring = self.shared.wiring.lock();
        let forward = self.shared.plan(&mut wiring, &a, &b, options)?;
        let backward = self.shared.plan(&mut wiring, &b, &a, options)?;

        let forward_bound = forward.bind(options);
        let backward_bound = backward.bind(options);

        Ok(forward_bound || backward_bound)
    }

    /// Connects the out-ports of `from` to the matching in-ports of `to`.
    ///
    /// Returns `true` if at least one new binding was created.
    pub fn connect_directed(
        &self,
        from: &dyn AsComponent,
        to: &dyn AsComponent,
        options: impl Into<ConnectOptions>,
    ) -> Result<bool, ConnectError> {
        let options = options.into();
        let (from, to) = (from.as_component(), to.as_component());

        let mut wiring = self.shared.wiring.lock();
        let plan = self.shared.plan(&mut wiring, &from, &to, options)?;

        Ok(plan.bind(options))
    }

    /// Removes the bindings that [`connect`](Self::connect) would create
    /// between the two components.
    ///
    /// Returns `true` if at least one binding was removed.
    pub fn disconnect(
        &self,
        a: &dyn AsComponent,
        b: &dyn AsComponent,
        options: impl Into<ConnectOptions>,
    ) -> Result<bool, ConnectError> {
        let options = options.into();
        let (a, b) = (a.as_component(), b.as_component());

        let mut wiring = self.shared.wiring.lock();
        let forward = self.shared.plan(&mut wiring, &a, &b, options)?;
        let backward = self.shared.plan(&mut wiring, &b, &a, options)?;

        let forward_unbound = forward.unbind();
        let backward_unbound = backward.unbind();

        Ok(forward_unbound || backward_unbound)
    }

    /// Removes the bindings that
    /// [`connect_directed`](Self::connect_directed) would create from `from`
    /// to `to`.
    ///
    /// Returns `true` if at least one binding was removed.
    pub fn disconnect_directed(
        &self,
        from: &dyn AsComponent,
        to: &dyn AsComponent,
        options: impl Into<ConnectOptions>,
    ) -> Result<bool, ConnectError> {
        let options = options.into();
        let (from, to) = (from.as_component(), to.as_component());

        let mut wiring = self.shared.wiring.lock();
        let plan = self.shared.plan(&mut wiring, &from, &to, options)?;

        Ok(plan.unbind())
    }

    /// Checks that every out-port of the components is connected.
    pub fn verify(&self, components: &[&dyn AsComponent]) -> Result<(), ConnectError> {
        self.verify_ports(components, false)
    }

    /// Checks that every request out-port of the components is connected.
    pub fn verify_requests_only(&self, components: &[&dyn AsComponent]) -> Result<(), ConnectError> {
        self.verify_ports(components, true)
    }

    fn verify_ports(
        &self,
        components: &[&dyn AsComponent],
        requests_only: bool,
    ) -> Result<(), ConnectError> {
        let tables = {
            let mut wiring = self.shared.wiring.lock();
            components
                .iter()
                .map(|c| self.shared.ports_of(&mut wiring, &c.as_component()))
                .collect::<Result<Vec<_>, _>>()?
        };

        let ports = unconnected_ports(&tables, requests_only);
        if ports.is_empty() {
            return Ok(());
        }

        Err(ConnectError::PortsNotConnected(ports))
    }

    /// Registers a component for auto-wiring.
    ///
    /// The component is connected in both directions to every previously
    /// registered component, and its `HandlerFailure` in-port, if any, is
    /// subscribed to handler failures. All connections are resolved before
    /// anything is bound, so on error the component is neither wired nor
    /// registered.
    ///
    /// Registering an already registered component does nothing.
    pub fn register_component(&self, component: &dyn AsComponent) -> Result<(), ConnectError> {
        let component = component.as_component();

        let mut wiring = self.shared.wiring.lock();
        let table = self.shared.ports_of(&mut wiring, &component)?;
        if wiring.registered.contains(&component) {
            return Ok(());
        }
        failure_in_port(&component, &table)?;

        let peers = wiring.registered.clone();
        let mut plans = Vec::with_capacity(2 * peers.len());
        for peer in &peers {
            plans.push(self.shared.plan(&mut wiring, &component, peer, ConnectOptions::NONE)?);
            plans.push(self.shared.plan(&mut wiring, peer, &component, ConnectOptions::NONE)?);
        }

        for plan in &plans {
            plan.bind(ConnectOptions::NONE);
        }
        self.shared.bind_failure_handler(&component, &table)?;
        debug!(component = %component.info(), peers = peers.len(), "component registered");
        wiring.registered.push(component);

        Ok(())
    }

    /// Unregisters a component, disconnecting it from all other registered
    /// components and from handler failures.
    ///
    /// Domain membership is left unchanged; see
    /// [`Domain::remove_component`](crate::domain::Domain::remove_component).
    ///
    /// Returns `false` if the component was not registered.
    pub fn unregister_component(&self, component: &dyn AsComponent) -> bool {
        let component = component.as_component();

        let mut wiring = self.shared.wiring.lock();
        let Some(pos) = wiring.registered.iter().position(|c| *c == component) else {
            return false;
        };
        wiring.registered.remove(pos);

        let peers = wiring.registered.clone();
        for peer in &peers {
            for (from, to) in [(&component, peer), (peer, &component)] {
                // Pairs that failed to resolve were never bound.
                if let Ok(plan) = self.shared.plan(&mut wiring, from, to, ConnectOptions::NONE) {
                    plan.unbind();
                }
            }
        }
        if let Ok(table) = component.port_table() {
            self.shared.unbind_failure_handler(&component, &table);
        }
        for pool in self.shared.pools.lock().values() {
            pool.forget_component(component.id());
        }
        debug!(component = %component.info(), "component unregistered");

        true
    }

    /// Returns `true` if the component is registered for auto-wiring.
    pub fn is_registered(&self, component: &dyn AsComponent) -> bool {
        let component = component.as_component();

        self.shared.wiring.lock().registered.contains(&component)
    }

    /// Subscribes the `HandlerFailure` in-port of a component, if any, to
    /// handler failures.
    ///
    /// Returns `true` if a new subscription was created.
    pub fn connect_failure_handler(&self, component: &dyn AsComponent) -> Result<bool, ConnectError> {
        let component = component.as_component();

        let mut wiring = self.shared.wiring.lock();
        let table = self.shared.ports_of(&mut wiring, &component)?;

        self.shared.bind_failure_handler(&component, &table)
    }

    /// Declares the response contract of request message type `T`.
    ///
    /// Request ports of already wired components are checked the next time
    /// they are involved in a connection, registration or verification.
    pub fn declare_response<T: 'static>(&self, contract: ResponseContract) -> Result<(), ConnectError> {
        if self.shared.is_shut_down.load(Ordering::Acquire) {
            return Err(ConnectError::RuntimeShutDown);
        }

        self.shared
            .contracts
            .write()
            .declare(TypeInfo::of::<T>(), contract)
    }

    /// Creates a named domain.
    pub fn create_domain(
        &self,
        name: impl Into<String>,
        sync_policy: SyncPolicy,
        dispatch_policy: DispatchPolicy,
    ) -> Result<Domain, DomainError> {
        self.shared
            .domains
            .create(name.into(), sync_policy, dispatch_policy)
    }

    /// Returns the domain of a component, if any.
    pub fn domain_of(&self, component: &dyn AsComponent) -> Option<Domain> {
        let id = component.as_component().id();

        self.shared
            .domains
            .domain_of(id)
            .map(|inner| self.shared.domains.wrap(inner))
    }

    /// Returns the interception harness.
    pub fn interceptor(&self) -> &Interceptor {
        &self.shared.interceptor
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) was called.
    pub fn is_shut_down(&self) -> bool {
        self.shared.is_shut_down.load(Ordering::Acquire)
    }

    /// Shuts the runtime down.
    ///
    /// All bindings of the out-ports discovered by this runtime are released,
    /// domains, interception rules and stashed replies are cleared, and the
    /// worker pools are drained and joined. Subsequent wiring operations fail
    /// with [`ConnectError::RuntimeShutDown`]; in-flight and later deliveries
    /// through ports that are still bound run on the calling thread.
    ///
    /// Calling this method more than once has no effect.
    pub fn shutdown(&self) {
        self.shared.shutdown();
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.shared.config)
            .field("is_shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

impl From<RuntimeConfig> for RuntimeInit {
    fn from(config: RuntimeConfig) -> Self {
        Self { config }
    }
}
