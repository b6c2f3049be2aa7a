//! Domains: named groups of components sharing a scheduling policy.
//!
//! A [`Domain`] is created with
//! [`Runtime::create_domain`](crate::runtime::Runtime::create_domain) and
//! combines two independent policies:
//!
//! * a [`SyncPolicy`], which states whether deliveries to domain members must
//!   be mutually excluded,
//! * a [`DispatchPolicy`], which states whether messages exchanged between
//!   domain members are delivered on the triggering thread or offloaded to the
//!   runtime's shared worker pool.
//!
//! Domain policies are layered on top of the per-component
//! [`AsyncConfig`](crate::runtime::AsyncConfig): lane exclusion of
//! asynchronous components is always enforced, and a serialized domain adds a
//! re-entrant lock around every handler execution of its members.
//!
//! A component belongs to at most one domain at a time. Adding it to a domain
//! removes it from its previous one.
//!
//! #### Example
//!
//! ```
//! use portwire::domain::{DispatchPolicy, SyncPolicy};
//! use portwire::runtime::Runtime;
//!
//! let runtime = Runtime::new();
//! let domain = runtime
//!     .create_domain("control", SyncPolicy::Serialized, DispatchPolicy::Sequential)
//!     .unwrap();
//!
//! assert_eq!(domain.name(), "control");
//! assert!(domain.members().is_empty());
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use tracing::debug;

use crate::component::{AsComponent, ComponentId, ComponentInfo};

static NEXT_DOMAIN_ID: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    /// Serialized domains locked by the current thread, innermost last.
    static HELD_DOMAINS: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Mutual exclusion applied to deliveries into domain members.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum SyncPolicy {
    /// No exclusion beyond the port-level rules of each component.
    #[default]
    NoSync,
    /// All handler executions of domain members are serialized.
    Serialized,
}

/// Scheduling of messages exchanged between domain members.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum DispatchPolicy {
    /// Cascades run on the triggering thread.
    #[default]
    Sequential,
    /// Events sent from a member to another member run on the runtime's shared
    /// pool. Requests always block the caller.
    Parallel,
}

/// Error returned when a domain cannot be created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DomainError {
    /// A domain with this name already exists.
    DuplicateName(String),
    /// The runtime was shut down.
    RuntimeShutDown,
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateName(name) => write!(f, "a domain named '{}' already exists", name),
            Self::RuntimeShutDown => f.write_str("the runtime was shut down"),
        }
    }
}

impl Error for DomainError {}

/// Shared data of a domain.
pub(crate) struct DomainInner {
    id: usize,
    name: String,
    sync_policy: SyncPolicy,
    dispatch_policy: DispatchPolicy,
    exclusion: ReentrantMutex<()>,
    members: Mutex<Vec<ComponentInfo>>,
}

impl DomainInner {
    /// Acquires the domain lock if the domain is serialized.
    pub(crate) fn exclude(&self) -> Option<Exclusion<'_>> {
        match self.sync_policy {
            SyncPolicy::NoSync => None,
            SyncPolicy::Serialized => {
                let guard = self.exclusion.lock();
                HELD_DOMAINS.with(|held| held.borrow_mut().push(self.id));

                Some(Exclusion { _guard: guard })
            }
        }
    }

    /// Returns `true` if the current thread holds the domain lock.
    pub(crate) fn is_held(&self) -> bool {
        HELD_DOMAINS.with(|held| held.borrow().contains(&self.id))
    }
}

/// Guard of a serialized domain, released on drop.
pub(crate) struct Exclusion<'a> {
    _guard: ReentrantMutexGuard<'a, ()>,
}

impl Drop for Exclusion<'_> {
    fn drop(&mut self) {
        HELD_DOMAINS.with(|held| held.borrow_mut().pop());
    }
}

/// The domain registry of a runtime.
#[derive(Default)]
pub(crate) struct Domains {
    state: Mutex<DomainsState>,
}

#[derive(Default)]
struct DomainsState {
    by_name: HashMap<String, Arc<DomainInner>>,
    membership: HashMap<ComponentId, Arc<DomainInner>>,
    is_closed: bool,
}

impl Domains {
    pub(crate) fn create(
        self: &Arc<Self>,
        name: String,
        sync_policy: SyncPolicy,
        dispatch_policy: DispatchPolicy,
    ) -> Result<Domain, DomainError> {
        let mut state = self.state.lock();
        if state.is_closed {
            return Err(DomainError::RuntimeShutDown);
        }
        if state.by_name.contains_key(&name) {
            return Err(DomainError::DuplicateName(name));
        }

        let inner = Arc::new(DomainInner {
            id: NEXT_DOMAIN_ID.fetch_add(1, Ordering::Relaxed),
            name: name.clone(),
            sync_policy,
            dispatch_policy,
            exclusion: ReentrantMutex::new(()),
            members: Mutex::new(Vec::new()),
        });
        state.by_name.insert(name, inner.clone());
        debug!(domain = %inner.name, ?sync_policy, ?dispatch_policy, "domain created");

        Ok(Domain {
            domains: self.clone(),
            inner,
        })
    }

    /// Returns the domain of a component, if any.
    pub(crate) fn domain_of(&self, component: ComponentId) -> Option<Arc<DomainInner>> {
        self.state.lock().membership.get(&component).cloned()
    }

    /// Returns `true` if both components are members of the same parallel
    /// domain.
    pub(crate) fn is_parallel_between(&self, origin: ComponentId, target: ComponentId) -> bool {
        let state = self.state.lock();
        match (state.membership.get(&origin), state.membership.get(&target)) {
            (Some(a), Some(b)) => {
                Arc::ptr_eq(a, b) && a.dispatch_policy == DispatchPolicy::Parallel
            }
            _ => false,
        }
    }

    pub(crate) fn wrap(self: &Arc<Self>, inner: Arc<DomainInner>) -> Domain {
        Domain {
            domains: self.clone(),
            inner,
        }
    }

    fn add(&self, domain: &Arc<DomainInner>, component: ComponentInfo) {
        let mut state = self.state.lock();
        if state.is_closed {
            return;
        }
        if let Some(previous) = state.membership.insert(component.id(), domain.clone()) {
            if Arc::ptr_eq(&previous, domain) {
                return;
            }
            previous.members.lock().retain(|m| m.id() != component.id());
            debug!(component = %component, from = %previous.name, to = %domain.name, "component moved to another domain");
        }
        domain.members.lock().push(component);
    }

    fn remove(&self, domain: &Arc<DomainInner>, component: ComponentId) -> bool {
        let mut state = self.state.lock();
        match state.membership.get(&component) {
            Some(current) if Arc::ptr_eq(current, domain) => {
                state.membership.remove(&component);
                domain.members.lock().retain(|m| m.id() != component);
                true
            }
            _ => false,
        }
    }

    /// Releases all domains and refuses new ones.
    pub(crate) fn close(&self) {
        let mut state = self.state.lock();
        state.is_closed = true;
        for domain in state.by_name.values() {
            domain.members.lock().clear();
        }
        state.by_name.clear();
        state.membership.clear();
    }
}

impl fmt::Debug for Domains {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Domains")
            .field("domains", &state.by_name.keys().collect::<Vec<_>>())
            .field("members", &state.membership.len())
            .finish()
    }
}

/// A handle to a named domain.
///
/// Domain handles are cheap to clone; all clones refer to the same domain.
#[derive(Clone)]
pub struct Domain {
    domains: Arc<Domains>,
    inner: Arc<DomainInner>,
}

impl Domain {
    /// Returns the domain name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the synchronization policy.
    pub fn sync_policy(&self) -> SyncPolicy {
        self.inner.sync_policy
    }

    /// Returns the dispatch policy.
    pub fn dispatch_policy(&self) -> DispatchPolicy {
        self.inner.dispatch_policy
    }

    /// Adds components to the domain, removing them from their previous
    /// domain if any.
    ///
    /// This has no effect once the runtime was shut down.
    pub fn add_components(&self, components: &[&dyn AsComponent]) -> &Self {
        for component in components {
            self.domains.add(&self.inner, component.as_component().info());
        }

        self
    }

    /// Removes a component from the domain.
    ///
    /// Returns `false` if the component was not a member.
    pub fn remove_component(&self, component: &dyn AsComponent) -> bool {
        self.domains.remove(&self.inner, component.as_component().id())
    }

    /// Returns the current members, in insertion order.
    pub fn members(&self) -> Vec<ComponentInfo> {
        self.inner.members.lock().clone()
    }

    /// Returns `true` if the component is a member of this domain.
    pub fn contains(&self, component: &dyn AsComponent) -> bool {
        let id = component.as_component().id();
        self.inner.members.lock().iter().any(|m| m.id() == id)
    }
}

impl PartialEq for Domain {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Domain {}

impl fmt::Debug for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Domain")
            .field("name", &self.inner.name)
            .field("sync_policy", &self.inner.sync_policy)
            .field("dispatch_policy", &self.inner.dispatch_policy)
            .finish_non_exhaustive()
    }
}
