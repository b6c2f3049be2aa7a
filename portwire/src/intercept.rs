//! Conditional interception of in-flight messages.
//!
//! The [`Interceptor`] of a runtime is notified of every message sent through
//! an attached out-port and of every message received by an in-port, in
//! addition to normal delivery. Tests use it to:
//!
//! * react to messages with [`Interceptor::when_sent`] and
//!   [`Interceptor::when_received`] rules,
//! * wait for messages handled on worker threads with
//!   [`Interceptor::expect_sent`] and [`Interceptor::expect_received`], without
//!   resorting to sleeps,
//! * substitute the reply of a request with [`Interceptor::respond_with`].
//!
//! "Sent" notifications happen on the sending thread before delivery.
//! "Received" notifications happen on the thread running the in-port: after
//! the handler returned (or the sink stored the event) for events, and when
//! the handler picks up the message for requests.
//!
//! A stashed reply is consumed by the next matching request, which then
//! returns the reply without invoking the handler.
//!
//! #### Example
//!
//! ```
//! use std::time::Duration;
//!
//! use portwire::runtime::Runtime;
//!
//! let runtime = Runtime::new();
//! let interceptor = runtime.interceptor();
//!
//! // Answer every `u32` request sent by any component with its square.
//! interceptor
//!     .when_sent::<u32>(|_| true)
//!     .then(|msg| msg.respond_with(u64::from(*msg.message()).pow(2)));
//!
//! let seen = interceptor.expect_received::<String>(|s| s.starts_with("done"));
//! assert!(!seen.wait(1, Duration::from_millis(10)));
//! ```

use std::any::{Any, TypeId};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::trace;

use crate::component::{AsComponent, ComponentId, ComponentInfo};

/// Identifier of an interception rule.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RuleId(u64);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Phase {
    Sent,
    Received,
}

type Action = dyn Fn(&dyn Any, &Envelope, &Interceptor) + Send + Sync;

/// Routing information of a notified message.
#[derive(Copy, Clone)]
struct Envelope {
    origin: Option<ComponentInfo>,
    target: Option<ComponentInfo>,
}

struct Rule {
    id: RuleId,
    phase: Phase,
    message: TypeId,
    action: Arc<Action>,
}

type StashKey = (TypeId, TypeId, Option<ComponentId>);

/// Observer and injector of in-flight messages.
///
/// See the [module-level documentation](self) for an overview.
pub struct Interceptor {
    rules: RwLock<Vec<Rule>>,
    responses: Mutex<HashMap<StashKey, VecDeque<Box<dyn Any + Send>>>>,
    next_rule: AtomicU64,
}

impl Interceptor {
    pub(crate) fn new() -> Self {
        Self {
            rules: RwLock::new(Vec::new()),
            responses: Mutex::new(HashMap::new()),
            next_rule: AtomicU64::new(0),
        }
    }

    /// Starts a rule reacting to sent messages of type `T` that satisfy the
    /// predicate.
    pub fn when_sent<T: 'static>(
        &self,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> When<'_, T> {
        When::new(self, Phase::Sent, predicate)
    }

    /// Starts a rule reacting to received messages of type `T` that satisfy
    /// the predicate.
    pub fn when_received<T: 'static>(
        &self,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> When<'_, T> {
        When::new(self, Phase::Received, predicate)
    }

    /// Returns an expectation counting sent messages of type `T` that satisfy
    /// the predicate.
    pub fn expect_sent<T: 'static>(
        &self,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Expectation {
        self.expect::<T, _>(Phase::Sent, predicate)
    }

    /// Returns an expectation counting received messages of type `T` that
    /// satisfy the predicate.
    pub fn expect_received<T: 'static>(
        &self,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Expectation {
        self.expect::<T, _>(Phase::Received, predicate)
    }

    /// Removes a rule.
    ///
    /// Returns `false` if the rule did not exist.
    pub fn remove(&self, rule: RuleId) -> bool {
        let mut rules = self.rules.write();
        let len = rules.len();
        rules.retain(|r| r.id != rule);

        rules.len() != len
    }

    /// Stashes a reply for the next request of type `T` expecting an `R`,
    /// whatever its sender.
    pub fn respond_with<T, R>(&self, reply: R)
    where
        T: 'static,
        R: Send + 'static,
    {
        self.stash::<T, R>(None, reply);
    }

    /// Stashes a reply for the next request of type `T` expecting an `R` sent
    /// by the specified component.
    ///
    /// Replies stashed for a specific sender take precedence over replies
    /// stashed with [`respond_with`](Self::respond_with).
    pub fn respond_with_from<T, R>(&self, origin: &dyn AsComponent, reply: R)
    where
        T: 'static,
        R: Send + 'static,
    {
        self.stash::<T, R>(Some(origin.as_component().id()), reply);
    }

    /// Discards all stashed replies.
    pub fn clear_responses(&self) {
        self.responses.lock().clear();
    }

    /// Removes all rules and discards all stashed replies.
    pub fn clear(&self) {
        self.rules.write().clear();
        self.clear_responses();
    }

    /// Returns the number of registered rules, expectations included.
    pub fn rule_count(&self) -> usize {
        self.rules.read().len()
    }

    fn stash<T: 'static, R: Send + 'static>(&self, origin: Option<ComponentId>, reply: R) {
        self.responses
            .lock()
            .entry((TypeId::of::<T>(), TypeId::of::<R>(), origin))
            .or_default()
            .push_back(Box::new(reply));
    }

    /// Consumes a stashed reply, preferring one stashed for the origin.
    pub(crate) fn take_response<T: 'static, R: 'static>(
        &self,
        origin: Option<ComponentId>,
    ) -> Option<R> {
        let mut responses = self.responses.lock();
        if responses.is_empty() {
            return None;
        }

        let mut keys = vec![(TypeId::of::<T>(), TypeId::of::<R>(), None)];
        if origin.is_some() {
            keys.insert(0, (TypeId::of::<T>(), TypeId::of::<R>(), origin));
        }
        for key in keys {
            let Some(queue) = responses.get_mut(&key) else {
                continue;
            };
            let reply = queue.pop_front();
            if queue.is_empty() {
                responses.remove(&key);
            }
            if let Some(reply) = reply.and_then(|r| r.downcast::<R>().ok()) {
                trace!(request = std::any::type_name::<T>(), "stashed reply consumed");
                return Some(*reply);
            }
        }

        None
    }

    /// Returns `true` if a rule observes received messages of type `T`.
    pub(crate) fn observes_received<T: 'static>(&self) -> bool {
        let id = TypeId::of::<T>();
        self.rules
            .read()
            .iter()
            .any(|r| r.phase == Phase::Received && r.message == id)
    }

    pub(crate) fn notify_sent<T: 'static>(&self, message: &T, origin: Option<ComponentInfo>) {
        self.notify(
            Phase::Sent,
            message,
            Envelope {
                origin,
                target: None,
            },
        );
    }

    pub(crate) fn notify_received<T: 'static>(
        &self,
        message: &T,
        origin: Option<ComponentInfo>,
        target: ComponentInfo,
    ) {
        self.notify(
            Phase::Received,
            message,
            Envelope {
                origin,
                target: Some(target),
            },
        );
    }

    fn notify<T: 'static>(&self, phase: Phase, message: &T, envelope: Envelope) {
        let id = TypeId::of::<T>();
        // Actions run on a snapshot so they may add or remove rules.
        let actions: Vec<_> = self
            .rules
            .read()
            .iter()
            .filter(|r| r.phase == phase && r.message == id)
            .map(|r| r.action.clone())
            .collect();

        for action in actions {
            action(message, &envelope, self);
        }
    }

    fn register(&self, phase: Phase, message: TypeId, action: Arc<Action>) -> RuleId {
        let id = RuleId(self.next_rule.fetch_add(1, Ordering::Relaxed));
        self.rules.write().push(Rule {
            id,
            phase,
            message,
            action,
        });

        id
    }

    fn expect<T, P>(&self, phase: Phase, predicate: P) -> Expectation
    where
        T: 'static,
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let counter = Arc::new(Counter::default());
        let observed = counter.clone();
        let rule = When::new(self, phase, predicate).then(move |_| observed.increment());

        Expectation { rule, counter }
    }
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("rules", &self.rules.read().len())
            .field("stashed_responses", &self.responses.lock().len())
            .finish()
    }
}

/// A rule under construction, completed with [`When::then`].
pub struct When<'a, T> {
    interceptor: &'a Interceptor,
    phase: Phase,
    predicate: Box<dyn Fn(&T) -> bool + Send + Sync>,
    _phantom: PhantomData<fn(&T)>,
}

impl<'a, T: 'static> When<'a, T> {
    fn new<P>(interceptor: &'a Interceptor, phase: Phase, predicate: P) -> Self
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            interceptor,
            phase,
            predicate: Box::new(predicate),
            _phantom: PhantomData,
        }
    }

    /// Registers the action run for each matching message.
    ///
    /// Actions run synchronously on the notifying thread and must not block
    /// on the delivery of the message they observe.
    pub fn then<A>(self, action: A) -> RuleId
    where
        A: Fn(&Intercepted<'_, T>) + Send + Sync + 'static,
    {
        let predicate = self.predicate;
        let action = move |message: &dyn Any, envelope: &Envelope, interceptor: &Interceptor| {
            let Some(message) = message.downcast_ref::<T>() else {
                return;
            };
            if predicate(message) {
                action(&Intercepted {
                    message,
                    origin: envelope.origin,
                    target: envelope.target,
                    interceptor,
                });
            }
        };

        self.interceptor
            .register(self.phase, TypeId::of::<T>(), Arc::new(action))
    }
}

impl<T> fmt::Debug for When<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("When")
            .field("message", &std::any::type_name::<T>())
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

/// A message observed by an interception rule.
pub struct Intercepted<'a, T> {
    message: &'a T,
    origin: Option<ComponentInfo>,
    target: Option<ComponentInfo>,
    interceptor: &'a Interceptor,
}

impl<T: 'static> Intercepted<'_, T> {
    /// Returns the message.
    pub fn message(&self) -> &T {
        self.message
    }

    /// Returns the component owning the out-port the message was sent from.
    pub fn origin(&self) -> Option<ComponentInfo> {
        self.origin
    }

    /// Returns the receiving component; always `None` for sent messages.
    pub fn target(&self) -> Option<ComponentInfo> {
        self.target
    }

    /// Stashes a reply for the next request of this type expecting an `R`
    /// from the same sender.
    ///
    /// When called from a "sent" rule, the reply answers the observed request
    /// itself.
    pub fn respond_with<R: Send + 'static>(&self, reply: R) {
        self.interceptor
            .stash::<T, R>(self.origin.map(|o| o.id()), reply);
    }
}

impl<T> fmt::Debug for Intercepted<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Intercepted")
            .field("message", &std::any::type_name::<T>())
            .field("origin", &self.origin)
            .field("target", &self.target)
            .finish()
    }
}

#[derive(Default)]
struct Counter {
    count: Mutex<usize>,
    changed: Condvar,
}

impl Counter {
    fn increment(&self) {
        *self.count.lock() += 1;
        self.changed.notify_all();
    }
}

/// A counter of intercepted messages that can be waited on.
pub struct Expectation {
    rule: RuleId,
    counter: Arc<Counter>,
}

impl Expectation {
    /// Returns the number of matching messages seen so far.
    pub fn count(&self) -> usize {
        *self.counter.count.lock()
    }

    /// Blocks until at least `count` matching messages were seen, or until the
    /// timeout elapses.
    ///
    /// Returns `true` if the count was reached.
    pub fn wait(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut seen = self.counter.count.lock();
        while *seen < count {
            if self
                .counter
                .changed
                .wait_until(&mut seen, deadline)
                .timed_out()
            {
                return *seen >= count;
            }
        }

        true
    }

    /// Returns the identifier of the underlying rule.
    pub fn rule(&self) -> RuleId {
        self.rule
    }
}

impl fmt::Debug for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expectation")
            .field("rule", &self.rule)
            .field("count", &self.count())
            .finish()
    }
}
