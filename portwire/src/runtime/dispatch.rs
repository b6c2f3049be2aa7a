//! Execution placement of event deliveries and request calls.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{trace, warn};

use super::pool::{LaneKey, Pool};
use super::{HandlerFailure, Shared, SyncLevel};
use crate::component::ComponentInfo;
use crate::ports::{BindingKey, ReplierBinding, Subscriber, TargetInfo, TypeInfo};

/// Selects the pool and lane of an in-port invocation, or `None` to run it on
/// the calling thread.
fn placement(
    runtime: Option<&Arc<Shared>>,
    origin: Option<ComponentInfo>,
    target: &TargetInfo,
    key: BindingKey,
    is_request: bool,
) -> Option<(Arc<Pool>, LaneKey)> {
    let runtime = runtime?;

    if let Some(config) = target.async_config {
        let pool = runtime.pool_for(target.component.type_info())?;
        let port = match config.sync_level {
            SyncLevel::PerPort => Some(key.port),
            SyncLevel::PerInstance => None,
        };
        return Some((
            pool,
            LaneKey {
                component: key.component,
                port,
            },
        ));
    }

    if is_request {
        return None;
    }
    let origin = origin?;
    if !runtime
        .domains
        .is_parallel_between(origin.id(), target.component.id())
    {
        return None;
    }

    Some((
        runtime.shared_pool()?,
        LaneKey {
            component: key.component,
            port: Some(key.port),
        },
    ))
}

/// Delivers an event to one subscriber.
///
/// Sinks are written on the calling thread; handlers run inline or on their
/// lane depending on the target's configuration and domain.
pub(crate) fn deliver_event<T>(
    runtime: Option<&Arc<Shared>>,
    origin: Option<ComponentInfo>,
    subscriber: Subscriber<T>,
    event: T,
) where
    T: Clone + Send + 'static,
{
    match subscriber {
        Subscriber::Sink(binding) => {
            let observed = observed_copy(runtime, &event);
            binding.write(event);
            if let (Some(runtime), Some(event)) = (runtime, observed) {
                runtime
                    .interceptor()
                    .notify_received(&event, origin, binding.target.component);
            }
        }
        Subscriber::Input(binding) => {
            match placement(runtime, origin, &binding.target, binding.key, false) {
                Some((pool, lane)) => {
                    trace!(
                        target_component = %binding.target.component,
                        port = binding.target.port,
                        "event queued"
                    );
                    let runtime = runtime.cloned();
                    pool.submit(
                        lane,
                        Box::new(move || {
                            run_handler(runtime.as_ref(), origin, &binding.target, event, |e| {
                                (binding.invoke)(e)
                            })
                        }),
                    );
                }
                None => run_handler(runtime, origin, &binding.target, event, |e| {
                    (binding.invoke)(e)
                }),
            }
        }
    }
}

/// Sends a request to its handler and waits for the reply.
///
/// Returns `None` if the job was dropped without running. A handler panic is
/// resumed on the calling thread.
pub(crate) fn call<T, R>(
    runtime: Option<&Arc<Shared>>,
    origin: Option<ComponentInfo>,
    binding: ReplierBinding<T, R>,
    request: T,
) -> Option<R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    // A caller holding the target's domain lock would block its worker, and a
    // handler calling into its own lane would wait for itself: both run inline.
    let holds_domain = runtime
        .and_then(|rt| rt.domains.domain_of(binding.target.component.id()))
        .is_some_and(|d| d.is_held());

    match placement(runtime, origin, &binding.target, binding.key, true) {
        Some((pool, lane)) if !holds_domain && !pool.is_running(lane) => {
            let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
            let runtime = runtime.cloned();
            pool.submit(
                lane,
                Box::new(move || {
                    let reply = panic::catch_unwind(AssertUnwindSafe(|| {
                        run_replier(runtime.as_ref(), origin, &binding, request)
                    }));
                    let _ = reply_tx.send(reply);
                }),
            );

            match pool.wait_for(&reply_rx) {
                Some(Ok(reply)) => Some(reply),
                Some(Err(payload)) => panic::resume_unwind(payload),
                None => None,
            }
        }
        _ => Some(run_replier(runtime, origin, &binding, request)),
    }
}

fn run_replier<T, R>(
    runtime: Option<&Arc<Shared>>,
    origin: Option<ComponentInfo>,
    binding: &ReplierBinding<T, R>,
    request: T,
) -> R
where
    T: Send + 'static,
    R: Send + 'static,
{
    let target = binding.target;
    if let Some(runtime) = runtime {
        runtime
            .interceptor()
            .notify_received(&request, origin, target.component);
    }

    let domain = runtime.and_then(|rt| rt.domains.domain_of(target.component.id()));
    let _exclusion = domain.as_ref().and_then(|d| d.exclude());

    (binding.invoke)(request)
}

/// Runs an event handler, isolating and reporting its failure.
fn run_handler<T, F>(
    runtime: Option<&Arc<Shared>>,
    origin: Option<ComponentInfo>,
    target: &TargetInfo,
    event: T,
    handler: F,
) where
    T: Clone + Send + 'static,
    F: FnOnce(T),
{
    let observed = observed_copy(runtime, &event);

    let result = {
        let domain = runtime.and_then(|rt| rt.domains.domain_of(target.component.id()));
        let _exclusion = domain.as_ref().and_then(|d| d.exclude());

        panic::catch_unwind(AssertUnwindSafe(|| handler(event)))
    };

    match result {
        Ok(()) => {
            if let (Some(runtime), Some(event)) = (runtime, observed) {
                runtime
                    .interceptor()
                    .notify_received(&event, origin, target.component);
            }
        }
        Err(payload) => report_failure(runtime, target, TypeInfo::of::<T>(), payload),
    }
}

/// Clones the event only if an interception rule will look at it once
/// delivered.
fn observed_copy<T: Clone + 'static>(runtime: Option<&Arc<Shared>>, event: &T) -> Option<T> {
    runtime
        .filter(|rt| rt.interceptor().observes_received::<T>())
        .map(|_| event.clone())
}

fn report_failure(
    runtime: Option<&Arc<Shared>>,
    target: &TargetInfo,
    message: TypeInfo,
    payload: Box<dyn Any + Send>,
) {
    let reason = panic_message(payload.as_ref());
    warn!(
        component = %target.component,
        port = target.port,
        message = %message,
        reason = %reason,
        "event handler panicked"
    );

    // Failures of failure handlers are only logged.
    if message == TypeInfo::of::<HandlerFailure>() {
        return;
    }
    if let Some(runtime) = runtime {
        runtime.failures.trigger(HandlerFailure {
            component: target.component,
            port: target.port,
            message,
            reason,
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
