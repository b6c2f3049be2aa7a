use std::fmt;
use std::sync::Arc;

use crate::component::{ComponentId, ComponentInfo};
use crate::runtime::AsyncConfig;

use super::sink::SinkHandle;

/// Identifies an in-port of a specific component instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct BindingKey {
    pub(crate) component: ComponentId,
    pub(crate) port: usize,
}

/// Everything the dispatcher needs to know about the target of a binding.
#[derive(Copy, Clone, Debug)]
pub(crate) struct TargetInfo {
    pub(crate) component: ComponentInfo,
    pub(crate) port: &'static str,
    pub(crate) async_config: Option<AsyncConfig>,
}

/// A subscriber of an event port.
pub(crate) enum Subscriber<T> {
    /// A handler method of another component.
    Input(InputBinding<T>),
    /// A queue or stack sink.
    Sink(SinkBinding<T>),
}

impl<T> Subscriber<T> {
    pub(crate) fn key(&self) -> BindingKey {
        match self {
            Self::Input(binding) => binding.key,
            Self::Sink(binding) => binding.key,
        }
    }
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Input(binding) => Self::Input(binding.clone()),
            Self::Sink(binding) => Self::Sink(binding.clone()),
        }
    }
}

impl<T> fmt::Debug for Subscriber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input(binding) => write!(f, "Input({}.{})", binding.target.component, binding.target.port),
            Self::Sink(binding) => write!(f, "Sink({}.{})", binding.target.component, binding.target.port),
        }
    }
}

/// A binding to an event handler.
pub(crate) struct InputBinding<T> {
    pub(crate) key: BindingKey,
    pub(crate) target: TargetInfo,
    pub(crate) invoke: Arc<dyn Fn(T) + Send + Sync>,
}

impl<T> Clone for InputBinding<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            target: self.target,
            invoke: self.invoke.clone(),
        }
    }
}

/// A binding to a queue or stack sink.
pub(crate) struct SinkBinding<T> {
    pub(crate) key: BindingKey,
    pub(crate) target: TargetInfo,
    pub(crate) sink: SinkHandle<T>,
}

impl<T> SinkBinding<T> {
    pub(crate) fn write(&self, event: T) {
        self.sink.materialize().push(event);
    }
}

impl<T> Clone for SinkBinding<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            target: self.target,
            sink: self.sink.clone(),
        }
    }
}

/// A binding to a request handler.
pub(crate) struct ReplierBinding<T, R> {
    pub(crate) key: BindingKey,
    pub(crate) target: TargetInfo,
    pub(crate) invoke: Arc<dyn Fn(T) -> R + Send + Sync>,
}

impl<T, R> Clone for ReplierBinding<T, R> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            target: self.target,
            invoke: self.invoke.clone(),
        }
    }
}
