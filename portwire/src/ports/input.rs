//! Traits for component event and request handlers.

pub mod markers;

use crate::component::{Component, Context};

/// A function, method or closure that can be used as an *event in-port*.
///
/// This trait is in particular implemented for any function or method with the
/// following signature, where it is implicitly assumed that the function
/// implements `Send + Sync + 'static`:
///
/// ```ignore
/// Fn(&C, T)
/// Fn(&C, T, &Context<C>)
/// where
///     C: Component
/// ```
///
/// It is also implemented for the following signature when `T=()`:
///
/// ```ignore
/// Fn(&C)
/// where
///     C: Component
/// ```
pub trait InputFn<C: Component, T, S>: Send + Sync + 'static {
    /// Calls the method.
    fn call(&self, component: &C, arg: T, context: &Context<'_, C>);
}

impl<C, F> InputFn<C, (), markers::WithoutArguments> for F
where
    C: Component,
    F: Fn(&C) + Send + Sync + 'static,
{
    fn call(&self, component: &C, _arg: (), _context: &Context<'_, C>) {
        self(component)
    }
}

impl<C, T, F> InputFn<C, T, markers::WithoutContext> for F
where
    C: Component,
    F: Fn(&C, T) + Send + Sync + 'static,
{
    fn call(&self, component: &C, arg: T, _context: &Context<'_, C>) {
        self(component, arg)
    }
}

impl<C, T, F> InputFn<C, T, markers::WithContext> for F
where
    C: Component,
    F: Fn(&C, T, &Context<'_, C>) + Send + Sync + 'static,
{
    fn call(&self, component: &C, arg: T, context: &Context<'_, C>) {
        self(component, arg, context)
    }
}

/// A function, method or closure that can be used as a *request in-port*.
///
/// This trait is in particular implemented for any function or method with the
/// following signature, where it is implicitly assumed that the function
/// implements `Send + Sync + 'static`:
///
/// ```ignore
/// Fn(&C, T) -> R
/// Fn(&C, T, &Context<C>) -> R
/// where
///     C: Component
/// ```
///
/// It is also implemented for the following signature when `T=()`:
///
/// ```ignore
/// Fn(&C) -> R
/// where
///     C: Component
/// ```
pub trait ReplierFn<C: Component, T, R, S>: Send + Sync + 'static {
    /// Calls the method.
    fn call(&self, component: &C, arg: T, context: &Context<'_, C>) -> R;
}

impl<C, R, F> ReplierFn<C, (), R, markers::WithoutArguments> for F
where
    C: Component,
    F: Fn(&C) -> R + Send + Sync + 'static,
{
    fn call(&self, component: &C, _arg: (), _context: &Context<'_, C>) -> R {
        self(component)
    }
}

impl<C, T, R, F> ReplierFn<C, T, R, markers::WithoutContext> for F
where
    C: Component,
    F: Fn(&C, T) -> R + Send + Sync + 'static,
{
    fn call(&self, component: &C, arg: T, _context: &Context<'_, C>) -> R {
        self(component, arg)
    }
}

impl<C, T, R, F> ReplierFn<C, T, R, markers::WithContext> for F
where
    C: Component,
    F: Fn(&C, T, &Context<'_, C>) -> R + Send + Sync + 'static,
{
    fn call(&self, component: &C, arg: T, context: &Context<'_, C>) -> R {
        self(component, arg, context)
    }
}
