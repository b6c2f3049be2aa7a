//! Marker types for component handler methods.

/// Marker type for handler methods that take a reference to the component,
/// without any other argument.
#[derive(Debug)]
pub struct WithoutArguments {}

/// Marker type for handler methods that take a reference to the component and
/// a message, without context argument.
#[derive(Debug)]
pub struct WithoutContext {}

/// Marker type for handler methods that take a reference to the component, a
/// message and an explicit context argument.
#[derive(Debug)]
pub struct WithContext {}
