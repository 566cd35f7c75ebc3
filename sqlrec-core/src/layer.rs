//! Layer trait and abstractions.
//!
//! Layers provide a composable way to wrap services with cross-cutting
//! concerns like logging and transport retry. A single layer type can wrap
//! both the completion service and the query service: the wrapper it
//! produces implements whichever service trait its inner value implements.

/// Layer trait for wrapping services.
///
/// Each layer wraps an inner service and returns a new service with
/// enhanced behavior. Wrapping happens with static dispatch while the
/// recommender is being built.
pub trait Layer<S> {
    /// The type of the layered service
    type Layered;

    /// Wrap the inner service with this layer
    fn layer(&self, inner: S) -> Self::Layered;
}

