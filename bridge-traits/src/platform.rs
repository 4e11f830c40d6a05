//! Marker traits keeping bridge bounds in one place.
//!
//! Every bridge is shared across tokio tasks, so implementations must be
//! `Send + Sync`. The blanket impls below let trait definitions name a single
//! bound instead of repeating it.

/// Marker trait for bridge implementations shared across async tasks.
pub trait PlatformSendSync: Send + Sync {}

impl<T> PlatformSendSync for T where T: Send + Sync {}
