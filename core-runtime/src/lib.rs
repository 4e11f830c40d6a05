//! Runtime plumbing shared by the media queue crates.
//!
//! - [`config`]: the validated [`CoreConfig`](config::CoreConfig) the
//!   service is bootstrapped from
//! - [`events`]: the broadcast bus carrying driver, cache and queue events
//! - [`logging`]: global `tracing` setup with optional host sink forwarding

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
