//! # Runtime
//!
//! - `initialization.rs` - Start-up and dependency wiring
//! - `watch_loop.rs` - The three controllers
//! - `error_policy.rs` - Requeue with per-object backoff

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

pub use initialization::{initialize, InitializationResult};
pub use watch_loop::run;
