//! # Controller
//!
//! Core controller modules.
//!
//! - `apply`: Server-side apply and pruning of a User's object set
//! - `backoff`: Fibonacci backoff for failed reconciles
//! - `desired_state`: Pure User → objects translation
//! - `naming`: Deterministic, length-bounded object names
//! - `reconciler`: Reconcile functions for every watched kind
//! - `server`: HTTP server for metrics and health checks
//! - `version`: API server version gate

pub mod apply;
pub mod backoff;
pub mod desired_state;
pub mod naming;
pub mod reconciler;
pub mod server;
pub mod version;
