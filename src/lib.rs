//! klum Controller Library
//!
//! Kubernetes Lazy User Manager: a `User` resource becomes a ServiceAccount,
//! RBAC bindings and a token Secret, and the token becomes a downloadable
//! `Kubeconfig`. Kubeconfigs can optionally be mirrored into GitHub
//! encrypted secrets through `UserSyncGithub` bindings.
//!
//! ## Quick Start
//!
//! ```rust
//! use klum_controller::prelude::*;
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod github;
pub mod observability;
pub mod prelude;
pub mod runtime;
