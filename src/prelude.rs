//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use klum_controller::prelude::*;
//! ```

// CRD types
pub use crate::crd::*;

// Reconciler types and the credential seam
pub use crate::controller::reconciler::{
    CredentialBackend, KubeconfigSettings, Reconciler, ReconcilerError,
};

// Desired state
pub use crate::controller::desired_state::{generate, DesiredObject, DesiredState, GeneratorConfig};
pub use crate::controller::version::PlatformVersion;

// GitHub sync seams
pub use crate::github::{KubeconfigSync, SecretStore, StoreConnector, SyncEngine, SyncError, SyncOutcome};

// Config types
pub use crate::config::{Args, ControllerConfig, GithubConfig};
