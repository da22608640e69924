//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Field manager used for every server-side apply
pub const FIELD_MANAGER: &str = "klum-controller";

/// Prefix of every derived RBAC binding name
pub const NAME_PREFIX: &str = "klum";

/// Annotation on ServiceAccounts pointing back at the owning User
pub const USER_ANNOTATION: &str = "klum.cattle.io/user";

/// Label carried by every object generated for a User (value is label-safe)
pub const USER_LABEL: &str = "klum.cattle.io/user";

/// Standard managed-by label
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Value of the managed-by label
pub const MANAGED_BY_VALUE: &str = "klum";

/// Annotation holding the SHA-256 of the last uploaded Kubeconfig spec.
/// Spelling matches objects created by earlier releases.
pub const LAST_UPLOAD_HASH_ANNOTATION: &str = "klum.cattle.io/lastest.upload.github";

/// Finalizer placed on token Secrets that produced a Kubeconfig
pub const SECRET_FINALIZER: &str = "klum.cattle.io/kubeconfig";

/// Finalizer placed on UserSyncGithub bindings
pub const GITHUB_SYNC_FINALIZER: &str = "klum.cattle.io/github-sync";

/// Platform annotations on service-account-token Secrets
pub const SERVICE_ACCOUNT_NAME_ANNOTATION: &str = "kubernetes.io/service-account.name";
pub const SERVICE_ACCOUNT_UID_ANNOTATION: &str = "kubernetes.io/service-account.uid";

/// Secret type issued for ServiceAccount tokens
pub const SERVICE_ACCOUNT_TOKEN_TYPE: &str = "kubernetes.io/service-account-token";

/// Keys inside a token Secret's data
pub const TOKEN_KEY: &str = "token";
pub const CA_CERT_KEY: &str = "ca.crt";

/// RBAC API group used in role references
pub const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

/// First Kubernetes minor release that stopped auto-issuing token Secrets
pub const MANUAL_TOKEN_SECRET_MINOR_VERSION: u32 = 24;

/// Condition types on the User status
pub const READY_CONDITION: &str = "Ready";
pub const ROLES_VALID_CONDITION: &str = "RolesValid";

/// Kubernetes object name length limit for most kinds
pub const MAX_NAME_LENGTH: usize = 63;

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default per-kind reconcile concurrency
pub const DEFAULT_RECONCILE_CONCURRENCY: u16 = 2;

/// Default periodic resync of User objects (seconds)
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 600;

/// Default Fibonacci backoff bounds for failed reconciles (minutes)
pub const DEFAULT_BACKOFF_MIN_MINUTES: u64 = 1;
pub const DEFAULT_BACKOFF_MAX_MINUTES: u64 = 10;

/// Pause inserted before each GitHub write to stay under burst limits
pub const DEFAULT_GITHUB_THROTTLE_MS: u64 = 1000;

/// Timeout for a single GitHub HTTP request (seconds)
pub const DEFAULT_GITHUB_HTTP_TIMEOUT_SECS: u64 = 30;

/// Public GitHub API root
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com/";
