//! # Configuration
//!
//! - `args.rs` - Process flags with environment fallbacks
//! - `controller.rs` - Runtime tuning from environment variables
//! - `github.rs` - GitHub credentials and API URL resolution

pub mod args;
pub mod controller;
pub mod github;

pub use args::{Args, GithubArgs};
pub use controller::ControllerConfig;
pub use github::{api_url, AuthStrategy, ConfigError, GithubConfig};
