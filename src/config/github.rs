//! # GitHub Configuration
//!
//! Resolves the optional GitHub credentials into an authentication strategy
//! and an API base URL.

use crate::config::args::GithubArgs;
use crate::constants::DEFAULT_GITHUB_API_URL;
use std::path::PathBuf;
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GitHub sync needs either a token or an app id together with a private key file")]
    MissingGithubCredentials,
    #[error("both a GitHub token and GitHub App credentials are configured; pick one")]
    ConflictingGithubCredentials,
    #[error("failed to read GitHub App private key {path}: {source}")]
    PrivateKey {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid GitHub URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

/// How the controller authenticates to GitHub
#[derive(Clone)]
pub enum AuthStrategy {
    /// Static personal access token
    Token(Zeroizing<String>),
    /// GitHub App; an installation token is minted per repository
    App {
        app_id: u64,
        private_key_pem: Zeroizing<Vec<u8>>,
    },
}

impl std::fmt::Debug for AuthStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Token(_) => f.debug_tuple("Token").field(&"***").finish(),
            Self::App { app_id, .. } => f
                .debug_struct("App")
                .field("app_id", app_id)
                .field("private_key_pem", &"***")
                .finish(),
        }
    }
}

/// Resolved GitHub settings
#[derive(Debug, Clone)]
pub struct GithubConfig {
    /// API root, always ending in `/`
    pub api_url: reqwest::Url,
    pub auth: AuthStrategy,
}

impl GithubArgs {
    /// Any GitHub credential was supplied
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
            || self.app_id.is_some()
            || self.private_key_file.is_some()
    }
}

impl GithubConfig {
    /// `Ok(None)` when sync is not configured at all
    pub fn from_args(args: &GithubArgs) -> Result<Option<Self>, ConfigError> {
        if !args.enabled() {
            return Ok(None);
        }

        let token = args.token.as_deref().filter(|t| !t.is_empty());
        let auth = match (token, args.app_id, &args.private_key_file) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                return Err(ConfigError::ConflictingGithubCredentials)
            }
            (Some(token), None, None) => AuthStrategy::Token(Zeroizing::new(token.to_string())),
            (None, Some(app_id), Some(path)) => AuthStrategy::App {
                app_id,
                private_key_pem: Zeroizing::new(std::fs::read(path).map_err(|source| {
                    ConfigError::PrivateKey {
                        path: path.clone(),
                        source,
                    }
                })?),
            },
            (None, _, _) => return Err(ConfigError::MissingGithubCredentials),
        };

        Ok(Some(Self {
            api_url: api_url(args.url.as_deref())?,
            auth,
        }))
    }
}

/// Public GitHub, or `<url>/api/v3/` for a GitHub Enterprise host
pub fn api_url(override_url: Option<&str>) -> Result<reqwest::Url, ConfigError> {
    let invalid = |url: &str, reason: String| ConfigError::InvalidBaseUrl {
        url: url.to_string(),
        reason,
    };

    match override_url.filter(|u| !u.is_empty()) {
        None => reqwest::Url::parse(DEFAULT_GITHUB_API_URL)
            .map_err(|e| invalid(DEFAULT_GITHUB_API_URL, e.to_string())),
        Some(raw) => {
            let mut url = reqwest::Url::parse(raw).map_err(|e| invalid(raw, e.to_string()))?;
            if url.cannot_be_a_base() {
                return Err(invalid(raw, "not a base URL".to_string()));
            }
            let path = format!("{}/api/v3/", url.path().trim_end_matches('/'));
            url.set_path(&path);
            Ok(url)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_without_credentials() {
        assert!(GithubConfig::from_args(&GithubArgs::default()).unwrap().is_none());
    }

    #[test]
    fn test_token_strategy() {
        let args = GithubArgs {
            token: Some("ghp_x".into()),
            ..Default::default()
        };
        let cfg = GithubConfig::from_args(&args).unwrap().unwrap();
        assert!(matches!(cfg.auth, AuthStrategy::Token(ref t) if t.as_str() == "ghp_x"));
        assert_eq!(cfg.api_url.as_str(), "https://api.github.com/");
        assert!(!format!("{:?}", cfg.auth).contains("ghp_x"));
    }

    #[test]
    fn test_incomplete_app_credentials() {
        let args = GithubArgs {
            app_id: Some(7),
            ..Default::default()
        };
        assert!(matches!(
            GithubConfig::from_args(&args),
            Err(ConfigError::MissingGithubCredentials)
        ));
    }

    #[test]
    fn test_conflicting_credentials() {
        let args = GithubArgs {
            token: Some("ghp_x".into()),
            app_id: Some(7),
            private_key_file: Some("/nonexistent".into()),
            ..Default::default()
        };
        assert!(matches!(
            GithubConfig::from_args(&args),
            Err(ConfigError::ConflictingGithubCredentials)
        ));
    }

    #[test]
    fn test_unreadable_private_key() {
        let args = GithubArgs {
            app_id: Some(7),
            private_key_file: Some("/nonexistent/klum-app.pem".into()),
            ..Default::default()
        };
        assert!(matches!(
            GithubConfig::from_args(&args),
            Err(ConfigError::PrivateKey { .. })
        ));
    }

    #[test]
    fn test_enterprise_url() {
        assert_eq!(
            api_url(Some("https://github.example.com")).unwrap().as_str(),
            "https://github.example.com/api/v3/"
        );
        assert_eq!(
            api_url(Some("https://example.com/git/")).unwrap().as_str(),
            "https://example.com/git/api/v3/"
        );
        assert!(api_url(Some("not a url")).is_err());
    }
}
