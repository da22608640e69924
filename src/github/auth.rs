//! # GitHub Authentication
//!
//! A personal access token is used as-is. A GitHub App signs a short-lived
//! RS256 JWT, looks up its installation on the target repository and
//! exchanges the JWT for an installation token scoped to that installation.

use super::client::{authorized, check, endpoint, GithubClient};
use super::requests::AppClaims;
use super::responses::{Installation, InstallationToken};
use super::{StoreConnector, SyncError};
use crate::config::{AuthStrategy, GithubConfig};
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Method, Url};
use std::time::Duration;
use tracing::{debug, info_span, Instrument};

/// Backdate `iat` to absorb clock drift between us and GitHub
const JWT_BACKDATE_SECS: i64 = 60;
/// GitHub rejects App JWTs valid for more than ten minutes
const JWT_LIFETIME_SECS: i64 = 540;

/// Sign the App JWT for `app_id` as of `now` (unix seconds)
pub fn app_jwt(app_id: u64, private_key_pem: &[u8], now: i64) -> Result<String, SyncError> {
    let claims = AppClaims {
        iat: now - JWT_BACKDATE_SECS,
        exp: now + JWT_LIFETIME_SECS,
        iss: app_id.to_string(),
    };
    let key = EncodingKey::from_rsa_pem(private_key_pem)?;
    Ok(jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)?)
}

/// Builds authenticated `GithubClient`s per repository
#[derive(Debug, Clone)]
pub struct GithubConnector {
    http: reqwest::Client,
    api_url: Url,
    auth: AuthStrategy,
}

impl GithubConnector {
    pub fn new(config: GithubConfig, timeout: Duration) -> Result<Self, SyncError> {
        Ok(Self {
            http: super::client::http_client(timeout)?,
            api_url: config.api_url,
            auth: config.auth,
        })
    }

    async fn installation_token(
        &self,
        app_id: u64,
        private_key_pem: &[u8],
        owner: &str,
        repository: &str,
    ) -> Result<InstallationToken, SyncError> {
        let span = info_span!(
            "github.app.installation_token",
            app.id = app_id,
            repo = %format!("{owner}/{repository}")
        );
        async move {
            let jwt = app_jwt(app_id, private_key_pem, chrono::Utc::now().timestamp())?;

            let url = endpoint(&self.api_url, &["repos", owner, repository, "installation"])?;
            let installation: Installation =
                check(authorized(&self.http, Method::GET, url, &jwt).send().await?)
                    .await?
                    .json()
                    .await?;
            debug!(installation.id = installation.id, "Found app installation");

            let url = endpoint(
                &self.api_url,
                &[
                    "app",
                    "installations",
                    installation.id.to_string().as_str(),
                    "access_tokens",
                ],
            )?;
            let token: InstallationToken =
                check(authorized(&self.http, Method::POST, url, &jwt).send().await?)
                    .await?
                    .json()
                    .await?;
            Ok::<_, SyncError>(token)
        }
        .instrument(span)
        .await
    }
}

#[async_trait]
impl StoreConnector for GithubConnector {
    type Store = GithubClient;

    async fn connect(&self, owner: &str, repository: &str) -> Result<GithubClient, SyncError> {
        let token = match &self.auth {
            AuthStrategy::Token(token) => token.clone(),
            AuthStrategy::App {
                app_id,
                private_key_pem,
            } => {
                self.installation_token(*app_id, private_key_pem, owner, repository)
                    .await?
                    .token
            }
        };
        Ok(GithubClient::new(self.http.clone(), self.api_url.clone(), token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation};
    use serde::Deserialize;

    const PRIVATE_KEY: &[u8] = include_bytes!("../../tests/fixtures/github-app.pem");
    const PUBLIC_KEY: &[u8] = include_bytes!("../../tests/fixtures/github-app.pub.pem");

    #[derive(Debug, Deserialize)]
    struct Claims {
        iat: i64,
        exp: i64,
        iss: String,
    }

    #[test]
    fn test_app_jwt_claims_and_signature() {
        let now = chrono::Utc::now().timestamp();
        let jwt = app_jwt(1234, PRIVATE_KEY, now).unwrap();

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.set_issuer(&["1234"]);
        let decoded = jsonwebtoken::decode::<Claims>(
            &jwt,
            &DecodingKey::from_rsa_pem(PUBLIC_KEY).unwrap(),
            &validation,
        )
        .unwrap();

        assert_eq!(decoded.header.alg, Algorithm::RS256);
        assert_eq!(decoded.claims.iss, "1234");
        assert_eq!(decoded.claims.iat, now - 60);
        assert_eq!(decoded.claims.exp, now + 540);
    }

    #[test]
    fn test_app_jwt_rejects_garbage_key() {
        assert!(matches!(
            app_jwt(1, b"not a pem", 0),
            Err(SyncError::Jwt(_))
        ));
    }
}
