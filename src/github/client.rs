//! # GitHub REST Client
//!
//! Repository lookup, public-key fetch and secret upsert/delete against the
//! GitHub REST v3 API, for both repository and environment scopes.

use super::requests::PutSecretRequest;
use super::responses::{PublicKeyResponse, Repository};
use super::{SecretScope, SecretStore, SyncError};
use crate::crd::GithubSyncSpec;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use std::time::Duration;
use tracing::{debug, info_span, Instrument};
use zeroize::Zeroizing;

const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";
const GITHUB_API_VERSION_HEADER: &str = "X-GitHub-Api-Version";
const GITHUB_API_VERSION: &str = "2022-11-28";

/// Shared HTTP client with the controller's user agent and request timeout
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, SyncError> {
    Ok(reqwest::Client::builder()
        .user_agent(concat!("klum-controller/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()?)
}

/// Client authenticated with a bearer token (PAT or installation token)
#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    api_url: Url,
    token: Zeroizing<String>,
}

impl std::fmt::Debug for GithubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubClient")
            .field("api_url", &self.api_url.as_str())
            .field("token", &"***")
            .finish()
    }
}

impl GithubClient {
    #[must_use]
    pub fn new(http: reqwest::Client, api_url: Url, token: Zeroizing<String>) -> Self {
        Self {
            http,
            api_url,
            token,
        }
    }

    pub(crate) fn request(&self, method: Method, url: Url) -> RequestBuilder {
        authorized(&self.http, method, url, &self.token)
    }

    fn secret_url(&self, scope: &SecretScope, tail: &str) -> Result<Url, SyncError> {
        let mut segments = scope.secrets_segments();
        segments.push(tail.to_string());
        endpoint(&self.api_url, &segments)
    }
}

/// Request carrying GitHub's media type, API version and a bearer credential
pub(crate) fn authorized(
    http: &reqwest::Client,
    method: Method,
    url: Url,
    bearer: &str,
) -> RequestBuilder {
    http.request(method, url)
        .bearer_auth(bearer)
        .header(ACCEPT, GITHUB_MEDIA_TYPE)
        .header(GITHUB_API_VERSION_HEADER, GITHUB_API_VERSION)
}

/// `api_url` extended by percent-encoded path segments
pub(crate) fn endpoint<S: AsRef<str>>(api_url: &Url, segments: &[S]) -> Result<Url, SyncError> {
    let mut url = api_url.clone();
    url.path_segments_mut()
        .map_err(|()| SyncError::Url(api_url.to_string()))?
        .pop_if_empty()
        .extend(segments.iter().map(AsRef::as_ref));
    Ok(url)
}

/// Map a non-success response to `SyncError::Api`
pub(crate) async fn check(response: Response) -> Result<Response, SyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SyncError::Api {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl SecretStore for GithubClient {
    async fn resolve_scope(&self, destination: &GithubSyncSpec) -> Result<SecretScope, SyncError> {
        let Some(environment) = destination.environment() else {
            return Ok(SecretScope::Repository {
                owner: destination.owner.clone(),
                repository: destination.repository.clone(),
            });
        };

        let span = info_span!(
            "github.repository.get",
            repo = %destination.repo_slug()
        );
        async move {
            let url = endpoint(
                &self.api_url,
                &["repos", destination.owner.as_str(), destination.repository.as_str()],
            )?;
            let repository: Repository = check(self.request(Method::GET, url).send().await?)
                .await?
                .json()
                .await?;
            debug!(repository.id = repository.id, "Resolved repository id");
            Ok::<_, SyncError>(SecretScope::Environment {
                repository_id: repository.id,
                environment: environment.to_string(),
            })
        }
        .instrument(span)
        .await
    }

    async fn public_key(&self, scope: &SecretScope) -> Result<PublicKeyResponse, SyncError> {
        let span = info_span!("github.public_key.get", scope = %scope.describe());
        async move {
            let url = self.secret_url(scope, "public-key")?;
            let key: PublicKeyResponse = check(self.request(Method::GET, url).send().await?)
                .await?
                .json()
                .await?;
            debug!(key.id = %key.key_id, "Fetched public key");
            Ok::<_, SyncError>(key)
        }
        .instrument(span)
        .await
    }

    async fn put_secret(
        &self,
        scope: &SecretScope,
        name: &str,
        encrypted_value: &str,
        key_id: &str,
    ) -> Result<(), SyncError> {
        let span = info_span!("github.secret.put", scope = %scope.describe(), secret = name);
        async move {
            let url = self.secret_url(scope, name)?;
            let body = PutSecretRequest {
                encrypted_value,
                key_id,
            };
            check(self.request(Method::PUT, url).json(&body).send().await?).await?;
            Ok::<_, SyncError>(())
        }
        .instrument(span)
        .await
    }

    async fn delete_secret(&self, scope: &SecretScope, name: &str) -> Result<(), SyncError> {
        let span = info_span!("github.secret.delete", scope = %scope.describe(), secret = name);
        async move {
            let url = self.secret_url(scope, name)?;
            let response = self.request(Method::DELETE, url).send().await?;
            if response.status() == StatusCode::NOT_FOUND {
                debug!("Secret already absent");
                return Ok::<_, SyncError>(());
            }
            check(response).await?;
            Ok(())
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_keeps_enterprise_prefix() {
        let base = Url::parse("https://github.example.com/api/v3/").unwrap();
        let url = endpoint(&base, &["repos", "acme", "infra"]).unwrap();
        assert_eq!(url.as_str(), "https://github.example.com/api/v3/repos/acme/infra");
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let base = Url::parse("https://api.github.com/").unwrap();
        let url = endpoint(&base, &["repositories", "1", "environments", "qa env", "secrets"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repositories/1/environments/qa%20env/secrets"
        );
    }
}
