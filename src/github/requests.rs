//! # Request Types
//!
//! GitHub REST v3 request bodies.

use serde::Serialize;

/// Body of a create-or-update for a repository or environment secret
///
/// API Reference: https://docs.github.com/en/rest/actions/secrets#create-or-update-a-repository-secret
#[derive(Debug, Serialize)]
pub struct PutSecretRequest<'a> {
    /// Sealed-box ciphertext, base64 encoded
    pub encrypted_value: &'a str,
    /// Id of the public key the value was sealed against
    pub key_id: &'a str,
}

/// JWT claims identifying a GitHub App
///
/// API Reference: https://docs.github.com/en/apps/creating-github-apps/authenticating-with-a-github-app/generating-a-json-web-token-jwt-for-a-github-app
#[derive(Debug, Serialize)]
pub struct AppClaims {
    /// Issued at, backdated to tolerate clock drift
    pub iat: i64,
    /// Expiry, at most ten minutes after `iat`
    pub exp: i64,
    /// App id
    pub iss: String,
}
