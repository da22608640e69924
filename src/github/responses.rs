//! # Response Types
//!
//! Subsets of GitHub REST v3 responses; unknown fields are ignored.

use serde::Deserialize;
use zeroize::Zeroizing;

/// `GET /repos/{owner}/{repo}`
#[derive(Debug, Deserialize)]
pub struct Repository {
    pub id: u64,
}

/// `GET .../secrets/public-key`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PublicKeyResponse {
    pub key_id: String,
    /// Base64 Curve25519 public key
    pub key: String,
}

/// `GET /repos/{owner}/{repo}/installation`
#[derive(Debug, Deserialize)]
pub struct Installation {
    pub id: u64,
}

/// `POST /app/installations/{id}/access_tokens`
#[derive(Deserialize)]
pub struct InstallationToken {
    pub token: Zeroizing<String>,
}

impl std::fmt::Debug for InstallationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallationToken")
            .field("token", &"***")
            .finish()
    }
}
