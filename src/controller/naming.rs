//! # Naming
//!
//! Deterministic names for derived RBAC bindings.
//!
//! A binding name is `klum-<user>-<role label>-<digest>` where the digest is
//! the first 8 hex characters of MD5 over `user/namespace/clusterRole/role`.
//! The digest keeps bindings apart that share a role name but differ in
//! scope. Long names are cut to fit the 63 character object name limit and
//! suffixed with a SHA-256 fragment of the full name so truncation cannot
//! merge two bindings.

use crate::constants::{MAX_NAME_LENGTH, NAME_PREFIX};
use sha2::{Digest, Sha256};

/// Name of the binding granting `role` (or `cluster_role`) to `user`,
/// optionally scoped to `namespace`
#[must_use]
pub fn derive_name(user: &str, namespace: &str, cluster_role: &str, role: &str) -> String {
    let digest = format!(
        "{:x}",
        md5::compute(format!("{user}/{namespace}/{cluster_role}/{role}"))
    );
    let label = if role.is_empty() { cluster_role } else { role };

    safe_concat_name(&[NAME_PREFIX, user, label, &digest[..8]])
}

/// Join parts with `-` and bound the result to a valid object name
#[must_use]
pub fn safe_concat_name(parts: &[&str]) -> String {
    let full = parts
        .iter()
        .map(|p| sanitize(p))
        .collect::<Vec<_>>()
        .join("-");

    if full.len() <= MAX_NAME_LENGTH {
        return trim_edges(&full).to_string();
    }

    let hash = format!("{:x}", Sha256::digest(full.as_bytes()));
    let bytes = full.as_bytes();
    // sanitize() leaves only ASCII, so byte offsets are char boundaries
    let truncated = if bytes[56].is_ascii_lowercase() || bytes[56].is_ascii_digit() {
        format!("{}-{}", &full[..57], &hash[..5])
    } else {
        format!("{}-{}", &full[..56], &hash[..6])
    };

    trim_edges(&truncated).to_string()
}

/// Label-safe form of a user name for the `klum.cattle.io/user` label
#[must_use]
pub fn label_value(user: &str) -> String {
    safe_concat_name(&[user])
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

fn trim_edges(name: &str) -> &str {
    name.trim_matches(|c| c == '-' || c == '.')
}
