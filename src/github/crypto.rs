//! # Sealed Boxes
//!
//! GitHub only accepts secret values sealed against the destination's
//! Curve25519 public key (libsodium `crypto_box_seal`): an ephemeral key pair
//! per message, X25519 + XSalsa20-Poly1305, no sender identity.

use super::SyncError;
use base64::{engine::general_purpose, Engine as _};
use crypto_box::{aead::OsRng, PublicKey, KEY_SIZE};

/// Seal `plaintext` against a base64 public key and return base64 ciphertext
pub fn seal(public_key_b64: &str, plaintext: &[u8]) -> Result<String, SyncError> {
    let decoded = general_purpose::STANDARD
        .decode(public_key_b64.trim())
        .map_err(|e| SyncError::InvalidPublicKey(e.to_string()))?;

    let bytes: [u8; KEY_SIZE] = decoded
        .get(..KEY_SIZE)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| {
            SyncError::InvalidPublicKey(format!(
                "not a full length key: {} bytes, need {KEY_SIZE}",
                decoded.len()
            ))
        })?;

    let sealed = PublicKey::from(bytes)
        .seal(&mut OsRng, plaintext)
        .map_err(|e| SyncError::Encryption(e.to_string()))?;

    Ok(general_purpose::STANDARD.encode(sealed))
}
