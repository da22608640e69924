//! # Platform Version
//!
//! The API server reports its minor version as a free-form string; managed
//! distributions decorate it (`"25+"`, `"+25"`). Only the digits matter.

use crate::constants::MANUAL_TOKEN_SECRET_MINOR_VERSION;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("platform minor version {0:?} contains no digits")]
    NoDigits(String),
    #[error("platform minor version {0:?} is out of range")]
    OutOfRange(String),
}

/// Minor version of the connected Kubernetes API server
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PlatformVersion {
    pub minor: u32,
}

impl PlatformVersion {
    /// Strip every non-digit and parse what remains
    pub fn parse(minor: &str) -> Result<Self, VersionError> {
        let digits: String = minor.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return Err(VersionError::NoDigits(minor.to_string()));
        }
        digits
            .parse::<u32>()
            .map(|minor| Self { minor })
            .map_err(|_| VersionError::OutOfRange(minor.to_string()))
    }

    /// From 1.24 on, token Secrets are no longer issued automatically
    #[must_use]
    pub fn requires_manual_token_secret(&self) -> bool {
        self.minor >= MANUAL_TOKEN_SECRET_MINOR_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decorated_minor_versions() {
        for raw in ["25", "25+", "+25"] {
            assert_eq!(PlatformVersion::parse(raw), Ok(PlatformVersion { minor: 25 }), "{raw}");
        }
    }

    #[test]
    fn test_token_secret_gate() {
        assert!(PlatformVersion { minor: 25 }.requires_manual_token_secret());
        assert!(PlatformVersion { minor: 24 }.requires_manual_token_secret());
        assert!(!PlatformVersion { minor: 23 }.requires_manual_token_secret());
    }

    #[test]
    fn test_unparsable_versions() {
        assert_eq!(
            PlatformVersion::parse("+"),
            Err(VersionError::NoDigits("+".to_string()))
        );
        assert!(matches!(
            PlatformVersion::parse("99999999999999"),
            Err(VersionError::OutOfRange(_))
        ));
    }
}
