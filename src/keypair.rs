//! Local generation of the temporary SSH credential injected into new
//! instances.

use std::fmt;

use rand_core::OsRng;
use ssh_key::{Algorithm, LineEnding, PrivateKey};
use thiserror::Error;

/// Errors raised while generating or encoding a key pair.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum KeyPairError {
    /// Raised when the underlying key generation fails.
    #[error("ssh key generation failed: {0}")]
    Generate(String),
    /// Raised when a generated key cannot be encoded in OpenSSH format.
    #[error("ssh key encoding failed: {0}")]
    Encode(String),
}

/// An Ed25519 key pair in OpenSSH encoding.
///
/// The pair exists only for the lifetime of one build: the public half is
/// injected into the launched instance and the private half is handed to the
/// caller for provisioning access. Neither half is persisted by this crate.
#[derive(Clone)]
pub struct SshKeyPair {
    /// Public key in `authorized_keys` format.
    pub public_key: String,
    /// Private key in OpenSSH PEM format.
    pub private_key: String,
}

impl SshKeyPair {
    /// Generates a fresh Ed25519 key pair.
    ///
    /// # Errors
    ///
    /// Returns [`KeyPairError`] when generation or OpenSSH encoding fails.
    pub fn generate() -> Result<Self, KeyPairError> {
        let private = PrivateKey::random(&mut OsRng, Algorithm::Ed25519)
            .map_err(|err| KeyPairError::Generate(err.to_string()))?;
        let encoded_private = private
            .to_openssh(LineEnding::LF)
            .map_err(|err| KeyPairError::Encode(err.to_string()))?;
        let public_key = private
            .public_key()
            .to_openssh()
            .map_err(|err| KeyPairError::Encode(err.to_string()))?;
        Ok(Self {
            public_key,
            private_key: encoded_private.as_str().to_owned(),
        })
    }
}

// The private half must not leak through debug logging.
impl fmt::Debug for SshKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshKeyPair")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_produces_openssh_encoded_pair() {
        let pair = SshKeyPair::generate().unwrap_or_else(|err| panic!("generate: {err}"));
        assert!(
            pair.public_key.starts_with("ssh-ed25519 "),
            "unexpected public key: {}",
            pair.public_key
        );
        assert!(
            pair.private_key.contains("OPENSSH PRIVATE KEY"),
            "private key is not OpenSSH encoded"
        );
    }

    #[test]
    fn generate_produces_distinct_pairs() {
        let first = SshKeyPair::generate().unwrap_or_else(|err| panic!("generate: {err}"));
        let second = SshKeyPair::generate().unwrap_or_else(|err| panic!("generate: {err}"));
        assert_ne!(first.public_key, second.public_key);
    }

    #[test]
    fn debug_redacts_private_key() {
        let pair = SshKeyPair::generate().unwrap_or_else(|err| panic!("generate: {err}"));
        let rendered = format!("{pair:?}");
        assert!(rendered.contains("<redacted>"), "rendered: {rendered}");
        assert!(
            !rendered.contains("OPENSSH PRIVATE KEY"),
            "private key leaked into debug output"
        );
    }
}
