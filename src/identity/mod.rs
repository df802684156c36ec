//! Client identities
//!
//! A [`Signer`] holds private key material that never leaves the client
//! process. Only its [`PublicIdentifier`] is sent over the wire. How a key is
//! derived (wallet signature, stored seed, randomness) is the caller's
//! business; the handshake only consumes the capability.

use base64::prelude::*;
use ed25519_dalek::{Signer as _, SigningKey, VerifyingKey, PUBLIC_KEY_LENGTH};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

/// Public identifier as transmitted: URL-safe unpadded base64 of the
/// Ed25519 verifying key
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicIdentifier(String);

impl PublicIdentifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        Self(BASE64_URL_SAFE_NO_PAD.encode(key.as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Decode into an Ed25519 verifying key, if well-formed
    pub fn to_verifying_key(&self) -> Option<VerifyingKey> {
        let bytes = BASE64_URL_SAFE_NO_PAD.decode(self.0.as_bytes()).ok()?;
        let bytes: [u8; PUBLIC_KEY_LENGTH] = bytes.try_into().ok()?;
        VerifyingKey::from_bytes(&bytes).ok()
    }
}

impl std::fmt::Display for PublicIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Debug for PublicIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shown: String = self.0.chars().take(8).collect();
        write!(f, "PublicIdentifier({}...)", shown)
    }
}

/// Private key capability used by the handshake client
pub trait Signer: Send + Sync {
    /// Sign exactly `bytes`
    fn sign(&self, bytes: &[u8]) -> Vec<u8>;

    /// Identifier the server will verify signatures against
    fn public_identifier(&self) -> PublicIdentifier;
}

/// Ed25519 signer
pub struct Ed25519Signer {
    signing_key: SigningKey,
}

impl Ed25519Signer {
    /// Fresh identity from OS randomness
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Identity from a 32-byte seed supplied by an external derivation step
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }
}

impl Signer for Ed25519Signer {
    fn sign(&self, bytes: &[u8]) -> Vec<u8> {
        self.signing_key.sign(bytes).to_bytes().to_vec()
    }

    fn public_identifier(&self) -> PublicIdentifier {
        PublicIdentifier::from_verifying_key(&self.verifying_key())
    }
}

impl std::fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("public_identifier", &self.public_identifier())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_roundtrips_to_key() {
        let signer = Ed25519Signer::generate();
        let id = signer.public_identifier();
        assert_eq!(id.to_verifying_key(), Some(signer.verifying_key()));
    }

    #[test]
    fn test_seeded_identity_is_deterministic() {
        let a = Ed25519Signer::from_seed(&[9u8; 32]);
        let b = Ed25519Signer::from_seed(&[9u8; 32]);
        assert_eq!(a.public_identifier(), b.public_identifier());
        assert_eq!(a.sign(b"hello"), b.sign(b"hello"));
    }

    #[test]
    fn test_garbage_identifier_has_no_key() {
        assert!(PublicIdentifier::new("pub123").to_verifying_key().is_none());
        assert!(PublicIdentifier::new("").to_verifying_key().is_none());
        assert!(PublicIdentifier::new("  ").is_empty());
    }

    #[test]
    fn test_debug_does_not_print_private_key() {
        let signer = Ed25519Signer::from_seed(&[1u8; 32]);
        let debug = format!("{:?}", signer);
        assert!(debug.contains("PublicIdentifier"));
        assert!(!debug.contains("signing_key"));
    }
}
