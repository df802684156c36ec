//! Challenge signature verification
//!
//! Pure and stateless: safe to call concurrently for unrelated handshakes.

use ed25519_dalek::{Signature, SIGNATURE_LENGTH};

use crate::identity::PublicIdentifier;

/// Checks that a signature authenticates a challenge for an identifier
pub trait Verifier: Send + Sync {
    fn verify(&self, public_identifier: &PublicIdentifier, challenge: &[u8], signature: &[u8])
        -> bool;
}

/// Ed25519 verifier over the raw challenge bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl Verifier for Ed25519Verifier {
    fn verify(
        &self,
        public_identifier: &PublicIdentifier,
        challenge: &[u8],
        signature: &[u8],
    ) -> bool {
        verify(public_identifier, challenge, signature)
    }
}

/// Verify `signature` over exactly `challenge` for `public_identifier`.
///
/// Malformed identifiers and signatures of the wrong length are `false`.
pub fn verify(public_identifier: &PublicIdentifier, challenge: &[u8], signature: &[u8]) -> bool {
    let Some(key) = public_identifier.to_verifying_key() else {
        return false;
    };
    let Ok(sig) = <[u8; SIGNATURE_LENGTH]>::try_from(signature) else {
        return false;
    };
    key.verify_strict(challenge, &Signature::from_bytes(&sig))
        .is_ok()
}
