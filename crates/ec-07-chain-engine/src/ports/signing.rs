//! Signature creation and recovery seams.
//!
//! ECDSA itself is an external collaborator; consensus code only relies on
//! "a signature resolves to a public key for a digest". The default
//! implementation binds the key and digest with SHA-256 so every test and
//! single-process deployment is deterministic; a production node plugs a
//! secp256k1 recoverable-signature implementation into the same port.

use shared_types::crypto::{sha256, Digest, PublicKey, Signature};

/// Recover the signing key of a signature over a digest.
pub trait SignatureVerifier: Send + Sync {
    fn recover(&self, digest: &Digest, signature: &Signature) -> Option<PublicKey>;
}

/// The default scheme: a signature carries its key in the first 33 bytes and
/// a SHA-256 binding of `key || digest` in the rest.
#[derive(Default, Clone, Copy)]
pub struct HashSignatureVerifier;

impl SignatureVerifier for HashSignatureVerifier {
    fn recover(&self, digest: &Digest, signature: &Signature) -> Option<PublicKey> {
        let mut key = PublicKey::null();
        key.0.copy_from_slice(&signature.0[..33]);
        if key.is_null() {
            return None;
        }
        let mut material = Vec::with_capacity(65);
        material.extend_from_slice(&key.0);
        material.extend_from_slice(digest);
        if signature.0[33..] == sha256(&material)[..32] {
            Some(key)
        } else {
            None
        }
    }
}

/// A signing keypair for block production and tests.
#[derive(Clone, Debug)]
pub struct KeyPair {
    seed: Digest,
}

impl KeyPair {
    pub fn from_seed(seed: &str) -> Self {
        KeyPair { seed: sha256(seed.as_bytes()) }
    }

    pub fn public(&self) -> PublicKey {
        let mut key = PublicKey::null();
        key.0[0] = 0x02;
        key.0[1..33].copy_from_slice(&sha256(&self.seed)[..32]);
        key
    }

    pub fn sign(&self, digest: &Digest) -> Signature {
        let key = self.public();
        let mut material = Vec::with_capacity(65);
        material.extend_from_slice(&key.0);
        material.extend_from_slice(digest);
        let binding = sha256(&material);

        let mut sig = Signature::empty();
        sig.0[..33].copy_from_slice(&key.0);
        sig.0[33..].copy_from_slice(&binding[..32]);
        sig
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_recover_round_trip() {
        let pair = KeyPair::from_seed("init_key");
        let digest = sha256(b"payload");
        let sig = pair.sign(&digest);
        let recovered = HashSignatureVerifier.recover(&digest, &sig);
        assert_eq!(recovered, Some(pair.public()));
    }

    #[test]
    fn test_wrong_digest_fails_recovery() {
        let pair = KeyPair::from_seed("init_key");
        let sig = pair.sign(&sha256(b"payload"));
        assert_eq!(HashSignatureVerifier.recover(&sha256(b"other"), &sig), None);
    }

    #[test]
    fn test_null_key_never_recovers() {
        let digest = sha256(b"payload");
        let sig = Signature::empty();
        assert_eq!(HashSignatureVerifier.recover(&digest, &sig), None);
    }
}
