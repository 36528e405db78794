//! Digests, keys and signatures.
//!
//! The chain treats ECDSA itself as an external collaborator; this module
//! only fixes the byte widths and the digest algorithm (SHA-256) that enter
//! consensus. Signature verification goes through the engine's verifier
//! port.

use crate::ids::{BlockId, TransactionId};
use serde::de::{Error as DeError, SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256};
use std::fmt;

/// A SHA-256 digest.
pub type Digest = [u8; 32];

/// Seed hashed into the chain id. The chain id enters every signature
/// digest, so signatures are not replayable across networks.
const CHAIN_ID_SEED: &[u8] = b"emberchain";

/// SHA-256 of the fixed network seed.
pub fn chain_id() -> Digest {
    sha256(CHAIN_ID_SEED)
}

pub fn sha256(bytes: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Truncate a digest to the 20-byte id width.
pub fn truncate_id(digest: Digest) -> [u8; 20] {
    let mut id = [0u8; 20];
    id.copy_from_slice(&digest[..20]);
    id
}

/// Combine two 20-byte ids into a merkle parent node.
pub fn merkle_pair(left: &TransactionId, right: &TransactionId) -> TransactionId {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    truncate_id(hasher.finalize().into())
}

/// A 33-byte compressed public key. The all-zero key is the null key a
/// witness is shut down with.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey(pub [u8; 33]);

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut tup = serializer.serialize_tuple(33)?;
        for byte in &self.0 {
            tup.serialize_element(byte)?;
        }
        tup.end()
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PublicKeyVisitor;

        impl<'de> Visitor<'de> for PublicKeyVisitor {
            type Value = PublicKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "33 bytes")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut bytes = [0u8; 33];
                for (i, slot) in bytes.iter_mut().enumerate() {
                    *slot = seq
                        .next_element()?
                        .ok_or_else(|| DeError::invalid_length(i, &self))?;
                }
                Ok(PublicKey(bytes))
            }
        }

        deserializer.deserialize_tuple(33, PublicKeyVisitor)
    }
}

impl PublicKey {
    pub fn null() -> Self {
        PublicKey([0u8; 33])
    }

    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 33]
    }
}

impl Default for PublicKey {
    fn default() -> Self {
        PublicKey::null()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(&self.0[..8]))
    }
}

/// A 65-byte recoverable signature, opaque to consensus code.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Signature(pub [u8; 65]);

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut tup = serializer.serialize_tuple(65)?;
        for byte in &self.0 {
            tup.serialize_element(byte)?;
        }
        tup.end()
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SignatureVisitor;

        impl<'de> Visitor<'de> for SignatureVisitor {
            type Value = Signature;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "65 bytes")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut bytes = [0u8; 65];
                for (i, slot) in bytes.iter_mut().enumerate() {
                    *slot = seq
                        .next_element()?
                        .ok_or_else(|| DeError::invalid_length(i, &self))?;
                }
                Ok(Signature(bytes))
            }
        }

        deserializer.deserialize_tuple(65, SignatureVisitor)
    }
}

impl Signature {
    pub fn empty() -> Self {
        Signature([0u8; 65])
    }

    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; 65]
    }
}

impl Default for Signature {
    fn default() -> Self {
        Signature::empty()
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(&self.0[..8]))
    }
}

/// Compute a 20-byte block id from the header digest and the block number.
/// The number overwrites the first four bytes, big-endian.
pub fn make_block_id(header_digest: Digest, block_num: u32) -> BlockId {
    let mut id = truncate_id(header_digest);
    id[..4].copy_from_slice(&block_num.to_be_bytes());
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::block_num_from_id;

    #[test]
    fn test_chain_id_is_stable() {
        assert_eq!(chain_id(), chain_id());
        assert_ne!(chain_id(), sha256(b"other-network"));
    }

    #[test]
    fn test_block_id_embeds_number() {
        let id = make_block_id(sha256(b"header"), 123_456);
        assert_eq!(block_num_from_id(&id), 123_456);
    }

    #[test]
    fn test_null_key() {
        assert!(PublicKey::null().is_null());
        let mut k = PublicKey::null();
        k.0[1] = 7;
        assert!(!k.is_null());
    }
}
