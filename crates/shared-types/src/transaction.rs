//! Signed transactions and TaPoS reference helpers.

use crate::crypto::{sha256, truncate_id, Digest, Signature};
use crate::ids::{block_num_from_id, BlockId, TransactionId};
use crate::operations::Operation;
use crate::time::TimePointSec;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

/// The TaPoS prefix carried by a transaction: bytes 4..8 of the referenced
/// block id as a little-endian u32.
pub fn tapos_prefix(id: &BlockId) -> u32 {
    u32::from_le_bytes([id[4], id[5], id[6], id[7]])
}

/// A transaction: a TaPoS reference, an expiration, ordered operations and
/// the signatures authorizing them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub ref_block_num: u16,
    pub ref_block_prefix: u32,
    pub expiration: TimePointSec,
    pub operations: Vec<Operation>,
    pub signatures: Vec<Signature>,
}

impl SignedTransaction {
    pub fn new(expiration: TimePointSec, operations: Vec<Operation>) -> Self {
        SignedTransaction {
            ref_block_num: 0,
            ref_block_prefix: 0,
            expiration,
            operations,
            signatures: Vec::new(),
        }
    }

    /// Point the transaction at a recent block for TaPoS.
    pub fn set_reference_block(&mut self, id: &BlockId) {
        self.ref_block_num = (block_num_from_id(id) & 0xFFFF) as u16;
        self.ref_block_prefix = tapos_prefix(id);
    }

    fn unsigned_bytes(&self) -> Vec<u8> {
        bincode::serialize(&(
            self.ref_block_num,
            self.ref_block_prefix,
            self.expiration,
            &self.operations,
        ))
        .expect("transaction serialization cannot fail")
    }

    /// The transaction id: truncated digest of the unsigned transaction.
    pub fn id(&self) -> TransactionId {
        truncate_id(sha256(&self.unsigned_bytes()))
    }

    /// The digest a signature must cover: chain id followed by the unsigned
    /// transaction bytes.
    pub fn sig_digest(&self, chain_id: &Digest) -> Digest {
        let mut hasher = Sha256::new();
        hasher.update(chain_id);
        hasher.update(self.unsigned_bytes());
        hasher.finalize().into()
    }

    pub fn pack_size(&self) -> usize {
        bincode::serialized_size(self).expect("transaction serialization cannot fail") as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Asset;
    use crate::crypto::{chain_id, sha256};
    use crate::ids::AccountName;

    fn sample() -> SignedTransaction {
        SignedTransaction::new(
            TimePointSec::new(1_000),
            vec![Operation::Transfer {
                from: AccountName::new("alice").unwrap(),
                to: AccountName::new("bob").unwrap(),
                amount: Asset::ember(300),
                memo: String::new(),
            }],
        )
    }

    #[test]
    fn test_id_ignores_signatures() {
        let mut trx = sample();
        let before = trx.id();
        trx.signatures.push(Signature::empty());
        assert_eq!(trx.id(), before);
    }

    #[test]
    fn test_id_covers_reference_block() {
        let mut trx = sample();
        let before = trx.id();
        let mut id: BlockId = [0u8; 20];
        id[..4].copy_from_slice(&7u32.to_be_bytes());
        id[4..8].copy_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
        trx.set_reference_block(&id);
        assert_eq!(trx.ref_block_num, 7);
        assert_eq!(trx.ref_block_prefix, 0xDEAD_BEEF);
        assert_ne!(trx.id(), before);
    }

    #[test]
    fn test_sig_digest_binds_chain_id() {
        let trx = sample();
        assert_ne!(trx.sig_digest(&chain_id()), trx.sig_digest(&sha256(b"testnet")));
    }
}
