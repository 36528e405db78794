//! Signed blocks, header extensions and the transaction merkle root.

use crate::crypto::{make_block_id, merkle_pair, sha256, Digest, Signature};
use crate::ids::{block_num_from_id, AccountName, BlockId, TransactionId};
use crate::time::TimePointSec;
use crate::transaction::SignedTransaction;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;

/// A protocol version as reported by witnesses in block headers.
#[derive(
    Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ProtocolVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u16,
}

impl ProtocolVersion {
    pub const fn new(major: u8, minor: u8, patch: u16) -> Self {
        ProtocolVersion { major, minor, patch }
    }

    /// Hardfork comparisons ignore the patch component.
    pub fn hardfork(self) -> ProtocolVersion {
        ProtocolVersion { patch: 0, ..self }
    }
}

impl fmt::Debug for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// A witness's vote for the next hardfork it will accept.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardforkVersionVote {
    pub hf_version: ProtocolVersion,
    pub hf_time: TimePointSec,
}

/// Variant header extension: nothing, the producer's running version, or a
/// hardfork vote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockHeaderExtension {
    Void,
    Version(ProtocolVersion),
    HardforkVote(HardforkVersionVote),
}

/// The unsigned block header fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub previous: BlockId,
    pub timestamp: TimePointSec,
    pub witness: AccountName,
    pub transaction_merkle_root: TransactionId,
    pub extensions: Vec<BlockHeaderExtension>,
}

/// A produced block: header, producer signature and transactions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedBlock {
    pub header: BlockHeader,
    pub witness_signature: Signature,
    pub transactions: Vec<SignedTransaction>,
}

impl SignedBlock {
    /// The block number, recovered from the parent link.
    pub fn block_num(&self) -> u32 {
        block_num_from_id(&self.header.previous) + 1
    }

    /// The digest the producer signs: the unsigned header bytes.
    pub fn sig_digest(&self) -> Digest {
        let bytes =
            bincode::serialize(&self.header).expect("header serialization cannot fail");
        sha256(&bytes)
    }

    /// The block id: truncated digest of the signed header with the block
    /// number spliced into the leading bytes.
    pub fn id(&self) -> BlockId {
        let mut hasher = Sha256::new();
        hasher.update(
            bincode::serialize(&self.header).expect("header serialization cannot fail"),
        );
        hasher.update(self.witness_signature.0);
        make_block_id(hasher.finalize().into(), self.block_num())
    }

    /// Pairwise merkle root over transaction ids; an odd node is promoted
    /// unchanged; the empty block has the zero root.
    pub fn calculate_merkle_root(&self) -> TransactionId {
        if self.transactions.is_empty() {
            return [0u8; 20];
        }

        let mut layer: Vec<TransactionId> =
            self.transactions.iter().map(|t| t.id()).collect();
        while layer.len() > 1 {
            let mut next = Vec::with_capacity((layer.len() + 1) / 2);
            for pair in layer.chunks(2) {
                match pair {
                    [left, right] => next.push(merkle_pair(left, right)),
                    [odd] => next.push(*odd),
                    _ => unreachable!(),
                }
            }
            layer = next;
        }
        layer[0]
    }

    pub fn pack_size(&self) -> usize {
        bincode::serialized_size(self).expect("block serialization cannot fail") as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Asset;
    use crate::operations::Operation;

    fn make_block(previous_num: u32, tx_count: usize) -> SignedBlock {
        let mut previous: BlockId = [0u8; 20];
        previous[..4].copy_from_slice(&previous_num.to_be_bytes());
        let transactions = (0..tx_count)
            .map(|i| {
                SignedTransaction::new(
                    TimePointSec::new(100 + i as u32),
                    vec![Operation::Transfer {
                        from: AccountName::new("alice").unwrap(),
                        to: AccountName::new("bob").unwrap(),
                        amount: Asset::ember(1 + i as i64),
                        memo: String::new(),
                    }],
                )
            })
            .collect();
        let mut block = SignedBlock {
            header: BlockHeader {
                previous,
                timestamp: TimePointSec::new(3),
                witness: AccountName::new("genesis").unwrap(),
                transaction_merkle_root: [0u8; 20],
                extensions: Vec::new(),
            },
            witness_signature: Signature::empty(),
            transactions,
        };
        block.header.transaction_merkle_root = block.calculate_merkle_root();
        block
    }

    #[test]
    fn test_block_num_from_previous() {
        assert_eq!(make_block(0, 0).block_num(), 1);
        assert_eq!(make_block(41, 0).block_num(), 42);
    }

    #[test]
    fn test_id_embeds_block_num() {
        let block = make_block(9, 1);
        assert_eq!(block_num_from_id(&block.id()), 10);
    }

    #[test]
    fn test_empty_merkle_root_is_zero() {
        assert_eq!(make_block(0, 0).calculate_merkle_root(), [0u8; 20]);
    }

    #[test]
    fn test_merkle_root_changes_with_contents() {
        let two = make_block(0, 2);
        let three = make_block(0, 3);
        assert_ne!(two.calculate_merkle_root(), three.calculate_merkle_root());
        // Odd node is promoted, so a single tx root is the tx id itself.
        let one = make_block(0, 1);
        assert_eq!(one.calculate_merkle_root(), one.transactions[0].id());
    }
}
