use shared_types::{BlockId, SignedBlock};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ForkDbError {
    #[error("unlinkable block: parent not in fork database")]
    UnlinkableBlock,

    #[error("block is older than the pruning horizon")]
    TooOld,

    #[error("pop on an empty chain")]
    PopEmptyChain,

    #[error("block not found in fork database")]
    NotFound,

    #[error("branches do not share an ancestor")]
    NoCommonAncestor,
}

/// A block held by the fork database, with its resolved height and arrival
/// order (the fork-choice tiebreak).
#[derive(Clone, Debug)]
pub struct ForkItem {
    pub id: BlockId,
    pub num: u32,
    pub previous: BlockId,
    pub data: SignedBlock,
    arrival: u64,
}

/// Tree of recent blocks. See the crate docs for the invariants.
pub struct ForkDatabase {
    index: BTreeMap<BlockId, ForkItem>,
    by_num: BTreeMap<u32, Vec<BlockId>>,
    head: Option<BlockId>,
    max_size: u32,
    arrivals: u64,
}

impl Default for ForkDatabase {
    fn default() -> Self {
        ForkDatabase {
            index: BTreeMap::new(),
            by_num: BTreeMap::new(),
            head: None,
            max_size: 1024,
            arrivals: 0,
        }
    }
}

impl ForkDatabase {
    pub fn new() -> Self {
        ForkDatabase::default()
    }

    /// Drop everything.
    pub fn reset(&mut self) {
        self.index.clear();
        self.by_num.clear();
        self.head = None;
    }

    /// Seed the tree with the current head block, e.g. after reopening.
    pub fn start_block(&mut self, block: SignedBlock) -> ForkItem {
        self.reset();
        self.insert(block).expect("seeding an empty fork database cannot fail")
    }

    fn insert(&mut self, block: SignedBlock) -> Result<ForkItem, ForkDbError> {
        let item = ForkItem {
            id: block.id(),
            num: block.block_num(),
            previous: block.header.previous,
            data: block,
            arrival: self.arrivals,
        };
        self.arrivals += 1;

        if let Some(head) = self.head_item() {
            let horizon = head.num.saturating_sub(self.max_size);
            if item.num <= horizon && horizon > 0 {
                return Err(ForkDbError::TooOld);
            }
            if !self.index.contains_key(&item.previous) {
                return Err(ForkDbError::UnlinkableBlock);
            }
        }

        self.by_num.entry(item.num).or_default().push(item.id);
        self.index.insert(item.id, item.clone());

        let new_head = match self.head_item() {
            Some(head) if item.num > head.num => true,
            None => true,
            _ => false,
        };
        if new_head {
            self.head = Some(item.id);
        }
        self.prune();
        Ok(item)
    }

    /// Insert a block and return the current longest-chain head.
    pub fn push_block(&mut self, block: SignedBlock) -> Result<ForkItem, ForkDbError> {
        self.insert(block)?;
        Ok(self.head_item().expect("head exists after insert").clone())
    }

    fn prune(&mut self) {
        let Some(head) = self.head_item() else { return };
        let horizon = head.num.saturating_sub(self.max_size);
        let stale: Vec<u32> = self.by_num.range(..=horizon).map(|(n, _)| *n).collect();
        for num in stale {
            if let Some(ids) = self.by_num.remove(&num) {
                for id in ids {
                    self.index.remove(&id);
                }
            }
        }
    }

    pub fn set_max_size(&mut self, max_size: u32) {
        self.max_size = max_size.max(1);
        self.prune();
    }

    fn head_item(&self) -> Option<&ForkItem> {
        self.head.as_ref().and_then(|id| self.index.get(id))
    }

    pub fn head(&self) -> Option<ForkItem> {
        self.head_item().cloned()
    }

    /// Move the head designation to an arbitrary stored block.
    pub fn set_head(&mut self, id: &BlockId) -> Result<(), ForkDbError> {
        if !self.index.contains_key(id) {
            return Err(ForkDbError::NotFound);
        }
        self.head = Some(*id);
        Ok(())
    }

    /// Retire the head to its parent. The popped block stays in the tree so
    /// a later fork switch can still reach it.
    pub fn pop_block(&mut self) -> Result<ForkItem, ForkDbError> {
        let head = self.head_item().cloned().ok_or(ForkDbError::PopEmptyChain)?;
        let parent = self.index.get(&head.previous).cloned();
        match parent {
            Some(p) => self.head = Some(p.id),
            None => return Err(ForkDbError::PopEmptyChain),
        }
        Ok(head)
    }

    /// Remove a single block. If it was the head, the best remaining block
    /// becomes head.
    pub fn remove(&mut self, id: &BlockId) {
        if let Some(item) = self.index.remove(id) {
            if let Some(ids) = self.by_num.get_mut(&item.num) {
                ids.retain(|i| i != id);
                if ids.is_empty() {
                    self.by_num.remove(&item.num);
                }
            }
        }
        if self.head.as_ref() == Some(id) {
            self.head = self
                .index
                .values()
                .max_by_key(|i| (i.num, u64::MAX - i.arrival))
                .map(|i| i.id);
            debug!("fork database head removed, rewound to best remaining block");
        }
    }

    pub fn fetch_block(&self, id: &BlockId) -> Option<ForkItem> {
        self.index.get(id).cloned()
    }

    pub fn is_known_block(&self, id: &BlockId) -> bool {
        self.index.contains_key(id)
    }

    /// All stored blocks at a height, in arrival order. More than one means
    /// a fork produced a block-number collision.
    pub fn fetch_block_by_number(&self, num: u32) -> Vec<ForkItem> {
        self.by_num
            .get(&num)
            .map(|ids| ids.iter().filter_map(|id| self.index.get(id)).cloned().collect())
            .unwrap_or_default()
    }

    /// The block at `num` on the branch the head sits on.
    pub fn fetch_block_on_main_branch_by_number(&self, num: u32) -> Option<ForkItem> {
        let mut current = self.head_item()?;
        if num > current.num {
            return None;
        }
        while current.num > num {
            current = self.index.get(&current.previous)?;
        }
        (current.num == num).then(|| current.clone())
    }

    /// Walk `first` and `second` back to their common ancestor.
    ///
    /// Each returned vector runs tip-first and excludes the ancestor itself;
    /// the last element of either branch links directly to the ancestor.
    pub fn fetch_branch_from(
        &self,
        first: &BlockId,
        second: &BlockId,
    ) -> Result<(Vec<ForkItem>, Vec<ForkItem>), ForkDbError> {
        let mut a = self.index.get(first).ok_or(ForkDbError::NotFound)?;
        let mut b = self.index.get(second).ok_or(ForkDbError::NotFound)?;
        let mut branch_a = Vec::new();
        let mut branch_b = Vec::new();

        while a.num > b.num {
            branch_a.push(a.clone());
            a = self.index.get(&a.previous).ok_or(ForkDbError::NoCommonAncestor)?;
        }
        while b.num > a.num {
            branch_b.push(b.clone());
            b = self.index.get(&b.previous).ok_or(ForkDbError::NoCommonAncestor)?;
        }
        while a.id != b.id {
            branch_a.push(a.clone());
            branch_b.push(b.clone());
            a = self.index.get(&a.previous).ok_or(ForkDbError::NoCommonAncestor)?;
            b = self.index.get(&b.previous).ok_or(ForkDbError::NoCommonAncestor)?;
        }
        Ok((branch_a, branch_b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{AccountName, BlockHeader, Signature, TimePointSec};

    fn block_after(previous: BlockId, tag: u8) -> SignedBlock {
        SignedBlock {
            header: BlockHeader {
                previous,
                timestamp: TimePointSec::new(u32::from(tag) * 3 + 3),
                witness: AccountName::new("genesis").unwrap(),
                transaction_merkle_root: [tag; 20],
                extensions: Vec::new(),
            },
            witness_signature: Signature::empty(),
            transactions: Vec::new(),
        }
    }

    fn genesis_id() -> BlockId {
        [0u8; 20]
    }

    #[test]
    fn test_longest_chain_is_head() {
        let mut db = ForkDatabase::new();
        let b1 = block_after(genesis_id(), 1);
        let b1_id = b1.id();
        db.push_block(b1).unwrap();
        let b2 = block_after(b1_id, 2);
        let b2_id = b2.id();
        let head = db.push_block(b2).unwrap();
        assert_eq!(head.id, b2_id);
        assert_eq!(head.num, 2);
    }

    #[test]
    fn test_tie_keeps_first_arrival() {
        let mut db = ForkDatabase::new();
        let b1 = block_after(genesis_id(), 1);
        let b1_id = b1.id();
        db.push_block(b1).unwrap();

        let y = block_after(b1_id, 2);
        let y_id = y.id();
        db.push_block(y).unwrap();
        let z = block_after(b1_id, 3);
        let head = db.push_block(z).unwrap();
        // Same height: the earlier block keeps the head.
        assert_eq!(head.id, y_id);
        assert_eq!(db.fetch_block_by_number(2).len(), 2);
    }

    #[test]
    fn test_unlinkable_block_rejected() {
        let mut db = ForkDatabase::new();
        db.push_block(block_after(genesis_id(), 1)).unwrap();
        let orphan = block_after([9u8; 20], 7);
        assert_eq!(db.push_block(orphan).unwrap_err(), ForkDbError::UnlinkableBlock);
    }

    #[test]
    fn test_branch_from_finds_common_ancestor() {
        let mut db = ForkDatabase::new();
        let b1 = block_after(genesis_id(), 1);
        let b1_id = b1.id();
        db.push_block(b1).unwrap();

        // Branch A: b1 -> a2 -> a3, branch B: b1 -> c2
        let a2 = block_after(b1_id, 2);
        let a2_id = a2.id();
        db.push_block(a2).unwrap();
        let a3 = block_after(a2_id, 3);
        let a3_id = a3.id();
        db.push_block(a3).unwrap();
        let c2 = block_after(b1_id, 4);
        let c2_id = c2.id();
        db.push_block(c2).unwrap();

        let (branch_a, branch_b) = db.fetch_branch_from(&a3_id, &c2_id).unwrap();
        assert_eq!(branch_a.iter().map(|i| i.id).collect::<Vec<_>>(), vec![a3_id, a2_id]);
        assert_eq!(branch_b.iter().map(|i| i.id).collect::<Vec<_>>(), vec![c2_id]);
        assert_eq!(branch_a.last().unwrap().previous, b1_id);
        assert_eq!(branch_b.last().unwrap().previous, b1_id);
    }

    #[test]
    fn test_pop_block_rewinds_head() {
        let mut db = ForkDatabase::new();
        let b1 = block_after(genesis_id(), 1);
        let b1_id = b1.id();
        db.push_block(b1).unwrap();
        let b2 = block_after(b1_id, 2);
        db.push_block(b2).unwrap();

        let popped = db.pop_block().unwrap();
        assert_eq!(popped.num, 2);
        assert_eq!(db.head().unwrap().id, b1_id);
        // Popping past the root is fatal.
        assert_eq!(db.pop_block().unwrap_err(), ForkDbError::PopEmptyChain);
    }

    #[test]
    fn test_remove_head_falls_back() {
        let mut db = ForkDatabase::new();
        let b1 = block_after(genesis_id(), 1);
        let b1_id = b1.id();
        db.push_block(b1).unwrap();
        let b2 = block_after(b1_id, 2);
        let b2_id = b2.id();
        db.push_block(b2).unwrap();

        db.remove(&b2_id);
        assert_eq!(db.head().unwrap().id, b1_id);
        assert!(!db.is_known_block(&b2_id));
    }

    #[test]
    fn test_pruning_by_max_size() {
        let mut db = ForkDatabase::new();
        db.set_max_size(2);
        let mut prev = genesis_id();
        let mut ids = Vec::new();
        for tag in 1..=5u8 {
            let b = block_after(prev, tag);
            prev = b.id();
            ids.push(b.id());
            db.push_block(b).unwrap();
        }
        // Heights 1..=3 are beyond head(5) - max_size(2).
        assert!(!db.is_known_block(&ids[0]));
        assert!(!db.is_known_block(&ids[1]));
        assert!(!db.is_known_block(&ids[2]));
        assert!(db.is_known_block(&ids[3]));
        assert!(db.is_known_block(&ids[4]));
    }

    #[test]
    fn test_main_branch_by_number_follows_head() {
        let mut db = ForkDatabase::new();
        let b1 = block_after(genesis_id(), 1);
        let b1_id = b1.id();
        db.push_block(b1).unwrap();
        let y = block_after(b1_id, 2);
        let y_id = y.id();
        db.push_block(y).unwrap();
        let z = block_after(b1_id, 3);
        let z_id = z.id();
        db.push_block(z).unwrap();
        let z2 = block_after(z_id, 4);
        db.push_block(z2).unwrap();

        // Head switched to the z-branch; height 2 on the main branch is z.
        let on_main = db.fetch_block_on_main_branch_by_number(2).unwrap();
        assert_eq!(on_main.id, z_id);
        assert_ne!(on_main.id, y_id);
    }
}
