// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! In-memory tree of reversible blocks. Tracks the heaviest tip (height
//! decides; first seen wins ties) and answers the branch queries the
//! controller needs to switch forks. Entries below the irreversibility
//! horizon are pruned as it advances.

use crate::blocks::{BlockId, SignedBlock};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("block {0} does not link to any known block")]
    Unlinkable(BlockId),
    #[error("block {0} is already present")]
    Duplicate(BlockId),
    #[error("block {0} is below the irreversibility horizon")]
    TooOld(BlockId),
    #[error("blocks {0} and {1} do not share an ancestor in the fork database")]
    NoCommonAncestor(BlockId, BlockId),
}

#[derive(Debug)]
pub struct ForkItem {
    pub block: Arc<SignedBlock>,
    pub id: BlockId,
    pub num: u32,
}

impl ForkItem {
    pub fn previous_id(&self) -> BlockId {
        self.block.header.previous
    }
}

#[derive(Default)]
pub struct ForkDatabase {
    by_id: HashMap<BlockId, Arc<ForkItem>>,
    by_num: BTreeMap<(u32, BlockId), ()>,
    head: Option<Arc<ForkItem>>,
    /// Lowest height still retained.
    floor: u32,
}

impl ForkDatabase {
    /// Seed with the current irreversible tip so arriving blocks can link.
    pub fn start_block(&mut self, block: SignedBlock) -> Arc<ForkItem> {
        let id = block.id().expect("start block must encode");
        let item = Arc::new(ForkItem {
            num: block.block_num(),
            block: Arc::new(block),
            id,
        });
        self.reset();
        self.floor = item.num;
        self.by_id.insert(id, item.clone());
        self.by_num.insert((item.num, id), ());
        self.head = Some(item.clone());
        item
    }

    pub fn reset(&mut self) {
        self.by_id.clear();
        self.by_num.clear();
        self.head = None;
        self.floor = 0;
    }

    pub fn head(&self) -> Option<&Arc<ForkItem>> {
        self.head.as_ref()
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn fetch_block(&self, id: &BlockId) -> Option<&Arc<ForkItem>> {
        self.by_id.get(id)
    }

    pub fn blocks_at_number(&self, num: u32) -> Vec<Arc<ForkItem>> {
        self.by_num
            .range((num, BlockId::default())..(num + 1, BlockId::default()))
            .filter_map(|((_, id), _)| self.by_id.get(id).cloned())
            .collect()
    }

    /// Insert a block that links to a known parent; returns the new item
    /// and promotes it to head when strictly higher.
    pub fn push_block(&mut self, block: SignedBlock) -> Result<Arc<ForkItem>, Error> {
        let id = block.id().map_err(|_| Error::Unlinkable(BlockId::default()))?;
        if self.by_id.contains_key(&id) {
            return Err(Error::Duplicate(id));
        }
        let num = block.block_num();
        if num <= self.floor {
            return Err(Error::TooOld(id));
        }
        if !self.by_id.is_empty() && !self.by_id.contains_key(&block.header.previous) {
            return Err(Error::Unlinkable(id));
        }
        let item = Arc::new(ForkItem {
            block: Arc::new(block),
            id,
            num,
        });
        self.by_id.insert(id, item.clone());
        self.by_num.insert((num, id), ());
        let higher = self.head.as_ref().map(|h| num > h.num).unwrap_or(true);
        if higher {
            self.head = Some(item.clone());
        }
        Ok(item)
    }

    /// Point the head at a known block; used when the controller pops or
    /// reverts.
    pub fn set_head(&mut self, id: &BlockId) {
        self.head = self.by_id.get(id).cloned();
    }

    /// Remove a block that failed to apply, so it cannot become head
    /// again.
    pub fn remove(&mut self, id: &BlockId) {
        if let Some(item) = self.by_id.remove(id) {
            self.by_num.remove(&(item.num, item.id));
            if self.head.as_ref().map(|h| h.id == *id).unwrap_or(false) {
                // Fall back to the best remaining tip.
                self.head = self
                    .by_num
                    .iter()
                    .next_back()
                    .and_then(|((_, id), _)| self.by_id.get(id).cloned());
            }
        }
    }

    /// Walk back to the main-branch block the controller knows as head.
    /// Returns the two disjoint branches `(to_a, to_b)` from the common
    /// ancestor (exclusive) to `a` and `b`, newest first.
    pub fn fetch_branch_from(
        &self,
        a: BlockId,
        b: BlockId,
    ) -> Result<(Vec<Arc<ForkItem>>, Vec<Arc<ForkItem>>), Error> {
        let mut first = self
            .by_id
            .get(&a)
            .cloned()
            .ok_or(Error::NoCommonAncestor(a, b))?;
        let mut second = self
            .by_id
            .get(&b)
            .cloned()
            .ok_or(Error::NoCommonAncestor(a, b))?;
        let mut branch_a = Vec::new();
        let mut branch_b = Vec::new();
        while first.num > second.num {
            branch_a.push(first.clone());
            first = self
                .by_id
                .get(&first.previous_id())
                .cloned()
                .ok_or(Error::NoCommonAncestor(a, b))?;
        }
        while second.num > first.num {
            branch_b.push(second.clone());
            second = self
                .by_id
                .get(&second.previous_id())
                .cloned()
                .ok_or(Error::NoCommonAncestor(a, b))?;
        }
        while first.id != second.id {
            branch_a.push(first.clone());
            branch_b.push(second.clone());
            first = self
                .by_id
                .get(&first.previous_id())
                .cloned()
                .ok_or(Error::NoCommonAncestor(a, b))?;
            second = self
                .by_id
                .get(&second.previous_id())
                .cloned()
                .ok_or(Error::NoCommonAncestor(a, b))?;
        }
        Ok((branch_a, branch_b))
    }

    /// Drop everything below `num`; the retained size bound is
    /// `head − last_irreversible + 1`.
    pub fn set_floor(&mut self, num: u32) {
        self.floor = num;
        let stale: Vec<BlockId> = self
            .by_num
            .range(..(num, BlockId::default()))
            .map(|((_, id), _)| *id)
            .collect();
        for id in stale {
            if let Some(item) = self.by_id.remove(&id) {
                self.by_num.remove(&(item.num, item.id));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::BlockHeader;
    use crate::crypto::{sha256, SecretKey};
    use crate::types::{AccountName, Timestamp};

    fn make_block(previous: BlockId, salt: u32) -> SignedBlock {
        let header = BlockHeader {
            previous,
            timestamp: Timestamp(salt),
            witness: AccountName::from("initwitness"),
            transaction_merkle_root: Default::default(),
            extensions: Vec::new(),
        };
        let key = SecretKey::from_seed("w");
        let sig = SignedBlock::sign(header.clone(), &key, &sha256(b"t")).unwrap();
        SignedBlock {
            header,
            witness_signature: sig,
            transactions: Vec::new(),
        }
    }

    fn genesis_like() -> SignedBlock {
        make_block(BlockId::default(), 1)
    }

    #[test]
    fn head_follows_height() {
        let mut db = ForkDatabase::default();
        let root = db.start_block(genesis_like());
        let b2 = db.push_block(make_block(root.id, 2)).unwrap();
        assert_eq!(db.head().unwrap().id, b2.id);
        // Sibling at the same height does not displace the head.
        let b2b = db.push_block(make_block(root.id, 22)).unwrap();
        assert_eq!(db.head().unwrap().id, b2.id);
        // But extending the sibling does.
        let b3 = db.push_block(make_block(b2b.id, 3)).unwrap();
        assert_eq!(db.head().unwrap().id, b3.id);
    }

    #[test]
    fn unlinkable_rejected() {
        let mut db = ForkDatabase::default();
        db.start_block(genesis_like());
        let stray = make_block(BlockId([9u8; 20]), 5);
        assert!(matches!(db.push_block(stray), Err(Error::Unlinkable(_))));
    }

    #[test]
    fn branches_from_common_ancestor() {
        let mut db = ForkDatabase::default();
        let root = db.start_block(genesis_like());
        let a1 = db.push_block(make_block(root.id, 10)).unwrap();
        let a2 = db.push_block(make_block(a1.id, 11)).unwrap();
        let b1 = db.push_block(make_block(root.id, 20)).unwrap();
        let b2 = db.push_block(make_block(b1.id, 21)).unwrap();
        let b3 = db.push_block(make_block(b2.id, 22)).unwrap();

        let (to_a, to_b) = db.fetch_branch_from(a2.id, b3.id).unwrap();
        assert_eq!(
            to_a.iter().map(|i| i.id).collect::<Vec<_>>(),
            vec![a2.id, a1.id]
        );
        assert_eq!(
            to_b.iter().map(|i| i.id).collect::<Vec<_>>(),
            vec![b3.id, b2.id, b1.id]
        );
    }

    #[test]
    fn pruning_respects_floor() {
        let mut db = ForkDatabase::default();
        let root = db.start_block(genesis_like());
        let mut prev = root.clone();
        let mut items = vec![root];
        for salt in 2..=6 {
            prev = db.push_block(make_block(prev.id, salt)).unwrap();
            items.push(prev.clone());
        }
        db.set_floor(4);
        assert!(!db.contains(&items[0].id));
        assert!(!db.contains(&items[2].id));
        assert!(db.contains(&items[3].id));
        assert!(db.contains(&items[5].id));
    }

    #[test]
    fn remove_head_falls_back() {
        let mut db = ForkDatabase::default();
        let root = db.start_block(genesis_like());
        let b2 = db.push_block(make_block(root.id, 2)).unwrap();
        let b3 = db.push_block(make_block(b2.id, 3)).unwrap();
        db.remove(&b3.id);
        assert_eq!(db.head().unwrap().id, b2.id);
    }
}
