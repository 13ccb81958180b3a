// Path: crates/chain/src/fork.rs

//! The fork DAG: per-block-id metadata with linkage and validity propagation.
//!
//! Every block ever seen gets a fork node. A node is *linked* when its
//! ancestry reaches the genesis sentinel (the all-zero id), *valid* once it
//! has been applied successfully (or `Some(false)` after any failure), and
//! *included* while it sits on the canonical chain. Linkage and invalidity
//! propagate forward through `next_blocks` until fixpoint.

use crate::state::ChainStore;
use meridian_types::block::FullBlock;
use meridian_types::crypto::BlockId;
use meridian_types::error::{ChainError, StoreError};
use parity_scale_codec::{Decode, Encode};
use std::collections::BTreeSet;

/// The genesis sentinel: the `previous` id of the first block.
pub const GENESIS_SENTINEL: BlockId = meridian_types::crypto::Digest160([0u8; 20]);

/// Per-block-id fork metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct BlockForkData {
    /// Ids of all blocks that build on this one.
    pub next_blocks: BTreeSet<BlockId>,
    /// Whether this block's ancestry reaches the genesis sentinel.
    pub is_linked: bool,
    /// Tri-state validity: unknown until the block is applied or rejected.
    pub is_valid: Option<bool>,
    /// Whether this block currently sits on the canonical chain.
    pub is_included: bool,
}

impl BlockForkData {
    /// Whether the block has been determined invalid.
    pub fn invalid(&self) -> bool {
        self.is_valid == Some(false)
    }

    /// Whether the block has been determined valid.
    pub fn valid(&self) -> bool {
        self.is_valid == Some(true)
    }

    /// Whether the block is eligible to extend a chain.
    pub fn can_link(&self) -> bool {
        self.is_linked && !self.invalid()
    }
}

/// Places a block in the fork tree and resolves its linkage.
///
/// The block is persisted under its id and appended to the height bucket.
/// A missing parent gets a synthesized non-linked placeholder node (linked
/// only when the parent id is the genesis sentinel). If this block was
/// previously an orphan and its parent turns out linked, linkage propagates
/// breadth-first through every descendant.
pub fn store_and_index(
    store: &ChainStore,
    block_id: &BlockId,
    block: &FullBlock,
) -> Result<BlockForkData, ChainError> {
    store.put_block(block_id, block)?;

    let mut bucket = store.blocks_at_number(block.header.block_num)?;
    if !bucket.contains(block_id) {
        bucket.push(*block_id);
        store.put_blocks_at_number(block.header.block_num, &bucket)?;
    }

    let previous = block.header.previous;
    let prev_fork_data = match store.get_fork_data(&previous)? {
        Some(mut data) => {
            data.next_blocks.insert(*block_id);
            data
        }
        None => {
            // We do not know about the previous block, so synthesize a
            // placeholder and assume it is not linked unless it is genesis.
            let mut next_blocks = BTreeSet::new();
            next_blocks.insert(*block_id);
            BlockForkData {
                next_blocks,
                is_linked: previous == GENESIS_SENTINEL,
                ..Default::default()
            }
        }
    };
    store.put_fork_data(&previous, &prev_fork_data)?;

    let current = match store.get_fork_data(block_id)? {
        Some(mut current) => {
            if !current.is_linked && prev_fork_data.is_linked {
                // Found the missing link; everything downstream becomes linked.
                current.is_linked = true;
                store.put_fork_data(block_id, &current)?;
                propagate_linked(store, current.next_blocks.clone())?;
            }
            current
        }
        None => {
            let current = BlockForkData {
                is_linked: prev_fork_data.is_linked,
                ..Default::default()
            };
            store.put_fork_data(block_id, &current)?;
            current
        }
    };

    Ok(current)
}

fn propagate_linked(store: &ChainStore, seed: BTreeSet<BlockId>) -> Result<(), StoreError> {
    let mut frontier = seed;
    while !frontier.is_empty() {
        let mut next = BTreeSet::new();
        for id in frontier {
            if let Some(mut data) = store.get_fork_data(&id)? {
                if !data.is_linked {
                    data.is_linked = true;
                    next.extend(data.next_blocks.iter().copied());
                    store.put_fork_data(&id, &data)?;
                }
            }
        }
        frontier = next;
    }
    Ok(())
}

/// Marks a block invalid and propagates invalidity to every descendant.
pub fn mark_invalid(store: &ChainStore, block_id: &BlockId) -> Result<(), ChainError> {
    let mut data = store
        .get_fork_data(block_id)?
        .ok_or_else(|| ChainError::NotFound(format!("fork node {}", block_id)))?;
    data.is_valid = Some(false);
    store.put_fork_data(block_id, &data)?;

    let mut frontier = data.next_blocks;
    while !frontier.is_empty() {
        let mut next = BTreeSet::new();
        for id in frontier {
            if let Some(mut data) = store.get_fork_data(&id)? {
                if data.is_valid != Some(false) {
                    data.is_valid = Some(false);
                    next.extend(data.next_blocks.iter().copied());
                    store.put_fork_data(&id, &data)?;
                }
            }
        }
        frontier = next;
    }
    Ok(())
}

/// Flips a block's inclusion flag; inclusion also certifies validity.
pub fn mark_included(store: &ChainStore, block_id: &BlockId, included: bool) -> Result<(), ChainError> {
    let mut data = store
        .get_fork_data(block_id)?
        .ok_or_else(|| ChainError::NotFound(format!("fork node {}", block_id)))?;
    data.is_included = included;
    if included {
        data.is_valid = Some(true);
    }
    store.put_fork_data(block_id, &data)?;
    Ok(())
}

/// Walks `previous` pointers from `block_id` until hitting either the genesis
/// sentinel or a block that is currently included. The last element of the
/// result is the common ancestor with the canonical chain.
///
/// Fails with corruption if the walk crosses a non-linked node, which the
/// fork-tree invariants rule out for any block worth switching to.
pub fn get_fork_history(store: &ChainStore, block_id: &BlockId) -> Result<Vec<BlockId>, ChainError> {
    let mut history = vec![*block_id];
    let mut next_id = *block_id;
    loop {
        let block = store
            .get_block(&next_id)?
            .ok_or_else(|| ChainError::NotFound(format!("block {}", next_id)))?;
        let previous = block.header.previous;
        history.push(previous);
        if previous == GENESIS_SENTINEL {
            return Ok(history);
        }
        let prev_fork_data = store
            .get_fork_data(&previous)?
            .ok_or_else(|| ChainError::Corruption(format!("missing fork node {}", previous)))?;
        if !prev_fork_data.is_linked {
            return Err(ChainError::Corruption(format!(
                "fork history of {} hit unlinked block {}",
                block_id, previous
            )));
        }
        if prev_fork_data.is_included {
            return Ok(history);
        }
        next_id = previous;
    }
}

/// Emits the whole fork tree as a graphviz document: nodes are green when
/// included (light blue otherwise) and ellipses when linked (boxes otherwise);
/// edges point from each block to its parent.
pub fn export_fork_graph(store: &ChainStore, path: &std::path::Path) -> Result<(), ChainError> {
    let mut out = String::from("digraph G {\nrankdir=RL;\n");
    store.scan_fork_nodes(|id, data| {
        let label = short_id(id);
        out.push_str(&format!(
            "\"{}\" [color={},style=filled, shape={}];\n",
            label,
            if data.is_included { "green" } else { "lightblue" },
            if data.is_linked { "ellipse" } else { "box" },
        ));
        for next in &data.next_blocks {
            out.push_str(&format!("\"{}\" -> \"{}\";\n", short_id(next), label));
        }
    })?;
    out.push('}');
    std::fs::write(path, out).map_err(StoreError::Io)?;
    Ok(())
}

fn short_id(id: &BlockId) -> String {
    hex::encode(id.0).chars().take(5).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ChainStore;
    use meridian_types::block::{BlockHeader, FullBlock};

    fn open_store() -> (tempfile::TempDir, ChainStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ChainStore::open(dir.path()).unwrap();
        (dir, store)
    }

    fn block(block_num: u64, previous: BlockId, salt: u64) -> FullBlock {
        FullBlock {
            header: BlockHeader {
                block_num,
                previous,
                timestamp: salt * 30,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn linkage_propagates_once_the_missing_parent_arrives() {
        let (_dir, store) = open_store();
        let b1 = block(1, GENESIS_SENTINEL, 1);
        let b2 = block(2, b1.id(), 2);
        let b3 = block(3, b2.id(), 3);

        // Children first: both stay unlinked.
        let data = store_and_index(&store, &b2.id(), &b2).unwrap();
        assert!(!data.is_linked);
        let data = store_and_index(&store, &b3.id(), &b3).unwrap();
        assert!(!data.is_linked);

        // The missing link arrives and linkage reaches the whole subtree.
        let data = store_and_index(&store, &b1.id(), &b1).unwrap();
        assert!(data.is_linked);
        assert!(store.get_fork_data(&b2.id()).unwrap().unwrap().is_linked);
        assert!(store.get_fork_data(&b3.id()).unwrap().unwrap().is_linked);

        // Height buckets track every id exactly once, even on re-insert.
        store_and_index(&store, &b2.id(), &b2).unwrap();
        assert_eq!(store.blocks_at_number(2).unwrap(), vec![b2.id()]);
    }

    #[test]
    fn invalidity_cascades_through_descendants() {
        let (_dir, store) = open_store();
        let b1 = block(1, GENESIS_SENTINEL, 1);
        let b2 = block(2, b1.id(), 2);
        let b3 = block(3, b2.id(), 3);
        for b in [&b1, &b2, &b3] {
            store_and_index(&store, &b.id(), b).unwrap();
        }

        mark_invalid(&store, &b1.id()).unwrap();
        for b in [&b1, &b2, &b3] {
            let data = store.get_fork_data(&b.id()).unwrap().unwrap();
            assert_eq!(data.is_valid, Some(false));
            assert!(!data.can_link());
        }
    }

    #[test]
    fn inclusion_certifies_validity_and_bounds_fork_history() {
        let (_dir, store) = open_store();
        let b1 = block(1, GENESIS_SENTINEL, 1);
        let b2 = block(2, b1.id(), 2);
        let b3 = block(3, b2.id(), 3);
        for b in [&b1, &b2, &b3] {
            store_and_index(&store, &b.id(), b).unwrap();
        }

        mark_included(&store, &b1.id(), true).unwrap();
        let data = store.get_fork_data(&b1.id()).unwrap().unwrap();
        assert!(data.is_included);
        assert_eq!(data.is_valid, Some(true));

        // History stops at the first included ancestor.
        let history = get_fork_history(&store, &b3.id()).unwrap();
        assert_eq!(history, vec![b3.id(), b2.id(), b1.id()]);

        // Without any included ancestor it runs to the sentinel.
        mark_included(&store, &b1.id(), false).unwrap();
        let history = get_fork_history(&store, &b3.id()).unwrap();
        assert_eq!(history, vec![b3.id(), b2.id(), b1.id(), GENESIS_SENTINEL]);
    }

    #[test]
    fn fork_history_rejects_unlinked_ancestry() {
        let (_dir, store) = open_store();
        let missing_parent = block(5, GENESIS_SENTINEL, 50);
        let orphan = block(6, missing_parent.id(), 60);
        store_and_index(&store, &orphan.id(), &orphan).unwrap();

        let error = get_fork_history(&store, &orphan.id()).unwrap_err();
        assert!(matches!(error, ChainError::Corruption(_)), "{error}");
    }
}
