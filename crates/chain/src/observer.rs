// Path: crates/chain/src/observer.rs

//! Observer notifications fired after commit.
//!
//! Observers run synchronously on the writer thread, strictly after the
//! block's batch has committed, in commit order. The callbacks are infallible
//! by construction: nothing an observer does can fail or unwind a block.

use crate::state::PendingDelta;
use meridian_types::block::FullBlock;

/// The outcome of one block application, handed to observers.
#[derive(Clone, Debug)]
pub struct BlockSummary {
    /// The applied block.
    pub block: FullBlock,
    /// The state delta the block committed.
    pub applied_changes: PendingDelta,
}

/// Receives chain lifecycle notifications.
pub trait ChainObserver: Send + Sync {
    /// Called after a block has been committed to the canonical chain.
    fn block_applied(&self, summary: &BlockSummary);

    /// Called after any other committed state change, including the undo
    /// delta flattened by a pop during reorganization.
    fn state_changed(&self, delta: &PendingDelta);
}
