// Path: crates/chain/src/pipeline.rs

//! Header verification and the block application steps.
//!
//! `extend_chain` runs these in a fixed order against a fresh overlay over the
//! committed state: delegate production accounting, transaction evaluation,
//! delegate payout, active-set rotation, random-seed mixing. The active
//! delegate list consulted here is always the one committed at the previous
//! block, never the list being rotated in by the block under apply.

use crate::eval::TransactionEvaluator;
use crate::state::{ChainStore, PendingState, StateReader};
use meridian_types::block::{BlockHeader, FullBlock, SignedBlockHeader};
use meridian_types::constants::{Shares, BLOCK_INTERVAL_SEC, N_DELEGATES};
use meridian_types::crypto::{ripemd160, sha256, sha512, BlockId, Digest160, Digest256};
use meridian_types::error::ChainError;
use meridian_types::records::{AccountId, ChainProperty, PropertyValue, TransactionLocation};

/// The delegate scheduled to sign the slot containing `timestamp`.
pub fn signing_delegate_at(active: &[AccountId], timestamp: u64) -> Result<AccountId, ChainError> {
    let slot = timestamp / BLOCK_INTERVAL_SEC;
    let index = (slot % N_DELEGATES) as usize;
    active.get(index).copied().ok_or_else(|| {
        ChainError::Corruption(format!(
            "active delegate list holds {} entries, slot index {} requested",
            active.len(),
            index
        ))
    })
}

/// Verifies a block header against the current head. All checks are pure
/// reads of committed state.
pub fn verify_header(
    state: &dyn StateReader,
    head: &SignedBlockHeader,
    head_id: &BlockId,
    block: &FullBlock,
    now: u64,
) -> Result<(), ChainError> {
    let header = &block.header;
    if header.block_num != head.header.block_num + 1 {
        return Err(ChainError::ConsensusViolation(format!(
            "block number {} does not follow head {}",
            header.block_num, head.header.block_num
        )));
    }
    if header.previous != *head_id {
        return Err(ChainError::ConsensusViolation(format!(
            "previous id {} does not match head {}",
            header.previous, head_id
        )));
    }
    if header.timestamp % BLOCK_INTERVAL_SEC != 0 {
        return Err(ChainError::ConsensusViolation(format!(
            "timestamp {} is not slot-aligned",
            header.timestamp
        )));
    }
    if header.timestamp <= head.header.timestamp {
        return Err(ChainError::ConsensusViolation(format!(
            "timestamp {} does not advance past head {}",
            header.timestamp, head.header.timestamp
        )));
    }
    if header.timestamp > now + BLOCK_INTERVAL_SEC / 2 {
        return Err(ChainError::ConsensusViolation(format!(
            "timestamp {} is too far in the future (now {})",
            header.timestamp, now
        )));
    }
    let expected_fee = BlockHeader::next_fee(head.header.fee_rate, block.block_size());
    if header.fee_rate != expected_fee {
        return Err(ChainError::ConsensusViolation(format!(
            "fee rate {} does not match schedule {}",
            header.fee_rate, expected_fee
        )));
    }
    if block.calculate_transaction_digest() != header.transaction_digest {
        return Err(ChainError::ConsensusViolation(
            "transaction digest mismatch".into(),
        ));
    }
    if !block.validate_unique() {
        return Err(ChainError::ConsensusViolation(
            "duplicate transaction id within block".into(),
        ));
    }

    let active = state.active_delegate_list()?;
    let delegate_id = signing_delegate_at(&active, header.timestamp)?;
    let delegate = state
        .get_account(delegate_id)?
        .ok_or_else(|| ChainError::Corruption(format!("missing delegate account {}", delegate_id)))?;
    if !block.validate_signee(&delegate.active_key()) {
        return Err(ChainError::ConsensusViolation(format!(
            "block is not signed by scheduled delegate {} ({})",
            delegate_id, delegate.name
        )));
    }
    Ok(())
}

/// Step 1: delegate production accounting.
///
/// Checks the producer's secret reveal against its standing commitment,
/// stores the new commitment, then walks every slot between the head and the
/// block: intermediate slots charge their scheduled delegate a missed block,
/// the final slot credits the producer.
pub fn update_delegate_production_info(
    pending: &mut PendingState<'_>,
    block: &FullBlock,
    head: &SignedBlockHeader,
    active: &[AccountId],
) -> Result<(), ChainError> {
    let producer_id = signing_delegate_at(active, block.header.timestamp)?;
    let mut producer = pending
        .get_account(producer_id)?
        .ok_or_else(|| ChainError::Corruption(format!("missing delegate account {}", producer_id)))?;
    {
        let stats = producer.delegate_info.as_mut().ok_or_else(|| {
            ChainError::Corruption(format!("account {} lost delegate status", producer_id))
        })?;
        if stats.blocks_produced > 0 {
            let revealed = ripemd160(&block.header.previous_secret.0);
            if revealed != stats.next_secret_hash {
                return Err(ChainError::ConsensusViolation(format!(
                    "secret reveal mismatch for delegate {}: {} committed, {} revealed",
                    producer_id, stats.next_secret_hash, revealed
                )));
            }
        }
        stats.next_secret_hash = block.header.next_secret_hash;
        stats.last_block_num_produced = block.header.block_num;
    }
    pending.store_account(producer);

    let mut slot_time = if head.header.block_num == 0 {
        block.header.timestamp - BLOCK_INTERVAL_SEC
    } else {
        head.header.timestamp
    };
    while slot_time < block.header.timestamp {
        slot_time += BLOCK_INTERVAL_SEC;
        let delegate_id = signing_delegate_at(active, slot_time)?;
        let mut record = pending.get_account(delegate_id)?.ok_or_else(|| {
            ChainError::Corruption(format!("missing delegate account {}", delegate_id))
        })?;
        let stats = record.delegate_info.as_mut().ok_or_else(|| {
            ChainError::Corruption(format!("account {} lost delegate status", delegate_id))
        })?;
        if slot_time == block.header.timestamp {
            stats.blocks_produced += 1;
        } else {
            stats.blocks_missed += 1;
        }
        pending.store_account(record);
    }
    Ok(())
}

/// Step 2: transaction evaluation. Any failure is fatal for the block.
pub fn apply_transactions(
    evaluator: &dyn TransactionEvaluator,
    pending: &mut PendingState<'_>,
    block: &FullBlock,
    fee_rate: Shares,
) -> Result<(), ChainError> {
    for (index, trx) in block.user_transactions.iter().enumerate() {
        evaluator.evaluate(pending, trx, fee_rate, block.header.timestamp)?;
        pending.store_transaction_location(
            trx.id(),
            TransactionLocation {
                block_num: block.header.block_num,
                trx_num: index as u32,
            },
        );
    }
    Ok(())
}

/// Step 3: delegate payout. The pay rate is minted: it lands on the
/// producer's pay balance, votes for the producer, and the base asset supply.
pub fn pay_delegate(
    pending: &mut PendingState<'_>,
    block: &FullBlock,
    active: &[AccountId],
) -> Result<(), ChainError> {
    let amount = block.header.delegate_pay_rate;
    let producer_id = signing_delegate_at(active, block.header.timestamp)?;
    let mut producer = pending
        .get_account(producer_id)?
        .ok_or_else(|| ChainError::Corruption(format!("missing delegate account {}", producer_id)))?;
    {
        let stats = producer.delegate_info.as_mut().ok_or_else(|| {
            ChainError::Corruption(format!("account {} lost delegate status", producer_id))
        })?;
        stats.pay_balance += amount;
        stats.votes_for += amount;
    }
    pending.store_account(producer);

    let mut base_asset = pending
        .get_asset(0)?
        .ok_or_else(|| ChainError::Corruption("missing base asset record".into()))?;
    base_asset.current_share_supply += amount;
    if base_asset.current_share_supply > base_asset.maximum_share_supply {
        return Err(ChainError::ConsensusViolation(format!(
            "delegate pay pushes supply {} over cap {}",
            base_asset.current_share_supply, base_asset.maximum_share_supply
        )));
    }
    pending.store_asset(base_asset);
    Ok(())
}

/// Step 4: active-set rotation, once per round.
///
/// The top delegates come from the rank index committed at the previous
/// block; the deterministic shuffle is seeded by `sha256` of the random seed
/// still standing from that block.
pub fn update_active_delegate_list(
    store: &ChainStore,
    pending: &mut PendingState<'_>,
    block: &FullBlock,
) -> Result<(), ChainError> {
    if block.header.block_num % N_DELEGATES != 0 {
        return Ok(());
    }
    let mut list = store.delegates_by_vote(0, N_DELEGATES as usize)?;
    if (list.len() as u64) < N_DELEGATES {
        return Err(ChainError::Corruption(format!(
            "delegate rank index holds {} entries, {} required",
            list.len(),
            N_DELEGATES
        )));
    }
    let seed = pending.current_random_seed()?;
    shuffle_delegates(&mut list, &seed);
    pending.set_property(
        ChainProperty::ActiveDelegateList,
        PropertyValue::AccountList(list),
    );
    Ok(())
}

/// Step 5: random-seed mixing.
///
/// `new_seed = ripemd160(sha512(previous_secret || current_seed))`.
pub fn update_random_seed(
    pending: &mut PendingState<'_>,
    revealed_secret: &Digest160,
) -> Result<(), ChainError> {
    let current = pending.current_random_seed()?;
    let mut buf = [0u8; 40];
    buf[..20].copy_from_slice(&revealed_secret.0);
    buf[20..].copy_from_slice(&current.0);
    let mixed = ripemd160(&sha512(&buf));
    pending.set_property(
        ChainProperty::LastRandomSeed,
        PropertyValue::Digest160(mixed),
    );
    Ok(())
}

/// The deterministic delegate shuffle.
///
/// Seeded by `sha256(seed)`; each position swaps with the position named by
/// the next 64-bit seed word modulo the list length, re-hashing after every
/// four words.
pub fn shuffle_delegates(list: &mut [AccountId], seed: &Digest160) {
    let n = list.len() as u64;
    if n == 0 {
        return;
    }
    let mut rand_seed = sha256(&seed.0);
    let mut i = 0usize;
    while (i as u64) < n {
        for word in seed_words(&rand_seed) {
            if i as u64 >= n {
                break;
            }
            list.swap(i, (word % n) as usize);
            i += 1;
        }
        rand_seed = sha256(&rand_seed.0);
    }
}

fn seed_words(seed: &Digest256) -> [u64; 4] {
    let mut words = [0u64; 4];
    for (word, chunk) in words.iter_mut().zip(seed.0.chunks_exact(8)) {
        if let Ok(raw) = <[u8; 8]>::try_from(chunk) {
            *word = u64::from_le_bytes(raw);
        }
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_selection_wraps_the_active_list() {
        let active: Vec<AccountId> = (1..=N_DELEGATES).collect();
        let base = 1_000 * BLOCK_INTERVAL_SEC * N_DELEGATES;
        for offset in 0..N_DELEGATES {
            let timestamp = base + offset * BLOCK_INTERVAL_SEC;
            assert_eq!(
                signing_delegate_at(&active, timestamp).unwrap(),
                active[offset as usize]
            );
        }
        // One full round later the schedule repeats.
        assert_eq!(
            signing_delegate_at(&active, base).unwrap(),
            signing_delegate_at(&active, base + N_DELEGATES * BLOCK_INTERVAL_SEC).unwrap()
        );
    }

    #[test]
    fn shuffle_is_deterministic_and_seed_sensitive() {
        let original: Vec<AccountId> = (1..=20).collect();
        let mut a = original.clone();
        let mut b = original.clone();
        shuffle_delegates(&mut a, &Digest160([1u8; 20]));
        shuffle_delegates(&mut b, &Digest160([1u8; 20]));
        assert_eq!(a, b);

        let mut c = original.clone();
        shuffle_delegates(&mut c, &Digest160([2u8; 20]));
        assert_ne!(a, c);

        // A shuffle is a permutation.
        let mut sorted = a.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, original);
    }

    #[test]
    fn empty_and_singleton_lists_survive_shuffling() {
        let mut empty: Vec<AccountId> = vec![];
        shuffle_delegates(&mut empty, &Digest160([3u8; 20]));
        assert!(empty.is_empty());

        let mut one = vec![42];
        shuffle_delegates(&mut one, &Digest160([3u8; 20]));
        assert_eq!(one, vec![42]);
    }
}
