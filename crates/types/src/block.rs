// Path: crates/types/src/block.rs

//! Block headers, full blocks, ids and the deterministic fee schedule.

use crate::constants::{
    Shares, FEE_EMA_WINDOW, MAX_BLOCK_SIZE, MIN_FEE_RATE, PAY_EMA_WINDOW,
};
use crate::crypto::{digest160, digest160_encoded, BlockId, Digest160, PublicKey, SecretHash,
    Signature, TransactionId};
use crate::transaction::SignedTransaction;
use parity_scale_codec::{Decode, Encode};

/// The consensus header of a block. The block id is the 160-bit digest of the
/// canonical encoding of the *signed* header.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct BlockHeader {
    /// Height of this block; the genesis state is height 0.
    pub block_num: u64,
    /// Id of the previous block; all zero for the first block.
    pub previous: BlockId,
    /// Whole-second timestamp; must be a multiple of the block interval.
    pub timestamp: u64,
    /// Fee rate in effect after this block, in millishares per byte.
    /// Recomputed deterministically from the prior rate and the block size.
    pub fee_rate: Shares,
    /// Shares minted to the producing delegate for this block.
    pub delegate_pay_rate: Shares,
    /// The secret this block's producer committed to in its previous block.
    pub previous_secret: SecretHash,
    /// Commitment to the secret the producer must reveal next time.
    pub next_secret_hash: SecretHash,
    /// Merkle digest over the ids of the block's transactions.
    pub transaction_digest: Digest160,
}

impl BlockHeader {
    /// The deterministic fee-rate schedule: an exponential moving average of
    /// the block-size-proportional instantaneous rate, floored at
    /// [`MIN_FEE_RATE`]. Producer and verifier both recompute this.
    pub fn next_fee(prev_rate: Shares, block_size: usize) -> Shares {
        let instant = prev_rate
            .saturating_mul(block_size as Shares)
            .checked_div(MAX_BLOCK_SIZE as Shares)
            .unwrap_or(0);
        let next = (prev_rate.saturating_mul(FEE_EMA_WINDOW - 1)).saturating_add(instant)
            / FEE_EMA_WINDOW;
        next.max(MIN_FEE_RATE)
    }

    /// The deterministic delegate-pay schedule: an exponential moving average
    /// of the fees collected per block.
    pub fn next_delegate_pay(prev_rate: Shares, collected_fees: Shares) -> Shares {
        (prev_rate.saturating_mul(PAY_EMA_WINDOW - 1)).saturating_add(collected_fees)
            / PAY_EMA_WINDOW
    }
}

/// A block header together with the producing delegate's signature.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct SignedBlockHeader {
    /// The signed consensus header.
    pub header: BlockHeader,
    /// Signature of the scheduled delegate over the header's encoding.
    pub delegate_signature: Signature,
}

impl SignedBlockHeader {
    /// The id of the block this header belongs to.
    pub fn id(&self) -> BlockId {
        digest160_encoded(self)
    }

    /// Verifies that `key` produced this header's signature.
    pub fn validate_signee(&self, key: &PublicKey) -> bool {
        key.verify(&self.header.encode(), &self.delegate_signature)
    }
}

/// A complete block: signed header plus the ordered user transactions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct FullBlock {
    /// The consensus header.
    pub header: BlockHeader,
    /// Signature of the scheduled delegate over the header's encoding.
    pub delegate_signature: Signature,
    /// The transactions included in the block, in application order.
    pub user_transactions: Vec<SignedTransaction>,
}

impl FullBlock {
    /// The signed header of this block.
    pub fn signed_header(&self) -> SignedBlockHeader {
        SignedBlockHeader {
            header: self.header.clone(),
            delegate_signature: self.delegate_signature,
        }
    }

    /// The id of this block: the digest of its signed header.
    pub fn id(&self) -> BlockId {
        self.signed_header().id()
    }

    /// The serialized size of the whole block, in bytes.
    pub fn block_size(&self) -> usize {
        self.encode().len()
    }

    /// Recomputes the Merkle digest over the block's transaction ids.
    pub fn calculate_transaction_digest(&self) -> Digest160 {
        let ids: Vec<TransactionId> = self.user_transactions.iter().map(|t| t.id()).collect();
        transaction_merkle_digest(&ids)
    }

    /// Whether every transaction id inside the block is unique.
    pub fn validate_unique(&self) -> bool {
        let mut seen = std::collections::BTreeSet::new();
        self.user_transactions.iter().all(|t| seen.insert(t.id()))
    }

    /// Signs the header with the producing delegate's secret key.
    pub fn sign(&mut self, secret: &[u8; 32]) {
        self.delegate_signature = crate::crypto::sign(secret, &self.header.encode());
    }

    /// Verifies that `key` signed this block's header.
    pub fn validate_signee(&self, key: &PublicKey) -> bool {
        self.signed_header().validate_signee(key)
    }
}

/// Binary Merkle digest over transaction ids with 160-bit combine.
///
/// Odd nodes are promoted unpaired to the next level; the empty set digests
/// to the digest of the empty string.
pub fn transaction_merkle_digest(ids: &[TransactionId]) -> Digest160 {
    if ids.is_empty() {
        return digest160(&[]);
    }
    let mut level: Vec<Digest160> = ids.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            match pair {
                [a, b] => {
                    let mut buf = [0u8; 40];
                    buf[..20].copy_from_slice(&a.0);
                    buf[20..].copy_from_slice(&b.0);
                    next.push(digest160(&buf));
                }
                [a] => next.push(*a),
                _ => {}
            }
        }
        level = next;
    }
    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::INITIAL_FEE_RATE;
    use crate::crypto::{public_key_of, Digest160};

    #[test]
    fn next_fee_decays_toward_floor_on_empty_blocks() {
        let mut rate = INITIAL_FEE_RATE;
        for _ in 0..100_000 {
            let next = BlockHeader::next_fee(rate, 0);
            assert!(next <= rate);
            rate = next;
        }
        assert_eq!(rate, MIN_FEE_RATE);
    }

    #[test]
    fn next_fee_is_deterministic() {
        assert_eq!(
            BlockHeader::next_fee(INITIAL_FEE_RATE, 4_096),
            BlockHeader::next_fee(INITIAL_FEE_RATE, 4_096)
        );
        assert_eq!(BlockHeader::next_delegate_pay(0, 2_880), 1);
    }

    #[test]
    fn merkle_digest_depends_on_order_and_content() {
        let a = Digest160([1u8; 20]);
        let b = Digest160([2u8; 20]);
        let c = Digest160([3u8; 20]);
        assert_ne!(
            transaction_merkle_digest(&[a, b]),
            transaction_merkle_digest(&[b, a])
        );
        assert_ne!(
            transaction_merkle_digest(&[a, b, c]),
            transaction_merkle_digest(&[a, b])
        );
        assert_eq!(transaction_merkle_digest(&[a]), a);
        assert_eq!(transaction_merkle_digest(&[]), digest160(&[]));
    }

    #[test]
    fn block_id_covers_the_signature() {
        let mut block = FullBlock {
            header: BlockHeader {
                block_num: 1,
                timestamp: 30,
                ..Default::default()
            },
            ..Default::default()
        };
        let unsigned_id = block.id();
        block.sign(&[9u8; 32]);
        assert_ne!(block.id(), unsigned_id);
        assert!(block.validate_signee(&public_key_of(&[9u8; 32])));
        assert!(!block.validate_signee(&public_key_of(&[8u8; 32])));
    }
}
