// Path: crates/chain/src/producer.rs

//! Candidate block assembly for the delegate whose slot is current.
//!
//! Pending transactions are walked in fee-ranked order. Each candidate is
//! evaluated in a nested overlay: success flattens the nested overlay into
//! the block's overlay and includes the transaction; failure discards the
//! nested overlay and moves on. The caller supplies the secret fields and
//! signs the result.

use crate::eval::TransactionEvaluator;
use crate::state::{PendingState, StateReader};
use meridian_types::block::{BlockHeader, FullBlock, SignedBlockHeader};
use meridian_types::constants::{Shares, MAX_BLOCK_SIZE};
use meridian_types::crypto::BlockId;
use meridian_types::error::ChainError;
use meridian_types::transaction::SignedTransaction;

/// Assembles an unsigned candidate block for `timestamp`.
pub fn generate_block<'a>(
    state: &dyn StateReader,
    evaluator: &dyn TransactionEvaluator,
    head: &SignedBlockHeader,
    head_id: &BlockId,
    candidates: impl Iterator<Item = &'a SignedTransaction>,
    timestamp: u64,
) -> Result<FullBlock, ChainError> {
    let mut outer = PendingState::new(state);
    let mut included: Vec<SignedTransaction> = Vec::new();
    let mut payload_size = 0usize;
    let mut total_fees: Shares = 0;

    for trx in candidates {
        let trx_size = trx.data_size();
        if payload_size + trx_size > MAX_BLOCK_SIZE {
            break;
        }
        let result = {
            let mut nested = PendingState::new(&outer);
            evaluator
                .evaluate(&mut nested, trx, head.header.fee_rate, timestamp)
                .map(|summary| (summary.base_fee(), nested.into_delta()))
        };
        match result {
            Ok((fee, delta)) => {
                outer.absorb(delta);
                total_fees += fee;
                payload_size += trx_size;
                included.push(trx.clone());
            }
            Err(error) => {
                tracing::warn!(
                    trx_id = %trx.id(),
                    %error,
                    "pending transaction invalid in block context, skipping"
                );
            }
        }
    }

    let mut block = FullBlock {
        header: BlockHeader {
            block_num: head.header.block_num + 1,
            previous: *head_id,
            timestamp,
            fee_rate: 0,
            delegate_pay_rate: BlockHeader::next_delegate_pay(
                head.header.delegate_pay_rate,
                total_fees,
            ),
            ..Default::default()
        },
        delegate_signature: Default::default(),
        user_transactions: included,
    };
    block.header.transaction_digest = block.calculate_transaction_digest();
    // All header fields are fixed-width, so sizing the block with a zero fee
    // rate and patching it afterwards is exact.
    block.header.fee_rate = BlockHeader::next_fee(head.header.fee_rate, block.block_size());
    Ok(block)
}
