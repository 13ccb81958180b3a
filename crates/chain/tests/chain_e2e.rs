// Path: crates/chain/tests/chain_e2e.rs

//! End-to-end scenarios on a single chain: genesis bootstrap, block
//! application, delegate accounting, the pending pool and block production.

mod common;

use common::*;
use meridian_types::constants::{INITIAL_SHARES, N_DELEGATES};
use meridian_types::error::ChainError;

#[test]
fn genesis_bootstrap_materializes_the_initial_state() {
    let net = open_net(aligned_genesis_timestamp(40));

    let base_asset = net.db.get_asset_record(0).unwrap().unwrap();
    assert_eq!(base_asset.current_share_supply, 1_000_000);
    assert_eq!(base_asset.maximum_share_supply, INITIAL_SHARES);
    assert_eq!(base_asset.issuer_account_id, 0);

    let ranked = net.db.get_delegates_by_vote(0, 100).unwrap();
    assert_eq!(ranked.len(), DELEGATES);
    // 500k / 300k / 200k allocations vote for delegates 1, 2, 3.
    assert_eq!(&ranked[..3], &[1, 2, 3]);

    let active = net.db.get_active_delegates().unwrap();
    assert_eq!(active.len() as u64, N_DELEGATES);

    assert_eq!(net.db.chain_id(), net.genesis.chain_id());
    assert_eq!(net.db.get_head_block_num(), 0);
    net.db.sanity_check().unwrap();

    // Named lookups resolve through the derived indices.
    let init0 = net.db.get_account_record_by_name("init0").unwrap().unwrap();
    assert_eq!(init0.id, 1);
    assert!(init0.is_delegate());
    let by_address = net
        .db
        .get_account_record_by_address(&init0.active_key().address())
        .unwrap()
        .unwrap();
    assert_eq!(by_address.id, 1);
}

#[test]
fn single_valid_block_moves_shares_and_credits_the_producer() {
    let net = open_net(aligned_genesis_timestamp(40));
    let alice_before = net
        .db
        .get_balance_record(&holder_balance_id(0))
        .unwrap()
        .unwrap()
        .balance;
    let bob_before = net
        .db
        .get_balance_record(&holder_balance_id(1))
        .unwrap()
        .unwrap()
        .balance;

    // Transfer 100 shares from alice into bob's genesis balance condition.
    let trx = transfer(&net.db, 0, holder_condition(1), 100);
    let fee = required_fee(trx.data_size(), net.db.get_fee_rate());
    assert!(fee > 0);
    net.db.store_pending_transaction(trx.clone()).unwrap().unwrap();

    let timestamp = net.genesis.timestamp + INTERVAL;
    let block = produce_block(&net.db, timestamp);
    assert_eq!(block.user_transactions.len(), 1);
    let producer = net.db.get_signing_delegate_id(timestamp).unwrap();
    net.db.push_block(block).unwrap();

    assert_eq!(net.db.get_head_block_num(), 1);
    let alice_after = net
        .db
        .get_balance_record(&holder_balance_id(0))
        .unwrap()
        .unwrap()
        .balance;
    let bob_after = net
        .db
        .get_balance_record(&holder_balance_id(1))
        .unwrap()
        .unwrap()
        .balance;
    assert_eq!(alice_after, alice_before - 100 - fee);
    assert_eq!(bob_after, bob_before + 100);

    let stats = net
        .db
        .get_account_record(producer)
        .unwrap()
        .unwrap()
        .delegate_info
        .unwrap();
    assert_eq!(stats.blocks_produced, 1);
    assert_eq!(stats.last_block_num_produced, 1);

    // The burned fee is tallied on the base asset and the supply invariant
    // still holds (checked in full by the sanity audit).
    let base_asset = net.db.get_asset_record(0).unwrap().unwrap();
    assert_eq!(base_asset.collected_fees, fee);
    net.db.sanity_check().unwrap();
}

#[test]
fn secret_reveal_mismatch_rejects_the_block() {
    let net = open_net(aligned_genesis_timestamp(40));
    let t1 = net.genesis.timestamp + INTERVAL;
    let first = produce_block(&net.db, t1);
    let producer = net.db.get_signing_delegate_id(t1).unwrap();
    net.db.push_block(first).unwrap();

    // One full round later the same delegate is scheduled again.
    let t2 = t1 + DELEGATES as u64 * INTERVAL;
    assert_eq!(net.db.get_signing_delegate_id(t2).unwrap(), producer);

    let mut second = produce_block(&net.db, t2);
    second.header.previous_secret = meridian_types::crypto::Digest160([0xEE; 20]);
    second.sign(&delegate_secret(producer));
    let bad_id = second.id();
    let head_before = net.db.get_head_block_id();

    let error = net.db.push_block(second).unwrap_err();
    assert!(matches!(error, ChainError::ConsensusViolation(_)), "{error}");
    assert_eq!(net.db.get_head_block_id(), head_before);
    let fork_data = net.db.get_fork_data(&bad_id).unwrap().unwrap();
    assert_eq!(fork_data.is_valid, Some(false));
    assert!(!fork_data.is_included);

    // The honest second block still applies.
    let honest = produce_block(&net.db, t2);
    net.db.push_block(honest).unwrap();
    assert_eq!(net.db.get_head_block_num(), 2);
}

#[test]
fn missed_slots_charge_the_scheduled_delegates() {
    let net = open_net(aligned_genesis_timestamp(40));
    let t1 = net.genesis.timestamp + INTERVAL;
    net.db.push_block(produce_block(&net.db, t1)).unwrap();

    // Skip two slots: their delegates each get a missed block.
    let t2 = t1 + 3 * INTERVAL;
    let skipped = [
        net.db.get_signing_delegate_id(t1 + INTERVAL).unwrap(),
        net.db.get_signing_delegate_id(t1 + 2 * INTERVAL).unwrap(),
    ];
    let producer = net.db.get_signing_delegate_id(t2).unwrap();
    net.db.push_block(produce_block(&net.db, t2)).unwrap();

    for id in skipped {
        let stats = net
            .db
            .get_account_record(id)
            .unwrap()
            .unwrap()
            .delegate_info
            .unwrap();
        assert_eq!(stats.blocks_missed, 1, "delegate {id}");
    }
    let stats = net
        .db
        .get_account_record(producer)
        .unwrap()
        .unwrap()
        .delegate_info
        .unwrap();
    assert_eq!(stats.blocks_missed, 0);
    assert!(stats.blocks_produced >= 1);
}

#[test]
fn included_transactions_leave_the_pending_pool() {
    let net = open_net(aligned_genesis_timestamp(40));
    let trx = transfer(&net.db, 0, holder_condition(2), 250);
    let trx_id = trx.id();
    net.db.store_pending_transaction(trx.clone()).unwrap().unwrap();
    // Re-submitting the same id is a no-op.
    assert!(net.db.store_pending_transaction(trx).unwrap().is_none());
    assert_eq!(net.db.get_pending_transactions().len(), 1);
    assert!(net.db.is_known_transaction(&trx_id).unwrap());

    let block = produce_block(&net.db, net.genesis.timestamp + INTERVAL);
    net.db.push_block(block).unwrap();

    assert!(net.db.get_pending_transactions().is_empty());
    // Known now through the processed index rather than the pool.
    assert!(net.db.is_known_transaction(&trx_id).unwrap());
    let location = net.db.get_transaction_location(&trx_id).unwrap().unwrap();
    assert_eq!(location.block_num, 1);
    assert_eq!(location.trx_num, 0);
    let fetched = net.db.get_transaction(&trx_id).unwrap().unwrap();
    assert_eq!(fetched.id(), trx_id);
}

#[test]
fn pending_pool_ranks_by_fee_and_producer_respects_the_order() {
    let net = open_net(aligned_genesis_timestamp(40));
    // A cheap transfer from carol and a deliberately overpaying one from
    // alice: alice's must rank first.
    let cheap = transfer(&net.db, 2, holder_condition(1), 50);
    let mut rich = transfer(&net.db, 0, holder_condition(1), 50);
    // Re-build alice's transfer with double fee by withdrawing extra.
    if let meridian_types::transaction::Operation::Withdraw { amount, .. } =
        &mut rich.transaction.operations[0]
    {
        *amount += 500;
    }
    rich.signatures.clear();
    rich.sign_with(&holder_secret(0));

    net.db.store_pending_transaction(cheap.clone()).unwrap().unwrap();
    net.db.store_pending_transaction(rich.clone()).unwrap().unwrap();

    let pending = net.db.get_pending_transactions();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].id(), rich.id());
    assert_eq!(pending[1].id(), cheap.id());

    let block = produce_block(&net.db, net.genesis.timestamp + INTERVAL);
    assert_eq!(block.user_transactions[0].id(), rich.id());
    net.db.push_block(block).unwrap();
    net.db.sanity_check().unwrap();
}

#[test]
fn generated_blocks_are_bit_deterministic() {
    let net = open_net(aligned_genesis_timestamp(40));
    net.db
        .store_pending_transaction(transfer(&net.db, 0, holder_condition(1), 10))
        .unwrap()
        .unwrap();
    let timestamp = net.genesis.timestamp + INTERVAL;
    let a = net.db.generate_block(timestamp).unwrap();
    let b = net.db.generate_block(timestamp).unwrap();
    assert_eq!(a, b);
    assert_eq!(
        parity_scale_codec::Encode::encode(&a),
        parity_scale_codec::Encode::encode(&b)
    );
}

#[test]
fn rotation_reshuffles_the_active_set_every_round() {
    let net = open_net(aligned_genesis_timestamp(40));
    let before = net.db.get_active_delegates().unwrap();
    let seed_before = net.db.get_current_random_seed().unwrap();

    let mut timestamp = net.genesis.timestamp;
    for _ in 0..DELEGATES {
        timestamp += INTERVAL;
        net.db.push_block(produce_block(&net.db, timestamp)).unwrap();
    }
    assert_eq!(net.db.get_head_block_num() as usize, DELEGATES);

    let after = net.db.get_active_delegates().unwrap();
    assert_eq!(after.len(), DELEGATES);
    let mut sorted = after.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, vec![1, 2, 3, 4, 5]);

    // The seed mixed on every block.
    assert_ne!(net.db.get_current_random_seed().unwrap(), seed_before);
    // The pre-rotation list was the plain ranking.
    assert_eq!(before, vec![1, 2, 3, 4, 5]);
    net.db.sanity_check().unwrap();
}

#[test]
fn committed_state_survives_reopen() {
    let mut net = open_net(aligned_genesis_timestamp(40));
    net.db
        .store_pending_transaction(transfer(&net.db, 0, holder_condition(1), 75))
        .unwrap()
        .unwrap();
    net.db
        .push_block(produce_block(&net.db, net.genesis.timestamp + INTERVAL))
        .unwrap();
    let head = net.db.get_head_block_id();
    let fingerprint = state_fingerprint(&net.db);

    net = reopen(net);
    assert_eq!(net.db.get_head_block_id(), head);
    assert_eq!(net.db.get_head_block_num(), 1);
    assert_eq!(state_fingerprint(&net.db), fingerprint);
    net.db.sanity_check().unwrap();
}

#[test]
fn range_accessors_walk_the_derived_indices() {
    let net = open_net(aligned_genesis_timestamp(40));
    let accounts = net.db.get_accounts("init1", 2).unwrap();
    assert_eq!(accounts.len(), 2);
    assert_eq!(accounts[0].name, "init1");
    assert_eq!(accounts[1].name, "init2");

    let assets = net.db.get_assets("", 10).unwrap();
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].symbol, meridian_types::constants::ADDRESS_PREFIX);
    assert!(net.db.is_valid_symbol(meridian_types::constants::ADDRESS_PREFIX).unwrap());
    assert_eq!(net.db.get_asset_symbol(0).unwrap(), assets[0].symbol);
}
