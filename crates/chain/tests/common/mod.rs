// Path: crates/chain/tests/common/mod.rs
#![allow(dead_code)] // not every suite uses every helper

//! Shared harness for the scenario suites: a throwaway chain with a known
//! genesis roster, deterministic delegate keys, and block sealing helpers.

use meridian_chain::ChainDatabase;
use meridian_types::block::FullBlock;
use meridian_types::constants::{Shares, BLOCK_INTERVAL_SEC};
use meridian_types::crypto::{
    digest160_encoded, public_key_of, ripemd160, Address, Digest160,
};
use meridian_types::genesis::{GenesisBalance, GenesisConfig, GenesisName};
use meridian_types::records::{AccountId, BalanceRecord, WithdrawCondition};
use meridian_types::transaction::{Operation, SignedTransaction, Transaction};
use parity_scale_codec::Encode;

pub const INTERVAL: u64 = BLOCK_INTERVAL_SEC;

/// Number of delegates in the test roster (matches the `test-params` value
/// of `N_DELEGATES`).
pub const DELEGATES: usize = 5;

pub struct TestNet {
    pub dir: tempfile::TempDir,
    pub db: ChainDatabase,
    pub genesis: GenesisConfig,
}

/// The secret key of delegate account `id` (genesis assigns ids 1..=5 to
/// `init0`..`init4`).
pub fn delegate_secret(id: AccountId) -> [u8; 32] {
    let mut secret = [0u8; 32];
    secret[0] = 0xD0;
    secret[1] = id as u8;
    secret
}

/// The secret key of the `index`-th genesis balance holder.
pub fn holder_secret(index: usize) -> [u8; 32] {
    let mut secret = [0u8; 32];
    secret[0] = 0xB0;
    secret[1] = index as u8;
    secret
}

pub fn holder_address(index: usize) -> Address {
    public_key_of(&holder_secret(index)).address()
}

/// The genesis slate assigned to the `index`-th balance (round-robin over the
/// delegate ids).
pub fn holder_slate(index: usize) -> i64 {
    (index % DELEGATES) as i64 + 1
}

/// The balance id of the `index`-th genesis allocation.
pub fn holder_balance_id(index: usize) -> Digest160 {
    BalanceRecord {
        condition: holder_condition(index),
        balance: 0,
    }
    .id()
}

pub fn holder_condition(index: usize) -> WithdrawCondition {
    WithdrawCondition {
        owner: holder_address(index),
        asset_id: 0,
        delegate_slate: holder_slate(index),
    }
}

/// A slot-aligned genesis timestamp `slots_back` intervals in the past, so
/// tests can push that many blocks without tripping the clock-skew check.
pub fn aligned_genesis_timestamp(slots_back: u64) -> u64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    (now / INTERVAL) * INTERVAL - slots_back * INTERVAL
}

/// Three holders with 500k / 300k / 200k shares and five delegates.
pub fn genesis_config(timestamp: u64) -> GenesisConfig {
    GenesisConfig {
        timestamp,
        names: (0..DELEGATES)
            .map(|i| GenesisName {
                name: format!("init{}", i),
                owner: public_key_of(&delegate_secret(i as AccountId + 1)),
                is_delegate: true,
            })
            .collect(),
        balances: [500_000, 300_000, 200_000]
            .iter()
            .enumerate()
            .map(|(index, amount)| GenesisBalance {
                owner: holder_address(index),
                amount: *amount,
            })
            .collect(),
    }
}

pub fn open_net(timestamp: u64) -> TestNet {
    let dir = tempfile::tempdir().unwrap();
    let genesis = genesis_config(timestamp);
    let genesis_path = dir.path().join("genesis.json");
    std::fs::write(&genesis_path, serde_json::to_string(&genesis).unwrap()).unwrap();
    let db = ChainDatabase::open(&dir.path().join("data"), &genesis_path).unwrap();
    TestNet { dir, db, genesis }
}

/// Reopens the chain in the same data directory.
pub fn reopen(net: TestNet) -> TestNet {
    let TestNet { dir, db, genesis } = net;
    db.close();
    let genesis_path = dir.path().join("genesis.json");
    let db = ChainDatabase::open(&dir.path().join("data"), &genesis_path).unwrap();
    TestNet { dir, db, genesis }
}

/// The per-round secret preimage of a delegate: deterministic, so the harness
/// can always reveal what it previously committed.
pub fn delegate_preimage(id: AccountId, round: u64) -> Digest160 {
    digest160_encoded(&(id, round))
}

/// Fills in the producer's secret-reveal fields and signs the block with the
/// scheduled delegate's key. Returns the producer id.
pub fn seal_block(db: &ChainDatabase, block: &mut FullBlock) -> AccountId {
    let delegate_id = db.get_signing_delegate_id(block.header.timestamp).unwrap();
    let record = db.get_account_record(delegate_id).unwrap().unwrap();
    let produced = record.delegate_info.as_ref().unwrap().blocks_produced;
    block.header.previous_secret = delegate_preimage(delegate_id, produced);
    block.header.next_secret_hash = ripemd160(&delegate_preimage(delegate_id, produced + 1).0);
    block.sign(&delegate_secret(delegate_id));
    delegate_id
}

/// Generates, seals and returns a block for `timestamp` (not yet pushed).
pub fn produce_block(db: &ChainDatabase, timestamp: u64) -> FullBlock {
    let mut block = db.generate_block(timestamp).unwrap();
    seal_block(db, &mut block);
    block
}

pub fn required_fee(size: usize, rate: Shares) -> Shares {
    (size as Shares) * rate / 1_000
}

/// A transfer of `amount` shares from a genesis holder to a condition,
/// paying exactly the minimum fee at the chain's current rate.
pub fn transfer(
    db: &ChainDatabase,
    from_index: usize,
    to: WithdrawCondition,
    amount: Shares,
) -> SignedTransaction {
    let from_id = holder_balance_id(from_index);
    let build = |withdrawal: Shares| {
        let mut trx = SignedTransaction {
            transaction: Transaction {
                operations: vec![
                    Operation::Withdraw {
                        balance_id: from_id,
                        amount: withdrawal,
                    },
                    Operation::Deposit {
                        amount,
                        condition: to,
                    },
                ],
            },
            signatures: vec![],
        };
        trx.sign_with(&holder_secret(from_index));
        trx
    };
    // Amounts are fixed-width, so the probe and the final transaction have
    // identical sizes and the fee computes exactly.
    let probe = build(amount + 1);
    let fee = required_fee(probe.data_size(), db.get_fee_rate());
    build(amount + fee)
}

/// A digest of the observable committed state, for undo/reorg equivalence
/// checks. The fork tree is deliberately excluded.
pub fn state_fingerprint(db: &ChainDatabase) -> Vec<u8> {
    let mut buf = Vec::new();
    db.scan_accounts(|record| buf.extend(record.encode())).unwrap();
    db.scan_balances(|record| buf.extend(record.encode())).unwrap();
    db.scan_assets(|record| buf.extend(record.encode())).unwrap();
    buf.extend(db.get_current_random_seed().unwrap().0);
    buf.extend(db.get_active_delegates().unwrap().encode());
    buf.extend(db.get_head_block_id().0);
    buf
}
