// Path: crates/storage/src/tables.rs

//! Table definitions: one named table per logical map of the chain layout.

use redb::TableDefinition;

/// Shorthand for the byte-keyed, byte-valued tables used throughout.
pub type Table = TableDefinition<'static, &'static [u8], &'static [u8]>;

/// block height -> list of all known block ids at that height (any fork).
pub const FORK_NUMBER: Table = TableDefinition::new("fork_number_db");
/// block id -> fork node (linkage / validity / inclusion flags).
pub const FORK: Table = TableDefinition::new("fork_db");
/// chain property key -> typed property value.
pub const PROPERTY: Table = TableDefinition::new("property_db");
/// proposal id -> proposal record.
pub const PROPOSAL: Table = TableDefinition::new("proposal_db");
/// (proposal id, delegate id) -> proposal vote.
pub const PROPOSAL_VOTE: Table = TableDefinition::new("proposal_vote_db");
/// block id -> undo snapshot reversing that block's state delta.
pub const UNDO_STATE: Table = TableDefinition::new("undo_state_db");
/// block height -> block id, canonical chain only.
pub const BLOCK_NUM_TO_ID: Table = TableDefinition::new("block_num_to_id_db");
/// block id -> full block, all forks.
pub const BLOCK_ID_TO_BLOCK: Table = TableDefinition::new("block_id_to_block_db");
/// transaction id -> raw pending transaction.
pub const PENDING_TRANSACTION: Table = TableDefinition::new("pending_transaction_db");
/// asset id -> asset record.
pub const ASSET: Table = TableDefinition::new("asset_db");
/// balance id -> balance record.
pub const BALANCE: Table = TableDefinition::new("balance_db");
/// account id -> account record.
pub const ACCOUNT: Table = TableDefinition::new("account_db");
/// address -> account id, one row per historical active key.
pub const ADDRESS_TO_ACCOUNT: Table = TableDefinition::new("address_to_account_db");
/// account name -> account id.
pub const ACCOUNT_INDEX: Table = TableDefinition::new("account_index_db");
/// asset symbol -> asset id.
pub const SYMBOL_INDEX: Table = TableDefinition::new("symbol_index_db");
/// (net votes desc, account id asc) -> account id; the delegate ranking.
pub const DELEGATE_VOTE_INDEX: Table = TableDefinition::new("delegate_vote_index_db");
/// market index key -> ask order.
pub const ASK: Table = TableDefinition::new("ask_db");
/// market index key -> bid order.
pub const BID: Table = TableDefinition::new("bid_db");
/// market index key -> short order.
pub const SHORT: Table = TableDefinition::new("short_db");
/// market index key -> collateral record.
pub const COLLATERAL: Table = TableDefinition::new("collateral_db");
/// transaction id -> canonical-chain location; duplicate suppression.
pub const PROCESSED_TRANSACTION_ID: Table = TableDefinition::new("processed_transaction_id_db");

/// Every table of the layout, opened eagerly at database creation so that an
/// empty store is fully structured on disk.
pub const ALL_TABLES: [Table; 21] = [
    FORK_NUMBER,
    FORK,
    PROPERTY,
    PROPOSAL,
    PROPOSAL_VOTE,
    UNDO_STATE,
    BLOCK_NUM_TO_ID,
    BLOCK_ID_TO_BLOCK,
    PENDING_TRANSACTION,
    ASSET,
    BALANCE,
    ACCOUNT,
    ADDRESS_TO_ACCOUNT,
    ACCOUNT_INDEX,
    SYMBOL_INDEX,
    DELEGATE_VOTE_INDEX,
    ASK,
    BID,
    SHORT,
    COLLATERAL,
    PROCESSED_TRANSACTION_ID,
];
