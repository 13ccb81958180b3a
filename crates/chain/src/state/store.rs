// Path: crates/chain/src/state/store.rs

//! The committed store: typed reads over the persistent tables, derived-index
//! maintenance, and the single-batch block commit.
//!
//! Every state mutation flows through [`ChainStore::apply_delta`] or
//! [`ChainStore::commit_block`], which flatten a [`PendingDelta`] inside one
//! atomic write batch. Storing a record's null form removes the row and every
//! index row derived from it. The delegate ranking index is maintained
//! strictly as remove-old-row-then-insert-new-row.

use crate::fork::BlockForkData;
use crate::state::{PendingDelta, StateReader};
use meridian_storage::{tables, Db, WriteBatch};
use meridian_types::block::FullBlock;
use meridian_types::crypto::{Address, BalanceId, BlockId, TransactionId};
use meridian_types::error::StoreError;
use meridian_types::records::{
    AccountId, AccountRecord, AssetId, AssetRecord, BalanceRecord, ChainProperty, CollateralRecord,
    MarketIndexKey, OrderRecord, PropertyValue, ProposalId, ProposalRecord, ProposalVote,
    ProposalVoteId, TransactionLocation, VoteRank,
};
use meridian_types::transaction::SignedTransaction;
use parity_scale_codec::Encode;

/// Key encodings. Byte order must equal logical order for every table that is
/// range-scanned.
mod keys {
    use super::*;

    pub fn u64_key(id: u64) -> [u8; 8] {
        id.to_be_bytes()
    }

    pub fn property_key(property: ChainProperty) -> Vec<u8> {
        property.encode()
    }

    pub fn market_key(key: &MarketIndexKey) -> Vec<u8> {
        key.encode()
    }

    pub fn proposal_vote_key(id: &ProposalVoteId) -> [u8; 16] {
        let mut key = [0u8; 16];
        key[..8].copy_from_slice(&id.proposal_id.to_be_bytes());
        key[8..].copy_from_slice(&id.delegate_id.to_be_bytes());
        key
    }

    pub fn rank_key(record: &AccountRecord) -> [u8; 16] {
        VoteRank {
            votes: record.net_votes(),
            delegate_id: record.id,
        }
        .to_index_key()
    }
}

/// The committed chain state and all block/fork rows, backed by one database.
pub struct ChainStore {
    db: Db,
}

impl ChainStore {
    /// Opens (or creates) the store under `data_dir`.
    pub fn open(data_dir: &std::path::Path) -> Result<Self, StoreError> {
        Ok(ChainStore {
            db: Db::open(data_dir)?,
        })
    }

    // ---- state flattening ------------------------------------------------

    /// Flattens a delta into the committed state as one atomic batch.
    pub fn apply_delta(&self, delta: &PendingDelta) -> Result<(), StoreError> {
        let mut batch = self.db.begin_batch()?;
        self.write_delta(&mut batch, delta)?;
        batch.commit()
    }

    /// Commits one block application atomically: the undo snapshot, the state
    /// delta, the canonical height row and the pending-row cleanup all land in
    /// a single batch.
    pub fn commit_block(
        &self,
        block_id: &BlockId,
        block_num: u64,
        delta: &PendingDelta,
        undo: &PendingDelta,
        confirmed: &[TransactionId],
    ) -> Result<(), StoreError> {
        let mut batch = self.db.begin_batch()?;
        batch.put(tables::UNDO_STATE, &block_id.0, undo)?;
        self.write_delta(&mut batch, delta)?;
        batch.put(tables::BLOCK_NUM_TO_ID, &keys::u64_key(block_num), block_id)?;
        for id in confirmed {
            batch.remove(tables::PENDING_TRANSACTION, &id.0)?;
        }
        batch.commit()
    }

    /// Rolls one block off the head atomically: removes its canonical height
    /// row and flattens its undo snapshot.
    pub fn rollback_block(
        &self,
        block_num: u64,
        undo: &PendingDelta,
    ) -> Result<(), StoreError> {
        let mut batch = self.db.begin_batch()?;
        batch.remove(tables::BLOCK_NUM_TO_ID, &keys::u64_key(block_num))?;
        self.write_delta(&mut batch, undo)?;
        batch.commit()
    }

    fn write_delta(&self, batch: &mut WriteBatch<'_>, delta: &PendingDelta) -> Result<(), StoreError> {
        for (property, value) in &delta.properties {
            let key = keys::property_key(*property);
            match value {
                Some(value) => batch.put(tables::PROPERTY, &key, value)?,
                None => batch.remove(tables::PROPERTY, &key)?,
            }
        }
        for record in delta.accounts.values() {
            self.write_account(batch, record)?;
        }
        for record in delta.assets.values() {
            self.write_asset(batch, record)?;
        }
        for (id, record) in &delta.balances {
            if record.is_null() {
                batch.remove(tables::BALANCE, &id.0)?;
            } else {
                batch.put(tables::BALANCE, &id.0, record)?;
            }
        }
        for (key, record) in &delta.asks {
            Self::write_order(batch, tables::ASK, key, record)?;
        }
        for (key, record) in &delta.bids {
            Self::write_order(batch, tables::BID, key, record)?;
        }
        for (key, record) in &delta.shorts {
            Self::write_order(batch, tables::SHORT, key, record)?;
        }
        for (key, record) in &delta.collateral {
            let key_bytes = keys::market_key(key);
            if record.is_null() {
                batch.remove(tables::COLLATERAL, &key_bytes)?;
            } else {
                batch.put(tables::COLLATERAL, &key_bytes, record)?;
            }
        }
        for (id, record) in &delta.proposals {
            let key = keys::u64_key(*id);
            if record.is_null() {
                batch.remove(tables::PROPOSAL, &key)?;
            } else {
                batch.put(tables::PROPOSAL, &key, record)?;
            }
        }
        for (id, record) in &delta.proposal_votes {
            let key = keys::proposal_vote_key(id);
            if record.is_null() {
                batch.remove(tables::PROPOSAL_VOTE, &key)?;
            } else {
                batch.put(tables::PROPOSAL_VOTE, &key, record)?;
            }
        }
        for (id, location) in &delta.transaction_locations {
            match location {
                Some(location) => {
                    batch.put(tables::PROCESSED_TRANSACTION_ID, &id.0, location)?
                }
                None => batch.remove(tables::PROCESSED_TRANSACTION_ID, &id.0)?,
            }
        }
        Ok(())
    }

    /// Writes one account and keeps every derived index in step: the name
    /// index, one address row per historical active key, and the delegate
    /// ranking (old row removed, new row inserted).
    fn write_account(
        &self,
        batch: &mut WriteBatch<'_>,
        record: &AccountRecord,
    ) -> Result<(), StoreError> {
        let key = keys::u64_key(record.id);
        let old: Option<AccountRecord> = batch.get(tables::ACCOUNT, &key)?;

        if let Some(old) = &old {
            if old.name != record.name {
                batch.remove(tables::ACCOUNT_INDEX, old.name.as_bytes())?;
            }
            if old.is_delegate() {
                batch.remove(tables::DELEGATE_VOTE_INDEX, &keys::rank_key(old))?;
            }
        }

        if record.is_null() {
            if let Some(old) = &old {
                batch.remove(tables::ACCOUNT, &key)?;
                batch.remove(tables::ACCOUNT_INDEX, old.name.as_bytes())?;
                for active_key in old.active_key_history.values() {
                    batch.remove(tables::ADDRESS_TO_ACCOUNT, &active_key.address().0)?;
                }
            }
            return Ok(());
        }

        batch.put(tables::ACCOUNT, &key, record)?;
        batch.put(tables::ACCOUNT_INDEX, record.name.as_bytes(), &record.id)?;
        for active_key in record.active_key_history.values() {
            batch.put(tables::ADDRESS_TO_ACCOUNT, &active_key.address().0, &record.id)?;
        }
        if record.is_delegate() {
            batch.put(tables::DELEGATE_VOTE_INDEX, &keys::rank_key(record), &record.id)?;
        }
        Ok(())
    }

    fn write_asset(&self, batch: &mut WriteBatch<'_>, record: &AssetRecord) -> Result<(), StoreError> {
        let key = keys::u64_key(record.id);
        let old: Option<AssetRecord> = batch.get(tables::ASSET, &key)?;

        if let Some(old) = &old {
            if old.symbol != record.symbol {
                batch.remove(tables::SYMBOL_INDEX, old.symbol.as_bytes())?;
            }
        }
        if record.is_null() {
            if let Some(old) = &old {
                batch.remove(tables::ASSET, &key)?;
                batch.remove(tables::SYMBOL_INDEX, old.symbol.as_bytes())?;
            }
            return Ok(());
        }
        batch.put(tables::ASSET, &key, record)?;
        batch.put(tables::SYMBOL_INDEX, record.symbol.as_bytes(), &record.id)?;
        Ok(())
    }

    fn write_order(
        batch: &mut WriteBatch<'_>,
        table: tables::Table,
        key: &MarketIndexKey,
        record: &OrderRecord,
    ) -> Result<(), StoreError> {
        let key_bytes = keys::market_key(key);
        if record.is_null() {
            batch.remove(table, &key_bytes)
        } else {
            batch.put(table, &key_bytes, record)
        }
    }

    // ---- block & undo rows ----------------------------------------------

    /// Persists a block under its id (any fork).
    pub fn put_block(&self, id: &BlockId, block: &FullBlock) -> Result<(), StoreError> {
        self.db.put(tables::BLOCK_ID_TO_BLOCK, &id.0, block)
    }

    /// Fetches a block by id.
    pub fn get_block(&self, id: &BlockId) -> Result<Option<FullBlock>, StoreError> {
        self.db.get(tables::BLOCK_ID_TO_BLOCK, &id.0)
    }

    /// Whether a block with this id has ever been stored.
    pub fn is_known_block(&self, id: &BlockId) -> Result<bool, StoreError> {
        self.db.contains(tables::BLOCK_ID_TO_BLOCK, &id.0)
    }

    /// All known block ids at a height, across every fork.
    pub fn blocks_at_number(&self, block_num: u64) -> Result<Vec<BlockId>, StoreError> {
        Ok(self
            .db
            .get(tables::FORK_NUMBER, &keys::u64_key(block_num))?
            .unwrap_or_default())
    }

    /// Replaces the fork bucket at a height.
    pub fn put_blocks_at_number(&self, block_num: u64, ids: &Vec<BlockId>) -> Result<(), StoreError> {
        self.db.put(tables::FORK_NUMBER, &keys::u64_key(block_num), ids)
    }

    /// The canonical block id at a height, if that height is on the best chain.
    pub fn block_id_for_num(&self, block_num: u64) -> Result<Option<BlockId>, StoreError> {
        self.db.get(tables::BLOCK_NUM_TO_ID, &keys::u64_key(block_num))
    }

    /// The highest committed canonical entry, used to recover the head on open.
    pub fn last_block_num_entry(&self) -> Result<Option<(u64, BlockId)>, StoreError> {
        let entry = self.db.last::<BlockId>(tables::BLOCK_NUM_TO_ID)?;
        Ok(entry.and_then(|(key, id)| {
            let raw: [u8; 8] = key.as_slice().try_into().ok()?;
            Some((u64::from_be_bytes(raw), id))
        }))
    }

    /// Fetches the undo snapshot persisted for a block.
    pub fn get_undo_state(&self, id: &BlockId) -> Result<Option<PendingDelta>, StoreError> {
        self.db.get(tables::UNDO_STATE, &id.0)
    }

    /// Fetches a fork node.
    pub fn get_fork_data(&self, id: &BlockId) -> Result<Option<BlockForkData>, StoreError> {
        self.db.get(tables::FORK, &id.0)
    }

    /// Stores a fork node.
    pub fn put_fork_data(&self, id: &BlockId, data: &BlockForkData) -> Result<(), StoreError> {
        self.db.put(tables::FORK, &id.0, data)
    }

    // ---- pending pool rows ----------------------------------------------

    /// Persists a raw pending transaction under its id.
    pub fn put_pending_transaction(
        &self,
        id: &TransactionId,
        trx: &SignedTransaction,
    ) -> Result<(), StoreError> {
        self.db.put(tables::PENDING_TRANSACTION, &id.0, trx)
    }

    /// Whether a pending transaction with this id is persisted.
    pub fn has_pending_transaction(&self, id: &TransactionId) -> Result<bool, StoreError> {
        self.db.contains(tables::PENDING_TRANSACTION, &id.0)
    }

    /// Every persisted pending transaction, in id order.
    pub fn pending_transactions(&self) -> Result<Vec<SignedTransaction>, StoreError> {
        let mut cursor = self.db.lower_bound(tables::PENDING_TRANSACTION, &[])?;
        let mut out = Vec::new();
        while cursor.is_valid() {
            if let Some(trx) = cursor.value::<SignedTransaction>()? {
                out.push(trx);
            }
            cursor.next()?;
        }
        Ok(out)
    }

    // ---- range reads -----------------------------------------------------

    /// The top delegates by `(net votes desc, id asc)`, skipping `first`.
    pub fn delegates_by_vote(&self, first: usize, count: usize) -> Result<Vec<AccountId>, StoreError> {
        let mut cursor = self.db.lower_bound(tables::DELEGATE_VOTE_INDEX, &[])?;
        let mut out = Vec::new();
        let mut position = 0usize;
        while cursor.is_valid() && out.len() < count {
            if position >= first {
                if let Some(id) = cursor.value::<AccountId>()? {
                    out.push(id);
                }
            }
            position += 1;
            cursor.next()?;
        }
        Ok(out)
    }

    /// Accounts in name order starting at `first`.
    pub fn accounts_from(&self, first: &str, count: usize) -> Result<Vec<AccountRecord>, StoreError> {
        let mut cursor = self.db.lower_bound(tables::ACCOUNT_INDEX, first.as_bytes())?;
        let mut out = Vec::new();
        while cursor.is_valid() && out.len() < count {
            if let Some(id) = cursor.value::<AccountId>()? {
                if let Some(record) = self.get_account(id)? {
                    out.push(record);
                }
            }
            cursor.next()?;
        }
        Ok(out)
    }

    /// Assets in symbol order starting at `first_symbol`.
    pub fn assets_from(&self, first_symbol: &str, count: usize) -> Result<Vec<AssetRecord>, StoreError> {
        let mut cursor = self.db.lower_bound(tables::SYMBOL_INDEX, first_symbol.as_bytes())?;
        let mut out = Vec::new();
        while cursor.is_valid() && out.len() < count {
            if let Some(id) = cursor.value::<AssetId>()? {
                if let Some(record) = self.get_asset(id)? {
                    out.push(record);
                }
            }
            cursor.next()?;
        }
        Ok(out)
    }

    /// Proposals in id order starting at `first`.
    pub fn proposals_from(&self, first: ProposalId, count: usize) -> Result<Vec<ProposalRecord>, StoreError> {
        let mut cursor = self.db.lower_bound(tables::PROPOSAL, &keys::u64_key(first))?;
        let mut out = Vec::new();
        while cursor.is_valid() && out.len() < count {
            if let Some(record) = cursor.value::<ProposalRecord>()? {
                out.push(record);
            }
            cursor.next()?;
        }
        Ok(out)
    }

    /// Every vote recorded for one proposal.
    pub fn proposal_votes_for(&self, proposal_id: ProposalId) -> Result<Vec<ProposalVote>, StoreError> {
        let start = keys::proposal_vote_key(&ProposalVoteId {
            proposal_id,
            delegate_id: 0,
        });
        let mut cursor = self.db.lower_bound(tables::PROPOSAL_VOTE, &start)?;
        let mut out = Vec::new();
        while cursor.is_valid() {
            let in_range = cursor
                .key()
                .and_then(|k| k.get(..8))
                .map(|prefix| prefix == proposal_id.to_be_bytes().as_slice())
                .unwrap_or(false);
            if !in_range {
                break;
            }
            if let Some(vote) = cursor.value::<ProposalVote>()? {
                out.push(vote);
            }
            cursor.next()?;
        }
        Ok(out)
    }

    /// Visits every account record in id order.
    pub fn scan_accounts(
        &self,
        mut callback: impl FnMut(&AccountRecord),
    ) -> Result<(), StoreError> {
        let mut cursor = self.db.lower_bound(tables::ACCOUNT, &[])?;
        while cursor.is_valid() {
            if let Some(record) = cursor.value::<AccountRecord>()? {
                callback(&record);
            }
            cursor.next()?;
        }
        Ok(())
    }

    /// Visits every balance record in id order.
    pub fn scan_balances(
        &self,
        mut callback: impl FnMut(&BalanceRecord),
    ) -> Result<(), StoreError> {
        let mut cursor = self.db.lower_bound(tables::BALANCE, &[])?;
        while cursor.is_valid() {
            if let Some(record) = cursor.value::<BalanceRecord>()? {
                callback(&record);
            }
            cursor.next()?;
        }
        Ok(())
    }

    /// Visits every asset record in id order.
    pub fn scan_assets(&self, mut callback: impl FnMut(&AssetRecord)) -> Result<(), StoreError> {
        let mut cursor = self.db.lower_bound(tables::ASSET, &[])?;
        while cursor.is_valid() {
            if let Some(record) = cursor.value::<AssetRecord>()? {
                callback(&record);
            }
            cursor.next()?;
        }
        Ok(())
    }

    /// Visits every fork node, in id order.
    pub fn scan_fork_nodes(
        &self,
        mut callback: impl FnMut(&BlockId, &BlockForkData),
    ) -> Result<(), StoreError> {
        let mut cursor = self.db.lower_bound(tables::FORK, &[])?;
        while cursor.is_valid() {
            let id = cursor.key().and_then(|k| {
                let raw: [u8; 20] = k.try_into().ok()?;
                Some(meridian_types::crypto::Digest160(raw))
            });
            if let (Some(id), Some(data)) = (id, cursor.value::<BlockForkData>()?) {
                callback(&id, &data);
            }
            cursor.next()?;
        }
        Ok(())
    }
}

impl StateReader for ChainStore {
    fn get_property(&self, property: ChainProperty) -> Result<Option<PropertyValue>, StoreError> {
        self.db.get(tables::PROPERTY, &keys::property_key(property))
    }

    fn get_account(&self, id: AccountId) -> Result<Option<AccountRecord>, StoreError> {
        self.db.get(tables::ACCOUNT, &keys::u64_key(id))
    }

    fn get_asset(&self, id: AssetId) -> Result<Option<AssetRecord>, StoreError> {
        self.db.get(tables::ASSET, &keys::u64_key(id))
    }

    fn get_balance(&self, id: &BalanceId) -> Result<Option<BalanceRecord>, StoreError> {
        self.db.get(tables::BALANCE, &id.0)
    }

    fn get_ask(&self, key: &MarketIndexKey) -> Result<Option<OrderRecord>, StoreError> {
        self.db.get(tables::ASK, &keys::market_key(key))
    }

    fn get_bid(&self, key: &MarketIndexKey) -> Result<Option<OrderRecord>, StoreError> {
        self.db.get(tables::BID, &keys::market_key(key))
    }

    fn get_short(&self, key: &MarketIndexKey) -> Result<Option<OrderRecord>, StoreError> {
        self.db.get(tables::SHORT, &keys::market_key(key))
    }

    fn get_collateral(&self, key: &MarketIndexKey) -> Result<Option<CollateralRecord>, StoreError> {
        self.db.get(tables::COLLATERAL, &keys::market_key(key))
    }

    fn get_proposal(&self, id: ProposalId) -> Result<Option<ProposalRecord>, StoreError> {
        self.db.get(tables::PROPOSAL, &keys::u64_key(id))
    }

    fn get_proposal_vote(&self, id: &ProposalVoteId) -> Result<Option<ProposalVote>, StoreError> {
        self.db.get(tables::PROPOSAL_VOTE, &keys::proposal_vote_key(id))
    }

    fn get_transaction_location(
        &self,
        id: &TransactionId,
    ) -> Result<Option<TransactionLocation>, StoreError> {
        self.db.get(tables::PROCESSED_TRANSACTION_ID, &id.0)
    }

    fn account_id_by_name(&self, name: &str) -> Result<Option<AccountId>, StoreError> {
        self.db.get(tables::ACCOUNT_INDEX, name.as_bytes())
    }

    fn account_id_by_address(&self, address: &Address) -> Result<Option<AccountId>, StoreError> {
        self.db.get(tables::ADDRESS_TO_ACCOUNT, &address.0)
    }

    fn asset_id_by_symbol(&self, symbol: &str) -> Result<Option<AssetId>, StoreError> {
        self.db.get(tables::SYMBOL_INDEX, symbol.as_bytes())
    }
}
