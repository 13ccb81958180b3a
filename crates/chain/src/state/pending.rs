// Path: crates/chain/src/state/pending.rs

//! The copy-on-write pending state overlay and its undo machinery.
//!
//! A [`PendingState`] layers a [`PendingDelta`] of typed overrides over a
//! parent [`StateReader`]. Reads resolve own overrides first; writes go to the
//! overrides only. Record overrides use each record family's null form as the
//! tombstone; property and transaction-location overrides use `None`.
//!
//! The delta is an absolute value map, so flattening it twice yields the same
//! final state as flattening once, and the inverse delta produced by
//! [`PendingState::compute_undo`] restores the parent exactly.

use crate::state::StateReader;
use meridian_types::crypto::{Address, BalanceId, TransactionId};
use meridian_types::error::StoreError;
use meridian_types::records::{
    AccountId, AccountRecord, AssetId, AssetRecord, BalanceRecord, ChainProperty, CollateralRecord,
    MarketIndexKey, OrderRecord, PropertyValue, ProposalId, ProposalRecord, ProposalVote,
    ProposalVoteId, TransactionLocation,
};
use parity_scale_codec::{Decode, Encode};
use std::collections::BTreeMap;

/// The complete set of overrides captured by one overlay.
///
/// Also the persisted undo-snapshot format: the undo of a block is simply the
/// delta that restores the pre-block values of every key the block touched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct PendingDelta {
    /// Property overrides; `None` removes the property.
    pub properties: BTreeMap<ChainProperty, Option<PropertyValue>>,
    /// Account overrides; null records are tombstones.
    pub accounts: BTreeMap<AccountId, AccountRecord>,
    /// Asset overrides; null records are tombstones.
    pub assets: BTreeMap<AssetId, AssetRecord>,
    /// Balance overrides; null records are tombstones.
    pub balances: BTreeMap<BalanceId, BalanceRecord>,
    /// Ask order overrides.
    pub asks: BTreeMap<MarketIndexKey, OrderRecord>,
    /// Bid order overrides.
    pub bids: BTreeMap<MarketIndexKey, OrderRecord>,
    /// Short order overrides.
    pub shorts: BTreeMap<MarketIndexKey, OrderRecord>,
    /// Collateral overrides.
    pub collateral: BTreeMap<MarketIndexKey, CollateralRecord>,
    /// Proposal overrides; null records are tombstones.
    pub proposals: BTreeMap<ProposalId, ProposalRecord>,
    /// Proposal vote overrides; null records are tombstones.
    pub proposal_votes: BTreeMap<ProposalVoteId, ProposalVote>,
    /// Transaction-location overrides; `None` removes the row.
    pub transaction_locations: BTreeMap<TransactionId, Option<TransactionLocation>>,
}

impl PendingDelta {
    /// Whether this delta carries no overrides at all.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
            && self.accounts.is_empty()
            && self.assets.is_empty()
            && self.balances.is_empty()
            && self.asks.is_empty()
            && self.bids.is_empty()
            && self.shorts.is_empty()
            && self.collateral.is_empty()
            && self.proposals.is_empty()
            && self.proposal_votes.is_empty()
            && self.transaction_locations.is_empty()
    }

    /// Merges `other` into `self`; `other`'s overrides win on conflict.
    pub fn merge(&mut self, other: PendingDelta) {
        self.properties.extend(other.properties);
        self.accounts.extend(other.accounts);
        self.assets.extend(other.assets);
        self.balances.extend(other.balances);
        self.asks.extend(other.asks);
        self.bids.extend(other.bids);
        self.shorts.extend(other.shorts);
        self.collateral.extend(other.collateral);
        self.proposals.extend(other.proposals);
        self.proposal_votes.extend(other.proposal_votes);
        self.transaction_locations.extend(other.transaction_locations);
    }
}

/// A copy-on-write view layered over a parent state.
pub struct PendingState<'a> {
    prev: &'a dyn StateReader,
    delta: PendingDelta,
}

impl<'a> PendingState<'a> {
    /// Creates an empty overlay over `prev`.
    pub fn new(prev: &'a dyn StateReader) -> Self {
        PendingState {
            prev,
            delta: PendingDelta::default(),
        }
    }

    /// Stores an account record; a null record tombstones the account.
    pub fn store_account(&mut self, record: AccountRecord) {
        self.delta.accounts.insert(record.id, record);
    }

    /// Stores an asset record; a null record tombstones the asset.
    pub fn store_asset(&mut self, record: AssetRecord) {
        self.delta.assets.insert(record.id, record);
    }

    /// Stores a balance record; a null record tombstones the balance.
    pub fn store_balance(&mut self, record: BalanceRecord) {
        self.delta.balances.insert(record.id(), record);
    }

    /// Stores an ask order under its market key.
    pub fn store_ask(&mut self, key: MarketIndexKey, record: OrderRecord) {
        self.delta.asks.insert(key, record);
    }

    /// Stores a bid order under its market key.
    pub fn store_bid(&mut self, key: MarketIndexKey, record: OrderRecord) {
        self.delta.bids.insert(key, record);
    }

    /// Stores a short order under its market key.
    pub fn store_short(&mut self, key: MarketIndexKey, record: OrderRecord) {
        self.delta.shorts.insert(key, record);
    }

    /// Stores a collateral record under its market key.
    pub fn store_collateral(&mut self, key: MarketIndexKey, record: CollateralRecord) {
        self.delta.collateral.insert(key, record);
    }

    /// Stores a proposal record.
    pub fn store_proposal(&mut self, record: ProposalRecord) {
        self.delta.proposals.insert(record.id, record);
    }

    /// Stores a proposal vote.
    pub fn store_proposal_vote(&mut self, record: ProposalVote) {
        self.delta.proposal_votes.insert(record.id, record);
    }

    /// Sets a chain property.
    pub fn set_property(&mut self, property: ChainProperty, value: PropertyValue) {
        self.delta.properties.insert(property, Some(value));
    }

    /// Records where a transaction landed on the canonical chain.
    pub fn store_transaction_location(&mut self, id: TransactionId, location: TransactionLocation) {
        self.delta.transaction_locations.insert(id, Some(location));
    }

    /// Borrows the accumulated overrides.
    pub fn delta(&self) -> &PendingDelta {
        &self.delta
    }

    /// Consumes the overlay, releasing the borrow on its parent.
    pub fn into_delta(self) -> PendingDelta {
        self.delta
    }

    /// Flattens a child overlay's delta into this overlay. Idempotent: the
    /// delta is an absolute value map.
    pub fn absorb(&mut self, child: PendingDelta) {
        self.delta.merge(child);
    }

    /// Builds the inverse delta: for every key this overlay touched, the value
    /// the parent held before the mutation, or the key's tombstone if the
    /// parent had none. Applying the result to the flattened parent restores
    /// the parent's original state.
    pub fn compute_undo(&self) -> Result<PendingDelta, StoreError> {
        let mut undo = PendingDelta::default();
        for property in self.delta.properties.keys() {
            undo.properties
                .insert(*property, self.prev.get_property(*property)?);
        }
        for id in self.delta.accounts.keys() {
            let old = self
                .prev
                .get_account(*id)?
                .unwrap_or_else(|| AccountRecord::null(*id));
            undo.accounts.insert(*id, old);
        }
        for id in self.delta.assets.keys() {
            let old = self
                .prev
                .get_asset(*id)?
                .unwrap_or_else(|| AssetRecord::null(*id));
            undo.assets.insert(*id, old);
        }
        for (id, record) in &self.delta.balances {
            let old = self.prev.get_balance(id)?.unwrap_or(BalanceRecord {
                condition: record.condition,
                balance: 0,
            });
            undo.balances.insert(*id, old);
        }
        for key in self.delta.asks.keys() {
            undo.asks
                .insert(*key, self.prev.get_ask(key)?.unwrap_or_default());
        }
        for key in self.delta.bids.keys() {
            undo.bids
                .insert(*key, self.prev.get_bid(key)?.unwrap_or_default());
        }
        for key in self.delta.shorts.keys() {
            undo.shorts
                .insert(*key, self.prev.get_short(key)?.unwrap_or_default());
        }
        for key in self.delta.collateral.keys() {
            undo.collateral
                .insert(*key, self.prev.get_collateral(key)?.unwrap_or_default());
        }
        for id in self.delta.proposals.keys() {
            let old = self
                .prev
                .get_proposal(*id)?
                .unwrap_or_else(|| ProposalRecord::null(*id));
            undo.proposals.insert(*id, old);
        }
        for id in self.delta.proposal_votes.keys() {
            let old = self
                .prev
                .get_proposal_vote(id)?
                .unwrap_or_else(|| ProposalVote::null(*id));
            undo.proposal_votes.insert(*id, old);
        }
        for id in self.delta.transaction_locations.keys() {
            undo.transaction_locations
                .insert(*id, self.prev.get_transaction_location(id)?);
        }
        Ok(undo)
    }
}

fn resolve<T: Clone>(record: Option<&T>, is_null: impl Fn(&T) -> bool) -> Option<Option<T>> {
    record.map(|r| if is_null(r) { None } else { Some(r.clone()) })
}

impl<'a> StateReader for PendingState<'a> {
    fn get_property(&self, property: ChainProperty) -> Result<Option<PropertyValue>, StoreError> {
        match self.delta.properties.get(&property) {
            Some(value) => Ok(value.clone()),
            None => self.prev.get_property(property),
        }
    }

    fn get_account(&self, id: AccountId) -> Result<Option<AccountRecord>, StoreError> {
        match resolve(self.delta.accounts.get(&id), AccountRecord::is_null) {
            Some(resolved) => Ok(resolved),
            None => self.prev.get_account(id),
        }
    }

    fn get_asset(&self, id: AssetId) -> Result<Option<AssetRecord>, StoreError> {
        match resolve(self.delta.assets.get(&id), AssetRecord::is_null) {
            Some(resolved) => Ok(resolved),
            None => self.prev.get_asset(id),
        }
    }

    fn get_balance(&self, id: &BalanceId) -> Result<Option<BalanceRecord>, StoreError> {
        match resolve(self.delta.balances.get(id), BalanceRecord::is_null) {
            Some(resolved) => Ok(resolved),
            None => self.prev.get_balance(id),
        }
    }

    fn get_ask(&self, key: &MarketIndexKey) -> Result<Option<OrderRecord>, StoreError> {
        match resolve(self.delta.asks.get(key), OrderRecord::is_null) {
            Some(resolved) => Ok(resolved),
            None => self.prev.get_ask(key),
        }
    }

    fn get_bid(&self, key: &MarketIndexKey) -> Result<Option<OrderRecord>, StoreError> {
        match resolve(self.delta.bids.get(key), OrderRecord::is_null) {
            Some(resolved) => Ok(resolved),
            None => self.prev.get_bid(key),
        }
    }

    fn get_short(&self, key: &MarketIndexKey) -> Result<Option<OrderRecord>, StoreError> {
        match resolve(self.delta.shorts.get(key), OrderRecord::is_null) {
            Some(resolved) => Ok(resolved),
            None => self.prev.get_short(key),
        }
    }

    fn get_collateral(&self, key: &MarketIndexKey) -> Result<Option<CollateralRecord>, StoreError> {
        match resolve(self.delta.collateral.get(key), CollateralRecord::is_null) {
            Some(resolved) => Ok(resolved),
            None => self.prev.get_collateral(key),
        }
    }

    fn get_proposal(&self, id: ProposalId) -> Result<Option<ProposalRecord>, StoreError> {
        match resolve(self.delta.proposals.get(&id), ProposalRecord::is_null) {
            Some(resolved) => Ok(resolved),
            None => self.prev.get_proposal(id),
        }
    }

    fn get_proposal_vote(&self, id: &ProposalVoteId) -> Result<Option<ProposalVote>, StoreError> {
        match resolve(self.delta.proposal_votes.get(id), ProposalVote::is_null) {
            Some(resolved) => Ok(resolved),
            None => self.prev.get_proposal_vote(id),
        }
    }

    fn get_transaction_location(
        &self,
        id: &TransactionId,
    ) -> Result<Option<TransactionLocation>, StoreError> {
        match self.delta.transaction_locations.get(id) {
            Some(location) => Ok(*location),
            None => self.prev.get_transaction_location(id),
        }
    }

    fn account_id_by_name(&self, name: &str) -> Result<Option<AccountId>, StoreError> {
        for (id, record) in &self.delta.accounts {
            if !record.is_null() && record.name == name {
                return Ok(Some(*id));
            }
        }
        match self.prev.account_id_by_name(name)? {
            Some(id) => match self.delta.accounts.get(&id) {
                Some(record) if record.is_null() => Ok(None),
                _ => Ok(Some(id)),
            },
            None => Ok(None),
        }
    }

    fn account_id_by_address(&self, address: &Address) -> Result<Option<AccountId>, StoreError> {
        for (id, record) in &self.delta.accounts {
            if !record.is_null()
                && record
                    .active_key_history
                    .values()
                    .any(|key| key.address() == *address)
            {
                return Ok(Some(*id));
            }
        }
        match self.prev.account_id_by_address(address)? {
            Some(id) => match self.delta.accounts.get(&id) {
                Some(record) if record.is_null() => Ok(None),
                _ => Ok(Some(id)),
            },
            None => Ok(None),
        }
    }

    fn asset_id_by_symbol(&self, symbol: &str) -> Result<Option<AssetId>, StoreError> {
        for (id, record) in &self.delta.assets {
            if !record.is_null() && record.symbol == symbol {
                return Ok(Some(*id));
            }
        }
        match self.prev.asset_id_by_symbol(symbol)? {
            Some(id) => match self.delta.assets.get(&id) {
                Some(record) if record.is_null() => Ok(None),
                _ => Ok(Some(id)),
            },
            None => Ok(None),
        }
    }
}
