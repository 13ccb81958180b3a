// Path: crates/chain/src/state/mod.rs

//! Chain state access: the committed store and the pending overlay.
//!
//! [`StateReader`] is the read interface shared by the committed store and any
//! overlay stacked on top of it. Overlays own their parent as an immutable
//! handle for their lifetime, which breaks the cyclic dependency between the
//! database and its pending states.

pub mod pending;
pub mod store;

pub use pending::{PendingDelta, PendingState};
pub use store::ChainStore;

use meridian_types::crypto::{Address, BalanceId, ChainId, Digest160, TransactionId};
use meridian_types::error::{ChainError, StoreError};
use meridian_types::records::{
    AccountId, AccountRecord, AssetId, AssetRecord, BalanceRecord, ChainProperty, CollateralRecord,
    MarketIndexKey, OrderRecord, PropertyValue, ProposalId, ProposalRecord, ProposalVote,
    ProposalVoteId, TransactionLocation,
};

/// Read access to a chain state: the committed store or any pending overlay.
///
/// Reads through an overlay resolve own overrides first, then the parent.
pub trait StateReader {
    /// Reads a chain property.
    fn get_property(&self, property: ChainProperty) -> Result<Option<PropertyValue>, StoreError>;
    /// Reads an account record by id.
    fn get_account(&self, id: AccountId) -> Result<Option<AccountRecord>, StoreError>;
    /// Reads an asset record by id.
    fn get_asset(&self, id: AssetId) -> Result<Option<AssetRecord>, StoreError>;
    /// Reads a balance record by id.
    fn get_balance(&self, id: &BalanceId) -> Result<Option<BalanceRecord>, StoreError>;
    /// Reads an ask order.
    fn get_ask(&self, key: &MarketIndexKey) -> Result<Option<OrderRecord>, StoreError>;
    /// Reads a bid order.
    fn get_bid(&self, key: &MarketIndexKey) -> Result<Option<OrderRecord>, StoreError>;
    /// Reads a short order.
    fn get_short(&self, key: &MarketIndexKey) -> Result<Option<OrderRecord>, StoreError>;
    /// Reads a collateral record.
    fn get_collateral(&self, key: &MarketIndexKey) -> Result<Option<CollateralRecord>, StoreError>;
    /// Reads a proposal record by id.
    fn get_proposal(&self, id: ProposalId) -> Result<Option<ProposalRecord>, StoreError>;
    /// Reads a proposal vote by its composite id.
    fn get_proposal_vote(&self, id: &ProposalVoteId) -> Result<Option<ProposalVote>, StoreError>;
    /// Reads the canonical-chain location of a processed transaction.
    fn get_transaction_location(
        &self,
        id: &TransactionId,
    ) -> Result<Option<TransactionLocation>, StoreError>;
    /// Resolves an account name to its id.
    fn account_id_by_name(&self, name: &str) -> Result<Option<AccountId>, StoreError>;
    /// Resolves an address to the account holding it as a historical active key.
    fn account_id_by_address(&self, address: &Address) -> Result<Option<AccountId>, StoreError>;
    /// Resolves an asset symbol to its id.
    fn asset_id_by_symbol(&self, symbol: &str) -> Result<Option<AssetId>, StoreError>;

    /// The chain id property. Missing after genesis means corruption.
    fn chain_id(&self) -> Result<ChainId, ChainError> {
        self.get_property(ChainProperty::ChainId)?
            .and_then(|v| v.as_digest256())
            .ok_or_else(|| ChainError::Corruption("missing chain id property".into()))
    }

    /// The chain-wide random seed.
    fn current_random_seed(&self) -> Result<Digest160, ChainError> {
        self.get_property(ChainProperty::LastRandomSeed)?
            .and_then(|v| v.as_digest160())
            .ok_or_else(|| ChainError::Corruption("missing random seed property".into()))
    }

    /// The current active delegate list, in slot order.
    fn active_delegate_list(&self) -> Result<Vec<AccountId>, ChainError> {
        self.get_property(ChainProperty::ActiveDelegateList)?
            .and_then(|v| v.as_account_list().map(<[AccountId]>::to_vec))
            .ok_or_else(|| ChainError::Corruption("missing active delegate list".into()))
    }

    /// The highest account id issued so far.
    fn last_account_id(&self) -> Result<u64, ChainError> {
        self.get_property(ChainProperty::LastAccountId)?
            .and_then(|v| v.as_u64())
            .ok_or_else(|| ChainError::Corruption("missing last account id".into()))
    }

    /// The highest asset id issued so far.
    fn last_asset_id(&self) -> Result<u64, ChainError> {
        self.get_property(ChainProperty::LastAssetId)?
            .and_then(|v| v.as_u64())
            .ok_or_else(|| ChainError::Corruption("missing last asset id".into()))
    }

    /// The highest proposal id issued so far.
    fn last_proposal_id(&self) -> Result<u64, ChainError> {
        self.get_property(ChainProperty::LastProposalId)?
            .and_then(|v| v.as_u64())
            .ok_or_else(|| ChainError::Corruption("missing last proposal id".into()))
    }

    /// The timestamp of the genesis state.
    fn genesis_timestamp(&self) -> Result<u64, ChainError> {
        self.get_property(ChainProperty::GenesisTimestamp)?
            .and_then(|v| v.as_u64())
            .ok_or_else(|| ChainError::Corruption("missing genesis timestamp".into()))
    }
}
