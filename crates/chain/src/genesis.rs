// Path: crates/chain/src/genesis.rs

//! Genesis bootstrap.
//!
//! Builds the initial state through one pending overlay and commits it as a
//! single batch: the root account, the named accounts (delegates flagged),
//! the initial balances with round-robin vote slates, the base asset, the
//! sentinel fork node and the initial properties.

use crate::fork::{BlockForkData, GENESIS_SENTINEL};
use crate::state::{ChainStore, PendingState, StateReader};
use meridian_types::constants::{
    ADDRESS_PREFIX, BLOCK_INTERVAL_SEC, INITIAL_SHARES, N_DELEGATES,
};
use meridian_types::crypto::Digest160;
use meridian_types::error::ChainError;
use meridian_types::genesis::GenesisConfig;
use meridian_types::records::{
    AccountId, AccountRecord, AssetRecord, BalanceRecord, ChainProperty, DelegateStats,
    PropertyValue, VoteRank, WithdrawCondition,
};

/// Initializes an empty store from a genesis configuration.
pub fn initialize_genesis(store: &ChainStore, config: &GenesisConfig) -> Result<(), ChainError> {
    if config.timestamp % BLOCK_INTERVAL_SEC != 0 {
        return Err(ChainError::InvalidArgument(format!(
            "genesis timestamp {} is not slot-aligned",
            config.timestamp
        )));
    }
    let delegate_count = config.names.iter().filter(|n| n.is_delegate).count() as u64;
    if delegate_count < N_DELEGATES {
        return Err(ChainError::InvalidArgument(format!(
            "genesis provides {} delegates, {} required",
            delegate_count, N_DELEGATES
        )));
    }
    let total = config.total_allocation();
    if total <= 0 || total > INITIAL_SHARES {
        return Err(ChainError::InvalidArgument(format!(
            "genesis allocates {} shares, cap is {}",
            total, INITIAL_SHARES
        )));
    }

    let mut pending = PendingState::new(store);

    pending.set_property(
        ChainProperty::ChainId,
        PropertyValue::Digest256(config.chain_id()),
    );

    // The root account issues the base asset and owns nothing else.
    pending.store_account(AccountRecord {
        id: 0,
        name: "genesis".into(),
        registration_date: config.timestamp,
        last_update: config.timestamp,
        ..Default::default()
    });

    let mut delegate_ids: Vec<AccountId> = Vec::new();
    for (index, name) in config.names.iter().enumerate() {
        let id = index as AccountId + 1;
        let mut record = AccountRecord {
            id,
            name: name.name.clone(),
            owner_key: name.owner,
            registration_date: config.timestamp,
            last_update: config.timestamp,
            delegate_info: name.is_delegate.then(DelegateStats::default),
            ..Default::default()
        };
        record.set_active_key(config.timestamp, name.owner);
        if name.is_delegate {
            delegate_ids.push(id);
        }
        pending.store_account(record);
    }

    // Every allocation votes for one delegate, assigned round-robin, so the
    // vote tallies cover the full supply from the first block on.
    for (index, allocation) in config.balances.iter().enumerate() {
        if allocation.amount <= 0 {
            return Err(ChainError::InvalidArgument(format!(
                "genesis allocation for {} must be positive",
                allocation.owner
            )));
        }
        let slate = delegate_ids[index % delegate_ids.len()] as i64;
        let condition = WithdrawCondition {
            owner: allocation.owner,
            asset_id: 0,
            delegate_slate: slate,
        };
        let template = BalanceRecord {
            condition,
            balance: 0,
        };
        let mut balance = pending.get_balance(&template.id())?.unwrap_or(template);
        balance.balance += allocation.amount;
        pending.store_balance(balance);

        let delegate_id = slate as AccountId;
        let mut delegate = pending
            .get_account(delegate_id)?
            .ok_or_else(|| ChainError::Corruption(format!("missing delegate {}", delegate_id)))?;
        if let Some(stats) = delegate.delegate_info.as_mut() {
            stats.votes_for += allocation.amount;
        }
        pending.store_account(delegate);
    }

    pending.store_asset(AssetRecord {
        id: 0,
        symbol: ADDRESS_PREFIX.into(),
        name: "Meridian core shares".into(),
        description: "Shares in the Meridian ledger".into(),
        issuer_account_id: 0,
        current_share_supply: total,
        maximum_share_supply: INITIAL_SHARES,
        collected_fees: 0,
    });

    // The initial active list is the plain vote ranking; the first rotation
    // applies the shuffle.
    let mut ranked: Vec<AccountId> = delegate_ids.clone();
    ranked.sort_by_key(|id| {
        let votes = pending
            .get_account(*id)
            .ok()
            .flatten()
            .map(|r| r.net_votes())
            .unwrap_or(0);
        VoteRank {
            votes,
            delegate_id: *id,
        }
        .to_index_key()
    });
    ranked.truncate(N_DELEGATES as usize);

    pending.set_property(
        ChainProperty::ActiveDelegateList,
        PropertyValue::AccountList(ranked),
    );
    pending.set_property(ChainProperty::LastAssetId, PropertyValue::U64(0));
    pending.set_property(ChainProperty::LastProposalId, PropertyValue::U64(0));
    pending.set_property(
        ChainProperty::LastAccountId,
        PropertyValue::U64(config.names.len() as u64),
    );
    pending.set_property(
        ChainProperty::LastRandomSeed,
        PropertyValue::Digest160(Digest160::default()),
    );
    pending.set_property(
        ChainProperty::GenesisTimestamp,
        PropertyValue::U64(config.timestamp),
    );

    let delta = pending.into_delta();
    store.apply_delta(&delta)?;

    store.put_fork_data(
        &GENESIS_SENTINEL,
        &BlockForkData {
            is_linked: true,
            is_valid: Some(true),
            is_included: true,
            ..Default::default()
        },
    )?;

    tracing::info!(
        chain_id = %config.chain_id(),
        accounts = config.names.len(),
        delegates = delegate_ids.len(),
        total_shares = total,
        "initialized genesis state"
    );
    Ok(())
}
