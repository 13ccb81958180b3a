// Path: crates/chain/src/db.rs

//! The chain engine.
//!
//! [`ChainDatabase`] is single-writer: every mutating operation runs under the
//! engine's exclusive lock; read accessors share a read guard and observe a
//! consistent committed snapshot. Blocks enter through [`ChainDatabase::push_block`],
//! which either extends the head or drives a fork switch through the undo
//! machinery. No partial block state is ever externally visible: one block's
//! state changes commit as a single storage batch.

use crate::eval::{EvaluationSummary, RegistryEvaluator, TransactionEvaluator};
use crate::fork::{self, BlockForkData, GENESIS_SENTINEL};
use crate::genesis;
use crate::observer::{BlockSummary, ChainObserver};
use crate::pipeline;
use crate::producer;
use crate::state::{ChainStore, PendingState, StateReader};
use meridian_types::block::{BlockHeader, FullBlock, SignedBlockHeader};
use meridian_types::codec;
use meridian_types::constants::{Shares, BLOCK_INTERVAL_SEC, INITIAL_FEE_RATE, N_DELEGATES};
use meridian_types::crypto::{Address, BalanceId, BlockId, ChainId, Digest160, TransactionId};
use meridian_types::error::ChainError;
use meridian_types::genesis::GenesisConfig;
use meridian_types::records::{
    AccountId, AccountRecord, AssetId, AssetRecord, BalanceRecord, CollateralRecord, FeeIndex,
    MarketIndexKey, OrderRecord, ProposalId, ProposalRecord, ProposalVote, TransactionLocation,
};
use meridian_types::transaction::SignedTransaction;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

struct Inner {
    store: ChainStore,
    chain_id: ChainId,
    head: SignedBlockHeader,
    head_id: BlockId,
    pending_fee_index: BTreeMap<FeeIndex, SignedTransaction>,
    evaluator: Box<dyn TransactionEvaluator>,
    observer: Option<Box<dyn ChainObserver>>,
    poisoned: bool,
}

/// The delegated-proof-of-stake chain database.
pub struct ChainDatabase {
    inner: RwLock<Inner>,
}

impl ChainDatabase {
    /// Opens the database under `data_dir`, bootstrapping from `genesis_path`
    /// if the store is empty, and re-admits persisted pending transactions.
    pub fn open(data_dir: &Path, genesis_path: &Path) -> Result<Self, ChainError> {
        let store = ChainStore::open(data_dir)?;
        if store
            .get_property(meridian_types::records::ChainProperty::ChainId)?
            .is_none()
        {
            let config = load_genesis_file(genesis_path)?;
            genesis::initialize_genesis(&store, &config)?;
        }
        let chain_id = store.chain_id()?;
        let (head, head_id) = load_head(&store)?;

        let mut inner = Inner {
            store,
            chain_id,
            head,
            head_id,
            pending_fee_index: BTreeMap::new(),
            evaluator: Box::new(RegistryEvaluator::standard()),
            observer: None,
            poisoned: false,
        };
        inner.reload_pending();
        inner.sanity_check()?;
        tracing::info!(
            chain_id = %inner.chain_id,
            head = %inner.head_id,
            head_num = inner.head.header.block_num,
            "chain database open"
        );
        Ok(ChainDatabase {
            inner: RwLock::new(inner),
        })
    }

    /// Closes the database, flushing nothing: every commit already reached
    /// disk atomically.
    pub fn close(self) {}

    /// Installs the observer notified after commits and pops.
    pub fn set_observer(&self, observer: Box<dyn ChainObserver>) {
        self.inner.write().observer = Some(observer);
    }

    /// Replaces the transaction evaluator (the external collaborator slot).
    pub fn set_evaluator(&self, evaluator: Box<dyn TransactionEvaluator>) {
        self.inner.write().evaluator = evaluator;
    }

    /// Adds a block to the database, extending the head or reorganizing onto
    /// a longer fork as required.
    pub fn push_block(&self, block: FullBlock) -> Result<(), ChainError> {
        self.inner.write().push_block(&block)
    }

    /// Rolls the head block off the canonical chain via its undo snapshot.
    pub fn pop_block(&self) -> Result<(), ChainError> {
        self.inner.write().pop_block()
    }

    /// Rewinds to the common ancestor of `target` and re-extends along the
    /// target's fork. Switching to the current head is a state no-op.
    pub fn switch_to_fork(&self, target: &BlockId) -> Result<(), ChainError> {
        self.inner.write().switch_to_fork(target)
    }

    /// Assembles an unsigned candidate block for `timestamp` from the
    /// fee-ranked pending pool. The caller sets the secret fields and signs.
    pub fn generate_block(&self, timestamp: u64) -> Result<FullBlock, ChainError> {
        let inner = self.inner.write();
        if timestamp % BLOCK_INTERVAL_SEC != 0 {
            return Err(ChainError::InvalidArgument(format!(
                "timestamp {} is not slot-aligned",
                timestamp
            )));
        }
        if timestamp <= inner.head.header.timestamp {
            return Err(ChainError::InvalidArgument(format!(
                "timestamp {} does not advance past head {}",
                timestamp, inner.head.header.timestamp
            )));
        }
        producer::generate_block(
            &inner.store,
            inner.evaluator.as_ref(),
            &inner.head,
            &inner.head_id,
            inner.pending_fee_index.values(),
            timestamp,
        )
    }

    /// Admits a transaction to the pending pool after speculative evaluation
    /// against the committed state. Re-submitting a known id is a no-op
    /// returning `None`.
    pub fn store_pending_transaction(
        &self,
        trx: SignedTransaction,
    ) -> Result<Option<EvaluationSummary>, ChainError> {
        self.inner.write().store_pending_transaction(trx)
    }

    /// The currently valid pending transactions, highest fee first.
    pub fn get_pending_transactions(&self) -> Vec<SignedTransaction> {
        self.inner
            .read()
            .pending_fee_index
            .values()
            .cloned()
            .collect()
    }

    /// Whether the id refers to a pending or an already processed transaction.
    pub fn is_known_transaction(&self, id: &TransactionId) -> Result<bool, ChainError> {
        let inner = self.inner.read();
        Ok(inner.store.has_pending_transaction(id)?
            || inner.store.get_transaction_location(id)?.is_some())
    }

    /// Runs the committed-state invariant audit.
    pub fn sanity_check(&self) -> Result<(), ChainError> {
        self.inner.read().sanity_check()
    }

    /// Writes the fork tree as a graphviz document.
    pub fn export_fork_graph(&self, path: &Path) -> Result<(), ChainError> {
        fork::export_fork_graph(&self.inner.read().store, path)
    }

    // ---- read accessors --------------------------------------------------

    /// The chain id fixed at genesis.
    pub fn chain_id(&self) -> ChainId {
        self.inner.read().chain_id
    }

    /// The head block's timestamp (chain time).
    pub fn now(&self) -> u64 {
        self.inner.read().head.header.timestamp
    }

    /// The fee rate committed at the head, in millishares per byte.
    pub fn get_fee_rate(&self) -> Shares {
        self.inner.read().head.header.fee_rate
    }

    /// The delegate pay rate committed at the head.
    pub fn get_delegate_pay_rate(&self) -> Shares {
        self.inner.read().head.header.delegate_pay_rate
    }

    /// The signed header of the head block.
    pub fn get_head_block(&self) -> SignedBlockHeader {
        self.inner.read().head.clone()
    }

    /// The height of the head block.
    pub fn get_head_block_num(&self) -> u64 {
        self.inner.read().head.header.block_num
    }

    /// The id of the head block.
    pub fn get_head_block_id(&self) -> BlockId {
        self.inner.read().head_id
    }

    /// Whether a block with this id has ever been stored, on any fork.
    pub fn is_known_block(&self, id: &BlockId) -> Result<bool, ChainError> {
        Ok(self.inner.read().store.is_known_block(id)?)
    }

    /// Fetches a block by id from any fork.
    pub fn get_block(&self, id: &BlockId) -> Result<FullBlock, ChainError> {
        self.inner
            .read()
            .store
            .get_block(id)?
            .ok_or_else(|| ChainError::NotFound(format!("block {}", id)))
    }

    /// Fetches the canonical block at a height.
    pub fn get_block_by_num(&self, block_num: u64) -> Result<FullBlock, ChainError> {
        let inner = self.inner.read();
        let id = inner
            .store
            .block_id_for_num(block_num)?
            .ok_or_else(|| ChainError::NotFound(format!("block number {}", block_num)))?;
        inner
            .store
            .get_block(&id)?
            .ok_or_else(|| ChainError::Corruption(format!("canonical block {} missing", id)))
    }

    /// Fetches a block header by id.
    pub fn get_block_header(&self, id: &BlockId) -> Result<SignedBlockHeader, ChainError> {
        Ok(self.get_block(id)?.signed_header())
    }

    /// The height of a known block; the genesis sentinel is height 0.
    pub fn get_block_num(&self, id: &BlockId) -> Result<u64, ChainError> {
        if *id == GENESIS_SENTINEL {
            return Ok(0);
        }
        Ok(self.get_block(id)?.header.block_num)
    }

    /// Fork metadata for a known block id.
    pub fn get_fork_data(&self, id: &BlockId) -> Result<Option<BlockForkData>, ChainError> {
        Ok(self.inner.read().store.get_fork_data(id)?)
    }

    /// The chain-wide random seed committed at the head.
    pub fn get_current_random_seed(&self) -> Result<Digest160, ChainError> {
        self.inner.read().store.current_random_seed()
    }

    /// The active delegate list committed at the head, in slot order.
    pub fn get_active_delegates(&self) -> Result<Vec<AccountId>, ChainError> {
        self.inner.read().store.active_delegate_list()
    }

    /// The delegate scheduled to sign the slot containing `timestamp`.
    pub fn get_signing_delegate_id(&self, timestamp: u64) -> Result<AccountId, ChainError> {
        let inner = self.inner.read();
        let active = inner.store.active_delegate_list()?;
        pipeline::signing_delegate_at(&active, timestamp)
    }

    /// An account record by id.
    pub fn get_account_record(&self, id: AccountId) -> Result<Option<AccountRecord>, ChainError> {
        Ok(self.inner.read().store.get_account(id)?)
    }

    /// An account record by unique name.
    pub fn get_account_record_by_name(
        &self,
        name: &str,
    ) -> Result<Option<AccountRecord>, ChainError> {
        let inner = self.inner.read();
        match inner.store.account_id_by_name(name)? {
            Some(id) => Ok(inner.store.get_account(id)?),
            None => Ok(None),
        }
    }

    /// An account record by one of its historical active-key addresses.
    pub fn get_account_record_by_address(
        &self,
        address: &Address,
    ) -> Result<Option<AccountRecord>, ChainError> {
        let inner = self.inner.read();
        match inner.store.account_id_by_address(address)? {
            Some(id) => Ok(inner.store.get_account(id)?),
            None => Ok(None),
        }
    }

    /// An asset record by id.
    pub fn get_asset_record(&self, id: AssetId) -> Result<Option<AssetRecord>, ChainError> {
        Ok(self.inner.read().store.get_asset(id)?)
    }

    /// An asset record by unique symbol.
    pub fn get_asset_record_by_symbol(
        &self,
        symbol: &str,
    ) -> Result<Option<AssetRecord>, ChainError> {
        let inner = self.inner.read();
        match inner.store.asset_id_by_symbol(symbol)? {
            Some(id) => Ok(inner.store.get_asset(id)?),
            None => Ok(None),
        }
    }

    /// Resolves a symbol to its asset id, failing on unknown symbols.
    pub fn get_asset_id(&self, symbol: &str) -> Result<AssetId, ChainError> {
        self.inner
            .read()
            .store
            .asset_id_by_symbol(symbol)?
            .ok_or_else(|| ChainError::InvalidArgument(format!("unknown asset symbol {}", symbol)))
    }

    /// Whether a symbol names a known asset.
    pub fn is_valid_symbol(&self, symbol: &str) -> Result<bool, ChainError> {
        Ok(self.inner.read().store.asset_id_by_symbol(symbol)?.is_some())
    }

    /// The symbol of a known asset id.
    pub fn get_asset_symbol(&self, id: AssetId) -> Result<String, ChainError> {
        self.get_asset_record(id)?
            .map(|record| record.symbol)
            .ok_or_else(|| ChainError::NotFound(format!("asset {}", id)))
    }

    /// A balance record by id.
    pub fn get_balance_record(&self, id: &BalanceId) -> Result<Option<BalanceRecord>, ChainError> {
        Ok(self.inner.read().store.get_balance(id)?)
    }

    /// An ask order by market key.
    pub fn get_ask_record(&self, key: &MarketIndexKey) -> Result<Option<OrderRecord>, ChainError> {
        Ok(self.inner.read().store.get_ask(key)?)
    }

    /// A bid order by market key.
    pub fn get_bid_record(&self, key: &MarketIndexKey) -> Result<Option<OrderRecord>, ChainError> {
        Ok(self.inner.read().store.get_bid(key)?)
    }

    /// A short order by market key.
    pub fn get_short_record(&self, key: &MarketIndexKey) -> Result<Option<OrderRecord>, ChainError> {
        Ok(self.inner.read().store.get_short(key)?)
    }

    /// A collateral record by market key.
    pub fn get_collateral_record(
        &self,
        key: &MarketIndexKey,
    ) -> Result<Option<CollateralRecord>, ChainError> {
        Ok(self.inner.read().store.get_collateral(key)?)
    }

    /// A proposal record by id.
    pub fn get_proposal_record(
        &self,
        id: ProposalId,
    ) -> Result<Option<ProposalRecord>, ChainError> {
        Ok(self.inner.read().store.get_proposal(id)?)
    }

    /// Proposals in id order starting at `first`.
    pub fn get_proposals(
        &self,
        first: ProposalId,
        count: usize,
    ) -> Result<Vec<ProposalRecord>, ChainError> {
        Ok(self.inner.read().store.proposals_from(first, count)?)
    }

    /// Every recorded vote for one proposal.
    pub fn get_proposal_votes(
        &self,
        proposal_id: ProposalId,
    ) -> Result<Vec<ProposalVote>, ChainError> {
        Ok(self.inner.read().store.proposal_votes_for(proposal_id)?)
    }

    /// Accounts in name order starting at `first`.
    pub fn get_accounts(&self, first: &str, count: usize) -> Result<Vec<AccountRecord>, ChainError> {
        Ok(self.inner.read().store.accounts_from(first, count)?)
    }

    /// Assets in symbol order starting at `first_symbol`.
    pub fn get_assets(
        &self,
        first_symbol: &str,
        count: usize,
    ) -> Result<Vec<AssetRecord>, ChainError> {
        Ok(self.inner.read().store.assets_from(first_symbol, count)?)
    }

    /// The top delegates by `(net votes desc, id asc)`, skipping `first`.
    pub fn get_delegates_by_vote(
        &self,
        first: usize,
        count: usize,
    ) -> Result<Vec<AccountId>, ChainError> {
        Ok(self.inner.read().store.delegates_by_vote(first, count)?)
    }

    /// The delegates projected to be active in the next round.
    pub fn next_round_active_delegates(&self) -> Result<Vec<AccountId>, ChainError> {
        self.get_delegates_by_vote(0, N_DELEGATES as usize)
    }

    /// The canonical-chain location of a processed transaction.
    pub fn get_transaction_location(
        &self,
        id: &TransactionId,
    ) -> Result<Option<TransactionLocation>, ChainError> {
        Ok(self.inner.read().store.get_transaction_location(id)?)
    }

    /// Fetches a processed transaction through its recorded location.
    pub fn get_transaction(
        &self,
        id: &TransactionId,
    ) -> Result<Option<SignedTransaction>, ChainError> {
        let location = match self.get_transaction_location(id)? {
            Some(location) => location,
            None => return Ok(None),
        };
        let block = self.get_block_by_num(location.block_num)?;
        block
            .user_transactions
            .get(location.trx_num as usize)
            .cloned()
            .map(Some)
            .ok_or_else(|| {
                ChainError::Corruption(format!(
                    "transaction {} location points past block {}",
                    id, location.block_num
                ))
            })
    }

    /// Visits every account record.
    pub fn scan_accounts(&self, callback: impl FnMut(&AccountRecord)) -> Result<(), ChainError> {
        Ok(self.inner.read().store.scan_accounts(callback)?)
    }

    /// Visits every balance record.
    pub fn scan_balances(&self, callback: impl FnMut(&BalanceRecord)) -> Result<(), ChainError> {
        Ok(self.inner.read().store.scan_balances(callback)?)
    }

    /// Visits every asset record.
    pub fn scan_assets(&self, callback: impl FnMut(&AssetRecord)) -> Result<(), ChainError> {
        Ok(self.inner.read().store.scan_assets(callback)?)
    }
}

impl Inner {
    fn ensure_not_poisoned(&self) -> Result<(), ChainError> {
        if self.poisoned {
            return Err(ChainError::Corruption(
                "engine is poisoned; close and reopen the database".into(),
            ));
        }
        Ok(())
    }

    fn push_block(&mut self, block: &FullBlock) -> Result<(), ChainError> {
        self.ensure_not_poisoned()?;
        let block_id = block.id();
        let current_head_id = self.head_id;
        let current_head_num = self.head.header.block_num;

        let fork_data = fork::store_and_index(&self.store, &block_id, block)?;

        if block.header.previous == current_head_id {
            return self.extend_chain(block, &block_id);
        }

        if fork_data.can_link() && block.header.block_num > current_head_num {
            tracing::info!(from = %current_head_id, to = %block_id, "attempting fork switch");
            if let Err(error) = self.switch_to_fork(&block_id) {
                tracing::warn!(%error, "fork switch failed, reverting to previous head");
                if let Err(revert_error) = self.switch_to_fork(&current_head_id) {
                    self.poisoned = true;
                    return Err(ChainError::Corruption(format!(
                        "failed to revert to head {} after aborted fork switch: {}",
                        current_head_id, revert_error
                    )));
                }
                return Err(error);
            }
        }
        Ok(())
    }

    fn extend_chain(&mut self, block: &FullBlock, block_id: &BlockId) -> Result<(), ChainError> {
        match self.extend_chain_inner(block, block_id) {
            Ok(summary) => {
                tracing::info!(
                    block = %block_id,
                    block_num = block.header.block_num,
                    transactions = block.user_transactions.len(),
                    "block applied"
                );
                if let Some(observer) = &self.observer {
                    observer.block_applied(&summary);
                }
                Ok(())
            }
            Err(error) => {
                tracing::warn!(block = %block_id, %error, "error applying block");
                if matches!(error, ChainError::Io(_)) {
                    self.poisoned = true;
                } else if let Err(mark_error) = fork::mark_invalid(&self.store, block_id) {
                    tracing::warn!(%mark_error, "failed to mark rejected block invalid");
                }
                Err(error)
            }
        }
    }

    fn extend_chain_inner(
        &mut self,
        block: &FullBlock,
        block_id: &BlockId,
    ) -> Result<BlockSummary, ChainError> {
        pipeline::verify_header(&self.store, &self.head, &self.head_id, block, unix_now())?;

        let store = &self.store;
        let active = store.active_delegate_list()?;
        let mut pending = PendingState::new(store);

        pipeline::update_delegate_production_info(&mut pending, block, &self.head, &active)?;
        pipeline::apply_transactions(
            self.evaluator.as_ref(),
            &mut pending,
            block,
            self.head.header.fee_rate,
        )?;
        pipeline::pay_delegate(&mut pending, block, &active)?;
        pipeline::update_active_delegate_list(store, &mut pending, block)?;
        pipeline::update_random_seed(&mut pending, &block.header.previous_secret)?;

        let undo = pending.compute_undo()?;
        let delta = pending.into_delta();
        let confirmed: Vec<TransactionId> =
            block.user_transactions.iter().map(|t| t.id()).collect();

        self.store
            .commit_block(block_id, block.header.block_num, &delta, &undo, &confirmed)?;
        fork::mark_included(&self.store, block_id, true)?;

        self.head = block.signed_header();
        self.head_id = *block_id;
        self.clear_pending(&confirmed);
        self.sanity_check()?;

        Ok(BlockSummary {
            block: block.clone(),
            applied_changes: delta,
        })
    }

    fn pop_block(&mut self) -> Result<(), ChainError> {
        self.ensure_not_poisoned()?;
        if self.head.header.block_num == 0 {
            return Err(ChainError::InvalidArgument(
                "cannot pop the genesis state".into(),
            ));
        }
        let head_id = self.head_id;
        let head_num = self.head.header.block_num;

        fork::mark_included(&self.store, &head_id, false)?;
        let undo = self
            .store
            .get_undo_state(&head_id)?
            .ok_or_else(|| ChainError::Corruption(format!("missing undo snapshot for {}", head_id)))?;
        if let Err(error) = self.store.rollback_block(head_num, &undo) {
            self.poisoned = true;
            return Err(error.into());
        }

        let previous = self.head.header.previous;
        let (head, new_head_id) = load_head_for(&self.store, &previous)?;
        self.head = head;
        self.head_id = new_head_id;
        tracing::info!(popped = %head_id, head = %self.head_id, "block popped");

        if let Some(observer) = &self.observer {
            observer.state_changed(&undo);
        }
        Ok(())
    }

    fn switch_to_fork(&mut self, target: &BlockId) -> Result<(), ChainError> {
        let history = fork::get_fork_history(&self.store, target)?;
        let ancestor = *history
            .last()
            .ok_or_else(|| ChainError::Corruption("empty fork history".into()))?;
        while self.head_id != ancestor {
            self.pop_block()?;
        }
        for id in history.iter().rev().skip(1) {
            let block = self
                .store
                .get_block(id)?
                .ok_or_else(|| ChainError::NotFound(format!("block {}", id)))?;
            self.extend_chain(&block, id)?;
        }
        Ok(())
    }

    fn store_pending_transaction(
        &mut self,
        trx: SignedTransaction,
    ) -> Result<Option<EvaluationSummary>, ChainError> {
        self.ensure_not_poisoned()?;
        let id = trx.id();
        if self.store.has_pending_transaction(&id)? {
            return Ok(None);
        }
        let summary = {
            let mut overlay = PendingState::new(&self.store);
            self.evaluator.evaluate(
                &mut overlay,
                &trx,
                self.head.header.fee_rate,
                self.head.header.timestamp + BLOCK_INTERVAL_SEC,
            )?
        };
        self.store.put_pending_transaction(&id, &trx)?;
        self.pending_fee_index.insert(
            FeeIndex {
                fees: summary.base_fee(),
                trx_id: id,
            },
            trx,
        );
        Ok(Some(summary))
    }

    /// Re-evaluates every persisted pending transaction on open. Failures are
    /// logged and left in storage but dropped from the fee index.
    fn reload_pending(&mut self) {
        let persisted = match self.store.pending_transactions() {
            Ok(persisted) => persisted,
            Err(error) => {
                tracing::warn!(%error, "failed to load persisted pending transactions");
                return;
            }
        };
        for trx in persisted {
            let id = trx.id();
            let result = {
                let mut overlay = PendingState::new(&self.store);
                self.evaluator.evaluate(
                    &mut overlay,
                    &trx,
                    self.head.header.fee_rate,
                    self.head.header.timestamp + BLOCK_INTERVAL_SEC,
                )
            };
            match result {
                Ok(summary) => {
                    self.pending_fee_index.insert(
                        FeeIndex {
                            fees: summary.base_fee(),
                            trx_id: id,
                        },
                        trx,
                    );
                }
                Err(error) => {
                    tracing::warn!(
                        trx_id = %id,
                        %error,
                        "persisted pending transaction no longer valid, dropping from fee index"
                    );
                }
            }
        }
    }

    fn clear_pending(&mut self, confirmed: &[TransactionId]) {
        let confirmed: BTreeSet<&TransactionId> = confirmed.iter().collect();
        self.pending_fee_index
            .retain(|key, _| !confirmed.contains(&key.trx_id));
    }

    /// The committed-state invariant audit, run after every commit.
    fn sanity_check(&self) -> Result<(), ChainError> {
        let mut base_total: Shares = 0;
        let mut negative: Option<String> = None;
        self.store.scan_balances(|record| {
            if record.asset_id() == 0 {
                if record.balance < 0 && negative.is_none() {
                    negative = Some(format!("balance {} is negative", record.id()));
                }
                base_total += record.balance;
            }
        })?;
        if let Some(message) = negative {
            return Err(ChainError::Corruption(message));
        }

        let mut votes_total: Shares = 0;
        self.store.scan_accounts(|record| {
            if let Some(stats) = &record.delegate_info {
                base_total += stats.pay_balance;
                votes_total += stats.votes_for + stats.votes_against;
            }
        })?;
        if votes_total != base_total {
            return Err(ChainError::Corruption(format!(
                "vote total {} diverges from share total {}",
                votes_total, base_total
            )));
        }

        let base_asset = self
            .store
            .get_asset(0)?
            .ok_or_else(|| ChainError::Corruption("missing base asset record".into()))?;
        if base_asset.current_share_supply != base_total {
            return Err(ChainError::Corruption(format!(
                "share supply {} diverges from balance total {}",
                base_asset.current_share_supply, base_total
            )));
        }
        if base_asset.current_share_supply > base_asset.maximum_share_supply {
            return Err(ChainError::Corruption(format!(
                "share supply {} exceeds cap {}",
                base_asset.current_share_supply, base_asset.maximum_share_supply
            )));
        }
        Ok(())
    }
}

fn load_genesis_file(path: &Path) -> Result<GenesisConfig, ChainError> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match extension {
        "json" => {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| ChainError::InvalidArgument(format!("cannot read genesis file: {}", e)))?;
            serde_json::from_str(&raw)
                .map_err(|e| ChainError::InvalidArgument(format!("malformed genesis json: {}", e)))
        }
        "dat" => {
            let raw = std::fs::read(path)
                .map_err(|e| ChainError::InvalidArgument(format!("cannot read genesis file: {}", e)))?;
            codec::from_bytes_canonical(&raw)
                .map_err(|e| ChainError::InvalidArgument(format!("malformed genesis data: {}", e)))
        }
        other => Err(ChainError::InvalidArgument(format!(
            "unsupported genesis format '{}'",
            other
        ))),
    }
}

fn load_head(store: &ChainStore) -> Result<(SignedBlockHeader, BlockId), ChainError> {
    match store.last_block_num_entry()? {
        Some((_, id)) => {
            let block = store
                .get_block(&id)?
                .ok_or_else(|| ChainError::Corruption(format!("canonical head block {} missing", id)))?;
            Ok((block.signed_header(), id))
        }
        None => Ok((synthetic_genesis_header(store)?, GENESIS_SENTINEL)),
    }
}

fn load_head_for(store: &ChainStore, id: &BlockId) -> Result<(SignedBlockHeader, BlockId), ChainError> {
    if *id == GENESIS_SENTINEL {
        return Ok((synthetic_genesis_header(store)?, GENESIS_SENTINEL));
    }
    let block = store
        .get_block(id)?
        .ok_or_else(|| ChainError::Corruption(format!("head block {} missing", id)))?;
    Ok((block.signed_header(), *id))
}

/// The pseudo-header representing the genesis state: height 0, the genesis
/// timestamp, the initial fee rate and no delegate pay.
fn synthetic_genesis_header(store: &ChainStore) -> Result<SignedBlockHeader, ChainError> {
    Ok(SignedBlockHeader {
        header: BlockHeader {
            block_num: 0,
            previous: GENESIS_SENTINEL,
            timestamp: store.genesis_timestamp()?,
            fee_rate: INITIAL_FEE_RATE,
            delegate_pay_rate: 0,
            ..Default::default()
        },
        delegate_signature: Default::default(),
    })
}
