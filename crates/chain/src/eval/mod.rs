// Path: crates/chain/src/eval/mod.rs

//! Transaction evaluation.
//!
//! The evaluator contract: given a pending state and a signed transaction,
//! either mutate the pending state and report the accumulated per-asset fees,
//! or fail without externally visible effect (the caller discards the
//! overlay). Evaluation is deterministic.
//!
//! Operations dispatch through an [`OperationRegistry`] — an explicit value
//! owned by the engine and handed to the evaluator, not process-wide state.

pub mod operations;

use crate::state::{PendingState, StateReader};
use meridian_types::constants::Shares;
use meridian_types::crypto::Address;
use meridian_types::error::EvaluationError;
use meridian_types::records::{AssetId, ChainProperty, PropertyValue};
use meridian_types::transaction::{Operation, OperationTag, SignedTransaction};
use std::collections::{BTreeMap, BTreeSet};

/// The per-asset fees a successful evaluation accumulated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EvaluationSummary {
    /// Fee per asset: shares withdrawn in excess of shares deposited.
    pub fees: BTreeMap<AssetId, Shares>,
}

impl EvaluationSummary {
    /// The base-asset fee.
    pub fn base_fee(&self) -> Shares {
        self.fees.get(&0).copied().unwrap_or(0)
    }
}

/// Mutable evaluation context threaded through an operation sequence.
pub struct EvalContext<'a, 'b> {
    /// The pending overlay all mutations target.
    pub state: &'a mut PendingState<'b>,
    /// Addresses whose signatures authorize this transaction.
    pub signed_by: BTreeSet<Address>,
    /// The timestamp operations stamp into new records.
    pub timestamp: u64,
    withdrawn: BTreeMap<AssetId, Shares>,
    deposited: BTreeMap<AssetId, Shares>,
}

impl<'a, 'b> EvalContext<'a, 'b> {
    /// Fails unless `address` signed the transaction.
    pub fn require_signature(&self, address: &Address) -> Result<(), EvaluationError> {
        if self.signed_by.contains(address) {
            Ok(())
        } else {
            Err(EvaluationError::MissingSignature(address.to_string()))
        }
    }

    /// Records shares leaving a balance (fees grow).
    pub fn add_withdrawn(&mut self, asset_id: AssetId, amount: Shares) {
        *self.withdrawn.entry(asset_id).or_default() += amount;
    }

    /// Records shares entering a balance (fees shrink).
    pub fn add_deposited(&mut self, asset_id: AssetId, amount: Shares) {
        *self.deposited.entry(asset_id).or_default() += amount;
    }

    /// Moves `delta` base-asset shares on a balance's vote slate: positive
    /// slates vote for, negative slates vote against, zero abstains. Votes
    /// only exist for the base asset.
    pub fn adjust_vote(
        &mut self,
        slate: i64,
        asset_id: AssetId,
        delta: Shares,
    ) -> Result<(), EvaluationError> {
        if asset_id != 0 || slate == 0 {
            return Ok(());
        }
        let delegate_id = slate.unsigned_abs();
        let mut record = self
            .state
            .get_account(delegate_id)?
            .ok_or_else(|| EvaluationError::NotFound(format!("delegate {}", delegate_id)))?;
        let stats = record
            .delegate_info
            .as_mut()
            .ok_or_else(|| EvaluationError::Invalid(format!("account {} is not a delegate", delegate_id)))?;
        if slate > 0 {
            stats.votes_for += delta;
        } else {
            stats.votes_against += delta;
        }
        self.state.store_account(record);
        Ok(())
    }
}

/// An operation's apply function.
pub type ApplyFn = fn(&Operation, &mut EvalContext<'_, '_>) -> Result<(), EvaluationError>;

/// Maps operation tags to apply functions. Owned by the engine; replaces the
/// source design's global factory singleton.
pub struct OperationRegistry {
    handlers: BTreeMap<OperationTag, ApplyFn>,
}

impl OperationRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        OperationRegistry {
            handlers: BTreeMap::new(),
        }
    }

    /// The registry with every built-in operation registered.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        operations::register_standard(&mut registry);
        registry
    }

    /// Registers (or replaces) the handler for one tag.
    pub fn register(&mut self, tag: OperationTag, handler: ApplyFn) {
        self.handlers.insert(tag, handler);
    }

    /// Dispatches one operation to its handler.
    pub fn apply(
        &self,
        operation: &Operation,
        ctx: &mut EvalContext<'_, '_>,
    ) -> Result<(), EvaluationError> {
        let handler = self
            .handlers
            .get(&operation.tag())
            .ok_or_else(|| EvaluationError::UnknownOperation(operation.tag().to_string()))?;
        handler(operation, ctx)
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The transaction evaluator contract (C4). The engine owns one evaluator;
/// tests and embedders may substitute their own.
pub trait TransactionEvaluator: Send + Sync {
    /// Evaluates `trx` against `state`, reporting per-asset fees on success.
    ///
    /// `fee_rate` is the rate committed at the previous block, in millishares
    /// per byte; `timestamp` stamps newly created records.
    fn evaluate(
        &self,
        state: &mut PendingState<'_>,
        trx: &SignedTransaction,
        fee_rate: Shares,
        timestamp: u64,
    ) -> Result<EvaluationSummary, EvaluationError>;
}

/// The built-in evaluator: signature verification, registry dispatch,
/// non-negative per-asset fees, a size-proportional minimum base fee, and the
/// fee burn.
pub struct RegistryEvaluator {
    registry: OperationRegistry,
}

impl RegistryEvaluator {
    /// An evaluator around an explicit registry.
    pub fn new(registry: OperationRegistry) -> Self {
        RegistryEvaluator { registry }
    }

    /// An evaluator with the standard operation set.
    pub fn standard() -> Self {
        Self::new(OperationRegistry::standard())
    }
}

impl TransactionEvaluator for RegistryEvaluator {
    fn evaluate(
        &self,
        state: &mut PendingState<'_>,
        trx: &SignedTransaction,
        fee_rate: Shares,
        timestamp: u64,
    ) -> Result<EvaluationSummary, EvaluationError> {
        let message = trx.signing_message();
        let mut signed_by = BTreeSet::new();
        for (index, sig) in trx.signatures.iter().enumerate() {
            if !sig.key.verify(&message, &sig.signature) {
                return Err(EvaluationError::InvalidSignature(index));
            }
            signed_by.insert(sig.key.address());
        }

        let mut ctx = EvalContext {
            state,
            signed_by,
            timestamp,
            withdrawn: BTreeMap::new(),
            deposited: BTreeMap::new(),
        };
        for operation in &trx.transaction.operations {
            self.registry.apply(operation, &mut ctx)?;
        }

        // Per-asset fees must be non-negative; the base-asset fee must cover
        // the transaction's share of block space.
        let mut summary = EvaluationSummary::default();
        let assets: BTreeSet<AssetId> = ctx
            .withdrawn
            .keys()
            .chain(ctx.deposited.keys())
            .copied()
            .collect();
        for asset_id in assets {
            let withdrawn = ctx.withdrawn.get(&asset_id).copied().unwrap_or(0);
            let deposited = ctx.deposited.get(&asset_id).copied().unwrap_or(0);
            let fee = withdrawn - deposited;
            if fee < 0 {
                return Err(EvaluationError::NegativeFee { asset_id });
            }
            if fee > 0 {
                summary.fees.insert(asset_id, fee);
            }
        }

        let required = (trx.data_size() as Shares).saturating_mul(fee_rate) / 1_000;
        let base_fee = summary.base_fee();
        if base_fee < required {
            return Err(EvaluationError::InsufficientFee {
                required,
                got: base_fee,
            });
        }

        // Fees are burned: removed from circulating supply, tallied on the
        // asset for bookkeeping. This is what keeps the supply and vote
        // invariants in step after every transfer.
        for (asset_id, fee) in &summary.fees {
            let mut asset = ctx
                .state
                .get_asset(*asset_id)?
                .ok_or_else(|| EvaluationError::NotFound(format!("asset {}", asset_id)))?;
            asset.collected_fees += fee;
            asset.current_share_supply -= fee;
            ctx.state.store_asset(asset);
        }

        Ok(summary)
    }
}

/// Reads the next id counter property, bumps it, and returns the fresh id.
pub(crate) fn next_id(
    state: &mut PendingState<'_>,
    property: ChainProperty,
) -> Result<u64, EvaluationError> {
    let last = state
        .get_property(property)?
        .and_then(|v| v.as_u64())
        .ok_or_else(|| EvaluationError::Invalid(format!("missing id counter {:?}", property)))?;
    let id = last + 1;
    state.set_property(property, PropertyValue::U64(id));
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ChainStore;
    use meridian_types::crypto::public_key_of;
    use meridian_types::error::EvaluationError;
    use meridian_types::records::{
        AccountRecord, AssetRecord, BalanceRecord, DelegateStats, WithdrawCondition,
    };
    use meridian_types::transaction::{Operation, Transaction};

    const ALICE: [u8; 32] = [0xA1; 32];
    const MALLORY: [u8; 32] = [0x3E; 32];

    /// A store seeded with one delegate, the base asset and one balance of
    /// 1000 shares voting for the delegate.
    fn seeded_store() -> (tempfile::TempDir, ChainStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ChainStore::open(dir.path()).unwrap();

        let mut pending = PendingState::new(&store);
        pending.store_account(AccountRecord {
            id: 1,
            name: "init0".into(),
            delegate_info: Some(DelegateStats {
                votes_for: 1_000,
                ..Default::default()
            }),
            ..Default::default()
        });
        pending.store_asset(AssetRecord {
            id: 0,
            symbol: "MRD".into(),
            name: "base".into(),
            issuer_account_id: 0,
            current_share_supply: 1_000,
            maximum_share_supply: 1_000_000,
            ..Default::default()
        });
        pending.store_balance(BalanceRecord {
            condition: alice_condition(),
            balance: 1_000,
        });
        pending.set_property(ChainProperty::LastAccountId, PropertyValue::U64(1));
        let delta = pending.into_delta();
        store.apply_delta(&delta).unwrap();
        (dir, store)
    }

    fn alice_condition() -> WithdrawCondition {
        WithdrawCondition {
            owner: public_key_of(&ALICE).address(),
            asset_id: 0,
            delegate_slate: 1,
        }
    }

    fn transfer_trx(withdrawal: Shares, deposit: Shares, signer: &[u8; 32]) -> SignedTransaction {
        let source_id = BalanceRecord {
            condition: alice_condition(),
            balance: 0,
        }
        .id();
        let mut trx = SignedTransaction {
            transaction: Transaction {
                operations: vec![
                    Operation::Withdraw {
                        balance_id: source_id,
                        amount: withdrawal,
                    },
                    Operation::Deposit {
                        amount: deposit,
                        condition: WithdrawCondition {
                            owner: public_key_of(&[0xB2; 32]).address(),
                            asset_id: 0,
                            delegate_slate: -1,
                        },
                    },
                ],
            },
            signatures: vec![],
        };
        trx.sign_with(signer);
        trx
    }

    #[test]
    fn transfer_moves_votes_and_burns_the_fee() {
        let (_dir, store) = seeded_store();
        let evaluator = RegistryEvaluator::standard();
        let mut pending = PendingState::new(&store);

        let summary = evaluator
            .evaluate(&mut pending, &transfer_trx(300, 200, &ALICE), 0, 60)
            .unwrap();
        assert_eq!(summary.base_fee(), 100);

        let delegate = pending.get_account(1).unwrap().unwrap();
        let stats = delegate.delegate_info.unwrap();
        assert_eq!(stats.votes_for, 700);
        assert_eq!(stats.votes_against, 200);

        let asset = pending.get_asset(0).unwrap().unwrap();
        assert_eq!(asset.current_share_supply, 900);
        assert_eq!(asset.collected_fees, 100);
        // Votes still cover the supply exactly.
        assert_eq!(stats.votes_for + stats.votes_against, asset.current_share_supply);
    }

    #[test]
    fn unauthorized_withdrawal_is_rejected() {
        let (_dir, store) = seeded_store();
        let evaluator = RegistryEvaluator::standard();
        let mut pending = PendingState::new(&store);

        let error = evaluator
            .evaluate(&mut pending, &transfer_trx(300, 200, &MALLORY), 0, 60)
            .unwrap_err();
        assert!(matches!(error, EvaluationError::MissingSignature(_)), "{error}");
    }

    #[test]
    fn underpaying_the_size_fee_is_rejected() {
        let (_dir, store) = seeded_store();
        let evaluator = RegistryEvaluator::standard();
        let mut pending = PendingState::new(&store);

        let error = evaluator
            .evaluate(&mut pending, &transfer_trx(200, 200, &ALICE), 1_000, 60)
            .unwrap_err();
        assert!(matches!(error, EvaluationError::InsufficientFee { .. }), "{error}");
    }

    #[test]
    fn overdrawing_a_balance_is_rejected() {
        let (_dir, store) = seeded_store();
        let evaluator = RegistryEvaluator::standard();
        let mut pending = PendingState::new(&store);

        let error = evaluator
            .evaluate(&mut pending, &transfer_trx(2_000, 100, &ALICE), 0, 60)
            .unwrap_err();
        assert!(matches!(error, EvaluationError::InsufficientFunds(_)), "{error}");
    }

    #[test]
    fn duplicate_account_names_are_rejected() {
        let (_dir, store) = seeded_store();
        let evaluator = RegistryEvaluator::standard();

        let register = |name: &str| {
            let mut trx = SignedTransaction {
                transaction: Transaction {
                    operations: vec![Operation::RegisterAccount {
                        name: name.into(),
                        owner_key: public_key_of(&[0xC3; 32]),
                        active_key: public_key_of(&[0xC3; 32]),
                        is_delegate: false,
                    }],
                },
                signatures: vec![],
            };
            trx.sign_with(&[0xC3; 32]);
            trx
        };

        let mut pending = PendingState::new(&store);
        evaluator
            .evaluate(&mut pending, &register("alice"), 0, 60)
            .unwrap();
        assert_eq!(pending.account_id_by_name("alice").unwrap(), Some(2));
        assert_eq!(pending.last_account_id().unwrap(), 2);

        let error = evaluator
            .evaluate(&mut pending, &register("init0"), 0, 60)
            .unwrap_err();
        assert!(matches!(error, EvaluationError::Duplicate(_)), "{error}");
    }

    #[test]
    fn unregistered_tags_are_reported() {
        let (_dir, store) = seeded_store();
        let evaluator = RegistryEvaluator::new(OperationRegistry::new());
        let mut pending = PendingState::new(&store);

        let error = evaluator
            .evaluate(&mut pending, &transfer_trx(10, 10, &ALICE), 0, 60)
            .unwrap_err();
        assert!(matches!(error, EvaluationError::UnknownOperation(_)), "{error}");
    }
}
