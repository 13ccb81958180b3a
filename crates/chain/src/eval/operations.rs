// Path: crates/chain/src/eval/operations.rs

//! The built-in operation set.
//!
//! Each apply function mutates the pending overlay through the evaluation
//! context. Signature requirements are enforced against the addresses the
//! evaluator collected from the transaction's signatures.

use crate::eval::{next_id, EvalContext, OperationRegistry};
use crate::state::StateReader;
use meridian_types::error::EvaluationError;
use meridian_types::records::{
    AccountRecord, AssetRecord, BalanceRecord, ChainProperty, DelegateStats, ProposalRecord,
    ProposalVote, ProposalVoteId, WithdrawCondition,
};
use meridian_types::transaction::{Operation, OperationTag};

/// Registers every built-in operation.
pub fn register_standard(registry: &mut OperationRegistry) {
    registry.register(OperationTag::Withdraw, apply_withdraw);
    registry.register(OperationTag::Deposit, apply_deposit);
    registry.register(OperationTag::RegisterAccount, apply_register_account);
    registry.register(OperationTag::UpdateAccount, apply_update_account);
    registry.register(OperationTag::CreateAsset, apply_create_asset);
    registry.register(OperationTag::IssueAsset, apply_issue_asset);
    registry.register(OperationTag::WithdrawPay, apply_withdraw_pay);
    registry.register(OperationTag::SubmitProposal, apply_submit_proposal);
    registry.register(OperationTag::VoteProposal, apply_vote_proposal);
}

fn apply_withdraw(op: &Operation, ctx: &mut EvalContext<'_, '_>) -> Result<(), EvaluationError> {
    let Operation::Withdraw { balance_id, amount } = op else {
        return Err(EvaluationError::Invalid("tag mismatch".into()));
    };
    if *amount <= 0 {
        return Err(EvaluationError::Invalid("withdraw amount must be positive".into()));
    }
    let mut balance = ctx
        .state
        .get_balance(balance_id)?
        .ok_or_else(|| EvaluationError::NotFound(format!("balance {}", balance_id)))?;
    ctx.require_signature(&balance.condition.owner)?;
    if balance.balance < *amount {
        return Err(EvaluationError::InsufficientFunds(format!(
            "balance {} holds {}, withdrawal of {} requested",
            balance_id, balance.balance, amount
        )));
    }
    balance.balance -= amount;
    ctx.adjust_vote(balance.delegate_slate(), balance.asset_id(), -amount)?;
    ctx.add_withdrawn(balance.asset_id(), *amount);
    // An emptied balance is stored in its null form and vanishes on commit.
    ctx.state.store_balance(balance);
    Ok(())
}

fn apply_deposit(op: &Operation, ctx: &mut EvalContext<'_, '_>) -> Result<(), EvaluationError> {
    let Operation::Deposit { amount, condition } = op else {
        return Err(EvaluationError::Invalid("tag mismatch".into()));
    };
    if *amount <= 0 {
        return Err(EvaluationError::Invalid("deposit amount must be positive".into()));
    }
    credit_condition(ctx, condition, *amount)?;
    ctx.add_deposited(condition.asset_id, *amount);
    Ok(())
}

fn apply_register_account(
    op: &Operation,
    ctx: &mut EvalContext<'_, '_>,
) -> Result<(), EvaluationError> {
    let Operation::RegisterAccount {
        name,
        owner_key,
        active_key,
        is_delegate,
    } = op
    else {
        return Err(EvaluationError::Invalid("tag mismatch".into()));
    };
    if name.is_empty() {
        return Err(EvaluationError::Invalid("account name must not be empty".into()));
    }
    if ctx.state.account_id_by_name(name)?.is_some() {
        return Err(EvaluationError::Duplicate(format!("account name {}", name)));
    }
    let id = next_id(ctx.state, ChainProperty::LastAccountId)?;
    let mut record = AccountRecord {
        id,
        name: name.clone(),
        owner_key: *owner_key,
        registration_date: ctx.timestamp,
        last_update: ctx.timestamp,
        delegate_info: is_delegate.then(DelegateStats::default),
        ..Default::default()
    };
    record.set_active_key(ctx.timestamp, *active_key);
    ctx.state.store_account(record);
    Ok(())
}

fn apply_update_account(
    op: &Operation,
    ctx: &mut EvalContext<'_, '_>,
) -> Result<(), EvaluationError> {
    let Operation::UpdateAccount {
        account_id,
        active_key,
    } = op
    else {
        return Err(EvaluationError::Invalid("tag mismatch".into()));
    };
    let mut record = ctx
        .state
        .get_account(*account_id)?
        .ok_or_else(|| EvaluationError::NotFound(format!("account {}", account_id)))?;
    ctx.require_signature(&record.owner_key.address())?;
    if let Some(key) = active_key {
        record.set_active_key(ctx.timestamp, *key);
    }
    record.last_update = ctx.timestamp;
    ctx.state.store_account(record);
    Ok(())
}

fn apply_create_asset(op: &Operation, ctx: &mut EvalContext<'_, '_>) -> Result<(), EvaluationError> {
    let Operation::CreateAsset {
        symbol,
        name,
        description,
        issuer_account_id,
        maximum_share_supply,
    } = op
    else {
        return Err(EvaluationError::Invalid("tag mismatch".into()));
    };
    if symbol.is_empty() {
        return Err(EvaluationError::Invalid("asset symbol must not be empty".into()));
    }
    if *maximum_share_supply <= 0 {
        return Err(EvaluationError::Invalid("maximum share supply must be positive".into()));
    }
    if ctx.state.asset_id_by_symbol(symbol)?.is_some() {
        return Err(EvaluationError::Duplicate(format!("asset symbol {}", symbol)));
    }
    let issuer = ctx
        .state
        .get_account(*issuer_account_id)?
        .ok_or_else(|| EvaluationError::NotFound(format!("account {}", issuer_account_id)))?;
    ctx.require_signature(&issuer.active_key().address())?;

    let id = next_id(ctx.state, ChainProperty::LastAssetId)?;
    ctx.state.store_asset(AssetRecord {
        id,
        symbol: symbol.clone(),
        name: name.clone(),
        description: description.clone(),
        issuer_account_id: *issuer_account_id,
        current_share_supply: 0,
        maximum_share_supply: *maximum_share_supply,
        collected_fees: 0,
    });
    Ok(())
}

fn apply_issue_asset(op: &Operation, ctx: &mut EvalContext<'_, '_>) -> Result<(), EvaluationError> {
    let Operation::IssueAsset {
        asset_id,
        amount,
        condition,
    } = op
    else {
        return Err(EvaluationError::Invalid("tag mismatch".into()));
    };
    if *asset_id == 0 {
        return Err(EvaluationError::Invalid("the base asset cannot be issued".into()));
    }
    if *amount <= 0 {
        return Err(EvaluationError::Invalid("issue amount must be positive".into()));
    }
    if condition.asset_id != *asset_id {
        return Err(EvaluationError::Invalid(
            "issue condition must target the issued asset".into(),
        ));
    }
    let mut asset = ctx
        .state
        .get_asset(*asset_id)?
        .ok_or_else(|| EvaluationError::NotFound(format!("asset {}", asset_id)))?;
    let issuer = ctx
        .state
        .get_account(asset.issuer_account_id)?
        .ok_or_else(|| EvaluationError::NotFound(format!("account {}", asset.issuer_account_id)))?;
    ctx.require_signature(&issuer.active_key().address())?;
    if asset.current_share_supply + amount > asset.maximum_share_supply {
        return Err(EvaluationError::SupplyCapExceeded { asset_id: *asset_id });
    }
    asset.current_share_supply += amount;
    ctx.state.store_asset(asset);
    // Minted shares enter a balance directly; they are not a transfer and do
    // not count toward the fee tally.
    credit_condition(ctx, condition, *amount)?;
    Ok(())
}

fn apply_withdraw_pay(op: &Operation, ctx: &mut EvalContext<'_, '_>) -> Result<(), EvaluationError> {
    let Operation::WithdrawPay {
        delegate_id,
        amount,
    } = op
    else {
        return Err(EvaluationError::Invalid("tag mismatch".into()));
    };
    if *amount <= 0 {
        return Err(EvaluationError::Invalid("pay withdrawal must be positive".into()));
    }
    let mut record = ctx
        .state
        .get_account(*delegate_id)?
        .ok_or_else(|| EvaluationError::NotFound(format!("account {}", delegate_id)))?;
    ctx.require_signature(&record.active_key().address())?;
    let stats = record
        .delegate_info
        .as_mut()
        .ok_or_else(|| EvaluationError::Invalid(format!("account {} is not a delegate", delegate_id)))?;
    if stats.pay_balance < *amount {
        return Err(EvaluationError::InsufficientFunds(format!(
            "delegate {} pay balance holds {}, withdrawal of {} requested",
            delegate_id, stats.pay_balance, amount
        )));
    }
    // Pay shares vote for their delegate while banked; both move together.
    stats.pay_balance -= amount;
    stats.votes_for -= amount;
    ctx.state.store_account(record);
    ctx.add_withdrawn(0, *amount);
    Ok(())
}

fn apply_submit_proposal(
    op: &Operation,
    ctx: &mut EvalContext<'_, '_>,
) -> Result<(), EvaluationError> {
    let Operation::SubmitProposal {
        submitting_delegate_id,
        subject,
        body,
        data,
    } = op
    else {
        return Err(EvaluationError::Invalid("tag mismatch".into()));
    };
    if subject.is_empty() {
        return Err(EvaluationError::Invalid("proposal subject must not be empty".into()));
    }
    let delegate = require_delegate(ctx, *submitting_delegate_id)?;
    ctx.require_signature(&delegate.active_key().address())?;

    let id = next_id(ctx.state, ChainProperty::LastProposalId)?;
    ctx.state.store_proposal(ProposalRecord {
        id,
        submitting_delegate_id: *submitting_delegate_id,
        submission_date: ctx.timestamp,
        subject: subject.clone(),
        body: body.clone(),
        data: data.clone(),
    });
    Ok(())
}

fn apply_vote_proposal(op: &Operation, ctx: &mut EvalContext<'_, '_>) -> Result<(), EvaluationError> {
    let Operation::VoteProposal {
        proposal_id,
        delegate_id,
        vote,
    } = op
    else {
        return Err(EvaluationError::Invalid("tag mismatch".into()));
    };
    if ctx.state.get_proposal(*proposal_id)?.is_none() {
        return Err(EvaluationError::NotFound(format!("proposal {}", proposal_id)));
    }
    let delegate = require_delegate(ctx, *delegate_id)?;
    ctx.require_signature(&delegate.active_key().address())?;

    ctx.state.store_proposal_vote(ProposalVote {
        id: ProposalVoteId {
            proposal_id: *proposal_id,
            delegate_id: *delegate_id,
        },
        timestamp: ctx.timestamp,
        vote: *vote,
    });
    Ok(())
}

fn require_delegate(
    ctx: &EvalContext<'_, '_>,
    delegate_id: u64,
) -> Result<AccountRecord, EvaluationError> {
    let record = ctx
        .state
        .get_account(delegate_id)?
        .ok_or_else(|| EvaluationError::NotFound(format!("account {}", delegate_id)))?;
    if !record.is_delegate() {
        return Err(EvaluationError::Invalid(format!(
            "account {} is not a delegate",
            delegate_id
        )));
    }
    Ok(record)
}

fn credit_condition(
    ctx: &mut EvalContext<'_, '_>,
    condition: &WithdrawCondition,
    amount: i64,
) -> Result<(), EvaluationError> {
    let template = BalanceRecord {
        condition: *condition,
        balance: 0,
    };
    let mut balance = ctx
        .state
        .get_balance(&template.id())?
        .unwrap_or(template);
    balance.balance += amount;
    ctx.adjust_vote(condition.delegate_slate, condition.asset_id, amount)?;
    ctx.state.store_balance(balance);
    Ok(())
}
