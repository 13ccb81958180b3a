// Path: crates/types/src/transaction.rs

//! Signed transactions and the tagged operation family.
//!
//! Operations are a closed tagged variant type dispatched through an explicit
//! registry owned by the engine. The registry maps an [`OperationTag`] to an
//! apply function; there is no global factory state.

use crate::constants::Shares;
use crate::crypto::{digest160_encoded, PublicKey, Signature, TransactionId};
use crate::records::{
    AccountId, AssetId, ProposalId, VoteChoice, WithdrawCondition,
};
use parity_scale_codec::{Decode, Encode};

/// A single state-mutating operation inside a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub enum Operation {
    /// Debit shares from a balance. Requires the balance owner's signature.
    Withdraw {
        /// The balance to debit.
        balance_id: crate::crypto::BalanceId,
        /// The amount to withdraw.
        amount: Shares,
    },
    /// Credit shares to the balance identified by `condition`.
    Deposit {
        /// The amount to deposit.
        amount: Shares,
        /// The spending condition of the receiving balance.
        condition: WithdrawCondition,
    },
    /// Register a new account under a unique name.
    RegisterAccount {
        /// The unique account name.
        name: String,
        /// The owning key.
        owner_key: PublicKey,
        /// The initial active key.
        active_key: PublicKey,
        /// Whether the account participates in delegate elections.
        is_delegate: bool,
    },
    /// Rotate an account's active key. Requires the owner key's signature.
    UpdateAccount {
        /// The account to update.
        account_id: AccountId,
        /// The new active key, if rotating.
        active_key: Option<PublicKey>,
    },
    /// Create a new asset under a unique symbol.
    CreateAsset {
        /// The unique ticker symbol.
        symbol: String,
        /// Human-readable asset name.
        name: String,
        /// Free-form description.
        description: String,
        /// The account allowed to issue shares.
        issuer_account_id: AccountId,
        /// Hard cap on the share supply.
        maximum_share_supply: Shares,
    },
    /// Mint shares of an asset. Requires the issuer's signature.
    IssueAsset {
        /// The asset to issue.
        asset_id: AssetId,
        /// The amount to mint.
        amount: Shares,
        /// The spending condition of the receiving balance.
        condition: WithdrawCondition,
    },
    /// Withdraw accumulated production pay. Requires the delegate's signature.
    WithdrawPay {
        /// The delegate whose pay balance is debited.
        delegate_id: AccountId,
        /// The amount to withdraw.
        amount: Shares,
    },
    /// Submit a governance proposal. Requires the delegate's signature.
    SubmitProposal {
        /// The submitting delegate.
        submitting_delegate_id: AccountId,
        /// Short subject line.
        subject: String,
        /// Proposal body text.
        body: String,
        /// Opaque payload interpreted off-chain.
        data: Vec<u8>,
    },
    /// Record a delegate's vote on a proposal.
    VoteProposal {
        /// The proposal being voted on.
        proposal_id: ProposalId,
        /// The voting delegate.
        delegate_id: AccountId,
        /// The position taken.
        vote: VoteChoice,
    },
}

/// The dispatch tag of an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub enum OperationTag {
    /// [`Operation::Withdraw`]
    Withdraw,
    /// [`Operation::Deposit`]
    Deposit,
    /// [`Operation::RegisterAccount`]
    RegisterAccount,
    /// [`Operation::UpdateAccount`]
    UpdateAccount,
    /// [`Operation::CreateAsset`]
    CreateAsset,
    /// [`Operation::IssueAsset`]
    IssueAsset,
    /// [`Operation::WithdrawPay`]
    WithdrawPay,
    /// [`Operation::SubmitProposal`]
    SubmitProposal,
    /// [`Operation::VoteProposal`]
    VoteProposal,
}

impl std::fmt::Display for OperationTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl Operation {
    /// The dispatch tag of this operation.
    pub fn tag(&self) -> OperationTag {
        match self {
            Operation::Withdraw { .. } => OperationTag::Withdraw,
            Operation::Deposit { .. } => OperationTag::Deposit,
            Operation::RegisterAccount { .. } => OperationTag::RegisterAccount,
            Operation::UpdateAccount { .. } => OperationTag::UpdateAccount,
            Operation::CreateAsset { .. } => OperationTag::CreateAsset,
            Operation::IssueAsset { .. } => OperationTag::IssueAsset,
            Operation::WithdrawPay { .. } => OperationTag::WithdrawPay,
            Operation::SubmitProposal { .. } => OperationTag::SubmitProposal,
            Operation::VoteProposal { .. } => OperationTag::VoteProposal,
        }
    }
}

/// The unsigned body of a transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct Transaction {
    /// The operations to apply, in order.
    pub operations: Vec<Operation>,
}

/// A public key together with its signature over the transaction body.
///
/// Ed25519 offers no key recovery, so every signature carries the key that
/// produced it; the evaluator derives the authorizing addresses from these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode)]
pub struct TransactionSignature {
    /// The signing key.
    pub key: PublicKey,
    /// The detached signature over the transaction body's encoding.
    pub signature: Signature,
}

/// A transaction with its authorizing signatures.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct SignedTransaction {
    /// The unsigned transaction body.
    pub transaction: Transaction,
    /// Signatures over the body's canonical encoding.
    pub signatures: Vec<TransactionSignature>,
}

impl SignedTransaction {
    /// The id of this transaction: the digest of its full canonical encoding.
    pub fn id(&self) -> TransactionId {
        digest160_encoded(self)
    }

    /// The serialized size of this transaction, in bytes.
    pub fn data_size(&self) -> usize {
        self.encode().len()
    }

    /// The message covered by the authorizing signatures.
    pub fn signing_message(&self) -> Vec<u8> {
        self.transaction.encode()
    }

    /// Appends a signature produced with `secret` over the transaction body.
    pub fn sign_with(&mut self, secret: &[u8; 32]) {
        let message = self.signing_message();
        self.signatures.push(TransactionSignature {
            key: crate::crypto::public_key_of(secret),
            signature: crate::crypto::sign(secret, &message),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_covers_the_body_only() {
        let mut trx = SignedTransaction {
            transaction: Transaction {
                operations: vec![Operation::Withdraw {
                    balance_id: Default::default(),
                    amount: 10,
                }],
            },
            signatures: vec![],
        };
        trx.sign_with(&[1u8; 32]);
        let message = trx.signing_message();
        assert!(trx.signatures[0].key.verify(&message, &trx.signatures[0].signature));

        // A second signature changes the id but not the signed message.
        let id_one_sig = trx.id();
        trx.sign_with(&[2u8; 32]);
        assert_eq!(trx.signing_message(), message);
        assert_ne!(trx.id(), id_one_sig);
    }

    #[test]
    fn tags_dispatch_per_variant() {
        let op = Operation::Deposit {
            amount: 1,
            condition: Default::default(),
        };
        assert_eq!(op.tag(), OperationTag::Deposit);
        assert_eq!(OperationTag::Deposit.to_string(), "Deposit");
    }
}
