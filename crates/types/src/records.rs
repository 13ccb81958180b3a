// Path: crates/types/src/records.rs

//! Entity records, chain properties and index key types.
//!
//! Records are pure value types. Every record family has a canonical "null"
//! form used as a tombstone: storing a null record removes the row and all
//! index rows derived from it. Records are created by transactions (or
//! genesis), mutated inside pending-state overlays and flattened to the store
//! only on block commit.

use crate::constants::Shares;
use crate::crypto::{digest160_encoded, Address, BalanceId, PublicKey, SecretHash, TransactionId};
use parity_scale_codec::{Decode, Encode};
use std::collections::BTreeMap;

/// The id of an account. Id 0 is the genesis root account.
pub type AccountId = u64;
/// The id of an asset. Id 0 is the base asset.
pub type AssetId = u64;
/// The id of a governance proposal.
pub type ProposalId = u64;

/// Per-delegate production statistics and vote tallies.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct DelegateStats {
    /// Number of blocks this delegate has produced.
    pub blocks_produced: u64,
    /// Number of scheduled slots this delegate failed to fill.
    pub blocks_missed: u64,
    /// Shares currently voting for this delegate.
    pub votes_for: Shares,
    /// Shares currently voting against this delegate.
    pub votes_against: Shares,
    /// Accumulated, not yet withdrawn, production pay.
    pub pay_balance: Shares,
    /// Block number of the last block this delegate produced.
    pub last_block_num_produced: u64,
    /// Commitment to the secret this delegate must reveal in its next block.
    pub next_secret_hash: SecretHash,
}

impl DelegateStats {
    /// The delegate's ranking score.
    pub fn net_votes(&self) -> Shares {
        self.votes_for - self.votes_against
    }
}

/// A registered account, possibly carrying delegate status.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct AccountRecord {
    /// Unique account id.
    pub id: AccountId,
    /// Unique, immutable account name.
    pub name: String,
    /// The key that owns the account and authorizes key rotation.
    pub owner_key: PublicKey,
    /// Active keys indexed by the timestamp from which each became valid.
    pub active_key_history: BTreeMap<u64, PublicKey>,
    /// Timestamp of registration.
    pub registration_date: u64,
    /// Timestamp of the last update.
    pub last_update: u64,
    /// Delegate statistics, present only for delegate accounts.
    pub delegate_info: Option<DelegateStats>,
}

impl AccountRecord {
    /// The tombstone form for this account id.
    pub fn null(id: AccountId) -> Self {
        AccountRecord {
            id,
            ..Default::default()
        }
    }

    /// Whether this record is a tombstone.
    pub fn is_null(&self) -> bool {
        self.name.is_empty()
    }

    /// Whether this account is a delegate.
    pub fn is_delegate(&self) -> bool {
        self.delegate_info.is_some()
    }

    /// The most recent active key, falling back to the owner key.
    pub fn active_key(&self) -> PublicKey {
        self.active_key_history
            .values()
            .next_back()
            .copied()
            .unwrap_or(self.owner_key)
    }

    /// Records a new active key valid from `timestamp`.
    pub fn set_active_key(&mut self, timestamp: u64, key: PublicKey) {
        self.active_key_history.insert(timestamp, key);
    }

    /// The delegate ranking score, zero for non-delegates.
    pub fn net_votes(&self) -> Shares {
        self.delegate_info
            .as_ref()
            .map(DelegateStats::net_votes)
            .unwrap_or(0)
    }
}

/// An issued asset. Asset 0 is the base asset created at genesis.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct AssetRecord {
    /// Unique asset id.
    pub id: AssetId,
    /// Unique ticker symbol.
    pub symbol: String,
    /// Human-readable asset name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// The account allowed to issue shares of this asset.
    pub issuer_account_id: AccountId,
    /// Shares currently in circulation.
    pub current_share_supply: Shares,
    /// Hard cap on `current_share_supply`.
    pub maximum_share_supply: Shares,
    /// Cumulative fees collected (and burned) in this asset.
    pub collected_fees: Shares,
}

impl AssetRecord {
    /// The tombstone form for this asset id.
    pub fn null(id: AssetId) -> Self {
        AssetRecord {
            id,
            ..Default::default()
        }
    }

    /// Whether this record is a tombstone.
    pub fn is_null(&self) -> bool {
        self.symbol.is_empty()
    }
}

/// The spending condition of a balance. The balance id is the 160-bit digest
/// of this structure's canonical encoding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Encode, Decode)]
pub struct WithdrawCondition {
    /// The address whose signature authorizes withdrawal.
    pub owner: Address,
    /// The asset held by the balance.
    pub asset_id: AssetId,
    /// Signed delegate id: positive votes for, negative votes against,
    /// zero abstains. Only base-asset balances carry voting weight.
    pub delegate_slate: i64,
}

/// A spendable balance, identified by the digest of its condition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct BalanceRecord {
    /// The spending condition; fixes the balance id.
    pub condition: WithdrawCondition,
    /// The amount held, in the condition's asset.
    pub balance: Shares,
}

impl BalanceRecord {
    /// The id of this balance: the digest of its withdraw condition.
    pub fn id(&self) -> BalanceId {
        digest160_encoded(&self.condition)
    }

    /// Whether this record is a tombstone. Balances vanish when emptied.
    pub fn is_null(&self) -> bool {
        self.balance == 0
    }

    /// The asset held by this balance.
    pub fn asset_id(&self) -> AssetId {
        self.condition.asset_id
    }

    /// The signed delegate slate of this balance.
    pub fn delegate_slate(&self) -> i64 {
        self.condition.delegate_slate
    }
}

/// Composite key of the market order tables.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Encode, Decode)]
pub struct MarketIndexKey {
    /// The asset being priced.
    pub quote_asset_id: AssetId,
    /// The asset the price is quoted in.
    pub base_asset_id: AssetId,
    /// Fixed-point price of the order.
    pub order_price: u64,
    /// The address that owns the order.
    pub owner: Address,
}

/// An open ask, bid or short order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct OrderRecord {
    /// Shares committed to the order.
    pub balance: Shares,
}

impl OrderRecord {
    /// Whether this record is a tombstone.
    pub fn is_null(&self) -> bool {
        self.balance == 0
    }
}

/// Collateral backing a short position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct CollateralRecord {
    /// Base-asset shares held as collateral.
    pub collateral_balance: Shares,
    /// Quote-asset shares owed to close the position.
    pub payoff_balance: Shares,
}

impl CollateralRecord {
    /// Whether this record is a tombstone.
    pub fn is_null(&self) -> bool {
        self.collateral_balance == 0 && self.payoff_balance == 0
    }
}

/// A governance proposal submitted by a delegate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct ProposalRecord {
    /// Unique proposal id.
    pub id: ProposalId,
    /// The delegate that submitted the proposal.
    pub submitting_delegate_id: AccountId,
    /// Timestamp of submission.
    pub submission_date: u64,
    /// Short subject line.
    pub subject: String,
    /// Proposal body text.
    pub body: String,
    /// Opaque payload interpreted off-chain.
    pub data: Vec<u8>,
}

impl ProposalRecord {
    /// The tombstone form for this proposal id.
    pub fn null(id: ProposalId) -> Self {
        ProposalRecord {
            id,
            ..Default::default()
        }
    }

    /// Whether this record is a tombstone.
    pub fn is_null(&self) -> bool {
        self.subject.is_empty()
    }
}

/// A delegate's position on a proposal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub enum VoteChoice {
    /// Approve the proposal.
    Yes,
    /// Reject the proposal.
    No,
    /// Explicitly abstain.
    #[default]
    Abstain,
}

/// Composite key of the proposal vote table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Encode, Decode)]
pub struct ProposalVoteId {
    /// The proposal being voted on.
    pub proposal_id: ProposalId,
    /// The voting delegate.
    pub delegate_id: AccountId,
}

/// A recorded delegate vote on a proposal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct ProposalVote {
    /// Composite vote key.
    pub id: ProposalVoteId,
    /// Timestamp of the vote.
    pub timestamp: u64,
    /// The position taken.
    pub vote: VoteChoice,
}

impl ProposalVote {
    /// The tombstone form for this vote key.
    pub fn null(id: ProposalVoteId) -> Self {
        ProposalVote {
            id,
            ..Default::default()
        }
    }

    /// Whether this record is a tombstone.
    pub fn is_null(&self) -> bool {
        self.timestamp == 0
    }
}

/// Where a processed transaction landed on the canonical chain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct TransactionLocation {
    /// The block that includes the transaction.
    pub block_num: u64,
    /// The transaction's index within that block.
    pub trx_num: u32,
}

/// Keys of the singleton chain property map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub enum ChainProperty {
    /// The chain id (`sha256` of the genesis configuration).
    ChainId,
    /// The highest asset id issued so far.
    LastAssetId,
    /// The highest account id issued so far.
    LastAccountId,
    /// The highest proposal id issued so far.
    LastProposalId,
    /// The current active delegate list, in slot order.
    ActiveDelegateList,
    /// The chain-wide random seed, mixed on every block.
    LastRandomSeed,
    /// The timestamp of the genesis state.
    GenesisTimestamp,
}

/// The typed value of a chain property.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub enum PropertyValue {
    /// A 256-bit digest value.
    Digest256(crate::crypto::Digest256),
    /// A 160-bit digest value.
    Digest160(crate::crypto::Digest160),
    /// An unsigned integer value.
    U64(u64),
    /// An ordered list of account ids.
    AccountList(Vec<AccountId>),
}

impl PropertyValue {
    /// Returns the contained `u64`, if this is an integer property.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            PropertyValue::U64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the contained 160-bit digest, if present.
    pub fn as_digest160(&self) -> Option<crate::crypto::Digest160> {
        match self {
            PropertyValue::Digest160(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns the contained 256-bit digest, if present.
    pub fn as_digest256(&self) -> Option<crate::crypto::Digest256> {
        match self {
            PropertyValue::Digest256(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns the contained account list, if present.
    pub fn as_account_list(&self) -> Option<&[AccountId]> {
        match self {
            PropertyValue::AccountList(l) => Some(l),
            _ => None,
        }
    }
}

/// Key of the delegate ranking index: orders delegates by net votes
/// descending, then account id ascending, so that a forward scan yields the
/// current top delegates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoteRank {
    /// The delegate's net votes at the time the row was written.
    pub votes: Shares,
    /// The ranked delegate.
    pub delegate_id: AccountId,
}

impl VoteRank {
    /// Encodes this rank as an order-preserving 16-byte index key.
    ///
    /// Byte order must equal logical order: the votes component is
    /// sign-flipped into an unsigned big-endian value and then complemented,
    /// so larger vote counts sort first; ties break on ascending id.
    pub fn to_index_key(&self) -> [u8; 16] {
        let votes = !((self.votes as u64) ^ (1 << 63));
        let mut key = [0u8; 16];
        key[..8].copy_from_slice(&votes.to_be_bytes());
        key[8..].copy_from_slice(&self.delegate_id.to_be_bytes());
        key
    }

    /// Decodes a rank from its index key form.
    pub fn from_index_key(key: &[u8]) -> Option<VoteRank> {
        let votes_raw: [u8; 8] = key.get(..8)?.try_into().ok()?;
        let id_raw: [u8; 8] = key.get(8..16)?.try_into().ok()?;
        let votes = (!u64::from_be_bytes(votes_raw) ^ (1 << 63)) as Shares;
        Some(VoteRank {
            votes,
            delegate_id: u64::from_be_bytes(id_raw),
        })
    }
}

impl Ord for VoteRank {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .votes
            .cmp(&self.votes)
            .then(self.delegate_id.cmp(&other.delegate_id))
    }
}

impl PartialOrd for VoteRank {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Key of the in-memory pending pool index: orders candidates by total fee
/// descending, then transaction id ascending.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeeIndex {
    /// Total base-asset fee the transaction pays.
    pub fees: Shares,
    /// The candidate transaction.
    pub trx_id: TransactionId,
}

impl Ord for FeeIndex {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .fees
            .cmp(&self.fees)
            .then(self.trx_id.cmp(&other.trx_id))
    }
}

impl PartialOrd for FeeIndex {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Digest160;

    #[test]
    fn vote_rank_orders_by_votes_desc_then_id_asc() {
        let a = VoteRank {
            votes: 10,
            delegate_id: 9,
        };
        let b = VoteRank {
            votes: 10,
            delegate_id: 2,
        };
        let c = VoteRank {
            votes: -3,
            delegate_id: 1,
        };
        let mut ranks = vec![a, c, b];
        ranks.sort();
        assert_eq!(ranks, vec![b, a, c]);
    }

    #[test]
    fn vote_rank_index_key_preserves_order() {
        let ranks = [
            VoteRank {
                votes: i64::MAX,
                delegate_id: 1,
            },
            VoteRank {
                votes: 100,
                delegate_id: 1,
            },
            VoteRank {
                votes: 100,
                delegate_id: 7,
            },
            VoteRank {
                votes: 0,
                delegate_id: 3,
            },
            VoteRank {
                votes: -50,
                delegate_id: 2,
            },
            VoteRank {
                votes: i64::MIN,
                delegate_id: 0,
            },
        ];
        for pair in ranks.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(
                pair[0].to_index_key() < pair[1].to_index_key(),
                "byte order diverged for {:?} / {:?}",
                pair[0],
                pair[1]
            );
        }
        for rank in ranks {
            assert_eq!(VoteRank::from_index_key(&rank.to_index_key()), Some(rank));
        }
    }

    #[test]
    fn fee_index_orders_by_fee_desc_then_id_asc() {
        let hi = FeeIndex {
            fees: 500,
            trx_id: Digest160([9u8; 20]),
        };
        let mid = FeeIndex {
            fees: 100,
            trx_id: Digest160([1u8; 20]),
        };
        let mid_later = FeeIndex {
            fees: 100,
            trx_id: Digest160([2u8; 20]),
        };
        let mut index = vec![mid_later, hi, mid];
        index.sort();
        assert_eq!(index, vec![hi, mid, mid_later]);
    }

    #[test]
    fn null_records_are_tombstones() {
        assert!(AccountRecord::null(4).is_null());
        assert!(AssetRecord::null(1).is_null());
        assert!(BalanceRecord::default().is_null());
        assert!(OrderRecord::default().is_null());
        assert!(CollateralRecord::default().is_null());
        assert!(ProposalRecord::null(2).is_null());
        assert!(ProposalVote::null(ProposalVoteId::default()).is_null());

        let mut rec = AccountRecord::null(4);
        rec.name = "init0".into();
        assert!(!rec.is_null());
    }

    #[test]
    fn balance_id_tracks_condition_only() {
        let condition = WithdrawCondition {
            owner: Address([5u8; 20]),
            asset_id: 0,
            delegate_slate: 3,
        };
        let a = BalanceRecord {
            condition,
            balance: 10,
        };
        let b = BalanceRecord {
            condition,
            balance: 99,
        };
        assert_eq!(a.id(), b.id());

        let other = BalanceRecord {
            condition: WithdrawCondition {
                delegate_slate: -3,
                ..condition
            },
            balance: 10,
        };
        assert_ne!(a.id(), other.id());
    }
}
