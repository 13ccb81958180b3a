// Path: crates/types/src/genesis.rs

//! The genesis configuration file format.
//!
//! A genesis file is either human-readable JSON (`.json`) or the packed
//! canonical encoding (`.dat`). The chain id is the `sha256` of the canonical
//! encoding of the parsed configuration, so both formats of the same
//! configuration bootstrap the same chain.

use crate::constants::Shares;
use crate::crypto::{sha256_encoded, Address, ChainId, PublicKey};
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// A named key in the genesis roster.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct GenesisName {
    /// The unique account name to register.
    pub name: String,
    /// The owning (and initial active) key.
    pub owner: PublicKey,
    /// Whether the account joins the initial delegate roster.
    pub is_delegate: bool,
}

/// An initial share allocation.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct GenesisBalance {
    /// The address credited with the allocation.
    pub owner: Address,
    /// The number of base-asset shares allocated.
    pub amount: Shares,
}

/// The complete genesis configuration.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct GenesisConfig {
    /// The timestamp of the genesis state; must be a multiple of the block
    /// interval, since delegate slot accounting steps from it.
    pub timestamp: u64,
    /// The ordered list of named keys to register.
    pub names: Vec<GenesisName>,
    /// The initial base-asset allocations.
    pub balances: Vec<GenesisBalance>,
}

impl GenesisConfig {
    /// The chain id defined by this configuration.
    pub fn chain_id(&self) -> ChainId {
        sha256_encoded(self)
    }

    /// Total shares allocated at genesis.
    pub fn total_allocation(&self) -> Shares {
        self.balances.iter().map(|b| b.amount).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::public_key_of;

    fn sample() -> GenesisConfig {
        GenesisConfig {
            timestamp: 60,
            names: vec![GenesisName {
                name: "init0".into(),
                owner: public_key_of(&[1u8; 32]),
                is_delegate: true,
            }],
            balances: vec![GenesisBalance {
                owner: public_key_of(&[2u8; 32]).address(),
                amount: 1_000,
            }],
        }
    }

    #[test]
    fn chain_id_is_stable_across_formats() {
        let config = sample();
        let json = serde_json::to_string(&config).unwrap();
        let reparsed: GenesisConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(reparsed, config);
        assert_eq!(reparsed.chain_id(), config.chain_id());

        let packed = config.encode();
        let unpacked = GenesisConfig::decode(&mut &packed[..]).unwrap();
        assert_eq!(unpacked.chain_id(), config.chain_id());
    }

    #[test]
    fn chain_id_tracks_content() {
        let config = sample();
        let mut other = config.clone();
        other.timestamp += 30;
        assert_ne!(config.chain_id(), other.chain_id());
        assert_eq!(config.total_allocation(), 1_000);
    }
}
