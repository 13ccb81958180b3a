// Path: crates/types/src/constants.rs

//! Consensus-critical compile-time constants.
//!
//! These values are part of the consensus definition: every node must agree on
//! them bit-exactly. The `test-params` feature swaps in a small delegate count
//! so the scenario suites can exercise full rotation rounds with a handful of
//! blocks; every other value is identical in both configurations.

/// A signed 64-bit share count. All monetary amounts on the chain use this type.
pub type Shares = i64;

/// Wall-clock seconds between consecutive valid block timestamps.
pub const BLOCK_INTERVAL_SEC: u64 = 30;

/// The fixed length of the active delegate list.
#[cfg(not(feature = "test-params"))]
pub const N_DELEGATES: u64 = 97;
/// The fixed length of the active delegate list (test configuration).
#[cfg(feature = "test-params")]
pub const N_DELEGATES: u64 = 5;

/// Hard cap on the base asset share supply. Genesis allocations plus all
/// delegate pay ever minted must stay at or below this value.
pub const INITIAL_SHARES: Shares = 80_000_000 * 1_000_000;

/// Maximum serialized size of a block's transaction set, in bytes.
pub const MAX_BLOCK_SIZE: usize = 1_048_576;

/// Human-readable prefix on rendered addresses; also the base asset symbol.
pub const ADDRESS_PREFIX: &str = "MRD";

/// Fee rate of the first block after genesis, in millishares per byte.
pub const INITIAL_FEE_RATE: Shares = 1_000;

/// Floor for the exponentially averaged fee rate.
pub const MIN_FEE_RATE: Shares = 1;

/// Averaging window of the fee-rate EMA, in blocks (one day of slots).
pub const FEE_EMA_WINDOW: Shares = 2_880;

/// Averaging window of the delegate-pay EMA, in blocks.
pub const PAY_EMA_WINDOW: Shares = 2_880;
