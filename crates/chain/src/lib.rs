// Path: crates/chain/src/lib.rs
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo
    )
)]

//! # Meridian Chain Engine
//!
//! A persistent, append-with-reorg chain database for a delegated
//! proof-of-stake ledger. The engine ingests signed blocks, validates them
//! against consensus rules, maintains a tree of competing forks, and exposes
//! the materialized best-chain state (accounts, balances, assets, delegates,
//! orders) through read accessors.
//!
//! The moving parts:
//!
//! - [`state`] — the committed store and the copy-on-write pending overlay
//!   with its undo machinery;
//! - [`fork`] — the fork DAG with linkage and validity propagation;
//! - [`eval`] — the transaction evaluator contract and the operation registry;
//! - [`pipeline`] — header verification and the block application steps;
//! - [`producer`] — candidate block assembly for the scheduled delegate;
//! - [`db`] — [`ChainDatabase`], the single-writer engine tying it together.

/// The engine: open/close, push_block, reorg handling and read accessors.
pub mod db;
/// Transaction evaluation: registry, context and the built-in operations.
pub mod eval;
/// The fork DAG and its flag propagation.
pub mod fork;
/// Genesis bootstrap.
pub mod genesis;
/// Observer notifications fired after commit.
pub mod observer;
/// Header verification and the block application steps.
pub mod pipeline;
/// Candidate block assembly.
pub mod producer;
/// Committed store and pending overlay.
pub mod state;

pub use db::ChainDatabase;
pub use observer::{BlockSummary, ChainObserver};
