// Path: crates/types/src/lib.rs
#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # Meridian Chain Types
//!
//! This crate is the foundational library for the Meridian chain engine,
//! containing all core data structures, error types and consensus constants.
//!
//! ## Architectural Role
//!
//! As the base crate, `meridian-types` has minimal dependencies and is itself a
//! dependency for every other crate in the workspace. This structure prevents
//! circular dependencies and provides a stable, canonical definition for shared
//! types like [`block::FullBlock`], [`transaction::SignedTransaction`],
//! [`records::AccountRecord`] and the error enums.

/// Block headers, full blocks, ids and the deterministic fee schedule.
pub mod block;
/// The canonical, deterministic binary codec for consensus-critical state.
pub mod codec;
/// Consensus-critical compile-time constants.
pub mod constants;
/// Digests, signing keys, signatures and addresses.
pub mod crypto;
/// A unified set of all error types used across the engine.
pub mod error;
/// The genesis configuration file format.
pub mod genesis;
/// Entity records, chain properties and index key types.
pub mod records;
/// Signed transactions and the tagged operation family.
pub mod transaction;
