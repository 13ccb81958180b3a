// Path: crates/types/src/error.rs

//! Core error types for the Meridian chain engine.

use crate::constants::Shares;
use thiserror::Error;

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Errors from the persistent ordered store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A generic error originating from the underlying key-value backend.
    #[error("storage backend error: {0}")]
    Backend(String),
    /// An error occurred while serializing data for storage.
    #[error("encode error: {0}")]
    Encode(String),
    /// An error occurred while deserializing data from storage.
    #[error("decode error: {0}")]
    Decode(String),
    /// The requested key or item was not found in the store.
    #[error("not found")]
    NotFound,
    /// A filesystem error occurred while opening or removing the store.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorCode for StoreError {
    fn code(&self) -> &'static str {
        match self {
            Self::Backend(_) => "STORE_BACKEND_ERROR",
            Self::Encode(_) => "STORE_ENCODE_ERROR",
            Self::Decode(_) => "STORE_DECODE_ERROR",
            Self::NotFound => "STORE_NOT_FOUND",
            Self::Io(_) => "STORE_IO_ERROR",
        }
    }
}

/// Errors from transaction evaluation.
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// A required signature is missing from the transaction.
    #[error("missing required signature of {0}")]
    MissingSignature(String),
    /// A signature failed cryptographic verification.
    #[error("invalid signature at index {0}")]
    InvalidSignature(usize),
    /// A balance does not cover the requested withdrawal.
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),
    /// The transaction's base-asset fee is below the required minimum.
    #[error("insufficient fee: required {required}, got {got}")]
    InsufficientFee {
        /// Minimum base-asset fee for the transaction's size.
        required: Shares,
        /// Fee the transaction actually pays.
        got: Shares,
    },
    /// Issuing the requested amount would exceed the asset's supply cap.
    #[error("share supply cap exceeded for asset {asset_id}")]
    SupplyCapExceeded {
        /// The asset whose cap would be breached.
        asset_id: u64,
    },
    /// A transaction withdrew less of an asset than it deposited.
    #[error("negative fee for asset {asset_id}")]
    NegativeFee {
        /// The asset with a deposit surplus.
        asset_id: u64,
    },
    /// No handler is registered for the operation's tag.
    #[error("no handler registered for operation {0}")]
    UnknownOperation(String),
    /// The operation's parameters are invalid in the current state.
    #[error("invalid operation: {0}")]
    Invalid(String),
    /// A unique name or symbol is already taken.
    #[error("duplicate registration: {0}")]
    Duplicate(String),
    /// A referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Reading or writing pending state failed.
    #[error("state access failed: {0}")]
    Store(#[from] StoreError),
}

impl ErrorCode for EvaluationError {
    fn code(&self) -> &'static str {
        match self {
            Self::MissingSignature(_) => "EVAL_MISSING_SIGNATURE",
            Self::InvalidSignature(_) => "EVAL_INVALID_SIGNATURE",
            Self::InsufficientFunds(_) => "EVAL_INSUFFICIENT_FUNDS",
            Self::InsufficientFee { .. } => "EVAL_INSUFFICIENT_FEE",
            Self::SupplyCapExceeded { .. } => "EVAL_SUPPLY_CAP_EXCEEDED",
            Self::NegativeFee { .. } => "EVAL_NEGATIVE_FEE",
            Self::UnknownOperation(_) => "EVAL_UNKNOWN_OPERATION",
            Self::Invalid(_) => "EVAL_INVALID_OPERATION",
            Self::Duplicate(_) => "EVAL_DUPLICATE",
            Self::NotFound(_) => "EVAL_NOT_FOUND",
            Self::Store(_) => "EVAL_STORE_ERROR",
        }
    }
}

/// Errors from the chain engine.
#[derive(Debug, Error)]
pub enum ChainError {
    /// A caller-supplied argument is malformed or out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A block violated a consensus rule and has been marked invalid.
    #[error("consensus violation: {0}")]
    ConsensusViolation(String),
    /// A referenced block, transaction or record does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// An invariant breach was detected; the database cannot be trusted.
    #[error("corruption: {0}")]
    Corruption(String),
    /// The storage layer failed; the engine must be closed and reopened.
    #[error("storage failure: {0}")]
    Io(#[from] StoreError),
    /// A transaction failed evaluation.
    #[error("transaction evaluation failed: {0}")]
    Evaluation(#[from] EvaluationError),
}

impl ErrorCode for ChainError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "CHAIN_INVALID_ARGUMENT",
            Self::ConsensusViolation(_) => "CHAIN_CONSENSUS_VIOLATION",
            Self::NotFound(_) => "CHAIN_NOT_FOUND",
            Self::Corruption(_) => "CHAIN_CORRUPTION",
            Self::Io(_) => "CHAIN_STORAGE_FAILURE",
            Self::Evaluation(_) => "CHAIN_EVALUATION_FAILED",
        }
    }
}

impl From<String> for ChainError {
    fn from(s: String) -> Self {
        ChainError::Corruption(s)
    }
}
