// Path: crates/storage/src/lib.rs
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! Pure-Rust persistent ordered store (redb) for the chain engine.
//!
//! One redb database file holds one named table per logical map of the chain
//! layout (`fork_db`, `account_db`, `undo_state_db`, ...). Grouping every map
//! into a single file is what lets a block application commit as one atomic
//! [`WriteBatch`]: after a successful commit all of the block's writes are
//! visible on restart, and on a crash before commit none of them are.
//!
//! Keys are raw bytes chosen by the caller so that byte order equals logical
//! order; values are the canonical encoding of their record type.

pub mod cursor;
pub mod db;
pub mod tables;

pub use cursor::Cursor;
pub use db::{Db, WriteBatch};
