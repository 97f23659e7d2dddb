//! Persistence for Huddle.
//!
//! This crate provides:
//! - A transactional, partitioned key-value store backed by SQLite
//! - Per-partition sequences for assigning question identifiers
//! - The records Huddle persists (teams, questions, rounds) and their CRUD

mod error;
pub mod kv;
mod records;
mod types;

pub use error::StoreError;
pub use kv::{Partition, Store, Tx};
pub use types::{Question, ReplyOutcome, ResponseState, Round, RoundKey, Team, compare_ts};
