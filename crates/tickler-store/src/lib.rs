//! `tickler-store`: persistence for task records.
//!
//! The [`TaskStore`] trait is the only thing the reminder engine and the
//! interactive session know about. Two implementations ship:
//!
//! | Store              | Backing                         |
//! |--------------------|---------------------------------|
//! | [`SqliteTaskStore`] | SQLite file (or in-memory DB)  |
//! | [`MemoryTaskStore`] | `BTreeMap` behind a mutex      |
//!
//! Both hold one coarse lock for every operation, and both implement
//! [`TaskStore::modify`] as a single locked find → mutate → persist.

pub mod db;
pub mod error;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::MemoryTaskStore;
pub use sqlite::SqliteTaskStore;
pub use store::TaskStore;
