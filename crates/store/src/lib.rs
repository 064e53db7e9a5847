//! Persistence for scans and scan results.
//!
//! The lifecycle only ever talks to a [`ScanStore`]. Two implementations are
//! provided:
//! - [`Repository`]: SQLite via `sqlx`, with migrations embedded in the binary.
//! - `MockStore` (behind the `mock` feature): in-memory, for tests in other
//!   crates.
//!
//! # Layout
//! A result row is the unit of work shared between users; a scan row is one
//! user's request pointing at exactly one result. Deleting a scan never
//! deletes its result.

mod db;
pub mod error;
#[cfg(feature = "mock")]
mod mock;
mod models;
mod repo;
mod store;

pub use crate::db::Database;
#[cfg(feature = "mock")]
pub use crate::mock::MockStore;
pub use crate::repo::Repository;
pub use crate::store::{Creation, ScanStore, StoreHandle};
