//! Connected and disconnected data access over a shop database.
//!
//! A [`ConnectedAccessor`] sends every call straight to a [`BackingStore`].
//! A [`DisconnectedCache`] loads a snapshot, buffers edits as tagged rows,
//! and hands them to a [`SyncEngine`] that applies them row by row.

pub mod access;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod logging;
pub mod record;
pub mod store;
pub mod sync;

pub use access::{ConnectedAccessor, DisconnectedCache, LoadPolicy, RowState};
pub use db::Database;
pub use error::{ErrorKind, Result, StoreError};
pub use record::{FieldChanges, FieldValue, Record, RecordKey};
pub use store::{BackingStore, Filter, InMemoryStore, SqliteStore};
pub use sync::{Outcome, RowOutcome, SyncEngine, SyncOptions, SyncResult};
