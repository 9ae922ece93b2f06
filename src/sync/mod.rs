//! Synchronization of buffered cache rows against the backing store.

mod engine;
mod result;

pub use engine::{SyncEngine, SyncOptions};
pub use result::{Outcome, RowOutcome, SyncResult};
