//! The two data-access strategies over a [`BackingStore`](crate::store::BackingStore).
//!
//! - [`ConnectedAccessor`] sends every call straight to the store.
//! - [`DisconnectedCache`] works on a loaded snapshot and buffers changes
//!   until [`SyncEngine`](crate::sync::SyncEngine) applies them.
//!
//! The two never share in-memory state.

mod connected;
mod disconnected;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use connected::ConnectedAccessor;
pub use disconnected::{CachedRow, DisconnectedCache, LoadPolicy};

/// Change state of a cached row relative to the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowState {
  /// Matches what was loaded or last synchronized
  Unchanged,
  /// Created locally, not yet in the store
  Added,
  /// Edited locally since load
  Modified,
  /// Marked for deletion; kept until synchronized
  Deleted,
}

impl RowState {
  pub fn is_pending(self) -> bool {
    self != Self::Unchanged
  }
}

impl fmt::Display for RowState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(self, f)
  }
}
