//! Persisted UI preferences.
//!
//! Values are plain strings in a key/value backend (SQLite on disk, or
//! memory when persistence is off). `PersistedScalar` layers typed access
//! and change notification on top.

mod kv;
mod scalar;

pub use kv::{KvError, KvStore, MemoryKvStore, SqliteKvStore};
pub use scalar::{PersistedScalar, Storage};
