//! Typed, observable values stored under a single key.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use crate::store::Subscription;

use super::kv::{KvStore, MemoryKvStore};

type Listener = Rc<dyn Fn()>;

struct StorageInner {
  backend: Box<dyn KvStore>,
  listeners: RefCell<HashMap<String, Vec<(u64, Listener)>>>,
  next_listener: Cell<u64>,
}

/// A key/value backend plus a per-key listener registry, so every binding
/// of a key hears about writes made through any other binding.
#[derive(Clone)]
pub struct Storage {
  inner: Rc<StorageInner>,
}

impl Storage {
  pub fn new(backend: impl KvStore + 'static) -> Self {
    Self {
      inner: Rc::new(StorageInner {
        backend: Box::new(backend),
        listeners: RefCell::new(HashMap::new()),
        next_listener: Cell::new(0),
      }),
    }
  }

  /// Storage that lives only as long as the process.
  pub fn memory() -> Self {
    Self::new(MemoryKvStore::default())
  }

  /// Read a raw value. Backend failures read as missing.
  pub fn read(&self, key: &str) -> Option<String> {
    match self.inner.backend.get_item(key) {
      Ok(value) => value,
      Err(e) => {
        debug!(key, error = %e, "failed to read preference");
        None
      }
    }
  }

  /// Write (or with `None`, remove) a raw value, then notify the key's
  /// listeners. Backend failures are logged and otherwise ignored.
  pub fn write(&self, key: &str, value: Option<&str>) {
    let result = match value {
      Some(value) => self.inner.backend.set_item(key, value),
      None => self.inner.backend.remove_item(key),
    };
    if let Err(e) = result {
      warn!(key, error = %e, "failed to write preference");
    }
    self.emit(key);
  }

  pub fn watch<F>(&self, key: &str, listener: F) -> Subscription
  where
    F: Fn() + 'static,
  {
    let id = self.inner.next_listener.get();
    self.inner.next_listener.set(id + 1);
    self
      .inner
      .listeners
      .borrow_mut()
      .entry(key.to_string())
      .or_default()
      .push((id, Rc::new(listener)));

    let weak: Weak<StorageInner> = Rc::downgrade(&self.inner);
    let key = key.to_string();
    Subscription::new(move || {
      let Some(inner) = weak.upgrade() else {
        return;
      };
      let mut listeners = inner.listeners.borrow_mut();
      if let Some(registered) = listeners.get_mut(&key) {
        registered.retain(|(existing, _)| *existing != id);
        if registered.is_empty() {
          listeners.remove(&key);
        }
      }
    })
  }

  /// Notify every watched key if another process changed the backend.
  /// Returns whether such a change was seen.
  pub fn sync_external(&self) -> bool {
    let changed = match self.inner.backend.external_change() {
      Ok(changed) => changed,
      Err(e) => {
        debug!(error = %e, "failed to check for external preference changes");
        false
      }
    };
    if changed {
      let keys: Vec<String> = self.inner.listeners.borrow().keys().cloned().collect();
      debug!(keys = keys.len(), "preferences changed externally");
      for key in keys {
        self.emit(&key);
      }
    }
    changed
  }

  fn emit(&self, key: &str) {
    // Listeners may watch or unwatch while being notified
    let snapshot: Vec<Listener> = self
      .inner
      .listeners
      .borrow()
      .get(key)
      .map(|registered| registered.iter().map(|(_, l)| Rc::clone(l)).collect())
      .unwrap_or_default();
    for listener in snapshot {
      listener();
    }
  }
}

/// A value of type `T` bound to one storage key.
///
/// `get` falls back to the default when the key is missing, the backend
/// fails, or the stored text does not parse.
pub struct PersistedScalar<T> {
  storage: Storage,
  key: String,
  default: T,
  parse: Rc<dyn Fn(&str) -> Option<T>>,
  serialize: Rc<dyn Fn(&T) -> Option<String>>,
}

impl<T: Clone + 'static> PersistedScalar<T> {
  /// A `serialize` result of `None` removes the key.
  pub fn new(
    storage: &Storage,
    key: impl Into<String>,
    default: T,
    parse: impl Fn(&str) -> Option<T> + 'static,
    serialize: impl Fn(&T) -> Option<String> + 'static,
  ) -> Self {
    Self {
      storage: storage.clone(),
      key: key.into(),
      default,
      parse: Rc::new(parse),
      serialize: Rc::new(serialize),
    }
  }

  pub fn key(&self) -> &str {
    &self.key
  }

  pub fn get(&self) -> T {
    self
      .storage
      .read(&self.key)
      .and_then(|raw| (self.parse)(&raw))
      .unwrap_or_else(|| self.default.clone())
  }

  pub fn set(&self, value: &T) {
    let raw = (self.serialize)(value);
    self.storage.write(&self.key, raw.as_deref());
  }

  /// Snapshot for contexts without storage access.
  pub fn server_snapshot(&self) -> T {
    self.default.clone()
  }

  pub fn subscribe<F>(&self, listener: F) -> Subscription
  where
    F: Fn() + 'static,
  {
    self.storage.watch(&self.key, listener)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::persist::kv::{KvError, SqliteKvStore};

  fn counter(storage: &Storage, key: &str) -> PersistedScalar<u32> {
    PersistedScalar::new(
      storage,
      key,
      7,
      |raw| raw.parse().ok(),
      |value| Some(value.to_string()),
    )
  }

  struct BrokenStore;

  impl KvStore for BrokenStore {
    fn get_item(&self, _key: &str) -> Result<Option<String>, KvError> {
      Err(KvError::Poisoned)
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<(), KvError> {
      Err(KvError::Poisoned)
    }

    fn remove_item(&self, _key: &str) -> Result<(), KvError> {
      Err(KvError::Poisoned)
    }
  }

  #[test]
  fn test_default_when_missing_or_unparseable() {
    let storage = Storage::memory();
    let value = counter(&storage, "count");
    assert_eq!(value.get(), 7);

    storage.write("count", Some("not a number"));
    assert_eq!(value.get(), 7);

    value.set(&3);
    assert_eq!(value.get(), 3);
    assert_eq!(value.server_snapshot(), 7);
  }

  #[test]
  fn test_writes_notify_every_binding_of_the_key() {
    let storage = Storage::memory();
    let a = counter(&storage, "count");
    let b = counter(&storage, "count");
    let other = counter(&storage, "other");

    let seen = Rc::new(Cell::new(0));
    let seen_by_b = Rc::clone(&seen);
    let _sub = b.subscribe(move || seen_by_b.set(seen_by_b.get() + 1));
    let untouched = Rc::new(Cell::new(false));
    let flag = Rc::clone(&untouched);
    let _other_sub = other.subscribe(move || flag.set(true));

    a.set(&9);
    assert_eq!(seen.get(), 1);
    assert_eq!(b.get(), 9);
    assert!(!untouched.get());
  }

  #[test]
  fn test_unsubscribe_stops_notifications() {
    let storage = Storage::memory();
    let value = counter(&storage, "count");
    let seen = Rc::new(Cell::new(0));
    let counter_seen = Rc::clone(&seen);
    let sub = value.subscribe(move || counter_seen.set(counter_seen.get() + 1));

    value.set(&1);
    sub.unsubscribe();
    value.set(&2);
    assert_eq!(seen.get(), 1);
  }

  #[test]
  fn test_failing_backend_falls_back_and_still_emits() {
    let storage = Storage::new(BrokenStore);
    let value = counter(&storage, "count");
    let seen = Rc::new(Cell::new(false));
    let flag = Rc::clone(&seen);
    let _sub = value.subscribe(move || flag.set(true));

    value.set(&5);
    assert_eq!(value.get(), 7);
    assert!(seen.get());
  }

  #[test]
  fn test_serialize_none_removes_key() {
    let storage = Storage::memory();
    let value: PersistedScalar<Option<String>> = PersistedScalar::new(
      &storage,
      "table.people.cols",
      None,
      |raw| Some(Some(raw.to_string())),
      |value| value.clone(),
    );

    value.set(&Some("name,mass".to_string()));
    assert_eq!(storage.read("table.people.cols").as_deref(), Some("name,mass"));
    value.set(&None);
    assert_eq!(storage.read("table.people.cols"), None);
  }

  #[test]
  fn test_sync_external_notifies_watchers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.db");
    let storage = Storage::new(SqliteKvStore::open(&path).unwrap());
    let elsewhere = SqliteKvStore::open(&path).unwrap();

    let value = counter(&storage, "count");
    let seen = Rc::new(Cell::new(0));
    let counter_seen = Rc::clone(&seen);
    let _sub = value.subscribe(move || counter_seen.set(counter_seen.get() + 1));

    assert!(!storage.sync_external());
    elsewhere.set_item("count", "42").unwrap();
    assert!(storage.sync_external());
    assert_eq!(seen.get(), 1);
    assert_eq!(value.get(), 42);
  }
}
