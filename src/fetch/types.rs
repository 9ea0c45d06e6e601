//! Public resource types shared by the engine and its consumers.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Lifecycle state of a single fetched resource.
///
/// - `Success`: fresh data is available.
/// - `Loading`: a fetch is in flight; data may be present but not fresh.
/// - `Error`: the last fetch failed; prior data may still be present.
/// - `Stale`: nothing is in flight; data may be present but not fresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ResourceFetchState {
  #[default]
  Stale,
  Loading,
  Success,
  Error,
}

impl ResourceFetchState {
  pub fn label(&self) -> &'static str {
    match self {
      Self::Stale => "stale",
      Self::Loading => "loading",
      Self::Success => "success",
      Self::Error => "error",
    }
  }
}

impl fmt::Display for ResourceFetchState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

/// Human-readable description of a failed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
  pub message: String,
}

impl ErrorInfo {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }
}

impl fmt::Display for ErrorInfo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.message)
  }
}

/// Type-erased parsed payload stored in the cache.
pub(crate) type AnyData = Arc<dyn Any + Send + Sync>;

/// What a consumer sees for one resource.
#[derive(Debug)]
pub struct ResourceItem<T> {
  pub data: Option<Arc<T>>,
  pub error: Option<ErrorInfo>,
  pub state: ResourceFetchState,
}

impl<T> ResourceItem<T> {
  /// The sentinel for keys that were never seen or were skipped.
  pub fn stale() -> Self {
    Self {
      data: None,
      error: None,
      state: ResourceFetchState::Stale,
    }
  }

  pub fn is_loading(&self) -> bool {
    self.state == ResourceFetchState::Loading
  }

  pub fn is_success(&self) -> bool {
    self.state == ResourceFetchState::Success
  }

  pub fn is_error(&self) -> bool {
    self.state == ResourceFetchState::Error
  }
}

impl<T> Clone for ResourceItem<T> {
  fn clone(&self) -> Self {
    Self {
      data: self.data.clone(),
      error: self.error.clone(),
      state: self.state,
    }
  }
}

impl<T> Default for ResourceItem<T> {
  fn default() -> Self {
    Self::stale()
  }
}

/// One entry of the observable snapshot. Engine bookkeeping is kept
/// elsewhere so it never shows up here.
#[derive(Clone, Default)]
pub struct ResourceEntry {
  pub(crate) data: Option<AnyData>,
  pub error: Option<ErrorInfo>,
  pub state: ResourceFetchState,
}

impl ResourceEntry {
  pub fn has_data(&self) -> bool {
    self.data.is_some()
  }

  pub(crate) fn typed<T: Send + Sync + 'static>(&self) -> ResourceItem<T> {
    ResourceItem {
      data: self
        .data
        .clone()
        .and_then(|data| data.downcast::<T>().ok()),
      error: self.error.clone(),
      state: self.state,
    }
  }
}

impl fmt::Debug for ResourceEntry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ResourceEntry")
      .field("has_data", &self.data.is_some())
      .field("error", &self.error)
      .field("state", &self.state)
      .finish()
  }
}
