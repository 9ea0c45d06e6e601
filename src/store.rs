//! Minimal publish/subscribe state container.
//!
//! A `Store<S, A>` holds an immutable `Rc<S>` snapshot, replaces it on every
//! dispatch by running a pure reducer, and then notifies subscribers in
//! registration order. It knows nothing about resources or networking; the
//! fetch engine is built on top of it.
//!
//! # Example
//!
//! ```ignore
//! #[derive(Debug)]
//! enum Action { Increment }
//!
//! let store = Store::new(|state: &Rc<u32>, action: &Action| match action {
//!   Action::Increment => Rc::new(**state + 1),
//! }, 0);
//!
//! let _scope = store.provide();
//! let _sub = store.subscribe(|| println!("changed"));
//! store.dispatch(Action::Increment);
//! assert_eq!(*store.get_state(), 1);
//! ```

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::sync::Arc;

/// Errors raised synchronously by the store's hook-style accessors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
  /// A hook was used while no `ProviderScope` for the store was alive.
  #[error("store hooks must be used within their provider")]
  OutsideProvider,
}

/// Identity comparison used to decide whether a derived value changed.
///
/// Shared pointers compare by address, so selectors must return the same
/// `Rc`/`Arc` for unchanged inputs or observers will be over-notified.
pub trait Identical {
  fn identical(&self, other: &Self) -> bool;
}

impl<T: ?Sized> Identical for Rc<T> {
  fn identical(&self, other: &Self) -> bool {
    Rc::ptr_eq(self, other)
  }
}

impl<T: ?Sized> Identical for Arc<T> {
  fn identical(&self, other: &Self) -> bool {
    Arc::ptr_eq(self, other)
  }
}

impl<T: Identical> Identical for Option<T> {
  fn identical(&self, other: &Self) -> bool {
    match (self, other) {
      (Some(a), Some(b)) => a.identical(b),
      (None, None) => true,
      _ => false,
    }
  }
}

macro_rules! identical_by_value {
  ($($ty:ty),*) => {
    $(impl Identical for $ty {
      fn identical(&self, other: &Self) -> bool {
        self == other
      }
    })*
  };
}

identical_by_value!(bool, char, u8, u16, u32, u64, usize, i32, i64);

type Listener = Rc<dyn Fn()>;
type ReducerFn<S, A> = Box<dyn Fn(&Rc<S>, &A) -> Rc<S>>;

struct StoreInner<S, A> {
  reducer: ReducerFn<S, A>,
  initial: Rc<S>,
  state: RefCell<Rc<S>>,
  listeners: RefCell<Vec<(u64, Listener)>>,
  next_listener: Cell<u64>,
  queue: RefCell<VecDeque<A>>,
  dispatching: Cell<bool>,
  providers: Cell<usize>,
}

/// Cloneable handle to a shared store.
pub struct Store<S, A> {
  inner: Rc<StoreInner<S, A>>,
}

impl<S, A> Clone for Store<S, A> {
  fn clone(&self) -> Self {
    Self {
      inner: Rc::clone(&self.inner),
    }
  }
}

impl<S: 'static, A: 'static> Store<S, A> {
  /// Create a store from a pure, total reducer and an initial state.
  ///
  /// The reducer must return the incoming `Rc` unchanged for actions it
  /// does not handle, so identity-based observers stay quiet.
  pub fn new<R>(reducer: R, initial: S) -> Self
  where
    R: Fn(&Rc<S>, &A) -> Rc<S> + 'static,
  {
    let initial = Rc::new(initial);
    Self {
      inner: Rc::new(StoreInner {
        reducer: Box::new(reducer),
        state: RefCell::new(Rc::clone(&initial)),
        initial,
        listeners: RefCell::new(Vec::new()),
        next_listener: Cell::new(0),
        queue: RefCell::new(VecDeque::new()),
        dispatching: Cell::new(false),
        providers: Cell::new(0),
      }),
    }
  }

  /// Current snapshot.
  pub fn get_state(&self) -> Rc<S> {
    Rc::clone(&self.inner.state.borrow())
  }

  /// Deterministic snapshot for contexts with no live state: the initial value.
  pub fn server_snapshot(&self) -> Rc<S> {
    Rc::clone(&self.inner.initial)
  }

  /// Run the reducer and notify subscribers.
  ///
  /// Dispatching from within a subscriber queues the action behind the
  /// notification pass that is currently running.
  pub fn dispatch(&self, action: A) {
    self.inner.queue.borrow_mut().push_back(action);
    if self.inner.dispatching.get() {
      return;
    }

    let _pass = DispatchPass::enter(&self.inner.dispatching);
    loop {
      let Some(action) = self.inner.queue.borrow_mut().pop_front() else {
        break;
      };
      let current = self.get_state();
      let next = (self.inner.reducer)(&current, &action);
      *self.inner.state.borrow_mut() = next;
      self.notify();
    }
  }

  fn notify(&self) {
    let snapshot: Vec<(u64, Listener)> = self.inner.listeners.borrow().clone();
    for (id, listener) in snapshot {
      // Skip listeners removed earlier in this pass
      let still_registered = self
        .inner
        .listeners
        .borrow()
        .iter()
        .any(|(registered, _)| *registered == id);
      if still_registered {
        listener();
      }
    }
  }

  /// Register a zero-argument listener. Dropping the returned subscription
  /// unregisters it.
  pub fn subscribe<F>(&self, listener: F) -> Subscription
  where
    F: Fn() + 'static,
  {
    let id = self.inner.next_listener.get();
    self.inner.next_listener.set(id + 1);
    self
      .inner
      .listeners
      .borrow_mut()
      .push((id, Rc::new(listener)));

    let weak: Weak<StoreInner<S, A>> = Rc::downgrade(&self.inner);
    Subscription::new(move || {
      if let Some(inner) = weak.upgrade() {
        inner
          .listeners
          .borrow_mut()
          .retain(|(registered, _)| *registered != id);
      }
    })
  }

  /// Compute a derived value from the current snapshot.
  pub fn select<T>(&self, selector: impl Fn(&S) -> T) -> T {
    selector(&self.get_state())
  }

  /// Call `on_change` after a dispatch only when the selected value differs
  /// by identity from the previous one.
  pub fn watch<T, F, C>(&self, selector: F, on_change: C) -> Subscription
  where
    T: Identical + 'static,
    F: Fn(&S) -> T + 'static,
    C: Fn(&T) + 'static,
  {
    let last = RefCell::new(self.select(&selector));
    let weak: Weak<StoreInner<S, A>> = Rc::downgrade(&self.inner);
    self.subscribe(move || {
      let Some(inner) = weak.upgrade() else {
        return;
      };
      let state = Rc::clone(&inner.state.borrow());
      let next = selector(&state);
      let changed = !last.borrow().identical(&next);
      if changed {
        on_change(&next);
        *last.borrow_mut() = next;
      }
    })
  }

  /// Open a provisioning scope. Hook-style accessors succeed only while at
  /// least one scope is alive.
  pub fn provide(&self) -> ProviderScope {
    self.inner.providers.set(self.inner.providers.get() + 1);
    let weak: Weak<StoreInner<S, A>> = Rc::downgrade(&self.inner);
    ProviderScope {
      release: Some(Box::new(move || {
        if let Some(inner) = weak.upgrade() {
          inner.providers.set(inner.providers.get().saturating_sub(1));
        }
      })),
    }
  }

  pub fn is_provided(&self) -> bool {
    self.inner.providers.get() > 0
  }

  fn guard(&self) -> Result<(), StoreError> {
    if self.is_provided() {
      Ok(())
    } else {
      Err(StoreError::OutsideProvider)
    }
  }

  /// Derived value tracker bound to this store.
  pub fn use_selector<T, F>(&self, selector: F) -> Result<Selection<S, A, T>, StoreError>
  where
    T: Identical + Clone,
    F: Fn(&S) -> T + 'static,
  {
    self.guard()?;
    let last = RefCell::new(self.select(&selector));
    Ok(Selection {
      store: self.clone(),
      selector: Box::new(selector),
      last,
    })
  }

  /// Return the dispatcher for this store.
  pub fn use_dispatch(&self) -> Result<Dispatcher<S, A>, StoreError> {
    self.guard()?;
    Ok(Dispatcher {
      store: self.clone(),
    })
  }
}

/// Resets the dispatching flag even if a reducer or listener panics.
struct DispatchPass<'a> {
  flag: &'a Cell<bool>,
}

impl<'a> DispatchPass<'a> {
  fn enter(flag: &'a Cell<bool>) -> Self {
    flag.set(true);
    Self { flag }
  }
}

impl Drop for DispatchPass<'_> {
  fn drop(&mut self) {
    self.flag.set(false);
  }
}

/// Registration handle returned by `Store::subscribe`.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
  remove: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
  pub(crate) fn new(remove: impl FnOnce() + 'static) -> Self {
    Self {
      remove: Some(Box::new(remove)),
    }
  }

  pub fn unsubscribe(mut self) {
    if let Some(remove) = self.remove.take() {
      remove();
    }
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    if let Some(remove) = self.remove.take() {
      remove();
    }
  }
}

/// Provisioning context for a store; see `Store::provide`.
#[must_use = "hooks fail once the scope is dropped"]
pub struct ProviderScope {
  release: Option<Box<dyn FnOnce()>>,
}

impl Drop for ProviderScope {
  fn drop(&mut self) {
    if let Some(release) = self.release.take() {
      release();
    }
  }
}

/// Dispatch handle returned by `Store::use_dispatch`.
pub struct Dispatcher<S, A> {
  store: Store<S, A>,
}

impl<S: 'static, A: 'static> Dispatcher<S, A> {
  pub fn dispatch(&self, action: A) {
    self.store.dispatch(action);
  }
}

/// A derived value that remembers what it last reported.
pub struct Selection<S, A, T> {
  store: Store<S, A>,
  selector: Box<dyn Fn(&S) -> T>,
  last: RefCell<T>,
}

impl<S: 'static, A: 'static, T: Identical + Clone> Selection<S, A, T> {
  /// The value as of the last `refresh`.
  pub fn current(&self) -> T {
    self.last.borrow().clone()
  }

  /// Recompute; returns true when the value changed by identity.
  pub fn refresh(&self) -> bool {
    let next = self.store.select(&self.selector);
    if self.last.borrow().identical(&next) {
      return false;
    }
    *self.last.borrow_mut() = next;
    true
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug, Clone, PartialEq, Eq)]
  struct Counter {
    count: u32,
    label: Rc<String>,
  }

  #[derive(Debug)]
  enum Action {
    Increment,
    Rename(&'static str),
    Unknown,
  }

  fn counter_store() -> Store<Counter, Action> {
    Store::new(
      |state: &Rc<Counter>, action: &Action| match action {
        Action::Increment => Rc::new(Counter {
          count: state.count + 1,
          label: Rc::clone(&state.label),
        }),
        Action::Rename(name) => Rc::new(Counter {
          count: state.count,
          label: Rc::new(name.to_string()),
        }),
        Action::Unknown => Rc::clone(state),
      },
      Counter {
        count: 0,
        label: Rc::new("start".to_string()),
      },
    )
  }

  #[test]
  fn test_dispatch_replaces_state() {
    let store = counter_store();
    let before = store.get_state();
    store.dispatch(Action::Increment);
    let after = store.get_state();

    assert_eq!(before.count, 0);
    assert_eq!(after.count, 1);
    assert!(!Rc::ptr_eq(&before, &after));
  }

  #[test]
  fn test_unknown_action_keeps_identity() {
    let store = counter_store();
    let before = store.get_state();
    store.dispatch(Action::Unknown);
    assert!(Rc::ptr_eq(&before, &store.get_state()));
  }

  #[test]
  fn test_listeners_fire_in_registration_order() {
    let store = counter_store();
    let log = Rc::new(RefCell::new(Vec::new()));

    let first = {
      let log = Rc::clone(&log);
      store.subscribe(move || log.borrow_mut().push("first"))
    };
    let second = {
      let log = Rc::clone(&log);
      store.subscribe(move || log.borrow_mut().push("second"))
    };

    store.dispatch(Action::Increment);
    store.dispatch(Action::Increment);

    assert_eq!(*log.borrow(), vec!["first", "second", "first", "second"]);
    drop((first, second));
  }

  #[test]
  fn test_unsubscribe_stops_notifications() {
    let store = counter_store();
    let calls = Rc::new(Cell::new(0));

    let sub = {
      let calls = Rc::clone(&calls);
      store.subscribe(move || calls.set(calls.get() + 1))
    };
    store.dispatch(Action::Increment);
    sub.unsubscribe();
    store.dispatch(Action::Increment);

    assert_eq!(calls.get(), 1);
  }

  #[test]
  fn test_dispatch_from_listener_is_queued() {
    let store = counter_store();
    let seen = Rc::new(RefCell::new(Vec::new()));

    let _reentrant = {
      let inner = store.clone();
      store.subscribe(move || {
        if inner.get_state().count == 1 {
          inner.dispatch(Action::Increment);
        }
      })
    };
    let _observer = {
      let inner = store.clone();
      let seen = Rc::clone(&seen);
      store.subscribe(move || seen.borrow_mut().push(inner.get_state().count))
    };

    store.dispatch(Action::Increment);

    // The second listener sees count=1 first; the queued dispatch runs after
    assert_eq!(*seen.borrow(), vec![1, 2]);
    assert_eq!(store.get_state().count, 2);
  }

  #[test]
  fn test_watch_notifies_only_on_identity_change() {
    let store = counter_store();
    let labels = Rc::new(RefCell::new(Vec::new()));

    let _sub = {
      let labels = Rc::clone(&labels);
      store.watch(
        |s: &Counter| Rc::clone(&s.label),
        move |label: &Rc<String>| labels.borrow_mut().push(label.to_string()),
      )
    };

    store.dispatch(Action::Increment);
    store.dispatch(Action::Rename("renamed"));
    store.dispatch(Action::Increment);

    assert_eq!(*labels.borrow(), vec!["renamed".to_string()]);
  }

  #[test]
  fn test_fresh_objects_from_selector_over_notify() {
    let store = counter_store();
    let calls = Rc::new(Cell::new(0));

    let _sub = {
      let calls = Rc::clone(&calls);
      store.watch(
        |s: &Counter| Rc::new(s.label.to_string()),
        move |_: &Rc<String>| calls.set(calls.get() + 1),
      )
    };

    store.dispatch(Action::Increment);
    store.dispatch(Action::Increment);

    assert_eq!(calls.get(), 2);
  }

  #[test]
  fn test_hooks_require_provider() {
    let store = counter_store();
    assert_eq!(
      store.use_dispatch().err(),
      Some(StoreError::OutsideProvider)
    );

    let scope = store.provide();
    let dispatch = store.use_dispatch().expect("inside provider");
    dispatch.dispatch(Action::Increment);
    assert_eq!(store.get_state().count, 1);

    drop(scope);
    assert!(store.use_selector(|s: &Counter| s.count).is_err());
  }

  #[test]
  fn test_selection_refresh() {
    let store = counter_store();
    let _scope = store.provide();
    let selection = store
      .use_selector(|s: &Counter| s.count)
      .expect("inside provider");

    assert!(!selection.refresh());
    store.dispatch(Action::Increment);
    assert!(selection.refresh());
    assert_eq!(selection.current(), 1);
  }

  #[test]
  fn test_server_snapshot_is_initial_state() {
    let store = counter_store();
    store.dispatch(Action::Increment);
    assert_eq!(store.server_snapshot().count, 0);
  }
}
