//! Reference-counted, deduplicating, abortable resource cache.
//!
//! The observable snapshot (`ResourceStore`) lives in a `Store` and changes
//! only through `reduce`. Request bookkeeping (the tracked request id, its
//! cancel handle and the observer count) lives in a side table next to it,
//! so it never shows up in snapshots.
//!
//! Network work runs on spawned tokio tasks. Each task reports back with a
//! `Completion` over a channel, and the owner applies completions on its own
//! thread through `poll` or `next_completion`. A completion is only written
//! when its request id is still the tracked one for its key. Anything
//! superseded is dropped even if the transport ignored the cancel signal.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::store::{Identical, ProviderScope, Store, StoreError, Subscription};

use super::resource::{DefinitionId, ErasedParser, ResourceDefinition};
use super::transport::{cancel_pair, CancelHandle, CancelSignal, Transport, TransportError};
use super::types::{AnyData, ErrorInfo, ResourceEntry, ResourceFetchState, ResourceItem};

/// Cache key: the definition's identity plus the URL it resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
  pub definition: DefinitionId,
  pub url: String,
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.definition, self.url)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct RequestId(u64);

/// Observable snapshot of every cached resource.
#[derive(Debug, Clone, Default)]
pub struct ResourceStore {
  entries: HashMap<CacheKey, Rc<ResourceEntry>>,
}

impl ResourceStore {
  pub fn get(&self, key: &CacheKey) -> Option<&Rc<ResourceEntry>> {
    self.entries.get(key)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

#[derive(Debug)]
pub enum ResourceAction {
  FetchStart { key: CacheKey },
  FetchSuccess { key: CacheKey, data: AnyData },
  FetchError { key: CacheKey, error: ErrorInfo },
  /// The request was cancelled because nobody observes the key anymore.
  FetchAborted { key: CacheKey },
}

impl ResourceAction {
  fn key(&self) -> &CacheKey {
    match self {
      Self::FetchStart { key }
      | Self::FetchSuccess { key, .. }
      | Self::FetchError { key, .. }
      | Self::FetchAborted { key } => key,
    }
  }
}

fn reduce(state: &Rc<ResourceStore>, action: &ResourceAction) -> Rc<ResourceStore> {
  let prev = state.entries.get(action.key()).cloned().unwrap_or_default();

  let next = match action {
    // Keep data from a prior success so it stays visible while loading
    ResourceAction::FetchStart { .. } => ResourceEntry {
      data: prev.data.clone(),
      error: None,
      state: ResourceFetchState::Loading,
    },
    ResourceAction::FetchSuccess { data, .. } => ResourceEntry {
      data: Some(Arc::clone(data)),
      error: None,
      state: ResourceFetchState::Success,
    },
    ResourceAction::FetchError { error, .. } => ResourceEntry {
      data: prev.data.clone(),
      error: Some(error.clone()),
      state: ResourceFetchState::Error,
    },
    ResourceAction::FetchAborted { .. } => {
      if prev.state != ResourceFetchState::Loading {
        return Rc::clone(state);
      }
      ResourceEntry {
        data: prev.data.clone(),
        error: None,
        state: ResourceFetchState::Stale,
      }
    }
  };

  let mut entries = state.entries.clone();
  entries.insert(action.key().clone(), Rc::new(next));
  Rc::new(ResourceStore { entries })
}

#[derive(Debug, Default)]
struct FetchMeta {
  request: Option<RequestId>,
  cancel: Option<CancelHandle>,
  observers: usize,
}

#[derive(Debug)]
enum Outcome {
  Loaded(AnyData),
  Failed(ErrorInfo),
  Cancelled,
}

#[derive(Debug)]
struct Completion {
  key: CacheKey,
  request: RequestId,
  outcome: Outcome,
}

struct FetchInner {
  store: Store<ResourceStore, ResourceAction>,
  meta: RefCell<HashMap<CacheKey, FetchMeta>>,
  transport: Arc<dyn Transport>,
  completions_tx: mpsc::UnboundedSender<Completion>,
  completions_rx: Mutex<mpsc::UnboundedReceiver<Completion>>,
  next_request: Cell<u64>,
}

/// Fetch store: provider scope, resource hooks and completion pump.
#[derive(Clone)]
pub struct FetchStore {
  inner: Rc<FetchInner>,
}

impl FetchStore {
  pub fn new(transport: Arc<dyn Transport>) -> Self {
    let (completions_tx, completions_rx) = mpsc::unbounded_channel();
    Self {
      inner: Rc::new(FetchInner {
        store: Store::new(reduce, ResourceStore::default()),
        meta: RefCell::new(HashMap::new()),
        transport,
        completions_tx,
        completions_rx: Mutex::new(completions_rx),
        next_request: Cell::new(1),
      }),
    }
  }

  /// Open the provisioning scope that `use_resource` requires.
  pub fn provide(&self) -> ProviderScope {
    self.inner.store.provide()
  }

  /// Begin observing a resource.
  ///
  /// Observing a key that has no entry yet (or a stale one) starts a fetch,
  /// unless that key already has a request in flight. Dropping the handle
  /// ends the observation, and the last observer to leave cancels whatever
  /// is still in flight.
  pub fn use_resource<T, A>(
    &self,
    definition: &ResourceDefinition<T, A>,
    args: &A,
  ) -> Result<ResourceHandle<T>, StoreError>
  where
    T: Send + Sync + 'static,
  {
    if !self.inner.store.is_provided() {
      return Err(StoreError::OutsideProvider);
    }

    let key = definition.resolve(args).map(|url| CacheKey {
      definition: definition.id(),
      url,
    });
    let parser = definition.erased_parser();

    if let Some(key) = &key {
      self.inner.attach(key, &parser);
    }

    let handle = ResourceHandle {
      inner: Rc::clone(&self.inner),
      key,
      parser,
      seen: RefCell::new(None),
      _marker: PhantomData,
    };
    *handle.seen.borrow_mut() = handle.entry();
    Ok(handle)
  }

  /// Current snapshot of every cached resource.
  pub fn snapshot(&self) -> Rc<ResourceStore> {
    self.inner.store.get_state()
  }

  pub fn server_snapshot(&self) -> Rc<ResourceStore> {
    self.inner.store.server_snapshot()
  }

  /// Get notified after every cache transition.
  pub fn subscribe<F>(&self, listener: F) -> Subscription
  where
    F: Fn() + 'static,
  {
    self.inner.store.subscribe(listener)
  }

  /// Number of keys with a request currently tracked as in flight.
  pub fn in_flight(&self) -> usize {
    self
      .inner
      .meta
      .borrow()
      .values()
      .filter(|meta| meta.request.is_some())
      .count()
  }

  /// Apply every completion that has already arrived without waiting.
  ///
  /// Returns true when at least one of them changed the cache.
  pub fn poll(&self) -> bool {
    let batch = {
      let Ok(mut rx) = self.inner.completions_rx.try_lock() else {
        debug!("completion receiver busy, poll skipped");
        return false;
      };
      let mut batch = Vec::new();
      while let Ok(completion) = rx.try_recv() {
        batch.push(completion);
      }
      batch
    };

    let mut changed = false;
    for completion in batch {
      changed |= self.inner.apply(completion);
    }
    changed
  }

  /// Wait for the next completion and apply it. Superseded completions
  /// are consumed but return false.
  pub async fn next_completion(&self) -> bool {
    let completion = {
      let mut rx = self.inner.completions_rx.lock().await;
      rx.recv().await
    };
    match completion {
      Some(completion) => self.inner.apply(completion),
      None => false,
    }
  }
}

impl FetchInner {
  fn attach(&self, key: &CacheKey, parser: &ErasedParser) {
    let in_flight = {
      let mut meta = self.meta.borrow_mut();
      let entry = meta.entry(key.clone()).or_default();
      entry.observers += 1;
      entry.request.is_some()
    };

    let state = self
      .store
      .get_state()
      .get(key)
      .map(|entry| entry.state)
      .unwrap_or_default();

    // Only a successful entry or a live request is served without a fetch
    let needs_fetch = match state {
      ResourceFetchState::Stale | ResourceFetchState::Error => true,
      // A loading entry without a tracked request was orphaned
      ResourceFetchState::Loading => !in_flight,
      ResourceFetchState::Success => false,
    };

    if needs_fetch {
      self.start_fetch(key, parser);
    } else {
      debug!(url = %key.url, state = %state, "observing cached resource");
    }
  }

  fn refetch(&self, key: &CacheKey, parser: &ErasedParser, force: bool) {
    let in_flight = self
      .meta
      .borrow()
      .get(key)
      .is_some_and(|meta| meta.request.is_some());

    if in_flight && !force {
      debug!(url = %key.url, "refetch ignored, request already in flight");
      return;
    }
    self.start_fetch(key, parser);
  }

  fn start_fetch(&self, key: &CacheKey, parser: &ErasedParser) {
    let request = RequestId(self.next_request.get());
    self.next_request.set(request.0 + 1);
    let (handle, signal) = cancel_pair();

    let superseded = {
      let mut meta = self.meta.borrow_mut();
      let entry = meta.entry(key.clone()).or_default();
      entry.request = Some(request);
      entry.cancel.replace(handle)
    };
    if let Some(previous) = superseded {
      info!(url = %key.url, "cancelling superseded request");
      previous.cancel();
    }

    debug!(url = %key.url, request = request.0, "starting fetch");
    self.store.dispatch(ResourceAction::FetchStart { key: key.clone() });

    let transport = Arc::clone(&self.transport);
    let parser = Arc::clone(parser);
    let tx = self.completions_tx.clone();
    let key = key.clone();
    tokio::spawn(async move {
      let outcome = run_request(transport.as_ref(), &key.url, &parser, signal).await;
      // The receiver only goes away with the store itself
      let _ = tx.send(Completion {
        key,
        request,
        outcome,
      });
    });
  }

  fn release(&self, key: &CacheKey) {
    let cancel = {
      let mut meta = self.meta.borrow_mut();
      let Some(entry) = meta.get_mut(key) else {
        return;
      };
      entry.observers = entry.observers.saturating_sub(1);
      if entry.observers > 0 {
        return;
      }
      meta.remove(key).and_then(|entry| entry.cancel)
    };

    if let Some(cancel) = cancel {
      debug!(url = %key.url, "last observer left, cancelling request");
      cancel.cancel();
      self
        .store
        .dispatch(ResourceAction::FetchAborted { key: key.clone() });
    }
  }

  fn apply(&self, completion: Completion) -> bool {
    let Completion {
      key,
      request,
      outcome,
    } = completion;

    let tracked = self.meta.borrow().get(&key).and_then(|meta| meta.request);
    if tracked != Some(request) {
      debug!(url = %key.url, request = request.0, outcome = ?outcome, "discarding superseded completion");
      return false;
    }

    if let Some(meta) = self.meta.borrow_mut().get_mut(&key) {
      meta.request = None;
      meta.cancel = None;
    }

    match outcome {
      Outcome::Loaded(data) => {
        debug!(url = %key.url, request = request.0, "fetch succeeded");
        self.store.dispatch(ResourceAction::FetchSuccess { key, data });
      }
      Outcome::Failed(error) => {
        warn!(url = %key.url, request = request.0, error = %error, "fetch failed");
        self.store.dispatch(ResourceAction::FetchError { key, error });
      }
      Outcome::Cancelled => {
        debug!(url = %key.url, request = request.0, "tracked request was cancelled");
        self.store.dispatch(ResourceAction::FetchAborted { key });
      }
    }
    true
  }
}

/// Network call, decode and parse, checking the cancel signal after each step.
async fn run_request(
  transport: &dyn Transport,
  url: &str,
  parser: &ErasedParser,
  mut signal: CancelSignal,
) -> Outcome {
  let request = transport.fetch(url, signal.clone());
  let response = tokio::select! {
    biased;
    _ = signal.cancelled() => return Outcome::Cancelled,
    response = request => response,
  };

  let response = match response {
    Ok(response) => response,
    Err(TransportError::Aborted) => return Outcome::Cancelled,
    Err(e) => return Outcome::Failed(ErrorInfo::new(e.to_string())),
  };
  if signal.is_cancelled() {
    return Outcome::Cancelled;
  }

  if !response.ok() {
    let message = format!("{} {}", response.status(), response.status_text());
    return Outcome::Failed(ErrorInfo::new(message.trim_end()));
  }

  let decode = response.json();
  let raw = tokio::select! {
    biased;
    _ = signal.cancelled() => return Outcome::Cancelled,
    raw = decode => raw,
  };
  let raw = match raw {
    Ok(raw) => raw,
    Err(TransportError::Aborted) => return Outcome::Cancelled,
    Err(e) => return Outcome::Failed(ErrorInfo::new(e.to_string())),
  };
  if signal.is_cancelled() {
    return Outcome::Cancelled;
  }

  let parsed = parser(raw);
  if signal.is_cancelled() {
    return Outcome::Cancelled;
  }
  match parsed {
    Ok(data) => Outcome::Loaded(data),
    Err(e) => Outcome::Failed(ErrorInfo::new(e.to_string())),
  }
}

/// One observation of a resource. Dropping it ends the observation.
pub struct ResourceHandle<T> {
  inner: Rc<FetchInner>,
  key: Option<CacheKey>,
  parser: ErasedParser,
  seen: RefCell<Option<Rc<ResourceEntry>>>,
  _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> ResourceHandle<T> {
  fn entry(&self) -> Option<Rc<ResourceEntry>> {
    let key = self.key.as_ref()?;
    self.inner.store.get_state().get(key).cloned()
  }

  /// Current item; the stale sentinel for skipped or unseen keys.
  pub fn item(&self) -> ResourceItem<T> {
    self
      .entry()
      .map(|entry| entry.typed())
      .unwrap_or_default()
  }

  pub fn state(&self) -> ResourceFetchState {
    self
      .entry()
      .map(|entry| entry.state)
      .unwrap_or_default()
  }

  /// Resolved URL, or `None` when the definition skipped this call.
  pub fn url(&self) -> Option<&str> {
    self.key.as_ref().map(|key| key.url.as_str())
  }

  /// Re-request the resource.
  ///
  /// Without `force` this is a no-op while a request is in flight. With
  /// `force` the in-flight request is cancelled and a new one always starts.
  pub fn refetch(&self, force: bool) {
    if let Some(key) = &self.key {
      self.inner.refetch(key, &self.parser, force);
    }
  }

  /// True when the entry was replaced since the last call.
  pub fn changed(&self) -> bool {
    let current = self.entry();
    if self.seen.borrow().identical(&current) {
      return false;
    }
    *self.seen.borrow_mut() = current;
    true
  }
}

impl<T> Drop for ResourceHandle<T> {
  fn drop(&mut self) {
    if let Some(key) = self.key.take() {
      self.inner.release(&key);
    }
  }
}

impl<T> fmt::Debug for ResourceHandle<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ResourceHandle")
      .field("key", &self.key)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fetch::resource::{define_resource, define_resource_with, ParseError};
  use crate::fetch::testing::{let_tasks_run, settle_until, FakeReply, FakeTransport};
  use serde_json::{json, Value};

  const URL: &str = "https://swapi.test/api/people";

  fn parse_names(raw: Value) -> Result<Vec<String>, ParseError> {
    Ok(serde_json::from_value(raw)?)
  }

  fn setup() -> (Arc<FakeTransport>, FetchStore, ProviderScope) {
    let fake = Arc::new(FakeTransport::default());
    let fetch = FetchStore::new(fake.clone());
    let scope = fetch.provide();
    (fake, fetch, scope)
  }

  #[tokio::test]
  async fn test_concurrent_observers_share_one_fetch() {
    let (fake, fetch, _scope) = setup();
    fake.reply(URL, FakeReply::ok(json!(["Luke", "Leia"])));
    let def = define_resource(URL, parse_names);

    let first = fetch.use_resource(&def, &()).unwrap();
    let second = fetch.use_resource(&def, &()).unwrap();
    assert_eq!(first.state(), ResourceFetchState::Loading);
    assert_eq!(fetch.in_flight(), 1);

    settle_until(&fetch, || first.item().is_success()).await;

    assert_eq!(fake.calls(URL), 1);
    let a = first.item().data.unwrap();
    let b = second.item().data.unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(*a, vec!["Luke".to_string(), "Leia".to_string()]);
  }

  #[tokio::test]
  async fn test_late_observer_joins_in_flight_request() {
    let (fake, fetch, _scope) = setup();
    let gate = fake.gate(URL);
    let def = define_resource(URL, parse_names);

    let first = fetch.use_resource(&def, &()).unwrap();
    let_tasks_run().await;
    assert_eq!(fake.calls(URL), 1);

    let second = fetch.use_resource(&def, &()).unwrap();
    let_tasks_run().await;
    assert_eq!(fake.calls(URL), 1);
    assert_eq!(second.state(), ResourceFetchState::Loading);

    gate.send(FakeReply::ok(json!(["Yoda"]))).unwrap();
    settle_until(&fetch, || second.item().is_success()).await;

    assert!(first.item().is_success());
    assert_eq!(fake.calls(URL), 1);
  }

  #[tokio::test]
  async fn test_refetch_without_force_is_noop_while_loading() {
    let (fake, fetch, _scope) = setup();
    let gate = fake.gate(URL);
    let def = define_resource(URL, parse_names);

    let handle = fetch.use_resource(&def, &()).unwrap();
    let_tasks_run().await;
    let before = fetch.snapshot();

    handle.refetch(false);
    let_tasks_run().await;

    assert_eq!(fake.calls(URL), 1);
    assert!(Rc::ptr_eq(&before, &fetch.snapshot()));

    gate.send(FakeReply::ok(json!([]))).unwrap();
    settle_until(&fetch, || handle.item().is_success()).await;
  }

  #[tokio::test]
  async fn test_forced_refetch_supersedes_in_flight_request() {
    let (fake, fetch, _scope) = setup();
    let first_gate = fake.gate(URL);
    let second_gate = fake.gate(URL);
    let def = define_resource(URL, parse_names);

    let handle = fetch.use_resource(&def, &()).unwrap();
    let_tasks_run().await;
    assert_eq!(fake.calls(URL), 1);

    handle.refetch(true);
    let_tasks_run().await;
    assert_eq!(fake.calls(URL), 2);
    assert_eq!(fetch.in_flight(), 1);

    // The first request's task already gave up, so this reply goes nowhere
    let _ = first_gate.send(FakeReply::ok(json!(["old"])));
    second_gate.send(FakeReply::ok(json!(["new"]))).unwrap();
    settle_until(&fetch, || handle.item().is_success()).await;

    assert_eq!(*handle.item().data.unwrap(), vec!["new".to_string()]);
    assert_eq!(fake.calls(URL), 2);
  }

  #[tokio::test]
  async fn test_superseded_completion_is_discarded() {
    let (fake, fetch, _scope) = setup();
    let _gate = fake.gate(URL);
    let def = define_resource(URL, parse_names);
    let handle = fetch.use_resource(&def, &()).unwrap();

    let key = handle.key.clone().unwrap();
    let stale = Completion {
      key,
      request: RequestId(u64::MAX),
      outcome: Outcome::Loaded(Arc::new(vec!["ghost".to_string()]) as AnyData),
    };

    assert!(!fetch.inner.apply(stale));
    assert_eq!(handle.state(), ResourceFetchState::Loading);
    assert!(handle.item().data.is_none());
  }

  #[tokio::test]
  async fn test_null_url_never_fetches() {
    let (fake, fetch, _scope) = setup();
    let def = define_resource_with(|id: &Option<u32>| id.map(|id| format!("{}/{}", URL, id)), parse_names);

    let handle = fetch.use_resource(&def, &None).unwrap();
    handle.refetch(true);
    let_tasks_run().await;

    assert_eq!(handle.url(), None);
    assert_eq!(handle.state(), ResourceFetchState::Stale);
    assert!(handle.item().data.is_none());
    assert_eq!(fake.total_calls(), 0);
    assert!(fetch.snapshot().is_empty());
  }

  #[tokio::test]
  async fn test_parse_failure_surfaces_as_error() {
    let (fake, fetch, _scope) = setup();
    fake.reply(URL, FakeReply::ok(json!({ "results": [] })));
    let def = define_resource(URL, parse_names);

    let handle = fetch.use_resource(&def, &()).unwrap();
    settle_until(&fetch, || handle.item().is_error()).await;

    let error = handle.item().error.unwrap();
    assert!(error.message.contains("invalid type"), "{}", error.message);
  }

  #[tokio::test]
  async fn test_failed_refresh_keeps_previous_data() {
    let (fake, fetch, _scope) = setup();
    fake.reply(URL, FakeReply::ok(json!(["Luke"])));
    let def = define_resource(URL, parse_names);

    let handle = fetch.use_resource(&def, &()).unwrap();
    settle_until(&fetch, || handle.item().is_success()).await;

    fake.reply(
      URL,
      FakeReply {
        status: 500,
        body: Value::Null,
      },
    );
    handle.refetch(false);
    assert_eq!(handle.state(), ResourceFetchState::Loading);
    assert!(handle.item().data.is_some());

    settle_until(&fetch, || handle.item().is_error()).await;
    let item = handle.item();
    assert_eq!(item.error.unwrap().message, "500 Internal Server Error");
    assert_eq!(*item.data.unwrap(), vec!["Luke".to_string()]);
  }

  #[tokio::test]
  async fn test_transport_failure_message() {
    let (_fake, fetch, _scope) = setup();
    let def = define_resource(URL, parse_names);

    let handle = fetch.use_resource(&def, &()).unwrap();
    settle_until(&fetch, || handle.item().is_error()).await;

    assert_eq!(handle.item().error.unwrap().message, "connection refused");
  }

  #[tokio::test]
  async fn test_cached_success_is_reused() {
    let (fake, fetch, _scope) = setup();
    fake.reply(URL, FakeReply::ok(json!(["Han"])));
    let def = define_resource(URL, parse_names);

    let first = fetch.use_resource(&def, &()).unwrap();
    settle_until(&fetch, || first.item().is_success()).await;
    drop(first);

    let second = fetch.use_resource(&def, &()).unwrap();
    let_tasks_run().await;
    assert!(second.item().is_success());
    assert_eq!(fake.calls(URL), 1);
  }

  #[tokio::test]
  async fn test_errored_entry_refetches_for_new_observer() {
    let (fake, fetch, _scope) = setup();
    let def = define_resource(URL, parse_names);

    let first = fetch.use_resource(&def, &()).unwrap();
    settle_until(&fetch, || first.item().is_error()).await;
    drop(first);
    assert_eq!(fake.calls(URL), 1);

    fake.reply(URL, FakeReply::ok(json!(["Padmé"])));
    let second = fetch.use_resource(&def, &()).unwrap();
    assert_eq!(second.state(), ResourceFetchState::Loading);
    settle_until(&fetch, || second.item().is_success()).await;
    assert_eq!(fake.calls(URL), 2);
    assert_eq!(*second.item().data.unwrap(), vec!["Padmé".to_string()]);
  }

  #[tokio::test]
  async fn test_second_observer_of_error_retries_once() {
    let (fake, fetch, _scope) = setup();
    let def = define_resource(URL, parse_names);

    let first = fetch.use_resource(&def, &()).unwrap();
    settle_until(&fetch, || first.item().is_error()).await;

    // Both observers share the retry
    fake.reply(URL, FakeReply::ok(json!(["Han"])));
    let second = fetch.use_resource(&def, &()).unwrap();
    let third = fetch.use_resource(&def, &()).unwrap();
    settle_until(&fetch, || third.item().is_success()).await;
    assert!(first.item().is_success());
    assert!(second.item().is_success());
    assert_eq!(fake.calls(URL), 2);
  }

  #[tokio::test]
  async fn test_poll_skips_while_receiver_is_held() {
    let (fake, fetch, _scope) = setup();
    fake.reply(URL, FakeReply::ok(json!(["Leia"])));
    let def = define_resource(URL, parse_names);

    let handle = fetch.use_resource(&def, &()).unwrap();
    let_tasks_run().await;

    let held = fetch.inner.completions_rx.lock().await;
    assert!(!fetch.poll());
    assert!(handle.item().is_loading());

    drop(held);
    assert!(fetch.poll());
    assert!(handle.item().is_success());
  }

  #[tokio::test]
  async fn test_last_observer_leaving_cancels_request() {
    let (fake, fetch, _scope) = setup();
    let gate = fake.gate(URL);
    let def = define_resource(URL, parse_names);

    let first = fetch.use_resource(&def, &()).unwrap();
    let second = fetch.use_resource(&def, &()).unwrap();
    let_tasks_run().await;

    drop(first);
    assert_eq!(fetch.in_flight(), 1);

    drop(second);
    assert_eq!(fetch.in_flight(), 0);
    let _ = gate.send(FakeReply::ok(json!(["late"])));
    let_tasks_run().await;
    assert!(!fetch.poll());

    // The entry went back to stale, so the next observer fetches again
    fake.reply(URL, FakeReply::ok(json!(["fresh"])));
    let third = fetch.use_resource(&def, &()).unwrap();
    settle_until(&fetch, || third.item().is_success()).await;
    assert_eq!(fake.calls(URL), 2);
  }

  #[tokio::test]
  async fn test_changed_tracks_entry_identity() {
    let (fake, fetch, _scope) = setup();
    fake.reply(URL, FakeReply::ok(json!(["Obi-Wan"])));
    let def = define_resource(URL, parse_names);

    let handle = fetch.use_resource(&def, &()).unwrap();
    assert!(!handle.changed());

    settle_until(&fetch, || handle.item().is_success()).await;
    assert!(handle.changed());
    assert!(!handle.changed());
  }

  #[test]
  fn test_use_resource_outside_provider() {
    let fetch = FetchStore::new(Arc::new(FakeTransport::default()));
    let def = define_resource(URL, parse_names);
    assert_eq!(
      fetch.use_resource(&def, &()).err(),
      Some(StoreError::OutsideProvider)
    );
  }

  #[test]
  fn test_reducer_copy_on_write() {
    let key = CacheKey {
      definition: define_resource(URL, parse_names).id(),
      url: URL.to_string(),
    };
    let empty = Rc::new(ResourceStore::default());
    let loading = reduce(&empty, &ResourceAction::FetchStart { key: key.clone() });

    assert!(empty.is_empty());
    assert_eq!(loading.get(&key).unwrap().state, ResourceFetchState::Loading);

    // Aborting something that is not loading keeps the snapshot identity
    let done = reduce(
      &loading,
      &ResourceAction::FetchError {
        key: key.clone(),
        error: ErrorInfo::new("boom"),
      },
    );
    let same = reduce(&done, &ResourceAction::FetchAborted { key });
    assert!(Rc::ptr_eq(&done, &same));
  }
}
