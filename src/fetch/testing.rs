//! Test doubles for the fetch engine.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::oneshot;

use super::transport::{CancelSignal, Response, Transport, TransportError};
use super::FetchStore;

#[derive(Debug, Clone)]
pub(crate) struct FakeReply {
  pub status: u16,
  pub body: Value,
}

impl FakeReply {
  pub fn ok(body: Value) -> Self {
    Self { status: 200, body }
  }
}

struct FakeResponse(FakeReply);

impl Response for FakeResponse {
  fn ok(&self) -> bool {
    (200..300).contains(&self.0.status)
  }

  fn status(&self) -> u16 {
    self.0.status
  }

  fn status_text(&self) -> String {
    match self.0.status {
      200 => "OK",
      404 => "Not Found",
      500 => "Internal Server Error",
      _ => "",
    }
    .to_string()
  }

  fn json(self: Box<Self>) -> BoxFuture<'static, Result<Value, TransportError>> {
    let body = self.0.body;
    Box::pin(async move { Ok(body) })
  }
}

/// Transport that ignores cancel signals and serves canned or gated replies.
#[derive(Default)]
pub(crate) struct FakeTransport {
  calls: StdMutex<HashMap<String, usize>>,
  replies: StdMutex<HashMap<String, FakeReply>>,
  gates: StdMutex<HashMap<String, VecDeque<oneshot::Receiver<FakeReply>>>>,
}

impl FakeTransport {
  pub fn reply(&self, url: &str, reply: FakeReply) {
    self.replies.lock().unwrap().insert(url.to_string(), reply);
  }

  pub fn gate(&self, url: &str) -> oneshot::Sender<FakeReply> {
    let (tx, rx) = oneshot::channel();
    self
      .gates
      .lock()
      .unwrap()
      .entry(url.to_string())
      .or_default()
      .push_back(rx);
    tx
  }

  pub fn calls(&self, url: &str) -> usize {
    self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
  }

  pub fn total_calls(&self) -> usize {
    self.calls.lock().unwrap().values().sum()
  }
}

impl Transport for FakeTransport {
  fn fetch(
    &self,
    url: &str,
    _signal: CancelSignal,
  ) -> BoxFuture<'static, Result<Box<dyn Response>, TransportError>> {
    *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;
    let gate = self
      .gates
      .lock()
      .unwrap()
      .get_mut(url)
      .and_then(|queue| queue.pop_front());
    let canned = self.replies.lock().unwrap().get(url).cloned();

    Box::pin(async move {
      let reply = match gate {
        Some(rx) => rx
          .await
          .map_err(|_| TransportError::Network("gate dropped".to_string()))?,
        None => canned.ok_or_else(|| TransportError::Network("connection refused".to_string()))?,
      };
      Ok(Box::new(FakeResponse(reply)) as Box<dyn Response>)
    })
  }
}

/// Give spawned request tasks a chance to reach the transport.
pub(crate) async fn let_tasks_run() {
  for _ in 0..8 {
    tokio::task::yield_now().await;
  }
}

pub(crate) async fn settle_until(fetch: &FetchStore, done: impl Fn() -> bool) {
  for _ in 0..10 {
    if done() {
      return;
    }
    tokio::time::timeout(Duration::from_secs(1), fetch.next_completion())
      .await
      .expect("completion arrives");
  }
  assert!(done(), "condition not reached");
}

