//! Network collaborator used by the fetch engine, plus the cancellation pair
//! handed to every request.

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::watch;

/// Failure reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
  #[error("request aborted")]
  Aborted,
  #[error("{0}")]
  Network(String),
  #[error("failed to decode response body: {0}")]
  Decode(String),
}

/// Owner side of a cancellation pair. Signalling is idempotent.
#[derive(Debug)]
pub struct CancelHandle {
  tx: watch::Sender<bool>,
}

impl CancelHandle {
  pub fn cancel(&self) {
    self.tx.send_replace(true);
  }

  pub fn is_cancelled(&self) -> bool {
    *self.tx.borrow()
  }
}

/// Request side of a cancellation pair.
#[derive(Debug, Clone)]
pub struct CancelSignal {
  rx: watch::Receiver<bool>,
}

impl CancelSignal {
  pub fn is_cancelled(&self) -> bool {
    *self.rx.borrow()
  }

  /// Resolves once the paired handle is cancelled. Never resolves if the
  /// handle is dropped without cancelling.
  pub async fn cancelled(&mut self) {
    loop {
      if *self.rx.borrow_and_update() {
        return;
      }
      if self.rx.changed().await.is_err() {
        std::future::pending::<()>().await;
      }
    }
  }
}

pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
  let (tx, rx) = watch::channel(false);
  (CancelHandle { tx }, CancelSignal { rx })
}

/// A response whose body has not been decoded yet.
pub trait Response: Send {
  /// Whether the status is in the 2xx range.
  fn ok(&self) -> bool;

  fn status(&self) -> u16;

  fn status_text(&self) -> String;

  /// Decode the body as JSON.
  fn json(self: Box<Self>) -> BoxFuture<'static, Result<Value, TransportError>>;
}

/// Something that can fetch a URL.
pub trait Transport: Send + Sync {
  fn fetch(
    &self,
    url: &str,
    signal: CancelSignal,
  ) -> BoxFuture<'static, Result<Box<dyn Response>, TransportError>>;
}

/// HTTP transport backed by reqwest.
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
}

impl HttpTransport {
  pub fn new(user_agent: &str) -> Result<Self, TransportError> {
    let client = reqwest::Client::builder()
      .user_agent(user_agent)
      .build()
      .map_err(|e| TransportError::Network(format!("failed to build HTTP client: {}", e)))?;
    Ok(Self { client })
  }
}

impl Transport for HttpTransport {
  fn fetch(
    &self,
    url: &str,
    mut signal: CancelSignal,
  ) -> BoxFuture<'static, Result<Box<dyn Response>, TransportError>> {
    let request = self.client.get(url).send();
    Box::pin(async move {
      let result = tokio::select! {
        biased;
        _ = signal.cancelled() => None,
        result = request => Some(result),
      };
      match result {
        None => Err(TransportError::Aborted),
        Some(result) => result
          .map(|res| Box::new(HttpResponse { inner: res, signal }) as Box<dyn Response>)
          .map_err(|e| TransportError::Network(e.to_string())),
      }
    })
  }
}

struct HttpResponse {
  inner: reqwest::Response,
  signal: CancelSignal,
}

impl Response for HttpResponse {
  fn ok(&self) -> bool {
    self.inner.status().is_success()
  }

  fn status(&self) -> u16 {
    self.inner.status().as_u16()
  }

  fn status_text(&self) -> String {
    self
      .inner
      .status()
      .canonical_reason()
      .unwrap_or_default()
      .to_string()
  }

  fn json(self: Box<Self>) -> BoxFuture<'static, Result<Value, TransportError>> {
    let HttpResponse { inner, mut signal } = *self;
    Box::pin(async move {
      tokio::select! {
        biased;
        _ = signal.cancelled() => Err(TransportError::Aborted),
        body = inner.json::<Value>() => body.map_err(|e| TransportError::Decode(e.to_string())),
      }
    })
  }
}
