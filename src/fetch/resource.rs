//! Declarative URL + parser bindings.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;

use super::types::AnyData;

/// Raised by resource parsers; surfaces as an `Error` state.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
  #[error(transparent)]
  Json(#[from] serde_json::Error),
  #[error("{0}")]
  Invalid(String),
}

impl ParseError {
  pub fn invalid(message: impl Into<String>) -> Self {
    Self::Invalid(message.into())
  }
}

/// Process-unique identity of a resource definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefinitionId(u64);

impl DefinitionId {
  fn next() -> Self {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    Self(NEXT.fetch_add(1, Ordering::Relaxed))
  }
}

impl fmt::Display for DefinitionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "def#{}", self.0)
  }
}

pub(crate) type ErasedParser = Arc<dyn Fn(Value) -> Result<AnyData, ParseError> + Send + Sync>;

/// Where a resource's URL comes from.
pub enum ResourceUrl<A> {
  Static(String),
  Factory(Arc<dyn Fn(&A) -> Option<String> + Send + Sync>),
}

/// A bound pairing of URL (or URL factory) and parser.
///
/// Create it once with `define_resource` / `define_resource_with` and share
/// it by reference; its identity namespaces the cache, so a definition
/// rebuilt on every use never hits the cache and restarts the fetch.
pub struct ResourceDefinition<T, A = ()> {
  id: DefinitionId,
  url: ResourceUrl<A>,
  parse: Arc<dyn Fn(Value) -> Result<T, ParseError> + Send + Sync>,
}

impl<T: Send + Sync + 'static, A> ResourceDefinition<T, A> {
  pub fn id(&self) -> DefinitionId {
    self.id
  }

  /// Resolve the URL for one call; `None` means "do not fetch".
  pub fn resolve(&self, args: &A) -> Option<String> {
    match &self.url {
      ResourceUrl::Static(url) => Some(url.clone()),
      ResourceUrl::Factory(factory) => factory(args),
    }
  }

  pub fn parse(&self, raw: Value) -> Result<T, ParseError> {
    (self.parse)(raw)
  }

  pub(crate) fn erased_parser(&self) -> ErasedParser {
    let parse = Arc::clone(&self.parse);
    Arc::new(move |raw| parse(raw).map(|data| Arc::new(data) as AnyData))
  }
}

impl<T, A> fmt::Debug for ResourceDefinition<T, A> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let url = match &self.url {
      ResourceUrl::Static(url) => url.as_str(),
      ResourceUrl::Factory(_) => "<factory>",
    };
    f.debug_struct("ResourceDefinition")
      .field("id", &self.id)
      .field("url", &url)
      .finish_non_exhaustive()
  }
}

/// Bind a static URL to a parser.
///
/// ```ignore
/// static FILMS: LazyLock<ResourceDefinition<Vec<Film>>> =
///   LazyLock::new(|| define_resource("https://swapi.info/api/films", parse_films));
/// ```
pub fn define_resource<T, P>(url: impl Into<String>, parser: P) -> ResourceDefinition<T, ()>
where
  P: Fn(Value) -> Result<T, ParseError> + Send + Sync + 'static,
{
  ResourceDefinition {
    id: DefinitionId::next(),
    url: ResourceUrl::Static(url.into()),
    parse: Arc::new(parser),
  }
}

/// Bind a URL factory to a parser. Return `None` from the factory to skip
/// the fetch for that call.
pub fn define_resource_with<T, A, F, P>(factory: F, parser: P) -> ResourceDefinition<T, A>
where
  F: Fn(&A) -> Option<String> + Send + Sync + 'static,
  P: Fn(Value) -> Result<T, ParseError> + Send + Sync + 'static,
{
  ResourceDefinition {
    id: DefinitionId::next(),
    url: ResourceUrl::Factory(Arc::new(factory)),
    parse: Arc::new(parser),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn parse_names(raw: Value) -> Result<Vec<String>, ParseError> {
    Ok(serde_json::from_value(raw)?)
  }

  #[test]
  fn test_static_url_resolves() {
    let def = define_resource("https://example.test/names", parse_names);
    assert_eq!(def.resolve(&()).as_deref(), Some("https://example.test/names"));
  }

  #[test]
  fn test_factory_can_skip() {
    let def = define_resource_with(
      |id: &Option<u32>| id.map(|id| format!("https://example.test/names/{}", id)),
      parse_names,
    );
    assert_eq!(
      def.resolve(&Some(3)).as_deref(),
      Some("https://example.test/names/3")
    );
    assert_eq!(def.resolve(&None), None);
  }

  #[test]
  fn test_definitions_have_distinct_identity() {
    let a = define_resource("https://example.test/names", parse_names);
    let b = define_resource("https://example.test/names", parse_names);
    assert_ne!(a.id(), b.id());
  }

  #[test]
  fn test_parse_error_message() {
    let def = define_resource("https://example.test/names", parse_names);
    let err = def.parse(json!({ "not": "a list" })).unwrap_err();
    assert!(err.to_string().contains("invalid type"));
  }
}
