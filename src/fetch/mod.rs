//! Resource fetching: declarative URL + parser definitions and a shared,
//! deduplicating cache of their results.
//!
//! - Observers of the same resource share one in-flight request
//! - A forced refetch cancels the request it supersedes
//! - The last observer leaving cancels whatever is still in flight
//! - Failed refreshes keep the previously loaded data visible

mod engine;
mod resource;
#[cfg(test)]
pub(crate) mod testing;
mod transport;
mod types;

pub use engine::{CacheKey, FetchStore, ResourceHandle, ResourceStore};
pub use resource::{define_resource, define_resource_with, ParseError, ResourceDefinition};
pub use transport::{HttpTransport, Transport};
pub use types::{ErrorInfo, ResourceFetchState, ResourceItem};
