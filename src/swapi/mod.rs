//! Star Wars API domain: records, resource definitions and table columns.

mod columns;
mod resources;
mod types;

pub use columns::{people_columns, planet_columns};
pub use resources::{ApiBase, PEOPLE, PLANETS, PLANET_BY_URL};
pub use types::{format_number, Measure, Person, Planet};

#[cfg(test)]
pub(crate) use types::fixtures;
