//! Declarative columns, multi-key sorting and per-table view state.

mod columns;
pub mod params;
mod sort;
mod state;

pub use columns::{ColumnDef, SortDirection, SortEntry, SortValue};
pub use sort::{compare_sort_values, sort_data};
pub use state::{ColumnVisibility, TableState};
