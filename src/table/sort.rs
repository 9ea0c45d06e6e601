//! Multi-key stable sort over column sort accessors.

use std::cmp::Ordering;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use super::columns::{ColumnDef, SortAccessor, SortDirection, SortEntry, SortValue};

/// Compare two sort values in ascending order.
///
/// `Null` sorts after everything. Numbers come before text. Text compares
/// by base letter with case and accents folded away, so `Padmé` ties with
/// `padme`.
pub fn compare_sort_values(a: &SortValue, b: &SortValue) -> Ordering {
  match (a, b) {
    (SortValue::Null, SortValue::Null) => Ordering::Equal,
    (SortValue::Null, _) => Ordering::Greater,
    (_, SortValue::Null) => Ordering::Less,
    (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(b),
    (SortValue::Text(a), SortValue::Text(b)) => text_key(a).cmp(&text_key(b)),
    (SortValue::Number(_), SortValue::Text(_)) => Ordering::Less,
    (SortValue::Text(_), SortValue::Number(_)) => Ordering::Greater,
  }
}

/// Decompose, drop combining marks, lowercase. Idempotent.
fn text_key(text: &str) -> String {
  text
    .nfd()
    .filter(|c| !is_combining_mark(*c))
    .collect::<String>()
    .to_lowercase()
}

/// Text keys are folded once per row instead of once per comparison.
fn fold(value: SortValue) -> SortValue {
  match value {
    SortValue::Text(text) => SortValue::Text(text_key(&text)),
    other => other,
  }
}

/// Sort rows by a sort chain, returning a new vector.
///
/// Entries naming unknown or non-sortable columns are skipped. Ties fall
/// through to the next entry and finally keep their input order. `Desc`
/// flips only comparisons between two non-null values, so nulls stay last.
pub fn sort_data<T: Clone>(rows: &[T], columns: &[ColumnDef<T>], chain: &[SortEntry]) -> Vec<T> {
  let effective: Vec<(&SortAccessor<T>, SortDirection)> = chain
    .iter()
    .filter_map(|entry| {
      columns
        .iter()
        .find(|col| col.id() == entry.column_id)
        .and_then(|col| col.sort_accessor())
        .map(|accessor| (accessor, entry.direction))
    })
    .collect();

  if effective.is_empty() {
    return rows.to_vec();
  }

  let mut keyed: Vec<(usize, Vec<SortValue>)> = rows
    .iter()
    .enumerate()
    .map(|(i, row)| {
      let keys = effective
        .iter()
        .map(|(accessor, _)| fold(accessor(row)))
        .collect();
      (i, keys)
    })
    .collect();

  // sort_by is stable
  keyed.sort_by(|(_, a), (_, b)| {
    for ((va, vb), (_, direction)) in a.iter().zip(b.iter()).zip(effective.iter()) {
      let cmp = compare_sort_values(va, vb);
      if cmp == Ordering::Equal {
        continue;
      }
      if *direction == SortDirection::Desc && !va.is_null() && !vb.is_null() {
        return cmp.reverse();
      }
      return cmp;
    }
    Ordering::Equal
  });

  keyed.into_iter().map(|(i, _)| rows[i].clone()).collect()
}
