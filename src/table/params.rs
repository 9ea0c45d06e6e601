//! String codec for the column and sort parameters (`cols=name,height`,
//! `sort=name,-height`). Used for CLI flags and persisted preferences.

use super::columns::{SortDirection, SortEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
  Columns,
  Sort,
}

impl ParamKind {
  fn base(&self) -> &'static str {
    match self {
      Self::Columns => "cols",
      Self::Sort => "sort",
    }
  }
}

/// Parameter name, optionally namespaced as `prefix.name`.
pub fn param_name(kind: ParamKind, prefix: Option<&str>) -> String {
  match prefix {
    Some(prefix) if !prefix.is_empty() => format!("{}.{}", prefix, kind.base()),
    _ => kind.base().to_string(),
  }
}

/// Ordered column ids, or `None` for "all columns in default order".
pub fn parse_columns_param(raw: Option<&str>) -> Option<Vec<String>> {
  let ids: Vec<String> = raw?
    .split(',')
    .map(str::trim)
    .filter(|id| !id.is_empty())
    .map(str::to_string)
    .collect();
  (!ids.is_empty()).then_some(ids)
}

/// `None` means the parameter should be omitted.
pub fn serialize_columns_param(ids: Option<&[String]>) -> Option<String> {
  match ids {
    Some(ids) if !ids.is_empty() => Some(ids.join(",")),
    _ => None,
  }
}

/// Bare ids sort ascending, `-id` descending. Tokens with no id are dropped.
pub fn parse_sort_param(raw: Option<&str>) -> Vec<SortEntry> {
  let Some(raw) = raw else {
    return Vec::new();
  };
  raw
    .split(',')
    .map(str::trim)
    .filter(|token| !token.is_empty())
    .filter_map(|token| match token.strip_prefix('-') {
      Some(id) if id.is_empty() => None,
      Some(id) => Some(SortEntry::desc(id)),
      None => Some(SortEntry::asc(token)),
    })
    .collect()
}

pub fn serialize_sort_param(chain: &[SortEntry]) -> Option<String> {
  if chain.is_empty() {
    return None;
  }
  let tokens: Vec<String> = chain
    .iter()
    .map(|entry| match entry.direction {
      SortDirection::Asc => entry.column_id.clone(),
      SortDirection::Desc => format!("-{}", entry.column_id),
    })
    .collect();
  Some(tokens.join(","))
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;

  fn strings(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn test_parse_columns() {
    assert_eq!(parse_columns_param(None), None);
    assert_eq!(parse_columns_param(Some("")), None);
    assert_eq!(parse_columns_param(Some(" , ,")), None);
    assert_eq!(parse_columns_param(Some("name")), Some(strings(&["name"])));
    assert_eq!(
      parse_columns_param(Some(" name , height,,mass, ")),
      Some(strings(&["name", "height", "mass"]))
    );
  }

  #[test]
  fn test_serialize_columns() {
    assert_eq!(serialize_columns_param(None), None);
    assert_eq!(serialize_columns_param(Some([].as_slice())), None);
    assert_eq!(
      serialize_columns_param(Some(strings(&["name", "gender"]).as_slice())).as_deref(),
      Some("name,gender")
    );
  }

  #[test]
  fn test_parse_sort() {
    assert!(parse_sort_param(None).is_empty());
    assert!(parse_sort_param(Some("")).is_empty());
    assert_eq!(
      parse_sort_param(Some("name, -height ,,mass")),
      vec![
        SortEntry::asc("name"),
        SortEntry::desc("height"),
        SortEntry::asc("mass")
      ]
    );
  }

  #[test]
  fn test_parse_sort_drops_bare_dash() {
    assert_eq!(parse_sort_param(Some("-,name")), vec![SortEntry::asc("name")]);
  }

  #[test]
  fn test_serialize_sort() {
    assert_eq!(serialize_sort_param(&[]), None);
    assert_eq!(
      serialize_sort_param(&[SortEntry::desc("height"), SortEntry::asc("name")]).as_deref(),
      Some("-height,name")
    );
  }

  #[test]
  fn test_round_trips() {
    let cols = strings(&["name", "climate", "diameter"]);
    assert_eq!(
      parse_columns_param(serialize_columns_param(Some(cols.as_slice())).as_deref()),
      Some(cols)
    );

    let chain = vec![SortEntry::asc("name"), SortEntry::desc("mass")];
    assert_eq!(
      parse_sort_param(serialize_sort_param(&chain).as_deref()),
      chain
    );
  }

  fn arb_id() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_.]{0,11}"
  }

  fn arb_entry() -> impl Strategy<Value = SortEntry> {
    (arb_id(), any::<bool>()).prop_map(|(id, desc)| {
      if desc {
        SortEntry::desc(id)
      } else {
        SortEntry::asc(id)
      }
    })
  }

  proptest! {
    #[test]
    fn prop_sort_chain_round_trips(chain in proptest::collection::vec(arb_entry(), 1..8)) {
      let raw = serialize_sort_param(&chain);
      prop_assert!(raw.is_some());
      prop_assert_eq!(parse_sort_param(raw.as_deref()), chain);
    }

    #[test]
    fn prop_column_list_round_trips(ids in proptest::collection::vec(arb_id(), 1..8)) {
      let raw = serialize_columns_param(Some(ids.as_slice()));
      prop_assert!(raw.is_some());
      prop_assert_eq!(parse_columns_param(raw.as_deref()), Some(ids));
    }
  }

  #[test]
  fn test_param_name() {
    assert_eq!(param_name(ParamKind::Columns, None), "cols");
    assert_eq!(param_name(ParamKind::Sort, Some("people")), "people.sort");
  }
}
