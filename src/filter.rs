//! Sector/date filtering and aggregation over the canonical table.
//!
//! [`apply_filters`] is a pure function of the table and the filter state:
//! every invocation recomputes the counts, sums, the date-sorted row view,
//! and the per-day value series from scratch. The only state it touches is
//! the caller's [`FilterState`], whose date bounds it corrects in place.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    data::{Cell, Value, parse_day_first_date},
    schema::{self, CanonicalTable, RoleMap},
};

/// Category sentinel meaning "no category filter".
pub const ALL_CATEGORIES: &str = "(All)";

/// Per-session selection driving recomputation.
///
/// One instance per caller session; the canonical table may be shared
/// read-only across sessions, this must not be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    pub category: String,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            category: ALL_CATEGORIES.to_string(),
            from: None,
            to: None,
        }
    }
}

impl FilterState {
    /// Initial state for a freshly normalized table: no category filter and
    /// the table's full timestamp span (unset when no timestamps exist).
    pub fn for_table(table: &CanonicalTable, roles: &RoleMap) -> Self {
        let bounds = schema::timestamp_bounds(table, roles);
        Self {
            category: ALL_CATEGORIES.to_string(),
            from: bounds.map(|(min, _)| min),
            to: bounds.map(|(_, max)| max),
        }
    }

    /// Builds a state from raw CLI flag values. Unparseable date flags are a
    /// caller error, unlike unparseable *data*.
    pub fn from_flags(
        table: &CanonicalTable,
        roles: &RoleMap,
        sector: Option<&str>,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<Self> {
        let mut state = Self::for_table(table, roles);
        if let Some(sector) = sector {
            state.category = sector.to_string();
        }
        if let Some(raw) = from {
            state.from = Some(
                parse_day_first_date(raw).with_context(|| format!("Parsing --from '{raw}'"))?,
            );
        }
        if let Some(raw) = to {
            state.to =
                Some(parse_day_first_date(raw).with_context(|| format!("Parsing --to '{raw}'"))?);
        }
        Ok(state)
    }
}

/// One complete recomputation: scalars, the date-sorted filtered rows, and
/// the per-day value series. Serializes as plain data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedView {
    pub row_count: usize,
    pub value_sum: f64,
    pub quantity_sum: f64,
    pub filtered_rows: Vec<Vec<Cell>>,
    pub daily_series: Vec<(NaiveDate, f64)>,
}

/// Applies the category and date-range filters and recomputes the view.
///
/// Date bounds fall back to the min/max of the category-filtered subset when
/// unset; inverted bounds are swapped and written back into `state`. When the
/// subset has no usable timestamp at all, date filtering is skipped entirely
/// and the bounds are left untouched.
pub fn apply_filters(
    table: &CanonicalTable,
    roles: &RoleMap,
    state: &mut FilterState,
) -> DerivedView {
    let mut rows: Vec<&Vec<Cell>> = table.rows.iter().collect();

    if state.category != ALL_CATEGORIES {
        rows.retain(|row| {
            row.get(roles.category)
                .and_then(|cell| cell.as_ref())
                .is_some_and(|value| value.as_display() == state.category)
        });
    }

    if let Some(ts_idx) = roles.timestamp
        && let Some((min, max)) = subset_bounds(&rows, ts_idx)
    {
        let mut from = state.from.unwrap_or(min);
        let mut to = state.to.unwrap_or(max);
        if from > to {
            std::mem::swap(&mut from, &mut to);
        }
        rows.retain(|row| {
            matches!(row_date(row.as_slice(), ts_idx), Some(date) if from <= date && date <= to)
        });
        state.from = Some(from);
        state.to = Some(to);
    }

    let value_sum = roles.value.map_or(0.0, |idx| column_sum(&rows, idx));
    let quantity_sum = roles.quantity.map_or(0.0, |idx| column_sum(&rows, idx));

    if let Some(ts_idx) = roles.timestamp {
        // Stable sort; rows with a missing timestamp order first.
        rows.sort_by_key(|row| row_date(row.as_slice(), ts_idx));
    }

    let daily_series = match (roles.timestamp, roles.value) {
        (Some(ts_idx), Some(value_idx)) => daily_value_series(&rows, ts_idx, value_idx),
        _ => Vec::new(),
    };

    DerivedView {
        row_count: rows.len(),
        value_sum,
        quantity_sum,
        filtered_rows: rows.into_iter().cloned().collect(),
        daily_series,
    }
}

fn row_date(row: &[Cell], idx: usize) -> Option<NaiveDate> {
    match row.get(idx) {
        Some(Some(Value::Date(date))) => Some(*date),
        _ => None,
    }
}

fn subset_bounds(rows: &[&Vec<Cell>], idx: usize) -> Option<(NaiveDate, NaiveDate)> {
    rows.iter()
        .filter_map(|row| row_date(row.as_slice(), idx))
        .fold(None, |bounds, date| {
            Some(match bounds {
                Some((min, max)) => (min.min(date), max.max(date)),
                None => (date, date),
            })
        })
}

fn column_sum(rows: &[&Vec<Cell>], idx: usize) -> f64 {
    rows.iter()
        .filter_map(|row| match row.get(idx) {
            Some(Some(Value::Number(number))) => Some(*number),
            _ => None,
        })
        // Explicit +0.0 identity: Iterator::sum for f64 starts from -0.0,
        // which would render as "-0" for an empty subset.
        .fold(0.0, |acc, number| acc + number)
}

// One entry per distinct date present in the rows, ascending; missing value
// cells contribute nothing to their date's sum.
fn daily_value_series(
    rows: &[&Vec<Cell>],
    ts_idx: usize,
    value_idx: usize,
) -> Vec<(NaiveDate, f64)> {
    let mut grouped: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for row in rows {
        let Some(date) = row_date(row.as_slice(), ts_idx) else {
            continue;
        };
        let entry = grouped.entry(date).or_insert(0.0);
        if let Some(Some(Value::Number(number))) = row.get(value_idx) {
            *entry += *number;
        }
    }
    grouped.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::RawTable;
    use crate::schema::normalize;

    fn canonical(headers: &[&str], rows: &[&[&str]]) -> (CanonicalTable, RoleMap) {
        let raw = RawTable {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|cell| cell.to_string()).collect())
                .collect(),
        };
        normalize(&raw).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn category_filter_matches_exact_text() {
        let (table, roles) = canonical(
            &["ativo", "setor", "vm"],
            &[&["A", "RF", "1.0"], &["B", "RV", "2.0"], &["C", "RF", "4.0"]],
        );
        let mut state = FilterState {
            category: "RF".to_string(),
            ..FilterState::default()
        };
        let view = apply_filters(&table, &roles, &mut state);
        assert_eq!(view.row_count, 2);
        assert_eq!(view.value_sum, 5.0);
    }

    #[test]
    fn unknown_category_yields_empty_view_without_error() {
        let (table, roles) = canonical(&["ativo", "setor"], &[&["A", "RF"]]);
        let mut state = FilterState {
            category: "does-not-exist".to_string(),
            ..FilterState::default()
        };
        let view = apply_filters(&table, &roles, &mut state);
        assert_eq!(view.row_count, 0);
        assert_eq!(view.value_sum, 0.0);
        assert_eq!(view.quantity_sum, 0.0);
        assert!(view.filtered_rows.is_empty());
        assert!(view.daily_series.is_empty());
    }

    #[test]
    fn inverted_bounds_are_swapped_and_written_back() {
        let (table, roles) = canonical(
            &["data", "ativo", "vm"],
            &[
                &["01/07/2025", "A", "1.0"],
                &["15/07/2025", "B", "2.0"],
                &["31/07/2025", "C", "4.0"],
            ],
        );
        let mut state = FilterState {
            from: Some(date(2025, 7, 20)),
            to: Some(date(2025, 7, 10)),
            ..FilterState::default()
        };
        let view = apply_filters(&table, &roles, &mut state);
        assert_eq!(state.from, Some(date(2025, 7, 10)));
        assert_eq!(state.to, Some(date(2025, 7, 20)));
        assert_eq!(view.row_count, 1);
        assert_eq!(view.value_sum, 2.0);
    }

    #[test]
    fn unset_bounds_fall_back_to_category_subset_span() {
        let (table, roles) = canonical(
            &["data", "ativo", "setor", "vm"],
            &[
                &["01/07/2025", "A", "RF", "1.0"],
                &["31/12/2030", "B", "RV", "2.0"],
            ],
        );
        let mut state = FilterState {
            category: "RF".to_string(),
            ..FilterState::default()
        };
        let view = apply_filters(&table, &roles, &mut state);
        assert_eq!(view.row_count, 1);
        // Bounds written back come from the RF subset, not the full table.
        assert_eq!(state.from, Some(date(2025, 7, 1)));
        assert_eq!(state.to, Some(date(2025, 7, 1)));
    }

    #[test]
    fn rows_with_missing_timestamps_drop_when_range_applies() {
        let (table, roles) = canonical(
            &["data", "ativo"],
            &[&["01/07/2025", "A"], &["bogus", "B"]],
        );
        let mut state = FilterState::default();
        let view = apply_filters(&table, &roles, &mut state);
        assert_eq!(view.row_count, 1);
    }

    #[test]
    fn date_filter_skipped_when_no_usable_timestamp() {
        let (table, roles) = canonical(
            &["data", "ativo"],
            &[&["bogus", "A"], &["also bogus", "B"]],
        );
        let mut state = FilterState {
            from: Some(date(2025, 1, 1)),
            to: Some(date(2025, 1, 2)),
            ..FilterState::default()
        };
        let view = apply_filters(&table, &roles, &mut state);
        // All timestamps missing: the range does not apply and bounds stay put.
        assert_eq!(view.row_count, 2);
        assert_eq!(state.from, Some(date(2025, 1, 1)));
    }

    #[test]
    fn filtered_rows_sort_ascending_by_timestamp() {
        let (table, roles) = canonical(
            &["data", "ativo"],
            &[
                &["31/07/2025", "late"],
                &["01/07/2025", "early"],
                &["15/07/2025", "mid"],
            ],
        );
        let mut state = FilterState::default();
        let view = apply_filters(&table, &roles, &mut state);
        let names: Vec<String> = view
            .filtered_rows
            .iter()
            .map(|row| row[roles.identity].as_ref().unwrap().as_display())
            .collect();
        assert_eq!(names, vec!["early", "mid", "late"]);
    }

    #[test]
    fn original_order_preserved_without_timestamp_role() {
        let (table, roles) = canonical(&["ativo"], &[&["z"], &["a"], &["m"]]);
        let mut state = FilterState::default();
        let view = apply_filters(&table, &roles, &mut state);
        let names: Vec<String> = view
            .filtered_rows
            .iter()
            .map(|row| row[roles.identity].as_ref().unwrap().as_display())
            .collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }

    #[test]
    fn daily_series_groups_by_date_ascending() {
        let (table, roles) = canonical(
            &["data", "ativo", "vm"],
            &[
                &["15/07/2025", "A", "2.0"],
                &["01/07/2025", "B", "1.0"],
                &["15/07/2025", "C", "3.0"],
            ],
        );
        let mut state = FilterState::default();
        let view = apply_filters(&table, &roles, &mut state);
        assert_eq!(
            view.daily_series,
            vec![(date(2025, 7, 1), 1.0), (date(2025, 7, 15), 5.0)]
        );
    }

    #[test]
    fn daily_series_keeps_dates_whose_values_are_missing() {
        let (table, roles) = canonical(
            &["data", "ativo", "vm"],
            &[&["01/07/2025", "A", "oops"], &["02/07/2025", "B", "3.5"]],
        );
        let mut state = FilterState::default();
        let view = apply_filters(&table, &roles, &mut state);
        assert_eq!(
            view.daily_series,
            vec![(date(2025, 7, 1), 0.0), (date(2025, 7, 2), 3.5)]
        );
    }

    #[test]
    fn daily_series_empty_without_value_role() {
        let (table, roles) = canonical(&["data", "ativo"], &[&["01/07/2025", "A"]]);
        let mut state = FilterState::default();
        let view = apply_filters(&table, &roles, &mut state);
        assert!(view.daily_series.is_empty());
        assert_eq!(view.value_sum, 0.0);
    }

    #[test]
    fn apply_filters_is_idempotent() {
        let (table, roles) = canonical(
            &["data", "ativo", "vm"],
            &[&["01/07/2025", "A", "1.5"], &["02/07/2025", "B", "2.5"]],
        );
        let mut state = FilterState::default();
        let first = apply_filters(&table, &roles, &mut state);
        let second = apply_filters(&table, &roles, &mut state);
        assert_eq!(first, second);
    }

    #[test]
    fn from_flags_rejects_unparseable_dates() {
        let (table, roles) = canonical(&["ativo"], &[&["A"]]);
        assert!(FilterState::from_flags(&table, &roles, None, Some("nope"), None).is_err());
    }
}
