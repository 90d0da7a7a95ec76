//! Semantic role resolution and type coercion for raw portfolio tables.
//!
//! Loosely-structured exports name their columns inconsistently ("ATIVO",
//! "Asset", "descricao", ...). This module matches headers case-insensitively
//! against priority-ordered candidate lists per role, synthesizes identity
//! and category columns when nothing matches, and coerces timestamp and
//! numeric columns with a missing-on-failure policy: a malformed cell becomes
//! `None`, never an error.

use std::collections::HashMap;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use itertools::Itertools;
use log::debug;

use crate::{
    data::{Cell, Value, parse_day_first_date, parse_number},
    filter::ALL_CATEGORIES,
    loader::RawTable,
};

/// Fill value for a synthesized identity column.
pub const UNNAMED_PLACEHOLDER: &str = "(unnamed)";
/// Fill value for a synthesized category column.
pub const NO_CATEGORY_PLACEHOLDER: &str = "(no category)";

/// Header given to a synthesized identity column.
pub const SYNTHETIC_IDENTITY_HEADER: &str = "__asset__";
/// Header given to a synthesized category column.
pub const SYNTHETIC_CATEGORY_HEADER: &str = "__category__";

// First match wins; matching is against lowercased, trimmed headers.
const IDENTITY_CANDIDATES: &[&str] = &[
    "ativo", "descrição", "descricao", "fundo", "ticker", "nome", "asset", "name",
];
const CATEGORY_CANDIDATES: &[&str] = &[
    "setor", "categoria", "segmento", "classe", "sector", "category", "segment", "class",
];
const TIMESTAMP_CANDIDATES: &[&str] = &["data", "date", "dt"];
const VALUE_CANDIDATES: &[&str] = &[
    "vm", "valor", "valor_mercado", "value", "preco", "price", "market_value",
];
const QUANTITY_CANDIDATES: &[&str] = &["qnt", "quantidade", "qtde", "qtd", "shares", "units"];

/// Which canonical column carries each semantic role.
///
/// `identity` and `category` always resolve: a synthetic column is appended
/// when no header matches. The remaining roles stay `None` when absent, and
/// every downstream computation treats absence as "skip", never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleMap {
    pub identity: usize,
    pub category: usize,
    pub timestamp: Option<usize>,
    pub value: Option<usize>,
    pub quantity: Option<usize>,
}

impl RoleMap {
    pub fn has_timestamp(&self) -> bool {
        self.timestamp.is_some()
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }
}

/// The normalized dataset: resolved headers plus typed cells. Built once at
/// startup and immutable afterwards; filtering never mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl CanonicalTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Resolves semantic roles and coerces role columns to their types.
///
/// The raw input is not mutated. The only error case is a structurally
/// empty table (zero columns), which is a caller contract violation;
/// malformed *data* never fails.
pub fn normalize(raw: &RawTable) -> Result<(CanonicalTable, RoleMap)> {
    if raw.headers.is_empty() {
        bail!("Raw table has no columns; at least a header row is required");
    }

    let lookup: HashMap<String, usize> = raw
        .headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.trim().to_lowercase(), idx))
        .collect();
    let pick = |candidates: &[&str]| -> Option<usize> {
        candidates
            .iter()
            .find_map(|candidate| lookup.get(*candidate).copied())
    };

    let mut headers = raw.headers.clone();
    let mut rows: Vec<Vec<Cell>> = raw
        .rows
        .iter()
        .map(|row| {
            (0..raw.headers.len())
                .map(|idx| match row.get(idx).map(|cell| cell.trim()) {
                    Some(text) if !text.is_empty() => Some(Value::String(text.to_string())),
                    _ => None,
                })
                .collect()
        })
        .collect();

    let identity = match pick(IDENTITY_CANDIDATES) {
        Some(idx) => idx,
        None => append_constant_column(
            &mut headers,
            &mut rows,
            SYNTHETIC_IDENTITY_HEADER,
            UNNAMED_PLACEHOLDER,
        ),
    };
    let category = match pick(CATEGORY_CANDIDATES) {
        Some(idx) => idx,
        None => append_constant_column(
            &mut headers,
            &mut rows,
            SYNTHETIC_CATEGORY_HEADER,
            NO_CATEGORY_PLACEHOLDER,
        ),
    };

    let timestamp = pick(TIMESTAMP_CANDIDATES);
    if let Some(idx) = timestamp {
        coerce_column(&mut rows, idx, |text| {
            parse_day_first_date(text).ok().map(Value::Date)
        });
    }
    let value = pick(VALUE_CANDIDATES);
    let quantity = pick(QUANTITY_CANDIDATES);
    for idx in [value, quantity].into_iter().flatten() {
        coerce_column(&mut rows, idx, |text| {
            parse_number(text).ok().map(Value::Number)
        });
    }

    let roles = RoleMap {
        identity,
        category,
        timestamp,
        value,
        quantity,
    };
    debug!(
        "Resolved roles: identity='{}', category='{}', timestamp={:?}, value={:?}, quantity={:?}",
        headers[roles.identity],
        headers[roles.category],
        roles.timestamp.map(|idx| headers[idx].clone()),
        roles.value.map(|idx| headers[idx].clone()),
        roles.quantity.map(|idx| headers[idx].clone()),
    );
    Ok((CanonicalTable { headers, rows }, roles))
}

fn append_constant_column(
    headers: &mut Vec<String>,
    rows: &mut [Vec<Cell>],
    header: &str,
    fill: &str,
) -> usize {
    headers.push(header.to_string());
    for row in rows.iter_mut() {
        row.push(Some(Value::String(fill.to_string())));
    }
    headers.len() - 1
}

fn coerce_column<F>(rows: &mut [Vec<Cell>], idx: usize, parse: F)
where
    F: Fn(&str) -> Cell,
{
    for row in rows {
        if let Some(cell) = row.get_mut(idx) {
            *cell = match cell.take() {
                Some(Value::String(text)) => parse(&text),
                other => other,
            };
        }
    }
}

/// Selectable category values: the [`ALL_CATEGORIES`] sentinel first, then
/// the distinct category texts in ascending order.
pub fn categories(table: &CanonicalTable, roles: &RoleMap) -> Vec<String> {
    let mut out = vec![ALL_CATEGORIES.to_string()];
    out.extend(
        table
            .rows
            .iter()
            .filter_map(|row| row.get(roles.category).and_then(|cell| cell.as_ref()))
            .map(Value::as_display)
            .sorted()
            .dedup(),
    );
    out
}

/// Min/max over non-missing timestamps, or `None` when the timestamp role is
/// unresolved or every cell is missing.
pub fn timestamp_bounds(table: &CanonicalTable, roles: &RoleMap) -> Option<(NaiveDate, NaiveDate)> {
    let idx = roles.timestamp?;
    let mut bounds: Option<(NaiveDate, NaiveDate)> = None;
    for row in &table.rows {
        if let Some(Some(Value::Date(date))) = row.get(idx) {
            bounds = Some(match bounds {
                Some((min, max)) => (min.min(*date), max.max(*date)),
                None => (*date, *date),
            });
        }
    }
    bounds
}
