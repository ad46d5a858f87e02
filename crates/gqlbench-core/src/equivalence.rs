//! Canonical comparison keys for result values and result-set equivalence.
//!
//! Normalization rules, applied recursively:
//! 1. floats are rounded to 9 fractional digits; an integral result compares
//!    equal to the same integer;
//! 2. integers, strings, booleans and null are kept;
//! 3. temporals and durations become their canonical text;
//! 4. lists keep their order;
//! 5. maps become `(key, value)` pairs sorted by key;
//! 6. anything else falls back to its string form.
//!
//! Rows are compared positionally, in each query's own column order.

use crate::value::{Row, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

pub const FLOAT_DIGITS: usize = 9;

/// Hashable, totally ordered canonical form of a [`Value`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Null,
    Bool(bool),
    Int(i64),
    Float(FloatKey),
    Text(String),
    Seq(Vec<Key>),
    Pairs(Vec<(String, Key)>),
}

/// A rounded, non-integral float compared by bit pattern.
#[derive(Debug, Clone, Copy)]
pub struct FloatKey(f64);

impl FloatKey {
    pub fn value(self) -> f64 {
        self.0
    }
}

impl PartialEq for FloatKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for FloatKey {}

impl Hash for FloatKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl PartialOrd for FloatKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Rounds to [`FLOAT_DIGITS`] fractional digits using correctly rounded
/// decimal formatting, so `round9(round9(x)) == round9(x)`.
pub fn round9(x: f64) -> f64 {
    if !x.is_finite() {
        return x;
    }
    format!("{:.*}", FLOAT_DIGITS, x).parse().unwrap_or(x)
}

fn float_key(x: f64) -> Key {
    if x.is_nan() {
        return Key::Float(FloatKey(f64::NAN));
    }
    let r = round9(x);
    if r.is_finite() && r.fract() == 0.0 && r >= i64::MIN as f64 && r < i64::MAX as f64 {
        return Key::Int(r as i64);
    }
    Key::Float(FloatKey(r))
}

pub fn normalize(value: &Value) -> Key {
    match value {
        Value::Float(f) => float_key(*f),
        Value::Int(i) => Key::Int(*i),
        Value::String(s) => Key::Text(s.clone()),
        Value::Bool(b) => Key::Bool(*b),
        Value::Null => Key::Null,
        Value::Temporal(t) => Key::Text(t.iso_format()),
        Value::Duration(d) => Key::Text(d.trim().to_string()),
        Value::List(items) => Key::Seq(items.iter().map(normalize).collect()),
        Value::Map(fields) => {
            let mut pairs: Vec<(String, Key)> = fields
                .iter()
                .map(|(k, v)| (k.clone(), normalize(v)))
                .collect();
            pairs.sort();
            Key::Pairs(pairs)
        }
        Value::Other { repr, .. } => Key::Text(repr.clone()),
    }
}

impl From<&Key> for Value {
    fn from(key: &Key) -> Self {
        match key {
            Key::Null => Value::Null,
            Key::Bool(b) => Value::Bool(*b),
            Key::Int(i) => Value::Int(*i),
            Key::Float(f) => Value::Float(f.value()),
            Key::Text(s) => Value::String(s.clone()),
            Key::Seq(items) => Value::List(items.iter().map(Value::from).collect()),
            Key::Pairs(pairs) => Value::Map(
                pairs
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Canonical row: normalized values in the row's own column order.
pub fn canonical_row(row: &Row) -> Vec<Key> {
    row.values().map(normalize).collect()
}

/// How two canonicalized result sets are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// Rows compared as sets: duplicate rows within one result collapse.
    #[default]
    Set,
    /// Rows compared as multisets: duplicate counts must match.
    Multiset,
}

impl Comparison {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparison::Set => "set",
            Comparison::Multiset => "multiset",
        }
    }
}

pub fn results_equivalent(gold: &[Row], predicted: &[Row], mode: Comparison) -> bool {
    match mode {
        Comparison::Set => {
            let g: HashSet<Vec<Key>> = gold.iter().map(canonical_row).collect();
            let p: HashSet<Vec<Key>> = predicted.iter().map(canonical_row).collect();
            g == p
        }
        Comparison::Multiset => {
            if gold.len() != predicted.len() {
                return false;
            }
            let mut g: Vec<Vec<Key>> = gold.iter().map(canonical_row).collect();
            let mut p: Vec<Vec<Key>> = predicted.iter().map(canonical_row).collect();
            g.sort();
            p.sort();
            g == p
        }
    }
}
