//! Values returned by graph query execution.
//!
//! A [`Row`] keeps its columns in the order the query projected them. Values
//! are decoded by the gateway into [`Value`]; temporal values are parsed with
//! chrono when possible and kept verbatim otherwise.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Temporal(Temporal),
    /// ISO-8601 duration text, e.g. `P14DT16H12M`.
    Duration(String),
    List(Vec<Value>),
    /// Field collection in the order the server sent it.
    Map(Vec<(String, Value)>),
    /// Anything without a dedicated variant (nodes, paths, points, ...).
    Other { kind: String, repr: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Temporal {
    Date(NaiveDate),
    LocalTime(NaiveTime),
    /// Time of day with a UTC offset.
    Time { time: NaiveTime, offset: String },
    LocalDateTime(NaiveDateTime),
    DateTime(DateTime<FixedOffset>),
    /// Offset date-time with a named zone suffix (`...+01:00[Europe/Berlin]`).
    Zoned {
        datetime: DateTime<FixedOffset>,
        zone: String,
    },
    /// Temporal text that did not parse; compared verbatim.
    Raw(String),
}

impl Temporal {
    /// Parses a server temporal of the given kind. Never fails: unparseable
    /// input is kept as [`Temporal::Raw`].
    pub fn parse(kind: &str, text: &str) -> Self {
        let text = text.trim();
        let parsed = match kind {
            "Date" => NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .map(Temporal::Date),
            "LocalTime" => parse_time(text).map(Temporal::LocalTime),
            "Time" => split_offset(text).and_then(|(t, off)| {
                parse_time(t).map(|time| Temporal::Time {
                    time,
                    offset: canonical_offset(off),
                })
            }),
            "LocalDateTime" => parse_local_datetime(text).map(Temporal::LocalDateTime),
            "DateTime" | "OffsetDateTime" | "ZonedDateTime" => parse_datetime(text),
            _ => None,
        };
        parsed.unwrap_or_else(|| Temporal::Raw(text.to_string()))
    }

    /// ISO-8601 text. Fractional seconds are printed only when non-zero.
    pub fn iso_format(&self) -> String {
        match self {
            Temporal::Date(d) => d.format("%Y-%m-%d").to_string(),
            Temporal::LocalTime(t) => t.format("%H:%M:%S%.f").to_string(),
            Temporal::Time { time, offset } => {
                format!("{}{}", time.format("%H:%M:%S%.f"), offset)
            }
            Temporal::LocalDateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            Temporal::DateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.f%:z").to_string(),
            Temporal::Zoned { datetime, zone } => format!(
                "{}[{}]",
                datetime.format("%Y-%m-%dT%H:%M:%S%.f%:z"),
                zone
            ),
            Temporal::Raw(s) => s.clone(),
        }
    }
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .ok()
}

fn parse_local_datetime(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M"))
        .ok()
}

fn parse_datetime(text: &str) -> Option<Temporal> {
    let (base, zone) = match text.find('[') {
        Some(i) if text.ends_with(']') => (&text[..i], Some(&text[i + 1..text.len() - 1])),
        _ => (text, None),
    };
    let datetime = DateTime::parse_from_rfc3339(base).ok()?;
    Some(match zone {
        Some(z) => Temporal::Zoned {
            datetime,
            zone: z.to_string(),
        },
        None => Temporal::DateTime(datetime),
    })
}

// "12:50:35.556+01:00" -> ("12:50:35.556", "+01:00")
fn split_offset(text: &str) -> Option<(&str, &str)> {
    if let Some(stripped) = text.strip_suffix('Z') {
        return Some((stripped, "Z"));
    }
    let idx = text.rfind(['+', '-'])?;
    Some((&text[..idx], &text[idx..]))
}

fn canonical_offset(offset: &str) -> String {
    if offset == "Z" {
        "+00:00".to_string()
    } else {
        offset.to_string()
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            Value::Float(f) => serializer.serialize_str(&f.to_string()),
            Value::String(s) => serializer.serialize_str(s),
            Value::Temporal(t) => serializer.serialize_str(&t.iso_format()),
            Value::Duration(d) => serializer.serialize_str(d),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(fields) => serialize_fields(fields, serializer),
            Value::Other { repr, .. } => serializer.serialize_str(repr),
        }
    }
}

fn serialize_fields<S: Serializer>(
    fields: &[(String, Value)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(fields.len()))?;
    for (k, v) in fields {
        map.serialize_entry(k, v)?;
    }
    map.end()
}

/// One result row, columns in projection order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new(columns: Vec<(String, Value)>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[(String, Value)] {
        &self.columns
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.columns.iter().map(|(_, v)| v)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.columns.iter().find(|(k, _)| k == field).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_fields(&self.columns, serializer)
    }
}
