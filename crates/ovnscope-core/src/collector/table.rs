//! Decoder for `ovn-nbctl --format=json` table listings.
//!
//! The listing is a JSON object with positional rows:
//!
//! ```text
//! {"headings": ["_uuid", "name", "ports"],
//!  "data": [[["uuid", "5f1c…"], "sw0", ["set", [["uuid", "a1…"], ["uuid", "b2…"]]]]]}
//! ```
//!
//! Non-primitive cells use OVSDB's tagged encoding `[tag, payload]`:
//! `uuid` (reference), `set` (sequence) and `map` (list of key/value pairs).
//! Some tool versions emit the listing with single quotes instead of double
//! quotes; such payloads are accepted after normalization and reported via
//! [`DecodedTable::normalized`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Deserialize;
use serde_json::Value;

/// Error decoding a table listing.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// Payload is not valid JSON, neither strictly nor after quote normalization.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),
    /// A row does not have one cell per heading.
    #[error("row {row} has {got} values, expected {expected} (heading count)")]
    RowShape {
        row: usize,
        got: usize,
        expected: usize,
    },
}

/// A decoded cell value with tagged encodings resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum TableValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Seq(Vec<TableValue>),
    Map(BTreeMap<String, TableValue>),
}

impl TableValue {
    /// Coerces the value to a string: strings pass through, null becomes empty,
    /// everything else uses its textual form.
    pub fn as_string(&self) -> String {
        match self {
            TableValue::String(s) => s.clone(),
            TableValue::Null => String::new(),
            other => other.to_string(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TableValue::Null)
    }

    fn to_json(&self) -> Value {
        match self {
            TableValue::Null => Value::Null,
            TableValue::Bool(b) => Value::Bool(*b),
            TableValue::Number(n) => Value::Number(n.clone()),
            TableValue::String(s) => Value::String(s.clone()),
            TableValue::Seq(items) => Value::Array(items.iter().map(TableValue::to_json).collect()),
            TableValue::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for TableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableValue::Null => Ok(()),
            TableValue::Bool(b) => write!(f, "{}", b),
            TableValue::Number(n) => write!(f, "{}", n),
            TableValue::String(s) => f.write_str(s),
            TableValue::Seq(_) | TableValue::Map(_) => write!(f, "{}", self.to_json()),
        }
    }
}

/// One table row: heading name → decoded cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: HashMap<String, TableValue>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&TableValue> {
        self.cells.get(column)
    }

    /// String column; missing or null → empty string.
    pub fn string(&self, column: &str) -> String {
        self.get(column).map(TableValue::as_string).unwrap_or_default()
    }

    /// Sequence-of-strings column with empty elements dropped.
    ///
    /// A bare scalar is treated as a one-element set, which is how the
    /// listing encodes sets holding a single value.
    pub fn strings(&self, column: &str) -> Vec<String> {
        match self.get(column) {
            None | Some(TableValue::Null) | Some(TableValue::Map(_)) => Vec::new(),
            Some(TableValue::Seq(items)) => items
                .iter()
                .map(TableValue::as_string)
                .filter(|s| !s.is_empty())
                .collect(),
            Some(scalar) => {
                let s = scalar.as_string();
                if s.is_empty() { Vec::new() } else { vec![s] }
            }
        }
    }

    /// String→string map column; anything other than a map → empty.
    pub fn string_map(&self, column: &str) -> BTreeMap<String, String> {
        match self.get(column) {
            Some(TableValue::Map(map)) => map
                .iter()
                .map(|(k, v)| (k.clone(), v.as_string()))
                .collect(),
            _ => BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl FromIterator<(String, TableValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, TableValue)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

/// Result of decoding one table listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedTable {
    pub rows: Vec<Row>,
    /// Set when the payload only parsed after replacing `'` with `"`.
    pub normalized: bool,
}

#[derive(Deserialize)]
struct RawTable {
    #[serde(default)]
    headings: Vec<String>,
    #[serde(default)]
    data: Vec<Vec<Value>>,
}

/// Decodes a raw listing into rows of resolved values.
pub fn decode_table(raw: &str) -> Result<DecodedTable, TableError> {
    let (table, normalized) = match serde_json::from_str::<RawTable>(raw) {
        Ok(table) => (table, false),
        Err(strict_err) => {
            let replaced = raw.replace('\'', "\"");
            if replaced == raw {
                return Err(TableError::Decode(strict_err));
            }
            let table = serde_json::from_str::<RawTable>(&replaced).map_err(TableError::Decode)?;
            (table, true)
        }
    };

    let expected = table.headings.len();
    let mut rows = Vec::with_capacity(table.data.len());
    for (index, raw_row) in table.data.into_iter().enumerate() {
        if raw_row.len() != expected {
            return Err(TableError::RowShape {
                row: index,
                got: raw_row.len(),
                expected,
            });
        }
        let row: Row = table
            .headings
            .iter()
            .cloned()
            .zip(raw_row.into_iter().map(resolve))
            .collect();
        rows.push(row);
    }

    Ok(DecodedTable { rows, normalized })
}

/// Resolves OVSDB tagged encodings recursively.
pub fn resolve(value: Value) -> TableValue {
    match value {
        Value::Null => TableValue::Null,
        Value::Bool(b) => TableValue::Bool(b),
        Value::Number(n) => TableValue::Number(n),
        Value::String(s) => TableValue::String(s),
        Value::Object(map) => {
            TableValue::Map(map.into_iter().map(|(k, v)| (k, resolve(v))).collect())
        }
        Value::Array(items) => resolve_array(items),
    }
}

enum Tag {
    Uuid,
    Set,
    Map,
}

fn resolve_array(mut items: Vec<Value>) -> TableValue {
    let tag = match items.as_slice() {
        [Value::String(tag), _] => match tag.as_str() {
            "uuid" => Some(Tag::Uuid),
            "set" => Some(Tag::Set),
            "map" => Some(Tag::Map),
            _ => None,
        },
        _ => None,
    };

    let Some(tag) = tag else {
        return TableValue::Seq(items.into_iter().map(resolve).collect());
    };
    let payload = items.swap_remove(1);

    match (tag, payload) {
        (Tag::Uuid, payload) => TableValue::String(resolve(payload).as_string()),
        (Tag::Set, Value::Array(elements)) => {
            TableValue::Seq(elements.into_iter().map(resolve).collect())
        }
        (Tag::Set, _) => TableValue::Seq(Vec::new()),
        (Tag::Map, Value::Array(pairs)) => TableValue::Map(
            pairs
                .into_iter()
                .filter_map(|pair| match pair {
                    Value::Array(kv) if kv.len() == 2 => {
                        let mut kv = kv.into_iter();
                        let key = resolve(kv.next()?).as_string();
                        let value = resolve(kv.next()?);
                        Some((key, value))
                    }
                    _ => None,
                })
                .collect(),
        ),
        (Tag::Map, _) => TableValue::Map(BTreeMap::new()),
    }
}
