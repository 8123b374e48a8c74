// src/backend/remote/document.rs
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::models::common::Timestamp;

pub type Fields = BTreeMap<String, Value>;

const NANOS_PER_SECOND: u64 = 1_000_000_000;
const NANOS_PER_MILLI: u64 = 1_000_000;

/// Vendor timestamp object as written by the store itself.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreTimestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl StoreTimestamp {
    pub fn from_nanos(nanos: Timestamp) -> Self {
        Self {
            seconds: (nanos / NANOS_PER_SECOND) as i64,
            nanos: (nanos % NANOS_PER_SECOND) as u32,
        }
    }

    pub fn to_nanos(&self) -> Option<Timestamp> {
        let seconds = u64::try_from(self.seconds).ok()?;
        seconds
            .checked_mul(NANOS_PER_SECOND)?
            .checked_add(u64::from(self.nanos))
    }
}

/// A loosely typed field value as held by the document store.
///
/// Records written by older clients may carry a creation time either as a
/// [`StoreTimestamp`] or as a plain date in epoch milliseconds.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Text(String),
    Timestamp(StoreTimestamp),
    DateMillis(i64),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn timestamp(nanos: Timestamp) -> Self {
        Value::Timestamp(StoreTimestamp::from_nanos(nanos))
    }

    pub fn text_array<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Value::Array(values.into_iter().map(|v| Value::Text(v.into())).collect())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Normalizes both timestamp representations to nanoseconds.
    pub fn as_instant(&self) -> Option<Timestamp> {
        match self {
            Value::Timestamp(ts) => ts.to_nanos(),
            Value::DateMillis(ms) => u64::try_from(*ms).ok()?.checked_mul(NANOS_PER_MILLI),
            _ => None,
        }
    }

    // Cross-type order: null, booleans, numbers, timestamps, strings, arrays, maps.
    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Integer(_) => 2,
            Value::Timestamp(_) | Value::DateMillis(_) => 3,
            Value::Text(_) => 4,
            Value::Array(_) => 5,
            Value::Map(_) => 6,
        }
    }

    /// Total order used for filters and for sorting query results.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| x.sort_cmp(y))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            (Value::Map(a), Value::Map(b)) => a
                .iter()
                .zip(b.iter())
                .map(|((ka, va), (kb, vb))| ka.cmp(kb).then_with(|| va.sort_cmp(vb)))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            _ if self.rank() == 3 && other.rank() == 3 => {
                self.as_instant().cmp(&other.as_instant())
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Address of a document: the collection path plus the document id.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentPath {
    pub collection: String,
    pub id: String,
}

impl DocumentPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn key(&self) -> String {
        format!("{}/{}", self.collection, self.id)
    }

    pub fn parse(key: &str) -> Option<Self> {
        let (collection, id) = key.rsplit_once('/')?;
        if collection.is_empty() || id.is_empty() {
            return None;
        }
        Some(Self::new(collection, id))
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A record failed the typed schema check at the store boundary.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("{path}: field `{field}` {problem}")]
pub struct SchemaError {
    pub path: String,
    pub field: String,
    pub problem: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub path: DocumentPath,
    pub fields: Fields,
}

impl Document {
    pub fn new(path: DocumentPath, fields: Fields) -> Self {
        Self { path, fields }
    }

    pub fn id(&self) -> &str {
        &self.path.id
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        match self.fields.get(name) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value),
        }
    }

    pub fn schema_error(&self, field: &str, problem: impl Into<String>) -> SchemaError {
        SchemaError {
            path: self.path.key(),
            field: field.to_string(),
            problem: problem.into(),
        }
    }

    pub fn text(&self, field: &str) -> Result<String, SchemaError> {
        self.optional_text(field)?
            .ok_or_else(|| self.schema_error(field, "is required"))
    }

    pub fn text_or_default(&self, field: &str) -> Result<String, SchemaError> {
        Ok(self.optional_text(field)?.unwrap_or_default())
    }

    pub fn optional_text(&self, field: &str) -> Result<Option<String>, SchemaError> {
        match self.field(field) {
            None => Ok(None),
            Some(Value::Text(s)) => Ok(Some(s.clone())),
            Some(_) => Err(self.schema_error(field, "must be text")),
        }
    }

    pub fn bool_or(&self, field: &str, default: bool) -> Result<bool, SchemaError> {
        match self.field(field) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(self.schema_error(field, "must be a boolean")),
        }
    }

    pub fn timestamp(&self, field: &str) -> Result<Timestamp, SchemaError> {
        self.optional_timestamp(field)?
            .ok_or_else(|| self.schema_error(field, "is required"))
    }

    pub fn optional_timestamp(&self, field: &str) -> Result<Option<Timestamp>, SchemaError> {
        match self.field(field) {
            None => Ok(None),
            Some(value) => value
                .as_instant()
                .map(Some)
                .ok_or_else(|| self.schema_error(field, "must be a timestamp or a date")),
        }
    }

    pub fn text_list(&self, field: &str) -> Result<Vec<String>, SchemaError> {
        match self.field(field) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_text()
                        .map(str::to_string)
                        .ok_or_else(|| self.schema_error(field, "must only contain text"))
                })
                .collect(),
            Some(_) => Err(self.schema_error(field, "must be a list")),
        }
    }

    pub fn map(&self, field: &str) -> Result<Option<&BTreeMap<String, Value>>, SchemaError> {
        match self.field(field) {
            None => Ok(None),
            Some(Value::Map(map)) => Ok(Some(map)),
            Some(_) => Err(self.schema_error(field, "must be a map")),
        }
    }
}
