// src/backend/remote/write.rs
use crate::remote::document::{DocumentPath, Fields, Value};
use crate::remote::error::StoreError;

#[derive(Clone, Debug, PartialEq)]
pub enum UpdateOp {
    Set(Value),
    /// Appends each element not already present.
    ArrayUnion(Vec<Value>),
    /// Removes every occurrence of each element.
    ArrayRemove(Vec<Value>),
}

/// A single field mutation. Dotted paths address nested map entries, e.g.
/// `reactions.❤️`.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldUpdate {
    pub field_path: String,
    pub op: UpdateOp,
}

impl FieldUpdate {
    pub fn set(field_path: impl Into<String>, value: Value) -> Self {
        Self {
            field_path: field_path.into(),
            op: UpdateOp::Set(value),
        }
    }

    pub fn array_union(field_path: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            field_path: field_path.into(),
            op: UpdateOp::ArrayUnion(values),
        }
    }

    pub fn array_remove(field_path: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            field_path: field_path.into(),
            op: UpdateOp::ArrayRemove(values),
        }
    }

    /// Applies the mutation in place, creating intermediate maps as needed.
    pub fn apply(&self, fields: &mut Fields) -> Result<(), StoreError> {
        let segments: Vec<&str> = self.field_path.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(StoreError::invalid_argument(format!(
                "Invalid field path `{}`",
                self.field_path
            )));
        }
        let (leaf, parents) = segments
            .split_last()
            .ok_or_else(|| StoreError::invalid_argument("Empty field path"))?;

        let mut target = fields;
        for segment in parents {
            let entry = target
                .entry(segment.to_string())
                .or_insert_with(|| Value::Map(Fields::new()));
            if !matches!(entry, Value::Map(_)) {
                *entry = Value::Map(Fields::new());
            }
            target = match entry {
                Value::Map(map) => map,
                _ => unreachable!("entry was just replaced with a map"),
            };
        }

        match &self.op {
            UpdateOp::Set(value) => {
                target.insert(leaf.to_string(), value.clone());
            }
            UpdateOp::ArrayUnion(values) => {
                let mut items = match target.remove(*leaf) {
                    Some(Value::Array(items)) => items,
                    _ => Vec::new(),
                };
                for value in values {
                    if !items.contains(value) {
                        items.push(value.clone());
                    }
                }
                target.insert(leaf.to_string(), Value::Array(items));
            }
            UpdateOp::ArrayRemove(values) => {
                let mut items = match target.remove(*leaf) {
                    Some(Value::Array(items)) => items,
                    _ => Vec::new(),
                };
                items.retain(|item| !values.contains(item));
                target.insert(leaf.to_string(), Value::Array(items));
            }
        }
        Ok(())
    }
}

/// Condition a document must satisfy for an update to apply.
#[derive(Clone, Debug, PartialEq)]
pub enum Precondition {
    Exists,
    FieldEquals(String, Value),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Write {
    Set {
        path: DocumentPath,
        fields: Fields,
        merge: bool,
    },
    Update {
        path: DocumentPath,
        updates: Vec<FieldUpdate>,
        precondition: Option<Precondition>,
    },
    Delete {
        path: DocumentPath,
    },
}

impl Write {
    pub fn path(&self) -> &DocumentPath {
        match self {
            Write::Set { path, .. } | Write::Update { path, .. } | Write::Delete { path } => path,
        }
    }
}

/// Writes committed together: either all apply or none do.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteBatch {
    writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: DocumentPath, fields: Fields, merge: bool) -> Self {
        self.writes.push(Write::Set {
            path,
            fields,
            merge,
        });
        self
    }

    pub fn update(
        mut self,
        path: DocumentPath,
        updates: Vec<FieldUpdate>,
        precondition: Option<Precondition>,
    ) -> Self {
        self.writes.push(Write::Update {
            path,
            updates,
            precondition,
        });
        self
    }

    pub fn delete(mut self, path: DocumentPath) -> Self {
        self.writes.push(Write::Delete { path });
        self
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_and_remove_on_nested_reaction_path() {
        let mut fields = Fields::new();
        let path = "reactions.❤️";

        FieldUpdate::array_union(path, vec![Value::text("u1")]).apply(&mut fields).unwrap();
        FieldUpdate::array_union(path, vec![Value::text("u1"), Value::text("u2")])
            .apply(&mut fields)
            .unwrap();
        let Some(Value::Map(reactions)) = fields.get("reactions") else {
            panic!("reactions map missing");
        };
        assert_eq!(
            reactions.get("❤️"),
            Some(&Value::text_array(["u1", "u2"]))
        );

        FieldUpdate::array_remove(path, vec![Value::text("u1")]).apply(&mut fields).unwrap();
        let Some(Value::Map(reactions)) = fields.get("reactions") else {
            panic!("reactions map missing");
        };
        assert_eq!(reactions.get("❤️"), Some(&Value::text_array(["u2"])));
    }

    #[test]
    fn union_replaces_legacy_counter() {
        let mut fields = Fields::new();
        let mut reactions = Fields::new();
        reactions.insert("😂".into(), Value::Integer(3));
        fields.insert("reactions".into(), Value::Map(reactions));

        FieldUpdate::array_union("reactions.😂", vec![Value::text("u1")])
            .apply(&mut fields)
            .unwrap();
        let Some(Value::Map(reactions)) = fields.get("reactions") else {
            panic!("reactions map missing");
        };
        assert_eq!(reactions.get("😂"), Some(&Value::text_array(["u1"])));
    }

    #[test]
    fn rejects_empty_segments() {
        let mut fields = Fields::new();
        let err = FieldUpdate::set("reactions..x", Value::Null)
            .apply(&mut fields)
            .unwrap_err();
        assert_eq!(err.kind, crate::remote::StoreErrorKind::InvalidArgument);
    }
}
