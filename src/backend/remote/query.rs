// src/backend/remote/query.rs
use candid::CandidType;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::remote::document::{Document, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
    ArrayContains,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn matches(&self, doc: &Document) -> bool {
        let Some(actual) = doc.field(&self.field) else {
            return false;
        };
        match self.op {
            FilterOp::Eq => actual.sort_cmp(&self.value) == Ordering::Equal,
            FilterOp::Lt => actual.sort_cmp(&self.value) == Ordering::Less,
            FilterOp::Lte => actual.sort_cmp(&self.value) != Ordering::Greater,
            FilterOp::Gt => actual.sort_cmp(&self.value) == Ordering::Greater,
            FilterOp::Gte => actual.sort_cmp(&self.value) != Ordering::Less,
            FilterOp::ArrayContains => match actual {
                Value::Array(items) => items
                    .iter()
                    .any(|item| item.sort_cmp(&self.value) == Ordering::Equal),
                _ => false,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    /// Comparator shared by the store's indexed ordering and the in-memory
    /// fallback sort. Ties fall back to the document id in the same direction.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let ordering = match (a.field(&self.field), b.field(&self.field)) {
            (Some(x), Some(y)) => x.sort_cmp(y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| a.id().cmp(b.id()));
        match self.direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    }

    /// Drops documents lacking the order field, then sorts the rest.
    pub fn sort(&self, docs: &mut Vec<Document>) {
        docs.retain(|doc| doc.field(&self.field).is_some());
        docs.sort_by(|a, b| self.compare(a, b));
    }
}

/// A server-side index needed to serve a filter combined with an order on a
/// different field.
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct CompositeIndex {
    pub collection: String,
    pub filter_fields: Vec<String>,
    pub order_field: String,
}

impl CompositeIndex {
    pub fn new<I, T>(collection: &str, filter_fields: I, order_field: &str) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut filter_fields: Vec<String> = filter_fields.into_iter().map(Into::into).collect();
        filter_fields.sort();
        filter_fields.dedup();
        Self {
            collection: collection.to_string(),
            filter_fields,
            order_field: order_field.to_string(),
        }
    }
}

/// Serving state of a declared composite index.
#[derive(CandidType, Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexState {
    Building,
    Ready,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn filter(mut self, field: &str, op: FilterOp, value: Value) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            op,
            value,
        });
        self
    }

    pub fn where_eq(self, field: &str, value: Value) -> Self {
        self.filter(field, FilterOp::Eq, value)
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The same filters with neither ordering nor limit. The limit only makes
    /// sense after sorting, so callers re-apply it themselves.
    pub fn without_ordering(&self) -> Query {
        Query {
            collection: self.collection.clone(),
            filters: self.filters.clone(),
            order_by: None,
            limit: None,
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|f| f.matches(doc))
    }

    pub fn required_index(&self) -> Option<CompositeIndex> {
        let order = self.order_by.as_ref()?;
        if self.filters.iter().all(|f| f.field == order.field) {
            return None;
        }
        Some(CompositeIndex::new(
            &self.collection,
            self.filters.iter().map(|f| f.field.clone()),
            &order.field,
        ))
    }

    /// Filters, orders and truncates a candidate set.
    pub fn apply(&self, docs: Vec<Document>) -> Vec<Document> {
        let mut matched: Vec<Document> = docs.into_iter().filter(|d| self.matches(d)).collect();
        if let Some(order) = &self.order_by {
            order.sort(&mut matched);
        }
        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::document::{DocumentPath, Fields, StoreTimestamp};

    fn doc(id: &str, vault: &str, created: Value) -> Document {
        let mut fields = Fields::new();
        fields.insert("vaultId".into(), Value::text(vault));
        fields.insert("createdAt".into(), created);
        Document::new(DocumentPath::new("memories", id), fields)
    }

    #[test]
    fn descending_order_mixes_timestamp_representations() {
        let docs = vec![
            doc("a", "v", Value::DateMillis(1_000)),
            doc(
                "b",
                "v",
                Value::Timestamp(StoreTimestamp {
                    seconds: 3,
                    nanos: 0,
                }),
            ),
            doc("c", "v", Value::DateMillis(2_000)),
            doc("d", "other", Value::DateMillis(9_000)),
        ];
        let query = Query::collection("memories")
            .where_eq("vaultId", Value::text("v"))
            .order_by("createdAt", Direction::Descending);
        let ids: Vec<_> = query.apply(docs).iter().map(|d| d.id().to_string()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn filter_plus_foreign_order_needs_an_index() {
        let query = Query::collection("memories")
            .where_eq("vaultId", Value::text("v"))
            .order_by("createdAt", Direction::Descending);
        assert_eq!(
            query.required_index(),
            Some(CompositeIndex::new("memories", ["vaultId"], "createdAt"))
        );
        assert_eq!(query.without_ordering().required_index(), None);

        let single = Query::collection("activities").order_by("timestamp", Direction::Descending);
        assert_eq!(single.required_index(), None);
    }

    #[test]
    fn limit_applies_after_sorting() {
        let docs = vec![
            doc("a", "v", Value::DateMillis(1)),
            doc("b", "v", Value::DateMillis(3)),
            doc("c", "v", Value::DateMillis(2)),
        ];
        let query = Query::collection("memories")
            .order_by("createdAt", Direction::Descending)
            .limit(1);
        let top = query.apply(docs);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].id(), "b");
    }
}
