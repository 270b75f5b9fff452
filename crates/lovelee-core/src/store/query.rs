//! Standing and one-shot queries over a single collection.

use std::cmp::Ordering;

use chrono::DateTime;
use serde_json::Value;

use super::document::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Equality filter. A missing field compares equal to `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// A query over one flat collection.
///
/// # Example
///
/// ```
/// use lovelee_core::store::Query;
///
/// let query = Query::collection("notes")
///     .where_eq("coupleId", "c1")
///     .order_by_desc("createdAt")
///     .limit(50);
/// assert_eq!(query.limit, Some(50));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn order_by_desc(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction: Direction::Descending,
        });
        self
    }

    pub fn order_by_asc(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction: Direction::Ascending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `document` belongs to this query's result set, ignoring the limit.
    pub fn matches(&self, document: &Document) -> bool {
        document.collection == self.collection
            && self.filters.iter().all(|filter| {
                let actual = document.field(&filter.field).unwrap_or(&Value::Null);
                actual == &filter.value
            })
    }

    /// Filters, orders and truncates `documents` into this query's result set.
    ///
    /// Ties on the ordering field fall back to the creation sequence in the
    /// same direction, so "latest first" stays stable for records stamped
    /// within the same clock tick.
    pub fn apply<I>(&self, documents: I) -> Vec<Document>
    where
        I: IntoIterator<Item = Document>,
    {
        let mut results: Vec<Document> = documents
            .into_iter()
            .filter(|doc| self.matches(doc))
            .collect();

        match &self.order_by {
            Some(order) => results.sort_by(|a, b| {
                let left = a.field(&order.field).unwrap_or(&Value::Null);
                let right = b.field(&order.field).unwrap_or(&Value::Null);
                let ordering = compare_values(left, right).then(a.sequence.cmp(&b.sequence));
                match order.direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            }),
            None => results.sort_by_key(|doc| doc.sequence),
        }

        if let Some(limit) = self.limit {
            results.truncate(limit);
        }
        results
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values used for `order_by`.
///
/// RFC 3339 strings are compared as instants, since serialized timestamps do
/// not all share one width.
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => {
            let a = a.as_f64().unwrap_or(f64::NAN);
            let b = b.as_f64().unwrap_or(f64::NAN);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Value::String(a), Value::String(b)) => {
            match (DateTime::parse_from_rfc3339(a), DateTime::parse_from_rfc3339(b)) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
        _ => type_rank(left).cmp(&type_rank(right)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, sequence: u64, data: Value) -> Document {
        Document {
            collection: "notes".into(),
            id: id.into(),
            version: 1,
            sequence,
            data,
        }
    }

    #[test]
    fn test_missing_field_matches_null() {
        let query = Query::collection("notes").where_eq("coupleId", Value::Null);
        assert!(query.matches(&doc("a", 1, json!({}))));
        assert!(!query.matches(&doc("b", 2, json!({ "coupleId": "c1" }))));
    }

    #[test]
    fn test_desc_order_compares_timestamps_as_instants() {
        let docs = vec![
            doc("early", 1, json!({ "createdAt": "2024-06-15T10:00:00.500Z" })),
            doc("late", 2, json!({ "createdAt": "2024-06-15T10:00:01Z" })),
        ];
        let results = Query::collection("notes").order_by_desc("createdAt").apply(docs);
        assert_eq!(results[0].id, "late");
    }

    #[test]
    fn test_ties_break_on_sequence_and_limit_truncates() {
        let stamp = "2024-06-15T10:00:00Z";
        let docs = vec![
            doc("first", 1, json!({ "createdAt": stamp })),
            doc("second", 2, json!({ "createdAt": stamp })),
            doc("third", 3, json!({ "createdAt": stamp })),
        ];
        let results = Query::collection("notes")
            .order_by_desc("createdAt")
            .limit(2)
            .apply(docs);
        let ids: Vec<_> = results.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["third", "second"]);
    }
}
