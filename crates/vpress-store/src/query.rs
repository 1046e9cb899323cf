//! Collections and find filters.

use std::fmt;

use serde_json::Value;

/// Typed collections the pipeline reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Authors,
    Videos,
    Articles,
    Media,
}

impl Collection {
    /// URL slug of the collection.
    pub fn slug(&self) -> &'static str {
        match self {
            Collection::Authors => "authors",
            Collection::Videos => "videos",
            Collection::Articles => "articles",
            Collection::Media => "media",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())
    }
}

/// Comparison applied to one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equals(Value),
    In(Vec<Value>),
}

/// Conjunction of field conditions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    clauses: Vec<(String, Condition)>,
}

impl Filter {
    /// Filter matching every document.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn equals(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), Condition::Equals(value.into())));
        self
    }

    pub fn is_in<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.clauses.push((field.into(), Condition::In(values)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Encode as `where[field][op]=value` query pairs.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        self.clauses
            .iter()
            .map(|(field, condition)| match condition {
                Condition::Equals(value) => {
                    (format!("where[{}][equals]", field), scalar_to_string(value))
                }
                Condition::In(values) => (
                    format!("where[{}][in]", field),
                    values.iter().map(scalar_to_string).collect::<Vec<_>>().join(","),
                ),
            })
            .collect()
    }

    /// Evaluate the filter against a document held in memory.
    ///
    /// Relationship fields may hold either an id or a populated object
    /// with an `id`; both compare by id.
    pub fn matches(&self, doc: &Value) -> bool {
        self.clauses.iter().all(|(field, condition)| {
            let actual = doc.get(field).map(relation_id).unwrap_or(&Value::Null);
            match condition {
                Condition::Equals(expected) => loosely_equal(actual, expected),
                Condition::In(options) => options.iter().any(|o| loosely_equal(actual, o)),
            }
        })
    }
}

fn relation_id(value: &Value) -> &Value {
    match value {
        Value::Object(map) => map.get("id").unwrap_or(value),
        _ => value,
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Ids round-trip through the query string as text, so `3` and `"3"` are
/// the same value.
fn loosely_equal(actual: &Value, expected: &Value) -> bool {
    actual == expected
        || (!actual.is_null()
            && !actual.is_array()
            && !actual.is_object()
            && scalar_to_string(actual) == scalar_to_string(expected))
}
