//! Exact-match filters, ordering and relation keys.

use crate::value::{Record, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Conjunction of exact-match predicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    predicates: Vec<(String, Value)>,
}

impl Filter {
    /// A filter matching every record.
    pub fn all() -> Self {
        Self::default()
    }

    /// Add an `attribute == value` predicate.
    pub fn eq(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicates.push((attribute.into(), value.into()));
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.predicates
            .iter()
            .all(|(attribute, expected)| record.get(attribute) == expected)
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// The `(attribute, value)` predicates in insertion order.
    pub fn predicates(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.predicates
            .iter()
            .map(|(attribute, value)| (attribute.as_str(), value))
    }
}

/// Sort key for query results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub attribute: String,
    pub descending: bool,
}

impl Order {
    pub fn asc(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            descending: false,
        }
    }

    pub fn desc(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            descending: true,
        }
    }

    /// Parse the `-attribute` / `attribute` shorthand used in schema metadata.
    pub fn parse(spec: &str) -> Self {
        match spec.strip_prefix('-') {
            Some(attribute) => Self::desc(attribute),
            None => Self::asc(spec),
        }
    }

    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let ordering = a.get(&self.attribute).sort_cmp(b.get(&self.attribute));
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "-{}", self.attribute)
        } else {
            write!(f, "{}", self.attribute)
        }
    }
}

/// A filtered, ordered, optionally limited read.
///
/// Records tied on every order key keep their insertion order.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filter: Filter,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn order_by(mut self, order: Order) -> Self {
        self.order.push(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sort records in place according to the order keys (stable).
    pub fn sort(&self, records: &mut [Record]) {
        if self.order.is_empty() {
            return;
        }
        records.sort_by(|a, b| {
            self.order
                .iter()
                .map(|order| order.compare(a, b))
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }
}

impl From<Filter> for Query {
    fn from(filter: Filter) -> Self {
        Query::new().filter(filter)
    }
}

/// Identifies a many-to-many relation table: the owning entity plus relation name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelationKey {
    pub entity: String,
    pub relation: String,
}

impl RelationKey {
    pub fn new(entity: impl Into<String>, relation: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            relation: relation.into(),
        }
    }
}

impl fmt::Display for RelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.entity, self.relation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matches_all_predicates() {
        let record = Record::new("Tag").with("name", "rust").with("weight", 2i64);
        assert!(Filter::all().matches(&record));
        assert!(Filter::all().eq("name", "rust").matches(&record));
        assert!(!Filter::all().eq("name", "rust").eq("weight", 3i64).matches(&record));
    }

    #[test]
    fn test_filter_on_missing_attribute_matches_null() {
        let record = Record::new("Tag");
        assert!(Filter::all().eq("name", Value::Null).matches(&record));
    }

    #[test]
    fn test_order_parse_shorthand() {
        assert_eq!(Order::parse("-created_at"), Order::desc("created_at"));
        assert_eq!(Order::parse("name"), Order::asc("name"));
        assert_eq!(Order::desc("created_at").to_string(), "-created_at");
    }

    #[test]
    fn test_sort_is_stable_on_ties() {
        let mut records = vec![
            Record::new("T").with("k", 1i64).with("n", "a"),
            Record::new("T").with("k", 2i64).with("n", "b"),
            Record::new("T").with("k", 1i64).with("n", "c"),
        ];
        Query::new().order_by(Order::desc("k")).sort(&mut records);
        let names: Vec<_> = records.iter().map(|r| r.get_text("n").unwrap()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }
}
