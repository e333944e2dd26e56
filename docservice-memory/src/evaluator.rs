//! Criteria evaluation for in-memory document filtering.
//!
//! [`DocumentEvaluator`] walks [`Criteria`] with the core [`QueryVisitor`] and decides
//! whether a single stored document matches. Values are compared through
//! [`Comparable`], which puts every numeric BSON type on the same footing.

use bson::{Bson, datetime::DateTime};
use std::{cmp::Ordering, collections::HashMap};

use docservice_core::{
    document::RawDocument,
    error::BackendError,
    query::{Criteria, FieldOp, QueryVisitor},
};

/// Type-erased, comparable representation of BSON values.
///
/// Integers and floats are normalized to `f64`.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(f64::from(*value)),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(values) => Comparable::Array(values.iter().map(Comparable::from).collect()),
            Bson::Document(document) => Comparable::Map(
                document
                    .iter()
                    .map(|(key, value)| (key.as_str(), Comparable::from(value)))
                    .collect(),
            ),
            // Other types are not comparable
            _ => Comparable::Null,
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Orders two documents on one field. Missing and incomparable values sort as equal.
pub(crate) fn compare_field(left: &RawDocument, right: &RawDocument, field: &str) -> Ordering {
    let left = left.get(field).map(Comparable::from).unwrap_or(Comparable::Null);
    let right = right.get(field).map(Comparable::from).unwrap_or(Comparable::Null);

    match (&left, &right) {
        (Comparable::Null, Comparable::Null) => Ordering::Equal,
        (Comparable::Null, _) => Ordering::Less,
        (_, Comparable::Null) => Ordering::Greater,
        _ => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
    }
}

fn is_member(candidate: &Comparable<'_>, values: &Bson) -> bool {
    match values {
        Bson::Array(values) => values.iter().any(|value| candidate == &Comparable::from(value)),
        single => candidate == &Comparable::from(single),
    }
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a RawDocument,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a RawDocument) -> Self {
        Self { document }
    }

    pub fn matches(&mut self, criteria: &Criteria) -> Result<bool, BackendError> {
        self.visit_criteria(criteria)
    }

    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a RawDocument>,
        criteria: &Criteria,
    ) -> Result<Vec<RawDocument>, BackendError> {
        let mut matching = Vec::new();

        for document in documents {
            if DocumentEvaluator::new(document).matches(criteria)? {
                matching.push(document.clone());
            }
        }

        Ok(matching)
    }
}

impl QueryVisitor for DocumentEvaluator<'_> {
    type Output = bool;
    type Error = BackendError;

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let Some(field_value) = self.document.get(field) else {
            // Only exclusion matches a missing field
            return Ok(*op == FieldOp::Nin);
        };
        let left = Comparable::from(field_value);

        Ok(match op {
            FieldOp::Eq => left == Comparable::from(value),
            FieldOp::Like | FieldOp::ILike => match (field_value, value) {
                (Bson::String(haystack), Bson::String(needle)) if *op == FieldOp::Like => {
                    haystack.contains(needle.as_str())
                }
                (Bson::String(haystack), Bson::String(needle)) => {
                    haystack.to_lowercase().contains(&needle.to_lowercase())
                }
                _ => false,
            },
            FieldOp::In => is_member(&left, value),
            FieldOp::Nin => !is_member(&left, value),
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                match left.partial_cmp(&Comparable::from(value)) {
                    Some(ordering) => match op {
                        FieldOp::Gt => ordering == Ordering::Greater,
                        FieldOp::Gte => ordering != Ordering::Less,
                        FieldOp::Lt => ordering == Ordering::Less,
                        _ => ordering != Ordering::Greater,
                    },
                    None => false,
                }
            }
        })
    }

    fn combine(&mut self, outputs: Vec<Self::Output>) -> Result<Self::Output, Self::Error> {
        Ok(outputs.into_iter().all(|matched| matched))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docservice_core::query::Filter;

    fn matches(document: &RawDocument, criteria: Criteria) -> bool {
        DocumentEvaluator::new(document).matches(&criteria).unwrap()
    }

    #[test]
    fn numbers_compare_across_bson_types() {
        let document = doc! { "likes": 10i32 };
        assert!(matches(&document, Criteria::new().and(Filter::eq("likes", 10i64))));
        assert!(matches(&document, Criteria::new().and(Filter::gte("likes", 10.0))));
        assert!(!matches(&document, Criteria::new().and(Filter::gt("likes", 10i64))));
        assert!(matches(
            &document,
            Criteria::new().and(Filter::gte("likes", 5i64)).and(Filter::lte("likes", 10i64))
        ));
    }

    #[test]
    fn like_is_substring_and_ilike_ignores_case() {
        let document = doc! { "title": "Black Cat" };
        assert!(matches(&document, Criteria::new().and(Filter::like("title", "k C"))));
        assert!(!matches(&document, Criteria::new().and(Filter::like("title", "cat"))));
        assert!(matches(&document, Criteria::new().and(Filter::ilike("title", "CAT"))));
    }

    #[test]
    fn membership() {
        let document = doc! { "title": "b", "likes": 2i64 };
        assert!(matches(&document, Criteria::new().and(Filter::any_of("title", ["a", "b"]))));
        assert!(!matches(&document, Criteria::new().and(Filter::none_of("likes", [1i64, 2i64]))));
        assert!(matches(&document, Criteria::new().and(Filter::none_of("missing", ["x"]))));
        assert!(!matches(&document, Criteria::new().and(Filter::eq("missing", "x"))));
    }

    #[test]
    fn empty_criteria_match_everything() {
        assert!(matches(&doc! {}, Criteria::new()));
    }
}
