//! Filter expressions and sort specifications understood by persistence backends.
//!
//! A request is translated into [`Criteria`]: an ordered conjunction of
//! [`FilterExpression`]s. Backends execute criteria through the [`QueryVisitor`]
//! trait, which evaluates each expression and folds the results together.
//!
//! # Filter Expression API
//!
//! The [`Filter`] struct provides static constructors for expressions:
//!
//! - Comparison: `eq`, `gt`, `gte`, `lt`, `lte`
//! - Substring: `like`, `ilike`
//! - Membership: `any_of`, `none_of`
//!
//! ```ignore
//! use docservice::query::{Criteria, Filter};
//!
//! let criteria = Criteria::new()
//!     .and(Filter::ilike("title", "cat"))
//!     .and(Filter::gte("likes", 10));
//! ```

use bson::Bson;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    document::{DocumentId, ID_FIELD},
    error::ServiceError,
};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "asc"),
            SortDirection::Desc => write!(f, "desc"),
        }
    }
}

/// Sort specification for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Sort { field: field.into(), direction: SortDirection::Asc }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Sort { field: field.into(), direction: SortDirection::Desc }
    }
}

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldOp {
    /// Equal to (exact match).
    Eq,
    /// String contains the value.
    Like,
    /// String contains the value, ignoring case.
    ILike,
    /// Field equals one of the values.
    In,
    /// Field equals none of the values.
    Nin,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
}

impl FieldOp {
    /// Returns the request suffix naming this operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldOp::Eq => "equals",
            FieldOp::Like => "like",
            FieldOp::ILike => "ilike",
            FieldOp::In => "in",
            FieldOp::Nin => "nin",
            FieldOp::Gt => "gt",
            FieldOp::Gte => "gte",
            FieldOp::Lt => "lt",
            FieldOp::Lte => "lte",
        }
    }
}

impl fmt::Display for FieldOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `field operator value` predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpression {
    /// The field name to compare.
    pub field: String,
    /// The comparison operator.
    pub op: FieldOp,
    /// The value to compare against. `In`/`Nin` carry an array.
    pub value: Bson,
}

impl FilterExpression {
    pub fn new(field: impl Into<String>, op: FieldOp, value: impl Into<Bson>) -> Self {
        FilterExpression { field: field.into(), op, value: value.into() }
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.op, self.value)
    }
}

/// Helper struct for constructing filter expressions.
pub struct Filter;

impl Filter {
    /// Matches documents where the field equals the value.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> FilterExpression {
        FilterExpression::new(field, FieldOp::Eq, value)
    }

    /// Matches documents where the string field contains the value.
    pub fn like(field: impl Into<String>, value: impl Into<String>) -> FilterExpression {
        FilterExpression::new(field, FieldOp::Like, value.into())
    }

    /// Matches documents where the string field contains the value, ignoring case.
    pub fn ilike(field: impl Into<String>, value: impl Into<String>) -> FilterExpression {
        FilterExpression::new(field, FieldOp::ILike, value.into())
    }

    /// Matches documents where the field equals any of the values.
    pub fn any_of<V: Into<Bson>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> FilterExpression {
        FilterExpression::new(field, FieldOp::In, Bson::Array(values.into_iter().map(Into::into).collect()))
    }

    /// Matches documents where the field equals none of the values.
    pub fn none_of<V: Into<Bson>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> FilterExpression {
        FilterExpression::new(field, FieldOp::Nin, Bson::Array(values.into_iter().map(Into::into).collect()))
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> FilterExpression {
        FilterExpression::new(field, FieldOp::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> FilterExpression {
        FilterExpression::new(field, FieldOp::Gte, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> FilterExpression {
        FilterExpression::new(field, FieldOp::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> FilterExpression {
        FilterExpression::new(field, FieldOp::Lte, value)
    }
}

/// An ordered conjunction of filter expressions. Empty criteria match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    expressions: Vec<FilterExpression>,
}

impl Criteria {
    pub fn new() -> Self {
        Criteria::default()
    }

    /// Matches the single document with the given id.
    pub fn by_id(id: DocumentId) -> Self {
        Criteria::new().and(Filter::eq(ID_FIELD, id))
    }

    /// Matches every document whose id is in `ids`.
    pub fn by_ids(ids: impl IntoIterator<Item = DocumentId>) -> Self {
        Criteria::new().and(Filter::any_of(ID_FIELD, ids))
    }

    /// Appends an expression.
    pub fn and(mut self, expression: FilterExpression) -> Self {
        self.expressions.push(expression);
        self
    }

    pub fn push(&mut self, expression: FilterExpression) {
        self.expressions.push(expression);
    }

    pub fn expressions(&self) -> &[FilterExpression] {
        &self.expressions
    }

    pub fn iter(&self) -> impl Iterator<Item = &FilterExpression> {
        self.expressions.iter()
    }

    pub fn len(&self) -> usize {
        self.expressions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }
}

impl From<Vec<FilterExpression>> for Criteria {
    fn from(expressions: Vec<FilterExpression>) -> Self {
        Criteria { expressions }
    }
}

impl IntoIterator for Criteria {
    type Item = FilterExpression;
    type IntoIter = std::vec::IntoIter<FilterExpression>;

    fn into_iter(self) -> Self::IntoIter {
        self.expressions.into_iter()
    }
}

/// Backend-side execution of criteria.
///
/// Implementors evaluate a single expression in [`visit_field`](Self::visit_field) and
/// fold the per-expression outputs in [`combine`](Self::combine).
pub trait QueryVisitor {
    type Output;
    type Error: Into<ServiceError>;

    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn combine(&mut self, outputs: Vec<Self::Output>) -> Result<Self::Output, Self::Error>;

    fn visit_expression(&mut self, expression: &FilterExpression) -> Result<Self::Output, Self::Error> {
        self.visit_field(&expression.field, &expression.op, &expression.value)
    }

    fn visit_criteria(&mut self, criteria: &Criteria) -> Result<Self::Output, Self::Error> {
        let outputs = criteria
            .iter()
            .map(|expression| self.visit_expression(expression))
            .collect::<Result<Vec<_>, _>>()?;

        self.combine(outputs)
    }
}
