//! Translation of raw request parameters into filter criteria.
//!
//! Each parameter key names a property, optionally followed by an operator suffix:
//! `title=cat`, `title__ilike=cat`, `likes__between=10,20`. The translator looks the
//! property up in the model's [`Schema`] and emits expressions according to the
//! property kind:
//!
//! | kind      | operators                                          |
//! |-----------|----------------------------------------------------|
//! | `String`  | equals, like, ilike, in, nin                       |
//! | `Number`  | equals, gt, gte, lt, lte, between, in, nin         |
//! | `Date`    | none, fails with `NotImplemented`                  |
//! | `Untyped` | none                                               |
//!
//! Parameters naming unknown or non-queryable properties, unknown operators, or
//! operators a kind does not support are dropped without error so that unrelated
//! query-string noise never fails a request.

use bson::Bson;
use tracing::debug;

use crate::{
    error::{ServiceError, ServiceResult, ValidationDetail},
    params::QueryParams,
    query::{Criteria, FieldOp, Filter, FilterExpression},
    schema::{PropertyKind, Schema},
};

const OPERATOR_SEPARATOR: &str = "__";

/// Operators accepted as parameter key suffixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOperator {
    Equals,
    Like,
    ILike,
    In,
    Nin,
    Gt,
    Gte,
    Lt,
    Lte,
    Between,
}

impl RequestOperator {
    /// Parses an operator suffix.
    pub fn parse(suffix: &str) -> Option<Self> {
        Some(match suffix {
            "equals" => RequestOperator::Equals,
            "like" => RequestOperator::Like,
            "ilike" => RequestOperator::ILike,
            "in" => RequestOperator::In,
            "nin" => RequestOperator::Nin,
            "gt" => RequestOperator::Gt,
            "gte" => RequestOperator::Gte,
            "lt" => RequestOperator::Lt,
            "lte" => RequestOperator::Lte,
            "between" => RequestOperator::Between,
            _ => return None,
        })
    }

    fn comparison(&self) -> Option<FieldOp> {
        match self {
            RequestOperator::Equals => Some(FieldOp::Eq),
            RequestOperator::Gt => Some(FieldOp::Gt),
            RequestOperator::Gte => Some(FieldOp::Gte),
            RequestOperator::Lt => Some(FieldOp::Lt),
            RequestOperator::Lte => Some(FieldOp::Lte),
            _ => None,
        }
    }
}

/// A parameter key split into its field and operator suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey<'a> {
    pub field: &'a str,
    /// `None` when the suffix is present but not a known operator.
    pub operator: Option<RequestOperator>,
}

fn is_word(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Splits `field__operator` keys. Keys without a well-formed suffix name a field
/// compared for equality.
pub fn parse_key(key: &str) -> ParsedKey<'_> {
    match key.rsplit_once(OPERATOR_SEPARATOR) {
        Some((field, suffix)) if is_word(field) && is_word(suffix) => ParsedKey {
            field,
            operator: RequestOperator::parse(suffix),
        },
        _ => ParsedKey {
            field: key,
            operator: Some(RequestOperator::Equals),
        },
    }
}

fn split_values(value: &str) -> Vec<&str> {
    value.split(',').collect()
}

fn parse_number(field: &str, raw: &str) -> ServiceResult<Bson> {
    let trimmed = raw.trim();

    if let Ok(integer) = trimmed.parse::<i64>() {
        return Ok(Bson::Int64(integer));
    }

    match trimmed.parse::<f64>() {
        Ok(float) if float.is_finite() => Ok(Bson::Double(float)),
        _ => Err(ServiceError::validation_with(
            format!("{field} must be a number"),
            vec![ValidationDetail::format(field, "must be a number", raw)],
        )),
    }
}

/// Translates raw request parameters into criteria for a given schema.
#[derive(Debug, Clone, Copy)]
pub struct FilterTranslator<'a> {
    schema: &'a Schema,
}

impl<'a> FilterTranslator<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Translates every parameter, in insertion order.
    ///
    /// # Errors
    ///
    /// - `Validation` for a malformed `between` or a non-numeric number value.
    /// - `NotImplemented` for any filter on a queryable `Date` property.
    pub fn translate(&self, params: &QueryParams) -> ServiceResult<Criteria> {
        let mut criteria = Criteria::new();

        for (key, value) in params.iter() {
            for expression in self.translate_param(key, value)? {
                debug!(%expression, "translated filter parameter");
                criteria.push(expression);
            }
        }

        Ok(criteria)
    }

    /// Translates one `key=value` parameter into zero or more expressions.
    pub fn translate_param(&self, key: &str, value: &str) -> ServiceResult<Vec<FilterExpression>> {
        let ParsedKey { field, operator } = parse_key(key);

        let Some(property) = self.schema.queryable(field) else {
            debug!(key, "dropping parameter for unknown or non-queryable property");
            return Ok(Vec::new());
        };

        let expressions = match property.kind {
            PropertyKind::String => operator.map(|op| Self::string(field, op, value)),
            PropertyKind::Number => match operator {
                Some(op) => Some(Self::number(field, op, value)?),
                None => None,
            },
            PropertyKind::Date => {
                return Err(ServiceError::not_implemented(
                    "Date filter has not been implemented yet",
                ));
            }
            PropertyKind::Untyped => None,
        }
        .flatten();

        Ok(expressions.unwrap_or_else(|| {
            debug!(key, "dropping parameter with unsupported operator");
            Vec::new()
        }))
    }

    fn string(field: &str, op: RequestOperator, value: &str) -> Option<Vec<FilterExpression>> {
        let expression = match op {
            RequestOperator::Equals => Filter::eq(field, value),
            RequestOperator::Like => Filter::like(field, value),
            RequestOperator::ILike => Filter::ilike(field, value),
            RequestOperator::In => Filter::any_of(field, split_values(value)),
            RequestOperator::Nin => Filter::none_of(field, split_values(value)),
            _ => return None,
        };

        Some(vec![expression])
    }

    fn number(
        field: &str,
        op: RequestOperator,
        value: &str,
    ) -> ServiceResult<Option<Vec<FilterExpression>>> {
        if let Some(comparison) = op.comparison() {
            let number = parse_number(field, value)?;
            return Ok(Some(vec![FilterExpression::new(field, comparison, number)]));
        }

        Ok(Some(match op {
            RequestOperator::Between => Self::between(field, value)?,
            RequestOperator::In | RequestOperator::Nin => {
                let numbers = split_values(value)
                    .into_iter()
                    .map(|raw| parse_number(field, raw))
                    .collect::<ServiceResult<Vec<_>>>()?;

                vec![if op == RequestOperator::In {
                    Filter::any_of(field, numbers)
                } else {
                    Filter::none_of(field, numbers)
                }]
            }
            _ => return Ok(None),
        }))
    }

    fn between(field: &str, value: &str) -> ServiceResult<Vec<FilterExpression>> {
        let bounds = split_values(value);

        let [lower, upper] = bounds.as_slice() else {
            return Err(ServiceError::validation_with(
                "Between filter requires 2 values comma separated",
                vec![ValidationDetail::format(
                    field,
                    "requires 2 values comma separated",
                    value,
                )],
            ));
        };

        let mut expressions = Vec::with_capacity(2);
        if !lower.is_empty() {
            expressions.push(Filter::gte(field, parse_number(field, lower)?));
        }
        if !upper.is_empty() {
            expressions.push(Filter::lte(field, parse_number(field, upper)?));
        }

        Ok(expressions)
    }
}
