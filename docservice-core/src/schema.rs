//! Property schemas describing which fields of a model may be filtered and sorted on.
//!
//! A [`Schema`] is built once per model and never changes afterwards. Backends expose
//! their schema through the [`SchemaProvider`] trait, which also answers the
//! "is this property queryable" question used by the filter translator and the
//! pagination resolver.

use bson::Bson;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::{
    document::{ID_FIELD, RawDocument},
    error::{BackendError, BackendResult, ValidationDetail},
};

/// Creation timestamp, stamped by backends when the schema declares it.
pub const CREATED_AT_FIELD: &str = "created_at";
/// Last modification timestamp, stamped by backends when the schema declares it.
pub const UPDATED_AT_FIELD: &str = "updated_at";

/// Properties that may always be sorted and filtered on, as long as the schema
/// declares them, even when they are not flagged queryable.
pub const ALWAYS_QUERYABLE: [&str; 3] = [ID_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD];

/// The semantic kind of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    /// Text values.
    String,
    /// Integer or floating point values.
    Number,
    /// Timestamps.
    Date,
    /// Anything else (nested documents, arrays, booleans). Never filterable.
    Untyped,
}

impl PropertyKind {
    /// Returns `true` when `value` may be stored in a property of this kind.
    ///
    /// `null` is accepted by every kind.
    pub fn accepts(&self, value: &Bson) -> bool {
        match (self, value) {
            (_, Bson::Null) | (PropertyKind::Untyped, _) => true,
            (PropertyKind::String, Bson::String(_)) => true,
            (PropertyKind::Number, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) => true,
            (PropertyKind::Date, Bson::DateTime(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PropertyKind::String => "string",
            PropertyKind::Number => "number",
            PropertyKind::Date => "date",
            PropertyKind::Untyped => "untyped",
        })
    }
}

/// Description of a single model property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySchema {
    /// The property name.
    pub name: String,
    /// The semantic kind of the property.
    pub kind: PropertyKind,
    /// Whether the property may appear in filter and sort expressions.
    pub queryable: bool,
    /// Whether a new document must carry this property.
    pub required: bool,
}

impl PropertySchema {
    /// Creates a non-queryable, optional property.
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            queryable: false,
            required: false,
        }
    }

    /// Marks the property as queryable.
    pub fn queryable(mut self) -> Self {
        self.queryable = true;
        self
    }

    /// Marks the property as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// The full set of properties of a model, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    properties: HashMap<String, PropertySchema>,
}

impl Schema {
    /// Creates a new schema builder.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Returns the property with the given name.
    pub fn get(&self, name: &str) -> Option<&PropertySchema> {
        self.properties.get(name)
    }

    /// Returns `true` when the schema declares the property.
    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Iterates over all properties in no particular order.
    pub fn properties(&self) -> impl Iterator<Item = &PropertySchema> {
        self.properties.values()
    }

    /// Returns `true` when `name` is a declared property that is flagged queryable
    /// or is one of [`ALWAYS_QUERYABLE`].
    pub fn is_queryable(&self, name: &str) -> bool {
        self.properties
            .get(name)
            .is_some_and(|property| property.queryable || ALWAYS_QUERYABLE.contains(&name))
    }

    /// Returns the property when it is queryable.
    pub fn queryable(&self, name: &str) -> Option<&PropertySchema> {
        self.is_queryable(name)
            .then(|| self.properties.get(name))
            .flatten()
    }

    /// Checks `document` against the declared property kinds.
    ///
    /// With `complete`, every required property must also be present and not `null`.
    /// Use it for new documents; partial updates only check the properties they set.
    /// Undeclared properties are not checked.
    ///
    /// # Errors
    ///
    /// [`BackendError::Validation`] listing every failing property.
    pub fn validate(&self, document: &RawDocument, complete: bool) -> BackendResult<()> {
        let mut details = Vec::new();

        for (name, value) in document {
            if let Some(property) = self.properties.get(name) {
                if !property.kind.accepts(value) {
                    details.push(
                        ValidationDetail::new(name, "type", format!("must be a {}", property.kind))
                            .with_value(value.to_string()),
                    );
                } else if property.required && *value == Bson::Null {
                    details.push(ValidationDetail::new(name, "required", "is required"));
                }
            }
        }

        if complete {
            let mut missing = self
                .properties
                .values()
                .filter(|property| property.required && !document.contains_key(&property.name))
                .map(|property| property.name.as_str())
                .collect::<Vec<_>>();
            missing.sort_unstable();

            details.extend(
                missing
                    .into_iter()
                    .map(|name| ValidationDetail::new(name, "required", "is required")),
            );
        }

        if details.is_empty() {
            return Ok(());
        }

        Err(BackendError::Validation {
            message: details
                .iter()
                .map(|detail| format!("{} {}", detail.property, detail.message))
                .collect::<Vec<_>>()
                .join(", "),
            details,
        })
    }
}

/// Builder for [`Schema`] instances.
///
/// # Example
///
/// ```ignore
/// let schema = Schema::builder()
///     .number("id", false)
///     .string("title", true)
///     .number("likes", true)
///     .date("created_at", false)
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    properties: HashMap<String, PropertySchema>,
}

impl SchemaBuilder {
    /// Adds a fully specified property, replacing any property with the same name.
    pub fn property(mut self, property: PropertySchema) -> Self {
        self.properties.insert(property.name.clone(), property);
        self
    }

    fn kind(self, name: &str, kind: PropertyKind, queryable: bool) -> Self {
        let property = PropertySchema::new(name, kind);
        self.property(if queryable { property.queryable() } else { property })
    }

    pub fn string(self, name: &str, queryable: bool) -> Self {
        self.kind(name, PropertyKind::String, queryable)
    }

    pub fn number(self, name: &str, queryable: bool) -> Self {
        self.kind(name, PropertyKind::Number, queryable)
    }

    pub fn date(self, name: &str, queryable: bool) -> Self {
        self.kind(name, PropertyKind::Date, queryable)
    }

    pub fn untyped(self, name: &str) -> Self {
        self.kind(name, PropertyKind::Untyped, false)
    }

    pub fn build(self) -> Schema {
        Schema {
            properties: self.properties,
        }
    }
}

/// Source of the property schema of a model.
pub trait SchemaProvider {
    /// Returns the model's properties.
    fn properties(&self) -> &Schema;
}

impl<P: SchemaProvider + ?Sized> SchemaProvider for &P {
    fn properties(&self) -> &Schema {
        (**self).properties()
    }
}

impl<P: SchemaProvider + ?Sized> SchemaProvider for Arc<P> {
    fn properties(&self) -> &Schema {
        (**self).properties()
    }
}

impl SchemaProvider for Schema {
    fn properties(&self) -> &Schema {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn schema() -> Schema {
        Schema::builder()
            .number("id", false)
            .string("name", true)
            .string("secret", false)
            .date("created_at", false)
            .build()
    }

    #[test]
    fn queryable_flag_is_honored() {
        let schema = schema();
        assert!(schema.is_queryable("name"));
        assert!(!schema.is_queryable("secret"));
        assert!(!schema.is_queryable("missing"));
    }

    #[test]
    fn fixed_fields_are_queryable_when_declared() {
        let schema = schema();
        assert!(schema.is_queryable("id"));
        assert!(schema.is_queryable("created_at"));
        assert!(!schema.is_queryable("updated_at"));
    }

    #[test]
    fn validation_reports_kinds_and_required_properties() {
        let schema = Schema::builder()
            .property(PropertySchema::new("title", PropertyKind::String).required())
            .number("likes", true)
            .build();

        assert!(schema.validate(&doc! { "title": "a", "likes": 2.5 }, true).is_ok());
        assert!(schema.validate(&doc! { "likes": 3 }, false).is_ok());

        let Err(BackendError::Validation { message, details }) =
            schema.validate(&doc! { "likes": "many" }, true)
        else {
            panic!("expected a validation failure");
        };
        assert_eq!(message, "likes must be a number, title is required");
        assert_eq!(details[0].kind, "type");
        assert_eq!(details[1].kind, "required");
    }
}
