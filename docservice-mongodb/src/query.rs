//! Criteria translation to MongoDB query syntax.
//!
//! This module translates docservice criteria into MongoDB BSON filter documents for
//! execution by the MongoDB query engine.

use bson::{Bson, Document, doc};

use docservice_core::{
    error::BackendError,
    query::{Criteria, FieldOp, QueryVisitor, Sort, SortDirection},
};

/// Builds the anchored "contains" pattern used by `like` and `ilike`.
///
/// The needle is escaped so that it is always matched literally.
pub(crate) fn contains_pattern(needle: &str) -> String {
    format!("^.*{}.*$", regex::escape(needle))
}

/// Translates criteria into MongoDB filter documents.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    pub fn filter(criteria: &Criteria) -> Result<Document, BackendError> {
        MongoQueryTranslator.visit_criteria(criteria)
    }

    /// Builds a sort document, falling back to id order for ties.
    pub fn sort(sort: &[Sort]) -> Document {
        let mut document = Document::new();

        for key in sort {
            document.insert(
                key.field.clone(),
                match key.direction {
                    SortDirection::Asc => 1,
                    SortDirection::Desc => -1,
                },
            );
        }

        if !document.contains_key("id") {
            document.insert("id", 1);
        }

        document
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = BackendError;

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: match op {
                FieldOp::Eq => doc! { "$eq": value },
                FieldOp::Gt => doc! { "$gt": value },
                FieldOp::Gte => doc! { "$gte": value },
                FieldOp::Lt => doc! { "$lt": value },
                FieldOp::Lte => doc! { "$lte": value },
                FieldOp::In => doc! { "$in": value },
                FieldOp::Nin => doc! { "$nin": value },
                FieldOp::Like | FieldOp::ILike => match value {
                    Bson::String(s) if *op == FieldOp::Like => doc! { "$regex": contains_pattern(s) },
                    Bson::String(s) => doc! { "$regex": contains_pattern(s), "$options": "i" },
                    _ => return Err(BackendError::Other(format!("{op} operator requires a string value"))),
                },
            }
        })
    }

    fn combine(&mut self, mut outputs: Vec<Self::Output>) -> Result<Self::Output, Self::Error> {
        Ok(match outputs.len() {
            0 => doc! {},
            1 => outputs.remove(0),
            _ => doc! { "$and": outputs },
        })
    }
}
