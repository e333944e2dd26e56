//! Pagination envelopes, their resolution from request parameters, and paginated results.
//!
//! [`PaginationResolver`] turns the reserved `page`, `limit` and `order` parameters into
//! a [`PaginationEnvelope`]. Resolution never fails: invalid numbers fall back to the
//! configured [`PaginationDefaults`] and unsortable fields are dropped.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    params::{LIMIT_KEY, ORDER_KEY, PAGE_KEY, QueryParams},
    query::{Sort, SortDirection},
    schema::Schema,
};

/// Default page and page size used when a request does not provide valid values.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationDefaults {
    pub page: u64,
    pub limit: u64,
}

impl Default for PaginationDefaults {
    fn default() -> Self {
        Self { page: 1, limit: 15 }
    }
}

/// Resolved page, page size and sort order of a listing query.
///
/// Pages are 1-indexed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PaginationEnvelope {
    pub page: u64,
    pub limit: u64,
    pub sort: Vec<Sort>,
}

impl PaginationEnvelope {
    /// Creates an unsorted envelope.
    ///
    /// Zero values are raised to one.
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
            sort: Vec::new(),
        }
    }

    /// Appends a sort key.
    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort.push(sort);
        self
    }

    /// Number of documents to skip for this page.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let envelope = PaginationEnvelope::new(3, 20);
    /// assert_eq!(envelope.offset(), 40);
    /// ```
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Wraps one page of documents with its navigation metadata.
    pub fn page_of<T>(&self, docs: Vec<T>, total: u64) -> Paginated<T> {
        Paginated::builder(docs)
            .with_total(total)
            .with_page(self.page)
            .with_limit(self.limit)
            .build()
    }
}

impl From<PaginationDefaults> for PaginationEnvelope {
    fn from(defaults: PaginationDefaults) -> Self {
        Self::new(defaults.page, defaults.limit)
    }
}

/// One page of results together with the totals needed to navigate the rest.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Paginated<T> {
    /// The documents on this page.
    pub docs: Vec<T>,
    /// Number of documents matching the query across all pages.
    pub total: u64,
    /// The 1-indexed page number.
    pub page: u64,
    /// The page size.
    pub limit: u64,
    /// Number of pages, at least one.
    pub pages: u64,
}

impl<T> Paginated<T> {
    pub fn builder(docs: Vec<T>) -> PaginatedBuilder<T> {
        PaginatedBuilder::new(docs)
    }

    /// Converts every document, keeping the navigation metadata.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Paginated<U>, E> {
        Ok(Paginated {
            docs: self.docs.into_iter().map(f).collect::<Result<Vec<_>, E>>()?,
            total: self.total,
            page: self.page,
            limit: self.limit,
            pages: self.pages,
        })
    }
}

/// Builder for [`Paginated`] results.
pub struct PaginatedBuilder<T> {
    docs: Vec<T>,
    total: u64,
    page: u64,
    limit: u64,
}

impl<T> PaginatedBuilder<T> {
    pub fn new(docs: Vec<T>) -> Self {
        Self {
            docs,
            total: 0,
            page: 1,
            limit: 1,
        }
    }

    pub fn with_total(mut self, total: u64) -> Self {
        self.total = total;
        self
    }

    pub fn with_page(mut self, page: u64) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn build(self) -> Paginated<T> {
        Paginated {
            docs: self.docs,
            total: self.total,
            page: self.page,
            limit: self.limit,
            pages: self.total.div_ceil(self.limit).max(1),
        }
    }
}

/// Only plain base-10 integers are accepted; `20.5` or `1e2` fall back to the default.
fn parse_positive(raw: Option<&str>) -> Option<u64> {
    raw?.trim().parse::<i64>().ok().filter(|value| *value >= 1).map(|value| value as u64)
}

/// Resolves pagination envelopes from request parameters.
#[derive(Debug, Clone, Copy)]
pub struct PaginationResolver<'a> {
    schema: &'a Schema,
    defaults: PaginationDefaults,
}

impl<'a> PaginationResolver<'a> {
    pub fn new(schema: &'a Schema, defaults: PaginationDefaults) -> Self {
        Self { schema, defaults }
    }

    /// Resolves `page`, `limit` and `order` from `params`.
    ///
    /// `order` is a comma separated list of fields, a leading `-` meaning descending.
    pub fn resolve(&self, params: &QueryParams) -> PaginationEnvelope {
        let page = parse_positive(params.get(PAGE_KEY)).unwrap_or(self.defaults.page);
        let limit = parse_positive(params.get(LIMIT_KEY)).unwrap_or(self.defaults.limit);

        PaginationEnvelope {
            page,
            limit,
            sort: params
                .get(ORDER_KEY)
                .map(|order| self.sort(order))
                .unwrap_or_default(),
        }
    }

    fn sort(&self, order: &str) -> Vec<Sort> {
        order
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .filter_map(|name| {
                let sort = match name.strip_prefix('-') {
                    Some(field) => Sort { field: field.to_string(), direction: SortDirection::Desc },
                    None => Sort { field: name.to_string(), direction: SortDirection::Asc },
                };

                if self.schema.is_queryable(&sort.field) {
                    Some(sort)
                } else {
                    debug!(field = %sort.field, "dropping sort on unknown or non-queryable property");
                    None
                }
            })
            .collect()
    }
}
