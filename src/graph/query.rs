//! OData `$filter` / `$select` construction for directory searches.

use super::models::{EntityType, SearchRequest};
use crate::error::ValidationError;

/// Query parameters for one collection request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ODataQuery {
    /// `$filter` expression, not yet URL-encoded.
    pub filter: String,

    /// `$select` fields, in request order.
    pub select: Vec<&'static str>,
}

impl ODataQuery {
    /// Comma-joined `$select` value.
    pub fn select_param(&self) -> String {
        self.select.join(",")
    }

    /// Query for a request whose input was validated at construction.
    pub fn for_request(request: &SearchRequest) -> Self {
        compose(request.entity_type, &request.query)
    }
}

/// Build the prefix-match filter for `raw_query` against every searchable field of `entity_type`.
///
/// Fails before any I/O when the query is blank.
pub fn build(entity_type: EntityType, raw_query: &str) -> Result<ODataQuery, ValidationError> {
    let query = raw_query.trim();
    if query.is_empty() {
        return Err(ValidationError::EmptyQuery);
    }

    Ok(compose(entity_type, query))
}

fn compose(entity_type: EntityType, query: &str) -> ODataQuery {
    let profile = entity_type.profile();
    let literal = escape_literal(query);

    let filter = profile
        .search_fields
        .iter()
        .map(|field| format!("startswith({},'{}')", field, literal))
        .collect::<Vec<_>>()
        .join(" or ");

    ODataQuery {
        filter,
        select: profile.select_fields.to_vec(),
    }
}

/// Escape a value for use inside a single-quoted OData string literal.
///
/// A quote is written as two quotes; nothing else is significant inside a
/// literal. URL-level characters are handled when the query string is encoded.
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}
