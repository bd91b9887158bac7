//! Microsoft Graph directory search.
//!
//! Query construction, the paginated HTTP client and result normalization.

pub mod client;
pub mod models;
pub mod normalize;
pub mod query;

pub use client::GraphSearchClient;
pub use models::{EntityProfile, EntityType, SearchRequest, SearchResult};
pub use normalize::normalize;
pub use query::ODataQuery;
