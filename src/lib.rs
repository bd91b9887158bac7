//! ObjectSeeker - find Azure AD object IDs from an Azure CLI session.
//!
//! Searches users, groups and applications in Microsoft Graph with a token
//! borrowed from `az`, and returns uniform records carrying the object ID.

#![deny(clippy::all)]

pub mod auth;
pub mod config;
pub mod error;
pub mod graph;
pub mod seeker;

pub use auth::AuthStatus;
pub use config::Config;
pub use error::{ErrorKind, GraphError, SearchError, ValidationError};
pub use graph::{EntityType, SearchRequest, SearchResult};
pub use seeker::ObjectSeeker;
