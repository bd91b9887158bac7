//! Directory search data models.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ValidationError;

/// Kind of directory object to search for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    User,
    Group,
    Application,
}

/// Per-type lookup table entry: where to search and which fields to use.
#[derive(Debug)]
pub struct EntityProfile {
    /// Collection path under the Graph version root.
    pub collection: &'static str,

    /// Fields matched against the query, OR-combined.
    pub search_fields: &'static [&'static str],

    /// Fields requested with `$select`.
    pub select_fields: &'static [&'static str],
}

static USER_PROFILE: EntityProfile = EntityProfile {
    collection: "users",
    search_fields: &["displayName", "mail", "userPrincipalName"],
    select_fields: &["id", "displayName", "mail", "userPrincipalName"],
};

static GROUP_PROFILE: EntityProfile = EntityProfile {
    collection: "groups",
    search_fields: &["displayName", "mail"],
    select_fields: &["id", "displayName", "mail"],
};

static APPLICATION_PROFILE: EntityProfile = EntityProfile {
    collection: "applications",
    search_fields: &["displayName"],
    select_fields: &["id", "displayName"],
};

impl EntityType {
    pub const ALL: [EntityType; 3] = [Self::User, Self::Group, Self::Application];

    pub fn profile(&self) -> &'static EntityProfile {
        match self {
            Self::User => &USER_PROFILE,
            Self::Group => &GROUP_PROFILE,
            Self::Application => &APPLICATION_PROFILE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
            Self::Application => "application",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" | "users" => Ok(Self::User),
            "group" | "groups" => Ok(Self::Group),
            "application" | "applications" | "app" | "apps" => Ok(Self::Application),
            other => Err(ValidationError::UnknownEntityType(other.to_string())),
        }
    }
}

/// One search, validated at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub entity_type: EntityType,
    /// Trimmed, never empty.
    pub query: String,
    pub max_results: usize,
    /// Deadline for the whole (possibly multi-page) request.
    pub timeout: Duration,
}

impl SearchRequest {
    pub fn new(
        entity_type: EntityType,
        query: &str,
        max_results: usize,
        timeout: Duration,
    ) -> Result<Self, ValidationError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ValidationError::EmptyQuery);
        }
        if max_results == 0 {
            return Err(ValidationError::InvalidMaxResults(max_results));
        }
        if timeout.is_zero() {
            return Err(ValidationError::InvalidTimeout);
        }

        Ok(Self {
            entity_type,
            query: query.to_string(),
            max_results,
            timeout,
        })
    }
}

/// Uniform search hit, whatever the entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Directory object ID (GUID).
    pub object_id: String,

    /// Display name; falls back to `principal_or_mail` when the directory has none.
    pub display_name: String,

    /// Mail or user principal name. Empty when the type has neither.
    pub principal_or_mail: String,

    pub entity_type: EntityType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_parsing() {
        assert_eq!("user".parse::<EntityType>().unwrap(), EntityType::User);
        assert_eq!(" Groups ".parse::<EntityType>().unwrap(), EntityType::Group);
        assert_eq!("app".parse::<EntityType>().unwrap(), EntityType::Application);
        assert_eq!(
            "role".parse::<EntityType>(),
            Err(ValidationError::UnknownEntityType("role".into()))
        );
    }

    #[test]
    fn test_profiles_are_consistent() {
        for entity_type in EntityType::ALL {
            let profile = entity_type.profile();
            assert!(profile.select_fields.contains(&"id"));
            for field in profile.search_fields {
                assert!(
                    profile.select_fields.contains(field),
                    "{} searches {} without selecting it",
                    entity_type,
                    field
                );
            }
        }
        assert_eq!(EntityType::Application.profile().collection, "applications");
    }

    #[test]
    fn test_search_request_validation() {
        let timeout = Duration::from_secs(30);

        let request = SearchRequest::new(EntityType::User, "  jane  ", 10, timeout).unwrap();
        assert_eq!(request.query, "jane");

        assert_eq!(
            SearchRequest::new(EntityType::User, " \t\n", 10, timeout),
            Err(ValidationError::EmptyQuery)
        );
        assert_eq!(
            SearchRequest::new(EntityType::User, "jane", 0, timeout),
            Err(ValidationError::InvalidMaxResults(0))
        );
        assert_eq!(
            SearchRequest::new(EntityType::User, "jane", 10, Duration::ZERO),
            Err(ValidationError::InvalidTimeout)
        );
    }

    #[test]
    fn test_result_serializes_lowercase_type() {
        let result = SearchResult {
            object_id: "11111111-1111-1111-1111-111111111111".into(),
            display_name: "Engineering Team".into(),
            principal_or_mail: "eng@example.com".into(),
            entity_type: EntityType::Group,
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["entity_type"], "group");
    }
}
