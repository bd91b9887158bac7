//! Access token cache with lazy refresh.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use super::cli::CredentialSource;
use super::secure::AccessToken;
use crate::error::GraphError;

type TokenSlot = Arc<AsyncMutex<Option<AccessToken>>>;

/// Hands out bearer tokens, going back to the credential source only when the
/// cached token for a resource is missing or about to expire.
pub struct TokenProvider {
    source: Arc<dyn CredentialSource>,
    /// Tokens closer than this to expiry are refreshed.
    margin: std::time::Duration,
    /// One slot per resource; the slot lock is held across a refresh.
    slots: Mutex<HashMap<String, TokenSlot>>,
}

impl TokenProvider {
    pub fn new(source: Arc<dyn CredentialSource>, margin: std::time::Duration) -> Self {
        Self {
            source,
            margin,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, resource: &str) -> TokenSlot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(resource.to_string()).or_default())
    }

    /// Get a token for `resource`, refreshing it if needed.
    ///
    /// Concurrent callers for the same resource wait for a single in-flight refresh.
    pub async fn get_token(&self, resource: &str) -> Result<AccessToken, GraphError> {
        let slot = self.slot(resource);
        let mut cached = slot.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.is_fresh(self.margin) {
                debug!("Using cached token for {}", resource);
                return Ok(token.clone());
            }
            debug!("Cached token for {} is about to expire", resource);
        }

        let token = self.source.get_token(resource).await?;
        if token.value.is_empty() {
            return Err(GraphError::Unauthenticated(
                "credential source returned an empty token".into(),
            ));
        }

        info!(
            "Token for {} refreshed, valid for {}",
            resource,
            time_until_expiry(&token.expires_at)
                .map(format_duration)
                .unwrap_or_else(|| "< 1 min".to_string())
        );

        *cached = Some(token.clone());
        Ok(token)
    }

    /// Drop the cached token for `resource` so the next call refetches it.
    pub async fn invalidate(&self, resource: &str) {
        let slot = self.slot(resource);
        if slot.lock().await.take().is_some() {
            debug!("Invalidated cached token for {}", resource);
        }
    }
}

/// Calculate the remaining time until token expiry.
pub fn time_until_expiry(expires_at: &DateTime<Utc>) -> Option<Duration> {
    let now = Utc::now();

    if *expires_at > now {
        Some(*expires_at - now)
    } else {
        None
    }
}

/// Format duration as human-readable string (e.g., "45 min", "1 hour").
pub fn format_duration(duration: Duration) -> String {
    let total_minutes = duration.num_minutes();

    if total_minutes < 1 {
        "< 1 min".to_string()
    } else if total_minutes < 60 {
        format!("{} min", total_minutes)
    } else {
        let hours = total_minutes / 60;
        let mins = total_minutes % 60;
        if mins == 0 {
            format!("{} hour{}", hours, if hours == 1 { "" } else { "s" })
        } else {
            format!("{}h {}m", hours, mins)
        }
    }
}
