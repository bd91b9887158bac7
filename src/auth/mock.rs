//! In-memory credential source for tests.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::cli::{AccountInfo, AccountUser, CredentialSource};
use super::secure::AccessToken;
use crate::error::{CliError, GraphError};

/// Counts invocations and hands out numbered tokens.
pub struct MockSource {
    token_calls: AtomicUsize,
    account_calls: AtomicUsize,
    lifetime: Duration,
    delay: Option<std::time::Duration>,
    signed_in: bool,
}

impl MockSource {
    pub fn new() -> Self {
        Self {
            token_calls: AtomicUsize::new(0),
            account_calls: AtomicUsize::new(0),
            lifetime: Duration::hours(1),
            delay: None,
            signed_in: true,
        }
    }

    /// A source whose CLI reports no active session.
    pub fn signed_out() -> Self {
        Self {
            signed_in: false,
            ..Self::new()
        }
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    pub fn account_calls(&self) -> usize {
        self.account_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialSource for MockSource {
    async fn get_token(&self, resource: &str) -> Result<AccessToken, GraphError> {
        let n = self.token_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if !self.signed_in {
            return Err(CliError::Failed {
                status: "exit status: 1".into(),
                stderr: "ERROR: Please run 'az login' to setup account.".into(),
            }
            .into());
        }

        // Each token expires a little later than the previous one
        let expires_at = Utc::now() + self.lifetime + Duration::seconds(n as i64);
        Ok(AccessToken::new(
            format!("token-{}", n),
            expires_at,
            resource,
        ))
    }

    async fn current_account(&self) -> Result<AccountInfo, CliError> {
        self.account_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if !self.signed_in {
            return Err(CliError::Failed {
                status: "exit status: 1".into(),
                stderr: "ERROR: Please run 'az login' to setup account.".into(),
            });
        }

        Ok(AccountInfo {
            subscription_name: Some("Platform Dev".into()),
            tenant_id: Some("72f988bf-0000-0000-0000-000000000000".into()),
            user: Some(AccountUser {
                name: Some("jane@contoso.com".into()),
                kind: Some("user".into()),
            }),
        })
    }
}
