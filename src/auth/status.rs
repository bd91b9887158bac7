//! Advisory sign-in status from the Azure CLI.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::debug;

use super::cli::CredentialSource;
use crate::error::CliError;

/// Snapshot of the CLI session. Recomputed on every check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthStatus {
    pub authenticated: bool,
    pub account_identifier: Option<String>,
    pub tenant_id: Option<String>,
    pub message: String,
}

impl AuthStatus {
    fn signed_out(message: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_identifier: None,
            tenant_id: None,
            message: message.into(),
        }
    }
}

/// Reports whether the Azure CLI has an active session without prompting for login.
pub struct AuthStatusChecker {
    source: Arc<dyn CredentialSource>,
    timeout: Duration,
}

impl AuthStatusChecker {
    pub fn new(source: Arc<dyn CredentialSource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    /// Check the current session. Never fails; problems become an unauthenticated status.
    pub async fn check(&self) -> AuthStatus {
        let account = match time::timeout(self.timeout, self.source.current_account()).await {
            Ok(result) => result,
            Err(_) => Err(CliError::TimedOut(self.timeout)),
        };

        let status = match account {
            Ok(account) => match account.identifier() {
                Some(identifier) => AuthStatus {
                    authenticated: true,
                    message: format!("Signed in as {}", identifier),
                    account_identifier: Some(identifier),
                    tenant_id: account.tenant_id,
                },
                None => AuthStatus::signed_out(
                    "Azure CLI returned an account without user or tenant. Run 'az login' to sign in.",
                ),
            },
            Err(CliError::NotInstalled(program)) => AuthStatus::signed_out(format!(
                "Azure CLI is not installed ('{}' not found). Install it, then run 'az login'.",
                program
            )),
            Err(e) if e.is_not_logged_in() => {
                AuthStatus::signed_out("Not signed in. Run 'az login' to sign in.")
            }
            Err(CliError::TimedOut(after)) => AuthStatus::signed_out(format!(
                "Azure CLI did not respond within {:?}. Check that 'az login' has completed.",
                after
            )),
            Err(e) => AuthStatus::signed_out(format!(
                "Could not read Azure CLI session ({}). Run 'az login' to sign in.",
                e
            )),
        };

        debug!(
            "Auth status: authenticated={} ({})",
            status.authenticated, status.message
        );
        status
    }
}
