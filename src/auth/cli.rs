//! Azure CLI credential source.
//!
//! Reuses the session established by `az login`: tokens come from
//! `az account get-access-token`, the signed-in account from `az account show`.

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time;
use tracing::{debug, info, warn};

use super::secure::AccessToken;
use crate::error::{CliError, GraphError};

/// Narrow interface over whatever holds the user's Azure session.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Fetch a fresh access token for `resource`.
    async fn get_token(&self, resource: &str) -> Result<AccessToken, GraphError>;

    /// Describe the currently signed-in account.
    async fn current_account(&self) -> Result<AccountInfo, CliError>;
}

/// Output of `az account show`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    /// Subscription display name.
    #[serde(rename = "name")]
    pub subscription_name: Option<String>,

    /// Tenant (directory) ID.
    pub tenant_id: Option<String>,

    /// Signed-in principal.
    pub user: Option<AccountUser>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AccountUser {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl AccountInfo {
    /// Best identifier for display: user name, else tenant ID.
    pub fn identifier(&self) -> Option<String> {
        self.user
            .as_ref()
            .and_then(|u| u.name.clone())
            .filter(|n| !n.is_empty())
            .or_else(|| self.tenant_id.clone().filter(|t| !t.is_empty()))
    }
}

/// Production credential source backed by the `az` executable.
pub struct AzureCli {
    program: String,
    timeout: Duration,
}

impl AzureCli {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Run the CLI with `args` and return its stdout.
    async fn run(&self, args: &[&str]) -> Result<String, CliError> {
        debug!("Running {} {}", self.program, args.join(" "));

        let mut cmd = Command::new(&self.program);
        cmd.args(args).stdin(Stdio::null()).kill_on_drop(true);

        let output = match time::timeout(self.timeout, cmd.output()).await {
            Err(_) => return Err(CliError::TimedOut(self.timeout)),
            Ok(Err(e)) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CliError::NotInstalled(self.program.clone()))
            }
            Ok(Err(e)) => return Err(CliError::Io(e)),
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(CliError::Failed {
                status: output.status.to_string(),
                stderr,
            });
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| CliError::InvalidOutput(e.to_string()))?;
        if stdout.trim().is_empty() {
            return Err(CliError::InvalidOutput("empty output".into()));
        }

        Ok(stdout)
    }
}

#[async_trait]
impl CredentialSource for AzureCli {
    async fn get_token(&self, resource: &str) -> Result<AccessToken, GraphError> {
        let stdout = self
            .run(&[
                "account",
                "get-access-token",
                "--resource",
                resource,
                "--output",
                "json",
            ])
            .await
            .map_err(|e| {
                if e.is_not_logged_in() {
                    warn!("Azure CLI has no active session");
                } else {
                    warn!("Token request to Azure CLI failed: {}", e);
                }
                GraphError::from(e)
            })?;

        let token = parse_token_output(&stdout, resource, Utc::now())?;
        info!("Acquired access token for {}, expires at {}", resource, token.expires_at);
        Ok(token)
    }

    async fn current_account(&self) -> Result<AccountInfo, CliError> {
        let stdout = self.run(&["account", "show", "--output", "json"]).await?;
        parse_account_output(&stdout)
    }
}

/// Output of `az account get-access-token`.
///
/// Newer CLI versions emit `expires_on` (epoch seconds); older ones only emit
/// `expiresOn` as a naive local timestamp.
#[derive(Deserialize)]
struct CliTokenOutput {
    #[serde(rename = "accessToken", alias = "access_token")]
    access_token: Option<String>,

    #[serde(rename = "expires_on")]
    expires_on_epoch: Option<serde_json::Value>,

    #[serde(rename = "expiresOn")]
    expires_on_text: Option<String>,

    #[serde(rename = "expires_in", alias = "expiresIn")]
    expires_in: Option<serde_json::Value>,
}

/// Parse `az account get-access-token` output into an [`AccessToken`].
///
/// Relative expiries are resolved against `now`.
pub fn parse_token_output(
    stdout: &str,
    resource: &str,
    now: DateTime<Utc>,
) -> Result<AccessToken, CliError> {
    let parsed: CliTokenOutput =
        serde_json::from_str(stdout).map_err(|e| CliError::InvalidOutput(e.to_string()))?;

    let value = parsed
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| CliError::InvalidOutput("no accessToken in output".into()))?;

    let expires_at = parsed
        .expires_on_epoch
        .as_ref()
        .and_then(json_seconds)
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .or_else(|| parsed.expires_on_text.as_deref().and_then(parse_timestamp))
        .or_else(|| {
            parsed
                .expires_in
                .as_ref()
                .and_then(json_seconds)
                .and_then(chrono::Duration::try_seconds)
                .and_then(|lifetime| now.checked_add_signed(lifetime))
        })
        .ok_or_else(|| CliError::InvalidOutput("no usable expiry in output".into()))?;

    Ok(AccessToken::new(value, expires_at, resource))
}

/// Parse `az account show` output.
pub fn parse_account_output(stdout: &str) -> Result<AccountInfo, CliError> {
    serde_json::from_str(stdout).map_err(|e| CliError::InvalidOutput(e.to_string()))
}

/// Integer seconds from a JSON number or numeric string.
fn json_seconds(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// RFC 3339, or the CLI's naive local `YYYY-MM-DD HH:MM:SS[.ffffff]`.
fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S"))
        .ok()?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESOURCE: &str = "https://graph.microsoft.com";

    #[test]
    fn test_parse_epoch_expiry() {
        let out = r#"{
            "accessToken": "eyJ0eXAi",
            "expiresOn": "2030-01-01 10:00:00.000000",
            "expires_on": 1893492000,
            "subscription": "sub-id",
            "tenant": "tenant-id",
            "tokenType": "Bearer"
        }"#;

        let token = parse_token_output(out, RESOURCE, Utc::now()).unwrap();
        assert_eq!(token.secret(), "eyJ0eXAi");
        assert_eq!(token.expires_at.timestamp(), 1893492000);
        assert_eq!(token.resource, RESOURCE);
    }

    #[test]
    fn test_parse_epoch_as_string() {
        let out = r#"{"accessToken": "abc", "expires_on": "1893492000"}"#;
        let token = parse_token_output(out, RESOURCE, Utc::now()).unwrap();
        assert_eq!(token.expires_at.timestamp(), 1893492000);
    }

    #[test]
    fn test_parse_rfc3339_expiry() {
        let out = r#"{"accessToken": "abc", "expiresOn": "2030-01-01T10:00:00Z"}"#;
        let token = parse_token_output(out, RESOURCE, Utc::now()).unwrap();
        assert_eq!(token.expires_at.to_rfc3339(), "2030-01-01T10:00:00+00:00");
    }

    #[test]
    fn test_parse_naive_local_expiry() {
        let out = r#"{"accessToken": "abc", "expiresOn": "2030-01-01 10:00:00.123456"}"#;
        let token = parse_token_output(out, RESOURCE, Utc::now()).unwrap();

        let expected = Local
            .from_local_datetime(
                &NaiveDateTime::parse_from_str("2030-01-01 10:00:00", "%Y-%m-%d %H:%M:%S")
                    .unwrap(),
            )
            .earliest()
            .unwrap();
        assert_eq!(token.expires_at.timestamp(), expected.timestamp());
    }

    #[test]
    fn test_parse_relative_expiry() {
        let now = Utc::now();
        let out = r#"{"access_token": "abc", "expires_in": 3599}"#;
        let token = parse_token_output(out, RESOURCE, now).unwrap();
        assert_eq!(token.expires_at, now + chrono::Duration::seconds(3599));
    }

    #[test]
    fn test_parse_rejects_bad_output() {
        let now = Utc::now();
        assert!(matches!(
            parse_token_output("not json", RESOURCE, now),
            Err(CliError::InvalidOutput(_))
        ));
        assert!(matches!(
            parse_token_output(r#"{"expires_on": 1893492000}"#, RESOURCE, now),
            Err(CliError::InvalidOutput(_))
        ));
        assert!(matches!(
            parse_token_output(r#"{"accessToken": "abc"}"#, RESOURCE, now),
            Err(CliError::InvalidOutput(_))
        ));
    }

    #[test]
    fn test_parse_rejects_out_of_range_expiry() {
        let now = Utc::now();
        for out in [
            r#"{"accessToken": "abc", "expires_in": 9223372036854775807}"#,
            r#"{"accessToken": "abc", "expires_in": 1e300}"#,
            r#"{"accessToken": "abc", "expiresIn": "-9223372036854775808"}"#,
            r#"{"accessToken": "abc", "expires_on": 9223372036854775807}"#,
        ] {
            assert!(
                matches!(
                    parse_token_output(out, RESOURCE, now),
                    Err(CliError::InvalidOutput(_))
                ),
                "accepted {}",
                out
            );
        }
    }

    #[test]
    fn test_parse_account() {
        let out = r#"{
            "environmentName": "AzureCloud",
            "id": "00000000-0000-0000-0000-000000000001",
            "isDefault": true,
            "name": "Platform Dev",
            "state": "Enabled",
            "tenantId": "72f988bf-0000-0000-0000-000000000000",
            "user": { "name": "jane@contoso.com", "type": "user" }
        }"#;

        let account = parse_account_output(out).unwrap();
        assert_eq!(account.identifier().as_deref(), Some("jane@contoso.com"));
        assert_eq!(account.subscription_name.as_deref(), Some("Platform Dev"));
        assert_eq!(
            account.tenant_id.as_deref(),
            Some("72f988bf-0000-0000-0000-000000000000")
        );
    }

    #[test]
    fn test_account_identifier_falls_back_to_tenant() {
        let account = parse_account_output(r#"{"tenantId": "tenant-1"}"#).unwrap();
        assert_eq!(account.identifier().as_deref(), Some("tenant-1"));

        let account = parse_account_output("{}").unwrap();
        assert_eq!(account.identifier(), None);
    }

    #[tokio::test]
    async fn test_missing_binary_is_not_installed() {
        let cli = AzureCli::new("/nonexistent/objectseeker-test/az", Duration::from_secs(5));

        let result = cli.current_account().await;
        assert!(matches!(result, Err(CliError::NotInstalled(_))));

        let result = cli.get_token(RESOURCE).await;
        assert!(matches!(result, Err(GraphError::Unauthenticated(_))));
    }

    #[cfg(unix)]
    mod fake_cli {
        use super::*;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use std::path::PathBuf;

        fn fake_az(dir: &tempfile::TempDir, body: &str) -> PathBuf {
            let path = dir.path().join("az");
            fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn test_token_from_fake_cli() {
            let dir = tempfile::tempdir().unwrap();
            let az = fake_az(
                &dir,
                r#"if [ "$2" = "get-access-token" ] && [ "$4" = "https://graph.microsoft.com" ]; then
  echo '{"accessToken": "fake-token", "expires_on": 1893492000}'
else
  exit 3
fi"#,
            );

            let cli = AzureCli::new(az.to_string_lossy(), Duration::from_secs(10));
            let token = cli.get_token(RESOURCE).await.unwrap();

            assert_eq!(token.secret(), "fake-token");
            assert_eq!(token.expires_at.timestamp(), 1893492000);
        }

        #[tokio::test]
        async fn test_not_logged_in() {
            let dir = tempfile::tempdir().unwrap();
            let az = fake_az(
                &dir,
                "echo \"ERROR: Please run 'az login' to setup account.\" >&2\nexit 1",
            );

            let cli = AzureCli::new(az.to_string_lossy(), Duration::from_secs(10));

            match cli.get_token(RESOURCE).await {
                Err(GraphError::Unauthenticated(msg)) => assert!(msg.contains("az login")),
                other => panic!("unexpected result: {:?}", other),
            }

            let err = cli.current_account().await.unwrap_err();
            assert!(err.is_not_logged_in());
        }

        #[tokio::test]
        async fn test_empty_output_is_rejected() {
            let dir = tempfile::tempdir().unwrap();
            let az = fake_az(&dir, "exit 0");

            let cli = AzureCli::new(az.to_string_lossy(), Duration::from_secs(10));
            assert!(matches!(
                cli.current_account().await,
                Err(CliError::InvalidOutput(_))
            ));
        }

        #[tokio::test]
        async fn test_slow_cli_times_out() {
            let dir = tempfile::tempdir().unwrap();
            let az = fake_az(&dir, "sleep 5");

            let cli = AzureCli::new(az.to_string_lossy(), Duration::from_millis(200));
            assert!(matches!(
                cli.current_account().await,
                Err(CliError::TimedOut(_))
            ));
        }
    }
}
