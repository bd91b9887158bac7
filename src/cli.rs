//! CLI module - command-line interface definitions and handlers

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, warn};

use objectseeker::auth::token_provider::{format_duration, time_until_expiry};
use objectseeker::{AuthStatus, Config, EntityType, ObjectSeeker, SearchRequest, SearchResult};

/// objectseeker - find Azure AD object IDs using your Azure CLI session.
#[derive(Parser, Debug)]
#[command(name = "objectseeker")]
#[command(
    author,
    version,
    about,
    long_about = r#"objectseeker looks up users, groups and applications in Microsoft Graph
and prints their object IDs. It borrows the token of your current Azure CLI
session, so run 'az login' first.

Examples:
    objectseeker status
    objectseeker search group Engineering
    objectseeker search user jane --max-results 5
    objectseeker --format ids search app terraform
"#
)]
pub struct Cli {
    /// Configuration file layered over the built-in defaults.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output format (table/json/ids).
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show whether the Azure CLI has an active session.
    Status,

    /// Search directory objects by name prefix.
    #[command(long_about = "Search users, groups or applications whose display name (and mail or\n\
user principal name, where the type has one) starts with QUERY.\n\n\
Examples:\n\
  objectseeker search user jane\n\
  objectseeker search group \"Platform Team\"\n\
  objectseeker search application terraform --max-results 10\n")]
    Search {
        /// Object type: user, group or application.
        #[arg(value_name = "TYPE")]
        entity_type: EntityType,

        /// Name prefix to look for. Several words are joined with spaces.
        #[arg(value_name = "QUERY", required = true, num_args = 1..)]
        query: Vec<String>,

        /// Maximum number of results (overrides search.max_results).
        #[arg(long, value_name = "N")]
        max_results: Option<usize>,

        /// Deadline for the whole search in seconds (overrides search.timeout_seconds).
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned columns for humans.
    Table,
    /// A single JSON document.
    Json,
    /// Object IDs only, one per line.
    Ids,
}

/// Run the selected command.
pub async fn run(cli: Cli, config: Config) -> Result<ExitCode> {
    let format = cli.format;
    let seeker = ObjectSeeker::new(config).context("Failed to initialize search client")?;

    match cli.command {
        Commands::Status => run_status(&seeker, format).await,
        Commands::Search {
            entity_type,
            query,
            max_results,
            timeout,
        } => {
            let config = seeker.config();
            let request = SearchRequest::new(
                entity_type,
                &query.join(" "),
                max_results.unwrap_or(config.search.max_results),
                timeout
                    .map(Duration::from_secs)
                    .unwrap_or_else(|| config.search_timeout()),
            )?;
            run_search(&seeker, &request, format).await
        }
    }
}

async fn run_status(seeker: &ObjectSeeker, format: OutputFormat) -> Result<ExitCode> {
    let status = seeker.check_auth().await;

    let validity = if status.authenticated {
        match seeker.token().await {
            Ok(token) => time_until_expiry(&token.expires_at).map(format_duration),
            Err(e) => {
                warn!("Signed in, but no Graph token could be obtained: {}", e);
                None
            }
        }
    } else {
        None
    };

    print!("{}", render_status(&status, validity.as_deref(), format)?);

    Ok(if status.authenticated {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run_search(
    seeker: &ObjectSeeker,
    request: &SearchRequest,
    format: OutputFormat,
) -> Result<ExitCode> {
    let status = seeker.check_auth().await;
    if !status.authenticated {
        warn!("{}", status.message);
        eprintln!("Warning: {}", status.message);
    }

    let results = seeker.search_request(request).await?;
    info!("{} result(s) for {} '{}'", results.len(), request.entity_type, request.query);

    if results.is_empty() && format == OutputFormat::Table {
        eprintln!("No {}s found starting with '{}'.", request.entity_type, request.query);
        return Ok(ExitCode::SUCCESS);
    }

    print!("{}", render_results(&results, format)?);
    Ok(ExitCode::SUCCESS)
}

fn render_status(
    status: &AuthStatus,
    validity: Option<&str>,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let mut value = serde_json::to_value(status)?;
            if let (Some(validity), Some(map)) = (validity, value.as_object_mut()) {
                map.insert("token_valid_for".into(), validity.into());
            }
            Ok(format!("{}\n", serde_json::to_string_pretty(&value)?))
        }
        OutputFormat::Ids => Ok(format!(
            "{}\n",
            status.account_identifier.as_deref().unwrap_or_default()
        )),
        OutputFormat::Table => {
            let mut out = format!("{}\n", status.message);
            if let Some(tenant) = &status.tenant_id {
                out.push_str(&format!("Tenant: {}\n", tenant));
            }
            if let Some(validity) = validity {
                out.push_str(&format!("Graph token valid for {}\n", validity));
            }
            Ok(out)
        }
    }
}

fn render_results(results: &[SearchResult], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(format!("{}\n", serde_json::to_string_pretty(results)?)),
        OutputFormat::Ids => Ok(results
            .iter()
            .map(|r| format!("{}\n", r.object_id))
            .collect()),
        OutputFormat::Table => Ok(render_table(results)),
    }
}

fn render_table(results: &[SearchResult]) -> String {
    const HEADERS: [&str; 4] = ["OBJECT ID", "DISPLAY NAME", "MAIL / UPN", "TYPE"];

    let rows: Vec<[&str; 4]> = results
        .iter()
        .map(|r| {
            [
                r.object_id.as_str(),
                r.display_name.as_str(),
                r.principal_or_mail.as_str(),
                r.entity_type.as_str(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: &[&str; 4]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect();
        format!("{}\n", padded.join("  ").trim_end())
    };

    let mut out = line(&HEADERS);
    for row in &rows {
        out.push_str(&line(row));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results() -> Vec<SearchResult> {
        vec![
            SearchResult {
                object_id: "11111111-1111-1111-1111-111111111111".into(),
                display_name: "Engineering Team".into(),
                principal_or_mail: "eng@example.com".into(),
                entity_type: EntityType::Group,
            },
            SearchResult {
                object_id: "22222222-2222-2222-2222-222222222222".into(),
                display_name: "Eng".into(),
                principal_or_mail: String::new(),
                entity_type: EntityType::Group,
            },
        ]
    }

    #[test]
    fn test_parse_search_command() {
        let cli = Cli::try_parse_from([
            "objectseeker",
            "--format",
            "ids",
            "search",
            "groups",
            "Platform",
            "Team",
            "--max-results",
            "5",
        ])
        .unwrap();

        assert_eq!(cli.format, OutputFormat::Ids);
        match cli.command {
            Commands::Search {
                entity_type,
                query,
                max_results,
                timeout,
            } => {
                assert_eq!(entity_type, EntityType::Group);
                assert_eq!(query.join(" "), "Platform Team");
                assert_eq!(max_results, Some(5));
                assert_eq!(timeout, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_entity_type_rejected() {
        assert!(Cli::try_parse_from(["objectseeker", "search", "role", "Owner"]).is_err());
        assert!(Cli::try_parse_from(["objectseeker", "search", "user"]).is_err());
    }

    #[test]
    fn test_render_table_aligns_columns() {
        let table = render_table(&results());
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("OBJECT ID"));
        let name_col = lines[0].find("DISPLAY NAME").unwrap();
        assert_eq!(lines[1].find("Engineering Team"), Some(name_col));
        assert_eq!(lines[2].find("Eng "), Some(name_col));
    }

    #[test]
    fn test_render_ids_and_json() {
        let ids = render_results(&results(), OutputFormat::Ids).unwrap();
        assert_eq!(
            ids,
            "11111111-1111-1111-1111-111111111111\n22222222-2222-2222-2222-222222222222\n"
        );

        let json = render_results(&results(), OutputFormat::Json).unwrap();
        let parsed: Vec<SearchResult> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, results());
    }

    #[test]
    fn test_render_status() {
        let status = AuthStatus {
            authenticated: true,
            account_identifier: Some("jane@contoso.com".into()),
            tenant_id: Some("72f988bf-0000-0000-0000-000000000000".into()),
            message: "Signed in as jane@contoso.com".into(),
        };

        let text = render_status(&status, Some("59m"), OutputFormat::Table).unwrap();
        assert!(text.contains("Signed in as jane@contoso.com"));
        assert!(text.contains("Graph token valid for 59m"));

        let json = render_status(&status, Some("59m"), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["authenticated"], true);
        assert_eq!(value["token_valid_for"], "59m");
    }
}
