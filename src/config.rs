//! Configuration loading and management.
//!
//! Loads configuration from embedded config.toml, merges an optional user config
//! file over it, then applies environment variable overrides.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Embedded configuration file content.
const CONFIG_TOML: &str = include_str!("../config.toml");

/// User config file name.
const CONFIG_FILE: &str = "config.toml";

/// Azure CLI executable names tried in each `PATH` directory.
#[cfg(windows)]
const CLI_NAMES: &[&str] = &["az.cmd", "az.exe", "az"];

#[cfg(not(windows))]
const CLI_NAMES: &[&str] = &["az"];

/// Standard install locations checked when the CLI is not on `PATH`.
#[cfg(windows)]
const CLI_INSTALL_PATHS: &[&str] = &[
    r"C:\Program Files\Microsoft SDKs\Azure\CLI2\wbin\az.cmd",
    r"C:\Program Files (x86)\Microsoft SDKs\Azure\CLI2\wbin\az.cmd",
];

#[cfg(not(windows))]
const CLI_INSTALL_PATHS: &[&str] = &["/usr/local/bin/az", "/opt/homebrew/bin/az", "/usr/bin/az"];

/// Root configuration structure.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    pub graph: GraphConfig,
    pub auth: AuthConfig,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GraphConfig {
    pub base_url: String,
    pub api_version: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthConfig {
    pub resource: String,
    pub cli_path: String,
    pub cli_timeout_seconds: u64,
    pub expiry_margin_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchConfig {
    pub max_results: usize,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    /// Load configuration from the default user config location.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, merging `path` (or the default user file) over the embedded defaults.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut merged: toml::Value =
            toml::from_str(CONFIG_TOML).context("Failed to parse embedded config.toml")?;

        let user_path = path.map(Path::to_path_buf).or_else(default_config_path);
        if let Some(user_path) = user_path {
            if user_path.exists() {
                let content = fs::read_to_string(&user_path)
                    .with_context(|| format!("Failed to read {}", user_path.display()))?;
                let overlay: toml::Value = toml::from_str(&content)
                    .with_context(|| format!("Failed to parse {}", user_path.display()))?;
                merge_toml(&mut merged, overlay);
                debug!("Merged user configuration from {:?}", user_path);
            } else if path.is_some() {
                anyhow::bail!("Config file {} does not exist", user_path.display());
            }
        }

        let mut config: Config = merged
            .try_into()
            .context("Configuration has missing or invalid fields")?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(base_url) = env::var("OBJECTSEEKER_GRAPH_BASE_URL") {
            self.graph.base_url = base_url;
        }

        if let Ok(version) = env::var("OBJECTSEEKER_GRAPH_VERSION") {
            self.graph.api_version = version;
        }

        if let Ok(resource) = env::var("OBJECTSEEKER_RESOURCE") {
            self.auth.resource = resource;
        }

        if let Ok(cli_path) = env::var("OBJECTSEEKER_AZ_PATH") {
            self.auth.cli_path = cli_path;
        }

        if let Ok(log_level) = env::var("RUST_LOG") {
            self.logging.level = log_level;
        }
    }

    /// Validate that the configuration is usable.
    fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.graph.base_url)
            .with_context(|| format!("Invalid graph.base_url '{}'", self.graph.base_url))?;
        if url.scheme() != "https" && url.scheme() != "http" {
            anyhow::bail!("graph.base_url must be an http(s) URL");
        }

        if self.graph.api_version.trim().is_empty() {
            anyhow::bail!("graph.api_version must not be empty");
        }

        if self.auth.resource.trim().is_empty() {
            anyhow::bail!("auth.resource must not be empty");
        }

        if self.auth.cli_timeout_seconds == 0 {
            anyhow::bail!("auth.cli_timeout_seconds must be greater than zero");
        }

        if self.search.max_results == 0 {
            anyhow::bail!("search.max_results must be at least 1");
        }

        if self.search.timeout_seconds == 0 {
            anyhow::bail!("search.timeout_seconds must be greater than zero");
        }

        Ok(())
    }

    /// Collection root, e.g. `https://graph.microsoft.com/v1.0`.
    pub fn graph_root(&self) -> String {
        format!(
            "{}/{}",
            self.graph.base_url.trim_end_matches('/'),
            self.graph.api_version.trim_matches('/')
        )
    }

    /// Azure CLI executable: the configured path, else the first one found on
    /// `PATH` or in a standard install location, else the bare platform name.
    pub fn cli_program(&self) -> String {
        if !self.auth.cli_path.trim().is_empty() {
            return self.auth.cli_path.clone();
        }

        match find_cli_program(env::var_os("PATH"), CLI_INSTALL_PATHS) {
            Some(path) => {
                debug!("Found Azure CLI at {}", path.display());
                path.to_string_lossy().into_owned()
            }
            None => default_cli_program().to_string(),
        }
    }

    pub fn cli_timeout(&self) -> Duration {
        Duration::from_secs(self.auth.cli_timeout_seconds)
    }

    pub fn expiry_margin(&self) -> Duration {
        Duration::from_secs(self.auth.expiry_margin_seconds)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search.timeout_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            graph: GraphConfig {
                base_url: "https://graph.microsoft.com".into(),
                api_version: "v1.0".into(),
            },
            auth: AuthConfig {
                resource: "https://graph.microsoft.com".into(),
                cli_path: String::new(),
                cli_timeout_seconds: 10,
                expiry_margin_seconds: 60,
            },
            search: SearchConfig {
                max_results: 100,
                timeout_seconds: 30,
            },
            logging: LoggingConfig {
                level: "info".into(),
            },
        }
    }
}

/// Get the path to the user config file.
///
/// Returns `~/.config/objectseeker/config.toml` on Linux.
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("io", "objectseeker", "objectseeker")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

/// Search `path_var` directories for a CLI executable, then `install_paths`.
fn find_cli_program(path_var: Option<OsString>, install_paths: &[&str]) -> Option<PathBuf> {
    let on_path = path_var.and_then(|paths| {
        env::split_paths(&paths).find_map(|dir| {
            CLI_NAMES
                .iter()
                .map(|name| dir.join(name))
                .find(|candidate| candidate.is_file())
        })
    });

    on_path.or_else(|| {
        install_paths
            .iter()
            .map(PathBuf::from)
            .find(|candidate| candidate.is_file())
    })
}

fn default_cli_program() -> &'static str {
    if cfg!(windows) {
        "az.cmd"
    } else {
        "az"
    }
}

/// Recursively merge `overlay` into `base`; tables merge key by key, anything else replaces.
fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                if let Some(existing) = base.get_mut(&key) {
                    if existing.is_table() && value.is_table() {
                        merge_toml(existing, value);
                        continue;
                    }
                }
                base.insert(key, value);
            }
        }
        (base, overlay) => *base = overlay,
    }
}
