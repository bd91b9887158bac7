//! Error types for objectseeker.
//!
//! Uses `thiserror` for library-style errors with automatic `Display` and `Error` implementations.

use std::time::Duration;
use thiserror::Error;

/// Hint attached when the Azure CLI executable could not be found.
const INSTALL_HINT: &str = "install the Azure CLI, then run 'az login'";

/// Top-level error returned to the embedding application by a search.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid search input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Graph API error: {0}")]
    Graph(#[from] GraphError),
}

/// Input problems that are caught before any process or network I/O.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Search query is empty")]
    EmptyQuery,

    #[error("max_results must be at least 1 (got {0})")]
    InvalidMaxResults(usize),

    #[error("Timeout must be greater than zero")]
    InvalidTimeout,

    #[error("Unknown entity type '{0}' (expected user, group or application)")]
    UnknownEntityType(String),
}

/// Errors from the credential and Graph API layers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Not authenticated: {0}")]
    Unauthenticated(String),

    #[error("Forbidden (403): Insufficient permissions")]
    Forbidden,

    #[error("Rate limited (429): Too many requests")]
    RateLimited(Option<Duration>),

    #[error("Request timed out")]
    Timeout,

    #[error("Malformed API response: {0}")]
    Malformed(String),

    #[error("Unexpected HTTP status {0}")]
    Unknown(u16),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures of the external Azure CLI.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Azure CLI not found at '{0}'")]
    NotInstalled(String),

    #[error("Azure CLI exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("Azure CLI did not respond within {0:?}")]
    TimedOut(Duration),

    #[error("Azure CLI returned unexpected output: {0}")]
    InvalidOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification callers can branch on without matching nested enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Unauthenticated,
    Forbidden,
    RateLimited,
    Timeout,
    Malformed,
    Unknown,
    Network,
}

impl CliError {
    /// Returns true if the CLI reported that nobody is signed in.
    pub fn is_not_logged_in(&self) -> bool {
        match self {
            Self::Failed { stderr, .. } => {
                let stderr = stderr.to_ascii_lowercase();
                stderr.contains("az login") || stderr.contains("not logged in")
            }
            _ => false,
        }
    }
}

impl From<CliError> for GraphError {
    fn from(err: CliError) -> Self {
        let hint = match &err {
            CliError::NotInstalled(_) => INSTALL_HINT,
            _ => "run 'az login' and try again",
        };
        GraphError::Unauthenticated(format!("{} ({})", err, hint))
    }
}

impl GraphError {
    /// Returns a user-friendly message for display in the UI.
    pub fn user_message(&self) -> &str {
        match self {
            Self::Unauthenticated(detail) if detail.contains(INSTALL_HINT) => {
                "Azure CLI is not installed. Install it, then run 'az login'."
            }
            Self::Unauthenticated(_) => "Not signed in to Azure. Run 'az login' and try again.",
            Self::Forbidden => "Insufficient permissions to read the directory.",
            Self::RateLimited(_) => "Too many requests. Please wait a moment.",
            Self::Timeout => "The search timed out. Please try again.",
            Self::Malformed(_) => "Unexpected response from Microsoft Graph.",
            Self::Unknown(_) => "Microsoft Graph returned an unexpected status.",
            Self::Network(_) => "Network error. Check your connection.",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthenticated(_) => ErrorKind::Unauthenticated,
            Self::Forbidden => ErrorKind::Forbidden,
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::Timeout => ErrorKind::Timeout,
            Self::Malformed(_) => ErrorKind::Malformed,
            Self::Unknown(_) => ErrorKind::Unknown,
            Self::Network(_) => ErrorKind::Network,
        }
    }
}

impl SearchError {
    /// Returns a user-friendly message for display in the UI.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(e) => e.to_string(),
            Self::Graph(GraphError::Unknown(status)) => {
                format!("Microsoft Graph returned HTTP {}.", status)
            }
            Self::Graph(e) => e.user_message().to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Graph(e) => e.kind(),
        }
    }

    /// Returns true if the user has to sign in again via the Azure CLI.
    pub fn requires_sign_in(&self) -> bool {
        matches!(self, Self::Graph(GraphError::Unauthenticated(_)))
    }
}
