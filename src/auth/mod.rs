//! Azure CLI authentication module.
//!
//! Provides the credential source seam over `az`, the cached token provider
//! and the advisory sign-in status check.

pub mod cli;
pub mod secure;
pub mod status;
pub mod token_provider;

#[cfg(test)]
pub(crate) mod mock;

pub use cli::{AccountInfo, AzureCli, CredentialSource};
pub use secure::{AccessToken, SecureString};
pub use status::{AuthStatus, AuthStatusChecker};
pub use token_provider::TokenProvider;
