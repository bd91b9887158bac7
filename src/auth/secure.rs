//! Secure data wrappers that are zeroized on drop.
//!
//! Bearer tokens read from the Azure CLI are held in these types so they are
//! cleared from memory when dropped and never show up in logs.

use chrono::{DateTime, Utc};
use std::time::Duration;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A secure string wrapper that zeroizes its contents on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecureString(String);

impl SecureString {
    pub fn new(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Bearer token for one resource, as handed out by the token provider.
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// The token itself. Never log this.
    pub value: SecureString,

    /// Absolute expiry time.
    pub expires_at: DateTime<Utc>,

    /// Resource URI the token was issued for.
    pub resource: String,
}

impl AccessToken {
    pub fn new(
        value: impl Into<SecureString>,
        expires_at: DateTime<Utc>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            value: value.into(),
            expires_at,
            resource: resource.into(),
        }
    }

    /// The raw bearer value for the `Authorization` header.
    pub fn secret(&self) -> &str {
        self.value.as_str()
    }

    /// True while the token is valid for longer than `margin` from now.
    pub fn is_fresh(&self, margin: Duration) -> bool {
        let Ok(margin) = chrono::Duration::from_std(margin) else {
            return false;
        };
        match Utc::now().checked_add_signed(margin) {
            Some(deadline) => self.expires_at > deadline,
            None => false,
        }
    }
}
