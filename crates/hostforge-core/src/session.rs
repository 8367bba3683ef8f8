//! Operator session context
//!
//! Replaces ambient process-wide state with an explicit context object:
//! the API token is validated once, at construction, and the optional SSH
//! key passphrase travels with it to every component that needs either.

use crate::error::CoreError;

/// Validated operator credentials for one tool invocation
#[derive(Clone)]
pub struct ApiSession {
    token: String,
    passphrase: Option<String>,
}

impl std::fmt::Debug for ApiSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiSession")
            .field("token", &"<redacted>")
            .field("has_passphrase", &self.passphrase.is_some())
            .finish()
    }
}

impl ApiSession {
    /// Validate the token and create the session context.
    ///
    /// Cloud API tokens are 64 alphanumeric characters; anything else is
    /// rejected up front so no request is ever sent with a malformed
    /// credential.
    ///
    /// # Errors
    /// Returns `CoreError::InvalidApiToken` if the token fails validation.
    pub fn new(token: impl Into<String>) -> Result<Self, CoreError> {
        let token = token.into();
        if token.len() != 64 || !token.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CoreError::InvalidApiToken);
        }
        Ok(Self {
            token,
            passphrase: None,
        })
    }

    /// Attach the SSH key passphrase chosen by the operator
    #[must_use]
    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    /// Bearer token for cloud API requests
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Passphrase protecting the operator's private key, if any
    #[must_use]
    pub fn passphrase(&self) -> Option<&str> {
        self.passphrase.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_token() -> String {
        "a1B2".repeat(16)
    }

    #[test]
    fn accepts_64_char_alphanumeric_token() {
        let session = ApiSession::new(valid_token()).unwrap();
        assert_eq!(session.token().len(), 64);
        assert!(session.passphrase().is_none());
    }

    #[test]
    fn rejects_short_token() {
        assert!(matches!(
            ApiSession::new("abc123"),
            Err(CoreError::InvalidApiToken)
        ));
    }

    #[test]
    fn rejects_non_alphanumeric_token() {
        let mut token = valid_token();
        token.replace_range(0..1, "-");
        assert!(ApiSession::new(token).is_err());
    }

    #[test]
    fn debug_does_not_leak_token() {
        let session = ApiSession::new(valid_token()).unwrap();
        let debug = format!("{session:?}");
        assert!(!debug.contains("a1B2"));
    }

    #[test]
    fn passphrase_travels_with_session() {
        let session = ApiSession::new(valid_token())
            .unwrap()
            .with_passphrase("hunter2");
        assert_eq!(session.passphrase(), Some("hunter2"));
    }
}
