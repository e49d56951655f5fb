//! Identity types returned by the hosted auth platform.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A signed-up user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
}

/// Tokens issued after a successful sign-in or refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,

    /// Lifetime of the access token in seconds.
    pub expires_in: i64,
    pub user: User,
}

/// Result of a sign-up call.
///
/// Platforms that require email confirmation return no session.
#[derive(Debug, Clone)]
pub enum SignUpOutcome {
    SignedIn(AuthSession),
    ConfirmationRequired(User),
}

/// Login form body.
#[derive(Debug, Deserialize)]
pub struct CredentialsForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub csrf_token: String,
}

impl CredentialsForm {
    /// Basic shape checks applied before calling the auth platform.
    pub fn validate_for_signup(&self) -> Result<(), String> {
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err("Please enter a valid email address".to_string());
        }
        if self.password.chars().count() < 8 {
            return Err("Password must be at least 8 characters".to_string());
        }
        Ok(())
    }
}
