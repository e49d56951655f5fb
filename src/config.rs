//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to deserialize environment variables into a type-safe struct.

use serde::Deserialize;
use url::Url;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `BAAS_URL` (required): base URL of the hosted database/auth platform
/// - `BAAS_ANON_KEY` (required): public key used for auth endpoints
/// - `BAAS_SERVICE_KEY` (required): server key used for table access
/// - `PAYMENT_SECRET_KEY` (required): payment processor secret key
/// - `PAYMENT_WEBHOOK_SECRET` (required): secret used to sign payment webhooks
/// - `PAYMENT_API_URL` (optional): defaults to `https://api.stripe.com`
/// - `PUBLIC_BASE_URL` (optional): defaults to `http://localhost:3000`
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `WEBHOOK_TOLERANCE_SECS` (optional): defaults to 300
/// - `HTTP_TIMEOUT_SECS` (optional): outbound request timeout, defaults to 10
/// - `SESSION_COOKIE` (optional): defaults to `sf_session`
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    pub baas_url: String,
    pub baas_anon_key: String,
    pub baas_service_key: String,

    #[serde(default = "default_payment_api_url")]
    pub payment_api_url: String,
    pub payment_secret_key: String,
    pub payment_webhook_secret: String,

    #[serde(default = "default_webhook_tolerance")]
    pub webhook_tolerance_secs: i64,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
}

fn default_port() -> u16 {
    3000
}

fn default_public_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_payment_api_url() -> String {
    "https://api.stripe.com".to_string()
}

fn default_webhook_tolerance() -> i64 {
    300
}

fn default_http_timeout() -> u64 {
    10
}

fn default_session_cookie() -> String {
    "sf_session".to_string()
}

/// Configuration could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Env(#[from] envy::Error),

    #[error("{key} is not a valid URL: {source}")]
    InvalidUrl {
        key: &'static str,
        source: url::ParseError,
    },
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Loads a `.env` file first when one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., BAAS_URL)
    /// - Values cannot be parsed into expected types
    /// - One of the URL settings is not a valid URL
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = envy::from_env::<Config>()?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from explicit key/value pairs.
    ///
    /// Keys use the same upper-case names as the environment.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config = envy::from_iter::<_, Config>(vars)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every URL setting parses.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("PUBLIC_BASE_URL", &self.public_base_url),
            ("BAAS_URL", &self.baas_url),
            ("PAYMENT_API_URL", &self.payment_api_url),
        ] {
            Url::parse(value).map_err(|source| ConfigError::InvalidUrl { key, source })?;
        }
        Ok(())
    }

    /// Whether cookies should carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.public_base_url.starts_with("https://")
    }

    /// Name of the cookie holding the refresh token.
    pub fn refresh_cookie(&self) -> String {
        format!("{}_refresh", self.session_cookie)
    }

    /// Public base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.public_base_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required() -> Vec<(String, String)> {
        [
            ("BAAS_URL", "https://project.baas.example"),
            ("BAAS_ANON_KEY", "anon"),
            ("BAAS_SERVICE_KEY", "service"),
            ("PAYMENT_SECRET_KEY", "sk_test_123"),
            ("PAYMENT_WEBHOOK_SECRET", "whsec_123"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn defaults_apply_when_optional_keys_missing() {
        let config = Config::from_vars(required()).unwrap();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.payment_api_url, "https://api.stripe.com");
        assert_eq!(config.webhook_tolerance_secs, 300);
        assert_eq!(config.session_cookie, "sf_session");
        assert_eq!(config.refresh_cookie(), "sf_session_refresh");
        assert!(!config.secure_cookies());
    }

    #[test]
    fn missing_required_key_is_an_error() {
        let vars = required()
            .into_iter()
            .filter(|(k, _)| k != "PAYMENT_WEBHOOK_SECRET");
        assert!(matches!(Config::from_vars(vars), Err(ConfigError::Env(_))));
    }

    #[test]
    fn invalid_url_is_rejected() {
        let mut vars = required();
        vars.push(("PUBLIC_BASE_URL".into(), "not a url".into()));
        let err = Config::from_vars(vars).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidUrl {
                key: "PUBLIC_BASE_URL",
                ..
            }
        ));
    }

    #[test]
    fn https_base_url_enables_secure_cookies() {
        let mut vars = required();
        vars.push(("PUBLIC_BASE_URL".into(), "https://shop.example/".into()));
        let config = Config::from_vars(vars).unwrap();
        assert!(config.secure_cookies());
        assert_eq!(config.base_url(), "https://shop.example");
    }
}
