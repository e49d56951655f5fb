//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::clients::{
    IdentityProvider, PaymentGateway, Store, baas::BaasClient, stripe::StripeClient,
};
use crate::config::Config;
use crate::error::AppError;
use crate::templates::Templates;

/// State available to handlers and middleware via Axum's `State` extractor.
///
/// Every field is reference counted, so cloning per request is cheap.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Hosted database tables.
    pub store: Arc<dyn Store>,
    /// Hosted authentication.
    pub identity: Arc<dyn IdentityProvider>,
    /// Payment processor.
    pub payments: Arc<dyn PaymentGateway>,
    pub templates: Arc<Templates>,
}

impl AppState {
    /// Wire the production adapters for the hosted services.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built or a template fails to parse.
    pub fn hosted(config: Config) -> Result<Self, AppError> {
        let baas = Arc::new(BaasClient::new(&config)?);
        let payments = Arc::new(StripeClient::new(&config)?);

        Ok(Self {
            config: Arc::new(config),
            store: baas.clone(),
            identity: baas,
            payments,
            templates: Arc::new(Templates::new()?),
        })
    }
}
