//! Catalog product model.
//!
//! Products live in the hosted database's `products` table. The storefront only
//! reads them; catalog management happens in the platform's dashboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a row of the `products` table.
///
/// # Price Storage
///
/// Prices are stored as `i64` cents to avoid floating-point precision issues.
/// `currency` is a lowercase ISO 4217 code, as the payment processor expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub currency: String,
    pub image_url: Option<String>,

    /// Inactive products are hidden from the catalog and cannot be bought.
    pub active: bool,
    pub created_at: DateTime<Utc>,
}
