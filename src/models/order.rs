//! Order data models and form types.
//!
//! This module defines:
//! - `Order`: a row of the hosted `orders` table
//! - `OrderStatus`: payment lifecycle of an order
//! - `CheckoutForm`: form body posted from a product page

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::product::Product;

/// Largest quantity accepted in a single order.
pub const MAX_QUANTITY: i32 = 99;

/// Payment lifecycle of an order.
///
/// ```text
/// pending ──► paid
///    │──────► failed
///    └──────► cancelled
/// ```
///
/// Every state other than `pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Failed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Failed => "failed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        self != OrderStatus::Pending
    }

    /// Whether moving from `self` to `to` is a legal transition.
    pub fn can_transition_to(self, to: OrderStatus) -> bool {
        self == OrderStatus::Pending && to != OrderStatus::Pending
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents an order record in the hosted database.
///
/// # Ownership
///
/// Every order belongs to exactly one user. Handlers always compare
/// `user_id` with the session's user before exposing an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,

    /// Product name captured at purchase time.
    pub product_name: String,
    pub quantity: i32,

    /// `price_cents * quantity` at purchase time.
    pub amount_cents: i64,
    pub currency: String,
    pub status: OrderStatus,

    /// Checkout session created for this order at the payment processor.
    pub checkout_session_id: Option<String>,

    /// Payment intent reported by the processor once paid.
    pub payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Build a fresh `pending` order for `quantity` units of `product`.
    ///
    /// # Errors
    ///
    /// Returns a message when the quantity is out of range or the total overflows.
    pub fn new_pending(user_id: Uuid, product: &Product, quantity: i32) -> Result<Self, String> {
        if !(1..=MAX_QUANTITY).contains(&quantity) {
            return Err(format!("Quantity must be between 1 and {MAX_QUANTITY}"));
        }
        let amount_cents = product
            .price_cents
            .checked_mul(i64::from(quantity))
            .ok_or_else(|| "Order total is too large".to_string())?;

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            product_id: product.id,
            product_name: product.name.clone(),
            quantity,
            amount_cents,
            currency: product.currency.clone(),
            status: OrderStatus::Pending,
            checkout_session_id: None,
            payment_intent_id: None,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Form posted by the "Buy" button on a product page.
#[derive(Debug, Deserialize)]
pub struct CheckoutForm {
    pub product_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    #[serde(default)]
    pub csrf_token: String,
}

fn default_quantity() -> i32 {
    1
}

/// Response body for `GET /api/v1/orders`.
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub amount_cents: i64,
    pub currency: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Drops payment processor identifiers that clients don't need to see.
impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            product_id: order.product_id,
            product_name: order.product_name,
            quantity: order.quantity,
            amount_cents: order.amount_cents,
            currency: order.currency,
            status: order.status,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}
