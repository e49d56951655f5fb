//! Adapters for the hosted services the storefront depends on.
//!
//! Handlers only see the traits below. Production wiring uses
//! [`baas::BaasClient`] for the database/auth platform and
//! [`stripe::StripeClient`] for payments; [`memory`] provides in-process
//! implementations with the same semantics.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    order::{Order, OrderStatus},
    payment::{CheckoutRequest, CheckoutSession},
    product::Product,
    user::{AuthSession, SignUpOutcome, User},
};

pub mod baas;
pub mod memory;
pub mod stripe;

/// Table access on the hosted database.
#[async_trait]
pub trait Store: Send + Sync {
    /// Cheap round trip used by the health check.
    async fn ping(&self) -> Result<(), AppError>;

    /// Active products, newest first.
    async fn list_products(&self) -> Result<Vec<Product>, AppError>;

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, AppError>;

    async fn insert_order(&self, order: &Order) -> Result<Order, AppError>;

    async fn set_checkout_session(
        &self,
        order_id: Uuid,
        session_id: &str,
    ) -> Result<Option<Order>, AppError>;

    /// Move a `pending` order to `to`.
    ///
    /// The update is conditional on the stored status still being `pending`.
    /// Returns `None` when no row changed (unknown order or already settled).
    async fn transition_order(
        &self,
        order_id: Uuid,
        to: OrderStatus,
        payment_intent_id: Option<&str>,
    ) -> Result<Option<Order>, AppError>;

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, AppError>;

    async fn find_order_by_session(&self, session_id: &str) -> Result<Option<Order>, AppError>;

    /// Orders of one user, newest first.
    async fn list_orders(&self, user_id: Uuid) -> Result<Vec<Order>, AppError>;
}

/// Hosted authentication.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AppError>;

    /// # Errors
    ///
    /// `InvalidCredentials` when the platform rejects the pair.
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AppError>;

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AppError>;

    /// # Errors
    ///
    /// `Unauthenticated` when the token is expired or unknown.
    async fn get_user(&self, access_token: &str) -> Result<User, AppError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), AppError>;
}

/// Hosted payment checkout.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, AppError>;

    async fn retrieve_checkout_session(&self, id: &str) -> Result<CheckoutSession, AppError>;

    /// Close an open session so it can no longer be paid.
    ///
    /// # Errors
    ///
    /// Upstream error when the session is already complete or expired.
    async fn expire_checkout_session(&self, id: &str) -> Result<CheckoutSession, AppError>;
}
