//! In-process implementations of the hosted-service traits.
//!
//! They follow the same rules as the real services (conditional order
//! transitions, token expiry, idempotent session creation) and back the tests
//! and local runs without network access.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::clients::{IdentityProvider, PaymentGateway, Store};
use crate::error::AppError;
use crate::models::{
    order::{Order, OrderStatus},
    payment::{CheckoutRequest, CheckoutSession},
    product::Product,
    user::{AuthSession, SignUpOutcome, User},
};

/// Thread-safe in-memory tables.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    products: Arc<RwLock<HashMap<Uuid, Product>>>,
    orders: Arc<RwLock<HashMap<Uuid, Order>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_product(&self, product: Product) {
        self.products.write().await.insert(product.id, product);
    }

    /// Make `ping` fail, as when the platform is unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// All orders regardless of owner.
    pub async fn orders(&self) -> Vec<Order> {
        self.orders.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn ping(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Upstream {
                service: "database platform",
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(())
    }

    async fn list_products(&self) -> Result<Vec<Product>, AppError> {
        let mut products: Vec<Product> = self
            .products
            .read()
            .await
            .values()
            .filter(|p| p.active)
            .cloned()
            .collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(products)
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, AppError> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn insert_order(&self, order: &Order) -> Result<Order, AppError> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Err(AppError::Upstream {
                service: "database platform",
                status: 409,
                message: "duplicate key".to_string(),
            });
        }
        orders.insert(order.id, order.clone());
        Ok(order.clone())
    }

    async fn set_checkout_session(
        &self,
        order_id: Uuid,
        session_id: &str,
    ) -> Result<Option<Order>, AppError> {
        let mut orders = self.orders.write().await;
        Ok(orders.get_mut(&order_id).map(|order| {
            order.checkout_session_id = Some(session_id.to_string());
            order.updated_at = Utc::now();
            order.clone()
        }))
    }

    async fn transition_order(
        &self,
        order_id: Uuid,
        to: OrderStatus,
        payment_intent_id: Option<&str>,
    ) -> Result<Option<Order>, AppError> {
        let mut orders = self.orders.write().await;
        let Some(order) = orders.get_mut(&order_id) else {
            return Ok(None);
        };
        if order.status != OrderStatus::Pending {
            return Ok(None);
        }
        order.status = to;
        if let Some(intent) = payment_intent_id {
            order.payment_intent_id = Some(intent.to_string());
        }
        order.updated_at = Utc::now();
        Ok(Some(order.clone()))
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, AppError> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn find_order_by_session(&self, session_id: &str) -> Result<Option<Order>, AppError> {
        Ok(self
            .orders
            .read()
            .await
            .values()
            .find(|o| o.checkout_session_id.as_deref() == Some(session_id))
            .cloned())
    }

    async fn list_orders(&self, user_id: Uuid) -> Result<Vec<Order>, AppError> {
        let mut orders: Vec<Order> = self
            .orders
            .read()
            .await
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}

#[derive(Debug, Clone)]
struct Account {
    user: User,
    password: String,
}

#[derive(Debug, Default)]
struct IdentityState {
    accounts: HashMap<String, Account>,
    access_tokens: HashMap<String, Uuid>,
    refresh_tokens: HashMap<String, Uuid>,
}

/// In-memory auth platform.
#[derive(Debug, Default, Clone)]
pub struct InMemoryIdentity {
    state: Arc<RwLock<IdentityState>>,
    require_confirmation: bool,
}

fn token() -> String {
    let bytes: [u8; 24] = rand::random();
    hex::encode(bytes)
}

impl InMemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sign-ups return no session, as with email confirmation enabled.
    pub fn requiring_confirmation() -> Self {
        Self {
            require_confirmation: true,
            ..Self::default()
        }
    }

    /// Register a user directly and return it.
    pub async fn register(&self, email: &str, password: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
        };
        self.state.write().await.accounts.insert(
            email.to_lowercase(),
            Account {
                user: user.clone(),
                password: password.to_string(),
            },
        );
        user
    }

    /// Invalidate an access token, as if it had expired.
    pub async fn expire(&self, access_token: &str) {
        self.state.write().await.access_tokens.remove(access_token);
    }

    fn issue(state: &mut IdentityState, user: &User) -> AuthSession {
        let session = AuthSession {
            access_token: token(),
            refresh_token: token(),
            expires_in: 3600,
            user: user.clone(),
        };
        state
            .access_tokens
            .insert(session.access_token.clone(), user.id);
        state
            .refresh_tokens
            .insert(session.refresh_token.clone(), user.id);
        session
    }

    fn user_by_id(state: &IdentityState, id: Uuid) -> Option<User> {
        state
            .accounts
            .values()
            .find(|a| a.user.id == id)
            .map(|a| a.user.clone())
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentity {
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AppError> {
        if self
            .state
            .read()
            .await
            .accounts
            .contains_key(&email.to_lowercase())
        {
            return Err(AppError::InvalidRequest(
                "User already registered".to_string(),
            ));
        }
        let user = self.register(email, password).await;
        if self.require_confirmation {
            return Ok(SignUpOutcome::ConfirmationRequired(user));
        }
        let mut state = self.state.write().await;
        Ok(SignUpOutcome::SignedIn(Self::issue(&mut state, &user)))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AppError> {
        let mut state = self.state.write().await;
        let user = match state.accounts.get(&email.to_lowercase()) {
            Some(account) if account.password == password => account.user.clone(),
            _ => return Err(AppError::InvalidCredentials),
        };
        Ok(Self::issue(&mut state, &user))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AppError> {
        let mut state = self.state.write().await;
        // Refresh tokens are single use
        let user_id = state
            .refresh_tokens
            .remove(refresh_token)
            .ok_or(AppError::InvalidCredentials)?;
        let user = Self::user_by_id(&state, user_id).ok_or(AppError::InvalidCredentials)?;
        Ok(Self::issue(&mut state, &user))
    }

    async fn get_user(&self, access_token: &str) -> Result<User, AppError> {
        let state = self.state.read().await;
        state
            .access_tokens
            .get(access_token)
            .and_then(|id| Self::user_by_id(&state, *id))
            .ok_or(AppError::Unauthenticated)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if let Some(user_id) = state.access_tokens.remove(access_token) {
            state.refresh_tokens.retain(|_, id| *id != user_id);
        }
        Ok(())
    }
}

/// In-memory payment processor.
#[derive(Debug, Default, Clone)]
pub struct FakeGateway {
    sessions: Arc<RwLock<HashMap<String, CheckoutSession>>>,
    by_order: Arc<RwLock<HashMap<Uuid, String>>>,
    fail: Arc<AtomicBool>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `create_checkout_session` call fail.
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    /// Record a completed payment for `session_id`.
    ///
    /// Only open sessions can be paid; returns `None` otherwise.
    pub async fn complete(&self, session_id: &str) -> Option<CheckoutSession> {
        let mut sessions = self.sessions.write().await;
        sessions
            .get_mut(session_id)
            .filter(|session| session.status.as_deref() == Some("open"))
            .map(|session| {
                session.status = Some("complete".to_string());
                session.payment_status = Some("paid".to_string());
                session.payment_intent = Some(format!("pi_{}", &session.id[3..]));
                session.url = None;
                session.clone()
            })
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Upstream {
                service: "payment processor",
                status: 503,
                message: "unavailable".to_string(),
            });
        }

        // Same order, same session
        if let Some(id) = self.by_order.read().await.get(&request.order_id) {
            if let Some(existing) = self.sessions.read().await.get(id) {
                return Ok(existing.clone());
            }
        }

        let id = format!("cs_{}", token());
        let session = CheckoutSession {
            id: id.clone(),
            url: Some(format!("https://pay.example/c/{id}")),
            status: Some("open".to_string()),
            payment_status: Some("unpaid".to_string()),
            payment_intent: None,
            amount_total: request
                .unit_amount_cents
                .checked_mul(i64::from(request.quantity)),
            client_reference_id: Some(request.order_id.to_string()),
            metadata: HashMap::from([("order_id".to_string(), request.order_id.to_string())]),
        };
        self.sessions
            .write()
            .await
            .insert(id.clone(), session.clone());
        self.by_order.write().await.insert(request.order_id, id);
        Ok(session)
    }

    async fn retrieve_checkout_session(&self, id: &str) -> Result<CheckoutSession, AppError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::Upstream {
                service: "payment processor",
                status: 404,
                message: format!("No such checkout session: {id}"),
            })
    }
    async fn expire_checkout_session(&self, id: &str) -> Result<CheckoutSession, AppError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(id).ok_or_else(|| AppError::Upstream {
            service: "payment processor",
            status: 404,
            message: format!("No such checkout session: {id}"),
        })?;
        if session.status.as_deref() != Some("open") {
            return Err(AppError::Upstream {
                service: "payment processor",
                status: 400,
                message: "Only open checkout sessions can be expired".to_string(),
            });
        }
        session.status = Some("expired".to_string());
        session.url = None;
        Ok(session.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(active: bool, age_secs: i64) -> Product {
        Product {
            id: Uuid::new_v4(),
            name: format!("p{age_secs}"),
            description: None,
            price_cents: 500,
            currency: "usd".into(),
            image_url: None,
            active,
            created_at: Utc::now() - chrono::Duration::seconds(age_secs),
        }
    }

    #[tokio::test]
    async fn catalog_hides_inactive_and_sorts_newest_first() {
        let store = InMemoryStore::new();
        store.add_product(product(true, 100)).await;
        store.add_product(product(true, 10)).await;
        store.add_product(product(false, 1)).await;

        let names: Vec<String> = store
            .list_products()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["p10", "p100"]);
    }

    #[tokio::test]
    async fn transition_applies_once() {
        let store = InMemoryStore::new();
        let p = product(true, 0);
        let order = Order::new_pending(Uuid::new_v4(), &p, 1).unwrap();
        store.insert_order(&order).await.unwrap();

        let paid = store
            .transition_order(order.id, OrderStatus::Paid, Some("pi_1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(paid.status, OrderStatus::Paid);
        assert_eq!(paid.payment_intent_id.as_deref(), Some("pi_1"));

        let again = store
            .transition_order(order.id, OrderStatus::Cancelled, None)
            .await
            .unwrap();
        assert!(again.is_none());
        assert_eq!(
            store.get_order(order.id).await.unwrap().unwrap().status,
            OrderStatus::Paid
        );
    }

    #[tokio::test]
    async fn identity_sign_in_refresh_and_expiry() {
        let identity = InMemoryIdentity::new();
        identity.register("a@example.com", "password1").await;

        assert!(matches!(
            identity.sign_in("a@example.com", "wrong").await,
            Err(AppError::InvalidCredentials)
        ));

        let session = identity.sign_in("A@example.com", "password1").await.unwrap();
        assert_eq!(
            identity.get_user(&session.access_token).await.unwrap().email,
            "a@example.com"
        );

        identity.expire(&session.access_token).await;
        assert!(matches!(
            identity.get_user(&session.access_token).await,
            Err(AppError::Unauthenticated)
        ));

        let refreshed = identity.refresh(&session.refresh_token).await.unwrap();
        assert!(identity.get_user(&refreshed.access_token).await.is_ok());
        assert!(identity.refresh(&session.refresh_token).await.is_err());
    }

    #[tokio::test]
    async fn gateway_reuses_session_per_order() {
        let gateway = FakeGateway::new();
        let request = CheckoutRequest {
            order_id: Uuid::new_v4(),
            customer_email: "a@example.com".into(),
            product_name: "Mug".into(),
            unit_amount_cents: 100,
            quantity: 1,
            currency: "usd".into(),
            success_url: "http://x/s".into(),
            cancel_url: "http://x/c".into(),
        };
        let first = gateway.create_checkout_session(&request).await.unwrap();
        let second = gateway.create_checkout_session(&request).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.order_id(), Some(request.order_id));

        let paid = gateway.complete(&first.id).await.unwrap();
        assert!(paid.is_paid());
    }
}
