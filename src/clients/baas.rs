//! Client for the hosted database/auth platform.
//!
//! The platform exposes two HTTP APIs under one base URL:
//! - `/rest/v1/<table>`: row access with filters in the query string
//!   (`id=eq.<uuid>`, `order=created_at.desc`), authorized with the service key
//! - `/auth/v1/*`: sign-up, password and refresh-token grants, user lookup, logout,
//!   authorized with the anon key plus the user's access token where relevant

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::json;
use uuid::Uuid;

use crate::clients::{IdentityProvider, Store};
use crate::config::Config;
use crate::error::AppError;
use crate::models::{
    order::{Order, OrderStatus},
    product::Product,
    user::{AuthSession, SignUpOutcome, User},
};

const SERVICE: &str = "database platform";

/// HTTP client for the hosted platform.
///
/// Cloning is cheap; the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct BaasClient {
    http: Client,
    base_url: String,
    anon_key: String,
    service_key: String,
}

impl BaasClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.baas_url.trim_end_matches('/').to_string(),
            anon_key: config.baas_anon_key.clone(),
            service_key: config.baas_service_key.clone(),
        })
    }

    /// Request against a table, authorized as the server.
    fn table(&self, method: reqwest::Method, table: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/rest/v1/{}", self.base_url, table))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    /// Request against the auth API with the public key.
    fn auth(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/auth/v1/{}", self.base_url, path))
            .header("apikey", &self.anon_key)
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<AuthSession, AppError> {
        let response = self
            .auth(reqwest::Method::POST, "token")
            .query(&[("grant_type", grant_type)])
            .json(&body)
            .send()
            .await?;

        match response.status() {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                Err(AppError::InvalidCredentials)
            }
            _ => Ok(ensure_success(response).await?.json().await?),
        }
    }

    /// PATCH `orders` rows matching `filters` and return the changed rows.
    async fn update_orders(
        &self,
        filters: &[(&str, String)],
        changes: serde_json::Value,
    ) -> Result<Option<Order>, AppError> {
        let response = self
            .table(reqwest::Method::PATCH, "orders")
            .query(filters)
            .header("Prefer", "return=representation")
            .json(&changes)
            .send()
            .await?;

        let rows: Vec<Order> = ensure_success(response).await?.json().await?;
        Ok(rows.into_iter().next())
    }

    async fn select_orders(&self, filters: &[(&str, String)]) -> Result<Vec<Order>, AppError> {
        let response = self
            .table(reqwest::Method::GET, "orders")
            .query(&[("select", "*".to_string())])
            .query(filters)
            .send()
            .await?;

        Ok(ensure_success(response).await?.json().await?)
    }
}

/// Turn a non-success response into `AppError::Upstream`.
async fn ensure_success(response: Response) -> Result<Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    tracing::warn!(%status, %message, "database platform request failed");
    Err(AppError::Upstream {
        service: SERVICE,
        status: status.as_u16(),
        message,
    })
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

#[async_trait]
impl Store for BaasClient {
    async fn ping(&self) -> Result<(), AppError> {
        let response = self
            .table(reqwest::Method::GET, "products")
            .query(&[("select", "id"), ("limit", "1")])
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn list_products(&self) -> Result<Vec<Product>, AppError> {
        let response = self
            .table(reqwest::Method::GET, "products")
            .query(&[
                ("select", "*"),
                ("active", "eq.true"),
                ("order", "created_at.desc"),
            ])
            .send()
            .await?;

        Ok(ensure_success(response).await?.json().await?)
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, AppError> {
        let response = self
            .table(reqwest::Method::GET, "products")
            .query(&[("select", "*".to_string()), ("id", eq(id))])
            .send()
            .await?;

        let rows: Vec<Product> = ensure_success(response).await?.json().await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_order(&self, order: &Order) -> Result<Order, AppError> {
        let response = self
            .table(reqwest::Method::POST, "orders")
            .header("Prefer", "return=representation")
            .json(order)
            .send()
            .await?;

        let rows: Vec<Order> = ensure_success(response).await?.json().await?;
        rows.into_iter().next().ok_or_else(|| AppError::Upstream {
            service: SERVICE,
            status: 200,
            message: "insert returned no rows".to_string(),
        })
    }

    async fn set_checkout_session(
        &self,
        order_id: Uuid,
        session_id: &str,
    ) -> Result<Option<Order>, AppError> {
        self.update_orders(
            &[("id", eq(order_id))],
            json!({ "checkout_session_id": session_id, "updated_at": Utc::now() }),
        )
        .await
    }

    async fn transition_order(
        &self,
        order_id: Uuid,
        to: OrderStatus,
        payment_intent_id: Option<&str>,
    ) -> Result<Option<Order>, AppError> {
        let mut changes = json!({ "status": to, "updated_at": Utc::now() });
        if let Some(intent) = payment_intent_id {
            changes["payment_intent_id"] = json!(intent);
        }

        // The status filter makes the update a compare-and-set on the platform side
        self.update_orders(
            &[
                ("id", eq(order_id)),
                ("status", eq(OrderStatus::Pending)),
            ],
            changes,
        )
        .await
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, AppError> {
        Ok(self
            .select_orders(&[("id", eq(id))])
            .await?
            .into_iter()
            .next())
    }

    async fn find_order_by_session(&self, session_id: &str) -> Result<Option<Order>, AppError> {
        Ok(self
            .select_orders(&[("checkout_session_id", eq(session_id))])
            .await?
            .into_iter()
            .next())
    }

    async fn list_orders(&self, user_id: Uuid) -> Result<Vec<Order>, AppError> {
        self.select_orders(&[
            ("user_id", eq(user_id)),
            ("order", "created_at.desc".to_string()),
        ])
        .await
    }
}

#[async_trait]
impl IdentityProvider for BaasClient {
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AppError> {
        let response = self
            .auth(reqwest::Method::POST, "signup")
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            // Already registered or password policy failure
            let message = response.text().await.unwrap_or_default();
            return Err(AppError::InvalidRequest(signup_error_message(&message)));
        }

        let body: serde_json::Value = ensure_success(response).await?.json().await?;

        // With email confirmation enabled the platform returns a bare user
        if body.get("access_token").is_some() {
            Ok(SignUpOutcome::SignedIn(serde_json::from_value(body)?))
        } else {
            Ok(SignUpOutcome::ConfirmationRequired(serde_json::from_value(
                body,
            )?))
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AppError> {
        self.token_grant("password", json!({ "email": email, "password": password }))
            .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AppError> {
        self.token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
    }

    async fn get_user(&self, access_token: &str) -> Result<User, AppError> {
        let response = self
            .auth(reqwest::Method::GET, "user")
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AppError::Unauthenticated),
            _ => Ok(ensure_success(response).await?.json().await?),
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AppError> {
        let response = self
            .auth(reqwest::Method::POST, "logout")
            .bearer_auth(access_token)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}

/// Pull the human-readable message out of an auth error body.
fn signup_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["msg", "error_description", "message"]
                .iter()
                .find_map(|key| v.get(*key).and_then(|m| m.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| "Could not create account".to_string())
}
