//! Payment processor client (Stripe-compatible checkout API).
//!
//! Requests are form-encoded with bracketed keys
//! (`line_items[0][price_data][unit_amount]=1250`) and authorized with the
//! secret key as a bearer token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};

use crate::clients::PaymentGateway;
use crate::config::Config;
use crate::error::AppError;
use crate::models::payment::{CheckoutRequest, CheckoutSession};

const SERVICE: &str = "payment processor";

#[derive(Debug, Clone)]
pub struct StripeClient {
    http: Client,
    api_url: String,
    secret_key: String,
}

impl StripeClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_url: config.payment_api_url.trim_end_matches('/').to_string(),
            secret_key: config.payment_secret_key.clone(),
        })
    }
}

/// Form fields for `POST /v1/checkout/sessions`.
pub fn checkout_form(request: &CheckoutRequest) -> Vec<(&'static str, String)> {
    let order_id = request.order_id.to_string();
    vec![
        ("mode", "payment".to_string()),
        ("success_url", request.success_url.clone()),
        ("cancel_url", request.cancel_url.clone()),
        ("client_reference_id", order_id.clone()),
        ("customer_email", request.customer_email.clone()),
        ("metadata[order_id]", order_id),
        ("line_items[0][quantity]", request.quantity.to_string()),
        (
            "line_items[0][price_data][currency]",
            request.currency.to_lowercase(),
        ),
        (
            "line_items[0][price_data][unit_amount]",
            request.unit_amount_cents.to_string(),
        ),
        (
            "line_items[0][price_data][product_data][name]",
            request.product_name.clone(),
        ),
    ]
}

async fn ensure_success(response: Response) -> Result<Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    tracing::warn!(%status, %message, "payment processor request failed");
    Err(AppError::Upstream {
        service: SERVICE,
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, AppError> {
        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_url))
            .bearer_auth(&self.secret_key)
            // Retrying the same order never opens a second session
            .header("Idempotency-Key", format!("order-{}", request.order_id))
            .form(&checkout_form(request))
            .send()
            .await?;

        let session: CheckoutSession = ensure_success(response).await?.json().await?;
        tracing::info!(order_id = %request.order_id, session_id = %session.id, "checkout session created");
        Ok(session)
    }

    async fn retrieve_checkout_session(&self, id: &str) -> Result<CheckoutSession, AppError> {
        let response = self
            .http
            .get(format!("{}/v1/checkout/sessions/{}", self.api_url, id))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        Ok(ensure_success(response).await?.json().await?)
    }

    async fn expire_checkout_session(&self, id: &str) -> Result<CheckoutSession, AppError> {
        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions/{}/expire", self.api_url, id))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        let session: CheckoutSession = ensure_success(response).await?.json().await?;
        tracing::info!(session_id = %session.id, "checkout session expired");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use axum::{
        Form, Json, Router,
        extract::Path,
        http::{HeaderMap, StatusCode},
        routing::post,
    };
    use serde_json::json;
    use tokio::sync::Mutex;
    use uuid::Uuid;

    fn request(order_id: Uuid) -> CheckoutRequest {
        CheckoutRequest {
            order_id,
            customer_email: "buyer@example.com".into(),
            product_name: "Mug".into(),
            unit_amount_cents: 1250,
            quantity: 2,
            currency: "USD".into(),
            success_url: "http://localhost:3000/checkout/success".into(),
            cancel_url: "http://localhost:3000/checkout/cancel".into(),
        }
    }

    /// Serve `router` on a local port and point a client at it.
    async fn client_for(router: Router) -> StripeClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let config = Config::from_vars(
            [
                ("BAAS_URL", "https://project.baas.example".to_string()),
                ("BAAS_ANON_KEY", "anon".to_string()),
                ("BAAS_SERVICE_KEY", "service".to_string()),
                ("PAYMENT_API_URL", format!("http://{addr}")),
                ("PAYMENT_SECRET_KEY", "sk_test_123".to_string()),
                ("PAYMENT_WEBHOOK_SECRET", "whsec_test".to_string()),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v)),
        )
        .unwrap();
        StripeClient::new(&config).unwrap()
    }

    #[test]
    fn checkout_form_carries_order_reference_and_line_item() {
        let order_id = Uuid::new_v4();
        let form = checkout_form(&request(order_id));
        let get = |key: &str| {
            form.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("mode"), Some("payment"));
        assert_eq!(get("metadata[order_id]"), Some(order_id.to_string().as_str()));
        assert_eq!(get("client_reference_id"), Some(order_id.to_string().as_str()));
        assert_eq!(get("line_items[0][price_data][currency]"), Some("usd"));
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("1250"));
        assert_eq!(get("line_items[0][quantity]"), Some("2"));
    }

    #[tokio::test]
    async fn create_session_is_idempotent_per_order() {
        let seen: Arc<Mutex<Option<(HeaderMap, HashMap<String, String>)>>> =
            Arc::new(Mutex::new(None));
        let captured = seen.clone();
        let router = Router::new().route(
            "/v1/checkout/sessions",
            post(
                move |headers: HeaderMap, Form(form): Form<HashMap<String, String>>| {
                    let captured = captured.clone();
                    async move {
                        *captured.lock().await = Some((headers, form));
                        Json(json!({
                            "id": "cs_test_1",
                            "object": "checkout.session",
                            "url": "https://checkout.example/c/cs_test_1",
                            "status": "open",
                            "payment_status": "unpaid",
                            "amount_total": 2500
                        }))
                    }
                },
            ),
        );
        let client = client_for(router).await;
        let order_id = Uuid::new_v4();

        let session = client
            .create_checkout_session(&request(order_id))
            .await
            .unwrap();
        assert_eq!(session.id, "cs_test_1");
        assert_eq!(session.amount_total, Some(2500));

        let (headers, form) = seen.lock().await.take().unwrap();
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        assert_eq!(
            header("idempotency-key"),
            Some(format!("order-{order_id}").as_str())
        );
        assert_eq!(header("authorization"), Some("Bearer sk_test_123"));
        assert_eq!(
            form.get("metadata[order_id]"),
            Some(&order_id.to_string())
        );
        assert_eq!(
            form.get("line_items[0][price_data][product_data][name]").map(String::as_str),
            Some("Mug")
        );
    }

    #[tokio::test]
    async fn expire_posts_to_session_and_reports_refusal() {
        let router = Router::new().route(
            "/v1/checkout/sessions/{id}/expire",
            post(|Path(id): Path<String>| async move {
                if id == "cs_paid" {
                    return Err((
                        StatusCode::BAD_REQUEST,
                        "Only Checkout Sessions with a status of `open` can be expired.",
                    ));
                }
                Ok(Json(json!({ "id": id, "url": null, "status": "expired" })))
            }),
        );
        let client = client_for(router).await;

        let expired = client.expire_checkout_session("cs_open").await.unwrap();
        assert_eq!(expired.status.as_deref(), Some("expired"));
        assert!(expired.url.is_none());

        assert!(matches!(
            client.expire_checkout_session("cs_paid").await,
            Err(AppError::Upstream { status: 400, .. })
        ));
    }
}
