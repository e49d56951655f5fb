#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, header},
};
use chrono::Utc;
use storefront::{
    app_state::AppState,
    clients::memory::{FakeGateway, InMemoryIdentity, InMemoryStore},
    config::Config,
    models::product::Product,
    routes::build_router,
    templates::Templates,
};
use tower::ServiceExt;
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const CSRF: &str = "test-csrf-token";
pub const EMAIL: &str = "buyer@example.com";
pub const PASSWORD: &str = "correct horse";

pub struct TestApp {
    pub router: Router,
    pub store: InMemoryStore,
    pub identity: InMemoryIdentity,
    pub gateway: FakeGateway,
    pub product: Product,
}

pub fn config() -> Config {
    Config::from_vars(
        [
            ("BAAS_URL", "https://project.baas.example"),
            ("BAAS_ANON_KEY", "anon"),
            ("BAAS_SERVICE_KEY", "service"),
            ("PAYMENT_SECRET_KEY", "sk_test"),
            ("PAYMENT_WEBHOOK_SECRET", WEBHOOK_SECRET),
            ("PUBLIC_BASE_URL", "http://localhost:3000"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string())),
    )
    .unwrap()
}

pub fn product(name: &str, price_cents: i64, active: bool) -> Product {
    Product {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: Some(format!("A fine {name}")),
        price_cents,
        currency: "usd".to_string(),
        image_url: None,
        active,
        created_at: Utc::now(),
    }
}

pub async fn setup_with(identity: InMemoryIdentity) -> TestApp {
    let store = InMemoryStore::new();
    let gateway = FakeGateway::new();
    let product = product("Mug", 1250, true);
    store.add_product(product.clone()).await;
    store.add_product(self::product("Retired Lamp", 900, false)).await;
    identity.register(EMAIL, PASSWORD).await;

    let state = AppState {
        config: Arc::new(config()),
        store: Arc::new(store.clone()),
        identity: Arc::new(identity.clone()),
        payments: Arc::new(gateway.clone()),
        templates: Arc::new(Templates::new().unwrap()),
    };

    TestApp {
        router: build_router(state),
        store,
        identity,
        gateway,
        product,
    }
}

pub async fn setup() -> TestApp {
    setup_with(InMemoryIdentity::new()).await
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Sign in through the identity provider and return the access and refresh tokens.
    pub async fn session(&self) -> (String, String) {
        use storefront::clients::IdentityProvider;
        let session = self.identity.sign_in(EMAIL, PASSWORD).await.unwrap();
        (session.access_token, session.refresh_token)
    }
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_form(uri: &str, cookie: &str, form: &str) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::COOKIE, cookie)
        .body(Body::from(form.to_string()))
        .unwrap()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}
