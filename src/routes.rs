//! Router assembly.
//!
//! # Route Groups
//!
//! - Public: `/health`, `/webhooks/payments`, `/api/v1/products`
//! - Pages (CSRF cookie issued): `/`, `/products/{id}`, `/login`, `/signup`, `/logout`
//! - Session pages: `/account`, `/checkout`, `/checkout/success`, `/checkout/cancel`
//! - Session API: `/api/v1/orders`

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::{
    app_state::AppState,
    handlers,
    middleware::{csrf::csrf_middleware, session::session_middleware},
};

/// Build the application router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Pages that need a signed-in user
    let session_pages = Router::new()
        .route("/account", get(handlers::account::account_page))
        .route("/checkout", post(handlers::checkout::create_checkout))
        .route(
            "/checkout/success",
            get(handlers::checkout::checkout_success),
        )
        .route("/checkout/cancel", get(handlers::checkout::checkout_cancel))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            session_middleware,
        ));

    let pages = Router::new()
        .route("/", get(handlers::catalog::index))
        .route("/products/{id}", get(handlers::catalog::product_page))
        .route(
            "/login",
            get(handlers::auth::login_page).post(handlers::auth::login),
        )
        .route(
            "/signup",
            get(handlers::auth::signup_page).post(handlers::auth::signup),
        )
        .route("/logout", post(handlers::auth::logout))
        .merge(session_pages)
        // Every page gets a CSRF token, including the session-protected ones
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            csrf_middleware,
        ));

    let api = Router::new()
        .route("/api/v1/orders", get(handlers::account::list_orders))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            session_middleware,
        ))
        // Added after route_layer so it stays public
        .route("/api/v1/products", get(handlers::catalog::list_products));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/webhooks/payments",
            post(handlers::webhooks::payment_webhook),
        )
        .merge(pages)
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
