//! Catalog handlers.
//!
//! - GET / - Product listing page
//! - GET /products/{id} - Product detail page with the buy form
//! - GET /api/v1/products - Product listing as JSON

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::HeaderMap,
    response::Html,
};
use uuid::Uuid;

use crate::{
    app_state::AppState,
    error::AppError,
    handlers::page_context,
    middleware::{csrf::CsrfToken, session::optional_user},
    models::{order::MAX_QUANTITY, product::Product},
};

/// Catalog page.
///
/// Lists active products, newest first.
pub async fn index(
    State(state): State<AppState>,
    Extension(csrf): Extension<CsrfToken>,
    headers: HeaderMap,
) -> Result<Html<String>, AppError> {
    let user = optional_user(&state, &headers).await;
    let products = state.store.list_products().await?;

    let mut context = page_context(user.as_ref(), &csrf);
    context.insert("products", &products);
    state.templates.render("index.html", &context)
}

/// Product detail page.
///
/// # Response
///
/// - **Success (200 OK)**: product page, with a buy form for signed-in users
/// - **Error (404)**: product missing or no longer for sale
pub async fn product_page(
    State(state): State<AppState>,
    Extension(csrf): Extension<CsrfToken>,
    headers: HeaderMap,
    Path(product_id): Path<Uuid>,
) -> Result<Html<String>, AppError> {
    let product = state
        .store
        .get_product(product_id)
        .await?
        .filter(|p| p.active)
        .ok_or(AppError::ProductNotFound)?;
    let user = optional_user(&state, &headers).await;

    let mut context = page_context(user.as_ref(), &csrf);
    context.insert("product", &product);
    context.insert("max_quantity", &MAX_QUANTITY);
    state.templates.render("product.html", &context)
}

/// List active products as JSON.
///
/// # Endpoint
///
/// `GET /api/v1/products` (public)
///
/// ```json
/// [
///   {
///     "id": "550e8400-e29b-41d4-a716-446655440000",
///     "name": "Mug",
///     "description": "Ceramic, 350 ml",
///     "price_cents": 1250,
///     "currency": "usd",
///     "image_url": null,
///     "active": true,
///     "created_at": "2025-12-20T10:00:00Z"
///   }
/// ]
/// ```
pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(state.store.list_products().await?))
}
