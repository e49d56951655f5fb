//! Account handlers.
//!
//! - GET /account - Order history page
//! - GET /api/v1/orders - Order history as JSON

use axum::{Extension, Json, extract::State, response::Html};

use crate::{
    app_state::AppState,
    error::AppError,
    handlers::page_context,
    middleware::{csrf::CsrfToken, session::AuthContext},
    models::order::OrderResponse,
};

/// Order history page of the signed-in user, newest first.
pub async fn account_page(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(csrf): Extension<CsrfToken>,
) -> Result<Html<String>, AppError> {
    let orders = state.store.list_orders(auth.user.id).await?;

    let mut context = page_context(Some(&auth.user), &csrf);
    context.insert("orders", &orders);
    state.templates.render("account.html", &context)
}

/// List orders of the authenticated user.
///
/// # Endpoint
///
/// `GET /api/v1/orders`
///
/// # Authentication
///
/// Session cookie or `Authorization: Bearer <access token>`.
///
/// # Response
///
/// - **Success (200 OK)**: array of orders (may be empty)
/// - **Error (401)**: no valid session
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<OrderResponse>>, AppError> {
    let orders = state.store.list_orders(auth.user.id).await?;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}
