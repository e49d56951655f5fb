//! Checkout handlers.
//!
//! - POST /checkout - Create an order and redirect to the payment page
//! - GET /checkout/success - Landing page after payment
//! - GET /checkout/cancel - Landing page after abandoning payment

use axum::{
    Extension, Form,
    extract::{Query, State, rejection::FormRejection},
    http::HeaderMap,
    response::{Html, Redirect},
};

use crate::{
    app_state::AppState,
    error::AppError,
    handlers::page_context,
    middleware::{
        csrf::{self, CsrfToken},
        session::AuthContext,
    },
    models::{
        order::CheckoutForm,
        payment::{CancelQuery, SuccessQuery},
    },
    services::checkout_service,
};

/// Start a checkout.
///
/// # Request Body (form)
///
/// `product_id=<uuid>&quantity=2&csrf_token=<token>`
///
/// # Response
///
/// - **303**: to the processor's hosted payment page
/// - **400**: quantity out of range, or a field that does not parse
/// - **404**: product missing or inactive
/// - **502**: processor unavailable (the order is marked failed)
pub async fn create_checkout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    form: Result<Form<CheckoutForm>, FormRejection>,
) -> Result<Redirect, AppError> {
    let Form(form) = form?;
    csrf::verify(&headers, &form.csrf_token)?;

    let (_, url) = checkout_service::start_checkout(
        state.store.as_ref(),
        state.payments.as_ref(),
        state.config.base_url(),
        &auth.user,
        form.product_id,
        form.quantity,
    )
    .await?;

    Ok(Redirect::to(&url))
}

/// Page shown after the processor redirects back.
///
/// The order status itself is only changed by the webhook.
pub async fn checkout_success(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(csrf): Extension<CsrfToken>,
    Query(query): Query<SuccessQuery>,
) -> Result<Html<String>, AppError> {
    let (order, processing) = checkout_service::confirm_return(
        state.store.as_ref(),
        state.payments.as_ref(),
        &auth.user,
        &query.session_id,
    )
    .await?;

    let mut context = page_context(Some(&auth.user), &csrf);
    context.insert("order", &order);
    context.insert("processing", &processing);
    state.templates.render("checkout_success.html", &context)
}

/// Page shown when the customer leaves the payment page.
///
/// Cancels the order if it is still pending and its session can be expired.
pub async fn checkout_cancel(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(csrf): Extension<CsrfToken>,
    Query(query): Query<CancelQuery>,
) -> Result<Html<String>, AppError> {
    let order = checkout_service::cancel_checkout(
        state.store.as_ref(),
        state.payments.as_ref(),
        &auth.user,
        query.order_id,
    )
    .await?;

    let mut context = page_context(Some(&auth.user), &csrf);
    context.insert("order", &order);
    state.templates.render("checkout_cancel.html", &context)
}
