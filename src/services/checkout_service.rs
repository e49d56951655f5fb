//! Checkout service - order creation and hand-off to the payment processor.
//!
//! # Flow
//!
//! 1. Validate product and quantity, compute the total
//! 2. Record a `pending` order in the hosted database
//! 3. Open a checkout session at the processor
//! 4. Link the session to the order and return the hosted payment URL
//!
//! Payment confirmation arrives later through the webhook; the return pages
//! only read state.

use uuid::Uuid;

use crate::{
    clients::{PaymentGateway, Store},
    error::AppError,
    models::{
        order::{Order, OrderStatus},
        payment::CheckoutRequest,
        user::User,
    },
};

/// Start a checkout for `quantity` units of a product.
///
/// # Returns
///
/// The created order and the URL of the processor's payment page.
///
/// # Errors
///
/// - `ProductNotFound`: product missing or inactive
/// - `InvalidRequest`: quantity out of range or total overflow
/// - Upstream errors. A processor failure leaves the order `failed`.
pub async fn start_checkout(
    store: &dyn Store,
    payments: &dyn PaymentGateway,
    base_url: &str,
    user: &User,
    product_id: Uuid,
    quantity: i32,
) -> Result<(Order, String), AppError> {
    let product = store
        .get_product(product_id)
        .await?
        .filter(|p| p.active)
        .ok_or(AppError::ProductNotFound)?;

    let order = Order::new_pending(user.id, &product, quantity).map_err(AppError::InvalidRequest)?;
    let order = store.insert_order(&order).await?;

    let request = CheckoutRequest {
        order_id: order.id,
        customer_email: user.email.clone(),
        product_name: product.name.clone(),
        unit_amount_cents: product.price_cents,
        quantity: order.quantity,
        currency: order.currency.clone(),
        // The processor substitutes {CHECKOUT_SESSION_ID} itself
        success_url: format!("{base_url}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}"),
        cancel_url: format!("{base_url}/checkout/cancel?order_id={}", order.id),
    };

    let session = match payments.create_checkout_session(&request).await {
        Ok(session) => session,
        Err(e) => {
            if let Err(mark_err) = store
                .transition_order(order.id, OrderStatus::Failed, None)
                .await
            {
                tracing::error!(order_id = %order.id, error = %mark_err, "could not mark order failed");
            }
            return Err(e);
        }
    };

    let order = store
        .set_checkout_session(order.id, &session.id)
        .await?
        .ok_or(AppError::OrderNotFound)?;

    let url = session.url.ok_or_else(|| AppError::Upstream {
        service: "payment processor",
        status: 200,
        message: format!("checkout session {} has no payment URL", session.id),
    })?;

    tracing::info!(order_id = %order.id, user_id = %user.id, amount_cents = order.amount_cents, "checkout started");
    Ok((order, url))
}

/// Order status shown when the customer returns from the payment page.
///
/// # Returns
///
/// The order, and whether the processor already reports it paid while the
/// webhook has not arrived yet.
///
/// # Errors
///
/// `OrderNotFound` when the session belongs to no order of this user.
pub async fn confirm_return(
    store: &dyn Store,
    payments: &dyn PaymentGateway,
    user: &User,
    session_id: &str,
) -> Result<(Order, bool), AppError> {
    let order = store
        .find_order_by_session(session_id)
        .await?
        .filter(|o| o.user_id == user.id)
        .ok_or(AppError::OrderNotFound)?;

    if order.status != OrderStatus::Pending {
        return Ok((order, false));
    }

    // Informational only; the webhook decides the order status
    let processing = match payments.retrieve_checkout_session(session_id).await {
        Ok(session) => session.is_paid(),
        Err(e) => {
            tracing::warn!(session_id, error = %e, "could not retrieve checkout session");
            false
        }
    };
    Ok((order, processing))
}

/// Cancel a pending order after the customer left the payment page.
///
/// The processor session is expired first so it can no longer be paid. When
/// that fails (the customer paid meanwhile, or the processor is unreachable)
/// the order stays `pending` and the webhook settles it. Settled orders are
/// returned unchanged.
///
/// # Errors
///
/// `OrderNotFound` when the order does not exist or belongs to someone else.
pub async fn cancel_checkout(
    store: &dyn Store,
    payments: &dyn PaymentGateway,
    user: &User,
    order_id: Uuid,
) -> Result<Order, AppError> {
    let order = store
        .get_order(order_id)
        .await?
        .filter(|o| o.user_id == user.id)
        .ok_or(AppError::OrderNotFound)?;

    if order.status.is_terminal() {
        return Ok(order);
    }

    if let Some(session_id) = order.checkout_session_id.as_deref() {
        if let Err(e) = payments.expire_checkout_session(session_id).await {
            tracing::warn!(order_id = %order.id, session_id, error = %e, "could not expire checkout session, order left pending");
            return Ok(order);
        }
    }

    match store
        .transition_order(order.id, OrderStatus::Cancelled, None)
        .await?
    {
        Some(cancelled) => {
            tracing::info!(order_id = %cancelled.id, "order cancelled by customer");
            Ok(cancelled)
        }
        // Settled concurrently, e.g. by a webhook
        None => store
            .get_order(order.id)
            .await?
            .ok_or(AppError::OrderNotFound),
    }
}
