//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (form body, URL params, session context)
//! 2. Calls the hosted services through `clients` or a service in `services`
//! 3. Returns an HTML page, a redirect, or JSON

use tera::Context;

use crate::{middleware::csrf::CsrfToken, models::user::User};

/// Account and order history
pub mod account;
/// Login, sign-up and logout
pub mod auth;
/// Product listing and detail pages
pub mod catalog;
/// Checkout start and return pages
pub mod checkout;
/// Service health
pub mod health;
/// Payment processor callbacks
pub mod webhooks;

/// Template context with the variables every page layout reads.
pub(crate) fn page_context(user: Option<&User>, csrf: &CsrfToken) -> Context {
    let mut context = Context::new();
    context.insert("user", &user);
    context.insert("csrf_token", &csrf.0);
    context
}
