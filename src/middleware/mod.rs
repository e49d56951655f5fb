//! HTTP middleware components.
//!
//! Middleware are functions that run before route handlers.
//! They can:
//! - Authenticate requests
//! - Attach per-browser tokens
//! - Short-circuit requests (redirect anonymous visitors to the login page)

/// Cookie helpers shared by the middleware and the auth handlers
pub mod cookies;
/// Double-submit CSRF tokens for forms
pub mod csrf;
/// Session authentication against the hosted auth platform
pub mod session;
