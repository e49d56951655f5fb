//! Double-submit CSRF protection for HTML forms.
//!
//! `csrf_middleware` makes sure every browser has a random token cookie and
//! exposes the token to handlers as a [`CsrfToken`] extension. Forms embed the
//! token in a hidden `csrf_token` field; [`verify`] compares field and cookie.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::SET_COOKIE},
    middleware::Next,
    response::{AppendHeaders, IntoResponse, Response},
};

use crate::{app_state::AppState, error::AppError, middleware::cookies};

pub const CSRF_COOKIE: &str = "sf_csrf";

/// Token for the current browser, available to page handlers.
#[derive(Debug, Clone)]
pub struct CsrfToken(pub String);

/// 32 random bytes, hex encoded.
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

pub async fn csrf_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match cookies::read(request.headers(), CSRF_COOKIE) {
        Some(token) => {
            request.extensions_mut().insert(CsrfToken(token));
            next.run(request).await
        }
        None => {
            let token = generate_token();
            request.extensions_mut().insert(CsrfToken(token.clone()));
            let response = next.run(request).await;
            let cookie = cookies::build(
                CSRF_COOKIE,
                &token,
                None,
                state.config.secure_cookies(),
            );
            (AppendHeaders([(SET_COOKIE, cookie)]), response).into_response()
        }
    }
}

/// Check a submitted form token against the cookie.
///
/// # Errors
///
/// `CsrfMismatch` when the cookie is missing or the values differ.
pub fn verify(headers: &HeaderMap, submitted: &str) -> Result<(), AppError> {
    let expected = cookies::read(headers, CSRF_COOKIE).ok_or(AppError::CsrfMismatch)?;
    if constant_time_eq(expected.as_bytes(), submitted.as_bytes()) {
        Ok(())
    } else {
        Err(AppError::CsrfMismatch)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
