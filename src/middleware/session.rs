//! Session authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Find the access token (session cookie, or `Authorization: Bearer` for API clients)
//! 2. Ask the hosted auth platform who the token belongs to
//! 3. Refresh an expired cookie session once with the refresh-token cookie
//! 4. Inject `AuthContext` into the request
//! 5. Reject the rest: 401 JSON under `/api/`, redirect to `/login` elsewhere

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION, header::SET_COOKIE},
    middleware::Next,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};

use crate::{
    app_state::AppState,
    error::AppError,
    middleware::cookies,
    models::user::{AuthSession, User},
};

/// Authentication context attached to authenticated requests.
///
/// Handlers extract it with `Extension<AuthContext>`.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,

    /// Token the request was authenticated with (used for logout).
    pub access_token: String,
}

enum TokenSource {
    Bearer(String),
    Cookie(String),
}

fn find_token(headers: &HeaderMap, cookie_name: &str) -> Option<TokenSource> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| TokenSource::Bearer(t.trim().to_string()));

    bearer.or_else(|| cookies::read(headers, cookie_name).map(TokenSource::Cookie))
}

/// Resolve the caller, refreshing a cookie session if needed.
///
/// Returns the context plus the new session when a refresh happened.
async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<(AuthContext, Option<AuthSession>), AppError> {
    let source =
        find_token(headers, &state.config.session_cookie).ok_or(AppError::Unauthenticated)?;

    let (token, can_refresh) = match source {
        TokenSource::Bearer(token) => (token, false),
        TokenSource::Cookie(token) => (token, true),
    };

    match state.identity.get_user(&token).await {
        Ok(user) => Ok((
            AuthContext {
                user,
                access_token: token,
            },
            None,
        )),
        Err(AppError::Unauthenticated) if can_refresh => {
            let refresh_token = cookies::read(headers, &state.config.refresh_cookie())
                .ok_or(AppError::Unauthenticated)?;

            let session = state
                .identity
                .refresh(&refresh_token)
                .await
                .map_err(|e| match e {
                    AppError::InvalidCredentials => AppError::Unauthenticated,
                    other => other,
                })?;

            tracing::debug!(user_id = %session.user.id, "session refreshed");
            Ok((
                AuthContext {
                    user: session.user.clone(),
                    access_token: session.access_token.clone(),
                },
                Some(session),
            ))
        }
        Err(e) => Err(e),
    }
}

/// Session middleware function.
///
/// # Returns
///
/// - The handler's response, with re-issued cookies after a refresh
/// - `401` JSON for unauthenticated `/api/` requests
/// - `303 See Other` to `/login` for unauthenticated page requests,
///   clearing stale session cookies
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let is_api = request.uri().path().starts_with("/api/");

    let outcome = authenticate(&state, request.headers()).await;

    match outcome {
        Ok((auth, refreshed)) => {
            request.extensions_mut().insert(auth);
            let response = next.run(request).await;

            match refreshed {
                Some(session) => {
                    let [access, refresh] = cookies::session(&state.config, &session);
                    (
                        AppendHeaders([(SET_COOKIE, access), (SET_COOKIE, refresh)]),
                        response,
                    )
                        .into_response()
                }
                None => response,
            }
        }
        Err(AppError::Unauthenticated) if is_api => AppError::Unauthenticated.into_response(),
        Err(AppError::Unauthenticated) => {
            let had_cookie = cookies::read(request.headers(), &state.config.session_cookie)
                .is_some();
            if had_cookie {
                let [access, refresh] = cookies::clear_session(&state.config);
                (
                    AppendHeaders([(SET_COOKIE, access), (SET_COOKIE, refresh)]),
                    Redirect::to("/login"),
                )
                    .into_response()
            } else {
                Redirect::to("/login").into_response()
            }
        }
        Err(e) => e.into_response(),
    }
}

/// Identify the caller without requiring a session.
///
/// Public pages use this to show the signed-in user. Expired sessions are
/// treated as anonymous.
pub async fn optional_user(state: &AppState, headers: &HeaderMap) -> Option<User> {
    let token = cookies::read(headers, &state.config.session_cookie)?;
    match state.identity.get_user(&token).await {
        Ok(user) => Some(user),
        Err(AppError::Unauthenticated) => None,
        Err(e) => {
            tracing::warn!(error = %e, "could not resolve session user");
            None
        }
    }
}
