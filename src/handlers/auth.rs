//! Login, sign-up and logout handlers.
//!
//! Credentials never touch the storefront's storage: they are forwarded to
//! the hosted auth platform, and the returned tokens live in `HttpOnly` cookies.

use axum::{
    Extension, Form,
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};

use crate::{
    app_state::AppState,
    config::Config,
    error::AppError,
    handlers::page_context,
    middleware::{
        cookies,
        csrf::{self, CsrfToken},
        session::optional_user,
    },
    models::user::{AuthSession, CredentialsForm, SignUpOutcome},
};

/// Set session cookies and send the user to their account page.
fn signed_in(config: &Config, session: &AuthSession) -> Response {
    let [access, refresh] = cookies::session(config, session);
    tracing::info!(user_id = %session.user.id, "user signed in");
    (
        AppendHeaders([(SET_COOKIE, access), (SET_COOKIE, refresh)]),
        Redirect::to("/account"),
    )
        .into_response()
}

fn render_login(
    state: &AppState,
    csrf: &CsrfToken,
    status: StatusCode,
    email: &str,
    error: Option<&str>,
    notice: Option<&str>,
) -> Result<Response, AppError> {
    let mut context = page_context(None, csrf);
    context.insert("email", email);
    context.insert("error", &error);
    context.insert("notice", &notice);
    Ok((status, state.templates.render("login.html", &context)?).into_response())
}

fn render_signup(
    state: &AppState,
    csrf: &CsrfToken,
    status: StatusCode,
    email: &str,
    error: Option<&str>,
) -> Result<Response, AppError> {
    let mut context = page_context(None, csrf);
    context.insert("email", email);
    context.insert("error", &error);
    Ok((status, state.templates.render("signup.html", &context)?).into_response())
}

/// `GET /login`
///
/// Signed-in users are sent straight to `/account`.
pub async fn login_page(
    State(state): State<AppState>,
    Extension(csrf): Extension<CsrfToken>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if optional_user(&state, &headers).await.is_some() {
        return Ok(Redirect::to("/account").into_response());
    }
    render_login(&state, &csrf, StatusCode::OK, "", None, None)
}

/// `POST /login`
///
/// # Response
///
/// - **303**: to `/account` with session cookies set
/// - **401**: login form again with an error message
/// - **403**: form token mismatch
pub async fn login(
    State(state): State<AppState>,
    Extension(csrf): Extension<CsrfToken>,
    headers: HeaderMap,
    Form(form): Form<CredentialsForm>,
) -> Result<Response, AppError> {
    csrf::verify(&headers, &form.csrf_token)?;
    let email = form.email.trim();

    match state.identity.sign_in(email, &form.password).await {
        Ok(session) => Ok(signed_in(&state.config, &session)),
        Err(AppError::InvalidCredentials) => render_login(
            &state,
            &csrf,
            StatusCode::UNAUTHORIZED,
            email,
            Some("Invalid email or password"),
            None,
        ),
        Err(e) => Err(e),
    }
}

/// `GET /signup`
pub async fn signup_page(
    State(state): State<AppState>,
    Extension(csrf): Extension<CsrfToken>,
) -> Result<Response, AppError> {
    render_signup(&state, &csrf, StatusCode::OK, "", None)
}

/// `POST /signup`
///
/// # Response
///
/// - **303**: to `/account` when the platform signs the user in right away
/// - **200**: login page asking to confirm the email first
/// - **400**: sign-up form again with the validation or platform message
pub async fn signup(
    State(state): State<AppState>,
    Extension(csrf): Extension<CsrfToken>,
    headers: HeaderMap,
    Form(form): Form<CredentialsForm>,
) -> Result<Response, AppError> {
    csrf::verify(&headers, &form.csrf_token)?;
    let email = form.email.trim();

    if let Err(message) = form.validate_for_signup() {
        return render_signup(
            &state,
            &csrf,
            StatusCode::BAD_REQUEST,
            email,
            Some(message.as_str()),
        );
    }

    match state.identity.sign_up(email, &form.password).await {
        Ok(SignUpOutcome::SignedIn(session)) => Ok(signed_in(&state.config, &session)),
        Ok(SignUpOutcome::ConfirmationRequired(user)) => {
            tracing::info!(user_id = %user.id, "sign-up awaiting email confirmation");
            render_login(
                &state,
                &csrf,
                StatusCode::OK,
                email,
                None,
                Some("Check your email to confirm your account, then log in."),
            )
        }
        Err(AppError::InvalidRequest(message)) => render_signup(
            &state,
            &csrf,
            StatusCode::BAD_REQUEST,
            email,
            Some(message.as_str()),
        ),
        Err(e) => Err(e),
    }
}

/// Form body of `POST /logout`.
#[derive(Debug, serde::Deserialize)]
pub struct LogoutForm {
    #[serde(default)]
    pub csrf_token: String,
}

/// `POST /logout`
///
/// Revokes the session at the auth platform (best effort), clears the cookies
/// and redirects home. Works with an already expired session.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<LogoutForm>,
) -> Result<Response, AppError> {
    csrf::verify(&headers, &form.csrf_token)?;

    if let Some(token) = cookies::read(&headers, &state.config.session_cookie) {
        if let Err(e) = state.identity.sign_out(&token).await {
            tracing::warn!(error = %e, "sign-out at auth platform failed");
        }
    }

    let [access, refresh] = cookies::clear_session(&state.config);
    Ok((
        AppendHeaders([(SET_COOKIE, access), (SET_COOKIE, refresh)]),
        Redirect::to("/"),
    )
        .into_response())
}
