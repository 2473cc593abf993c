/// Authentication Routes
///
/// Registration, login, logout, access-token refresh and the current
/// subject. Only `/auth/me` sits behind the authorization middleware.

use actix_web::{http::header::AUTHORIZATION, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{bearer_token, Claims, TokenService};
use crate::error::{AppError, ErrorContext, ValidationError};
use crate::store::StorePool;
use crate::validators::is_valid_email;

/// Body of both register and login
#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenResponse {
    pub access_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUserResponse {
    pub subject_id: i64,
    pub email: String,
    pub expires_at: i64,
}

/// POST /auth/register
///
/// # Errors
/// - 400: missing/invalid email or password, or email already registered
/// - 503: no backing-store handle available
pub async fn register(
    form: web::Json<CredentialsRequest>,
    tokens: web::Data<TokenService>,
    store: web::Data<StorePool>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration");

    let email = is_valid_email(&form.email)?;
    if form.password.is_empty() {
        return Err(ValidationError::EmptyField("password".to_string()).into());
    }

    let lease = store.acquire().await?;
    let subject_id = tokens
        .register(&lease, &email, &form.password)
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    tracing::info!(
        request_id = %context.request_id,
        subject_id = subject_id,
        "User registered successfully"
    );

    Ok(HttpResponse::Created().json(MessageResponse {
        message: "User created",
    }))
}

/// POST /auth/login
///
/// Unknown email and wrong password both answer 400 "Invalid email or
/// password".
pub async fn login(
    form: web::Json<CredentialsRequest>,
    tokens: web::Data<TokenService>,
    store: web::Data<StorePool>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");

    let lease = store.acquire().await?;
    let pair = tokens
        .login(&lease, form.email.trim(), &form.password)
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    Ok(HttpResponse::Ok().json(pair))
}

/// POST /auth/logout
///
/// Revokes the bearer access token and the body's `refreshToken`, whichever
/// are present. Neither is verified first; the call always succeeds.
pub async fn logout(
    req: HttpRequest,
    body: Option<web::Json<LogoutRequest>>,
    tokens: web::Data<TokenService>,
) -> HttpResponse {
    let access_token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token);
    let refresh_token = body
        .as_ref()
        .and_then(|body| body.refresh_token.as_deref())
        .filter(|token| !token.is_empty());

    tokens.logout(access_token, refresh_token);

    HttpResponse::Ok().json(MessageResponse {
        message: "Logged out",
    })
}

/// POST /auth/refresh
///
/// # Errors
/// - 400: `refreshToken` missing
/// - 401: "Refresh token blacklisted" or "Invalid refresh token"; the
///   latter also revokes the presented token
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    tokens: web::Data<TokenService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh");

    if form.refresh_token.is_empty() {
        return Err(ValidationError::EmptyField("refreshToken".to_string()).into());
    }

    let access_token = tokens.refresh(&form.refresh_token).map_err(|e| {
        context.log_error(&e);
        e
    })?;

    Ok(HttpResponse::Ok().json(AccessTokenResponse { access_token }))
}

/// GET /auth/me
///
/// **Requires a valid access token**; claims are injected by the
/// authorization middleware.
pub async fn current_user(claims: web::ReqData<Claims>) -> HttpResponse {
    let claims = claims.into_inner();
    HttpResponse::Ok().json(CurrentUserResponse {
        subject_id: claims.subject_id(),
        email: claims.email,
        expires_at: claims.exp,
    })
}
