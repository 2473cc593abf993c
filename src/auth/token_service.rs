/// Credential lifecycle
///
/// Issues, verifies and revokes access/refresh token pairs. There is no
/// server-side token table: a token is honored iff its signature and expiry
/// check out and its purpose's revocation filter has not seen it.
///
/// Per token: `issued -> valid -> {expired | revoked}`. Revocation is
/// irreversible for the lifetime of the process and is driven by `logout`
/// or by a failed `refresh`.

use serde::Serialize;

use crate::auth::claims::{Claims, TokenPurpose};
use crate::auth::jwt::{generate_token, validate_token};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::revocation::RevocationFilter;
use crate::configuration::{JwtSettings, RevocationSettings};
use crate::error::{AppError, AuthError, DatabaseError};
use crate::store::{users, StoreHandle};

/// Tokens handed out on login
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct TokenService {
    settings: JwtSettings,
    access_revocations: RevocationFilter,
    refresh_revocations: RevocationFilter,
}

impl TokenService {
    /// Build the service with one independently sized filter per token
    /// purpose; access and refresh revocations never share bit space.
    pub fn new(settings: JwtSettings, revocation: &RevocationSettings) -> Self {
        Self::with_filters(
            settings,
            RevocationFilter::from_settings(revocation),
            RevocationFilter::from_settings(revocation),
        )
    }

    pub fn with_filters(
        settings: JwtSettings,
        access_revocations: RevocationFilter,
        refresh_revocations: RevocationFilter,
    ) -> Self {
        Self {
            settings,
            access_revocations,
            refresh_revocations,
        }
    }

    pub fn settings(&self) -> &JwtSettings {
        &self.settings
    }

    fn filter(&self, purpose: TokenPurpose) -> &RevocationFilter {
        match purpose {
            TokenPurpose::Access => &self.access_revocations,
            TokenPurpose::Refresh => &self.refresh_revocations,
        }
    }

    /// Create an account. One account per email, compared case-sensitively.
    ///
    /// The connection is only locked around the queries, never across the
    /// bcrypt hash, so a handle shared under pool exhaustion is not stalled.
    ///
    /// # Errors
    /// `AuthError::Conflict` if the email is taken.
    pub async fn register(
        &self,
        store: &StoreHandle,
        email: &str,
        password: &str,
    ) -> Result<i64, AppError> {
        let existing = users::find_by_email(&mut *store.lock().await, email).await?;
        if existing.is_some() {
            return Err(AuthError::Conflict.into());
        }

        let cost = self.settings.hash_cost;
        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password, cost))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))??;

        // A concurrent registration can still win between lookup and insert.
        let subject_id = users::insert(&mut *store.lock().await, email, &password_hash)
            .await
            .map_err(|e| match e {
                AppError::Database(DatabaseError::UniqueConstraintViolation(_)) => {
                    AppError::Auth(AuthError::Conflict)
                }
                other => other,
            })?;

        tracing::info!(subject_id = subject_id, "Account registered");
        Ok(subject_id)
    }

    /// Verify credentials and mint an access/refresh pair.
    ///
    /// Unknown email and wrong password produce the same
    /// `AuthError::InvalidCredentials`.
    pub async fn login(
        &self,
        store: &StoreHandle,
        email: &str,
        password: &str,
    ) -> Result<TokenPair, AppError> {
        let user = users::find_by_email(&mut *store.lock().await, email)
            .await?
            .ok_or(AppError::Auth(AuthError::InvalidCredentials))?;

        let password = password.to_string();
        let password_hash = user.password_hash.clone();
        let password_valid =
            tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
                .await
                .map_err(|e| {
                    AppError::Internal(format!("Password verification task failed: {}", e))
                })??;

        if !password_valid {
            return Err(AuthError::InvalidCredentials.into());
        }

        let pair = TokenPair {
            access_token: generate_token(
                user.id,
                &user.email,
                TokenPurpose::Access,
                &self.settings,
            )?,
            refresh_token: generate_token(
                user.id,
                &user.email,
                TokenPurpose::Refresh,
                &self.settings,
            )?,
        };

        tracing::info!(subject_id = user.id, "Token pair issued");
        Ok(pair)
    }

    /// Revoke whichever tokens are present. Always succeeds; tokens are not
    /// verified first, so logging out an expired or foreign token is harmless.
    pub fn logout(&self, access_token: Option<&str>, refresh_token: Option<&str>) {
        if let Some(token) = access_token {
            self.revoke(token, TokenPurpose::Access);
        }
        if let Some(token) = refresh_token {
            self.revoke(token, TokenPurpose::Refresh);
        }
        tracing::info!(
            access = access_token.is_some(),
            refresh = refresh_token.is_some(),
            "Logout recorded"
        );
    }

    /// Exchange a refresh token for a fresh access token.
    ///
    /// A refresh token that fails verification is revoked on the spot:
    /// presenting a malformed, expired or forged refresh token escalates to
    /// a permanent reject of that exact string, which blunts replay and
    /// brute-force attempts.
    pub fn refresh(&self, refresh_token: &str) -> Result<String, AppError> {
        if self.refresh_revocations.has(refresh_token) {
            tracing::warn!(purpose = %TokenPurpose::Refresh, "Revoked token presented");
            return Err(AuthError::TokenRevoked(TokenPurpose::Refresh).into());
        }

        let claims = match validate_token(refresh_token, TokenPurpose::Refresh, &self.settings) {
            Ok(claims) => claims,
            Err(e) => {
                self.revoke(refresh_token, TokenPurpose::Refresh);
                tracing::warn!(
                    purpose = %TokenPurpose::Refresh,
                    reason = %e,
                    "Token failed verification and was revoked"
                );
                return Err(e.into());
            }
        };

        let access_token = generate_token(
            claims.sub,
            &claims.email,
            TokenPurpose::Access,
            &self.settings,
        )?;

        tracing::info!(subject_id = claims.sub, "Access token refreshed");
        Ok(access_token)
    }

    /// Check an access token. The revocation filter is consulted before the
    /// signature; a filter hit is final.
    pub fn authorize(&self, access_token: &str) -> Result<Claims, AuthError> {
        if self.access_revocations.has(access_token) {
            return Err(AuthError::TokenRevoked(TokenPurpose::Access));
        }
        validate_token(access_token, TokenPurpose::Access, &self.settings)
    }

    /// Authorize the raw `Authorization` header value, if any.
    ///
    /// A missing header is `MissingAuth`; a header that is not a bearer
    /// credential is `TokenInvalid`.
    pub fn authorize_header(&self, header: Option<&str>) -> Result<Claims, AuthError> {
        let header = header.ok_or(AuthError::MissingAuth)?;
        let token = bearer_token(header).ok_or(AuthError::TokenInvalid(TokenPurpose::Access))?;
        self.authorize(token)
    }

    pub fn is_revoked(&self, token: &str, purpose: TokenPurpose) -> bool {
        self.filter(purpose).has(token)
    }

    pub fn revoke(&self, token: &str, purpose: TokenPurpose) {
        self.filter(purpose).add(token);
    }
}

/// Extract the credential from `Bearer <token>`
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
