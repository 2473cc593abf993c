/// JWT signing and verification
///
/// Both token classes are HS256 JWTs signed with the same symmetric key.
/// The `purpose` claim keeps them apart at verification time.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::{Claims, TokenPurpose};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

/// Mint a signed token for `subject_id` with the lifetime of its purpose
pub fn generate_token(
    subject_id: i64,
    email: &str,
    purpose: TokenPurpose,
    config: &JwtSettings,
) -> Result<String, AppError> {
    let expiry = match purpose {
        TokenPurpose::Access => config.access_token_expiry,
        TokenPurpose::Refresh => config.refresh_token_expiry,
    };
    let claims = Claims::new(
        subject_id,
        email.to_string(),
        purpose,
        expiry,
        config.issuer.clone(),
    );

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
}

/// Verify signature, expiry, issuer and purpose of a token
///
/// # Errors
/// Returns `AuthError::TokenInvalid` if the token is malformed, expired,
/// tampered with, or was minted for a different purpose.
pub fn validate_token(
    token: &str,
    expected: TokenPurpose,
    config: &JwtSettings,
) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);
    validation.leeway = 0;

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!(purpose = %expected, "JWT validation error: {}", e);
        AuthError::TokenInvalid(expected)
    })?;

    if claims.purpose != expected {
        tracing::warn!(
            subject_id = claims.sub,
            expected = %expected,
            presented = %claims.purpose,
            "Token presented for the wrong purpose"
        );
        return Err(AuthError::TokenInvalid(expected));
    }

    Ok(claims)
}
