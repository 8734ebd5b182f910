use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::errors::ApiError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    /// Issued at, seconds since the epoch
    pub iat: i64,
    pub exp: i64,
}

/// Sign a session token for `user_id`.
///
/// # Errors
///
/// Returns a `500` when signing fails.
pub fn sign(user_id: Uuid, config: &Config) -> Result<String, ApiError> {
    let now = Utc::now().timestamp();
    let ttl = i64::try_from(config.jwt_expires_in.as_secs()).unwrap_or(i64::MAX);
    let claims = Claims {
        sub: user_id,
        iat: now,
        exp: now.saturating_add(ttl),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::internal("Something went wrong", Some(e.to_string())))
}

/// # Errors
///
/// `401` for malformed, tampered or expired tokens.
pub fn verify(token: &str, config: &Config) -> Result<Claims, ApiError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_sign_and_verify() {
        let config = Config::for_tests();
        let id = Uuid::new_v4();
        let token = sign(id, &config).unwrap();
        let claims = verify(&token, &config).unwrap();
        assert_eq!(claims.sub, id);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let config = Config::for_tests();
        let token = sign(Uuid::new_v4(), &config).unwrap();
        let other = Config {
            jwt_secret: "another-secret".into(),
            ..Config::for_tests()
        };
        let err = verify(&token, &other).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let config = Config::for_tests();
        let claims = Claims {
            sub: Uuid::new_v4(),
            iat: 1_000,
            exp: 2_000,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap();
        let err = verify(&token, &config).unwrap_err();
        assert_eq!(err.user_message(), "Your token has expired! Please log in again");
    }

    #[test]
    fn test_garbage_is_rejected() {
        let err = verify("loggedout", &Config::for_tests()).unwrap_err();
        assert_eq!(err.user_message(), "Invalid token! Please log in again");
    }
}
