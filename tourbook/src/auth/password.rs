use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::errors::ApiError;

/// Minutes a password reset token stays valid.
pub const RESET_TOKEN_TTL_MINUTES: i64 = 10;

/// Expiry of a reset token issued now.
#[must_use]
pub fn reset_token_expiry() -> DateTime<Utc> {
    Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES)
}

/// Hash a password with bcrypt on the blocking pool.
///
/// # Errors
///
/// Returns a `500` when hashing fails.
pub async fn hash(password: String, cost: u32) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| ApiError::internal("Something went wrong", Some(e.to_string())))?
        .map_err(|e| ApiError::internal("Something went wrong", Some(e.to_string())))
}

/// # Errors
///
/// Returns a `500` when the stored hash cannot be read.
pub async fn verify(password: String, hashed: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hashed))
        .await
        .map_err(|e| ApiError::internal("Something went wrong", Some(e.to_string())))?
        .map_err(|e| ApiError::internal("Something went wrong", Some(e.to_string())))
}

/// A fresh reset token and the hash that gets stored.
#[must_use]
pub fn new_reset_token() -> (String, String) {
    let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
    let hashed = hash_reset_token(&token);
    (token, hashed)
}

#[must_use]
pub fn hash_reset_token(token: &str) -> String {
    blake3::hash(token.as_bytes()).to_hex().to_string()
}

/// Timestamp recorded on a password change. Set a second in the past so a
/// token issued right after the change stays valid.
#[must_use]
pub fn changed_at() -> DateTime<Utc> {
    Utc::now() - Duration::seconds(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hashed = hash("pass1234".into(), 4).await.unwrap();
        assert_ne!(hashed, "pass1234");
        assert!(verify("pass1234".into(), hashed.clone()).await.unwrap());
        assert!(!verify("wrong".into(), hashed).await.unwrap());
    }

    #[test]
    fn test_reset_token_hash_is_stable() {
        let (token, hashed) = new_reset_token();
        assert_eq!(token.len(), 64);
        assert_eq!(hash_reset_token(&token), hashed);
        assert_ne!(token, hashed);
    }

    #[test]
    fn test_reset_tokens_are_unique() {
        assert_ne!(new_reset_token().0, new_reset_token().0);
    }
}
