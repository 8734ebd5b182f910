//! # Error Handling
//!
//! Every handler returns `Result<_, ApiError>`. Errors are turned into a JSON
//! body of the form
//!
//! ```json
//! { "status": "fail", "message": "No tour found with that ID" }
//! ```
//!
//! where `status` is `"fail"` for client errors (4xx) and `"error"` for server
//! errors (5xx). Validation failures additionally carry an `errors` list.
//!
//! ## Philosophy
//!
//! **Never expose internal errors to users**. Database errors and other
//! internal details are logged with `tracing` and replaced by a generic
//! message in the response.
//!
//! ## Usage
//!
//! ```rust,ignore
//! async fn handler(State(state): State<AppState>) -> Result<Json<Doc>, ApiError> {
//!     let tour = tour::Entity::find_by_id(id)
//!         .one(&state.db)
//!         .await?
//!         .ok_or_else(|| ApiError::not_found("tour"))?;
//!     Ok(Json(tour))
//! }
//! ```

use axum::{
    Json,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;
use std::fmt;

use crate::filtering::QueryError;

/// API error type with automatic logging and sanitized responses
#[derive(Debug)]
pub enum ApiError {
    /// 404 Not Found - Resource doesn't exist
    NotFound {
        /// User-facing error message
        message: String,
    },

    /// 400 Bad Request - Invalid input from user
    BadRequest {
        /// User-facing error message
        message: String,
    },

    /// 401 Unauthorized - Authentication required or failed
    Unauthorized {
        /// User-facing error message
        message: String,
    },

    /// 403 Forbidden - User lacks permission
    Forbidden {
        /// User-facing error message
        message: String,
    },

    /// 409 Conflict - Duplicate unique value
    Conflict {
        /// User-facing error message
        message: String,
    },

    /// 400 Bad Request - Payload validation failed
    ValidationFailed {
        /// User-facing validation errors
        errors: Vec<String>,
    },

    /// 500 Internal Server Error - Database error (details logged, not exposed)
    Database {
        /// Internal error (logged, not sent to user)
        internal: DbErr,
    },

    /// 500 Internal Server Error - Generic internal error
    Internal {
        /// User-facing generic message
        message: String,
        /// Internal error details (logged, not sent to user)
        internal: Option<String>,
    },

    /// Custom error with specific status code
    Custom {
        /// HTTP status code
        status: StatusCode,
        /// User-facing message
        message: String,
    },
}

impl ApiError {
    // ============================================================================
    // Constructors for common error types
    // ============================================================================

    /// 404 for a resource looked up by id, e.g. `No tour found with that ID`.
    pub fn not_found(resource: &str) -> Self {
        Self::NotFound {
            message: format!("No {resource} found with that ID"),
        }
    }

    /// 404 with a custom message.
    pub fn not_found_message(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// 404 for an unmatched route.
    pub fn route_not_found(path: &str) -> Self {
        Self::NotFound {
            message: format!("Can't find {path} on this server"),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn validation_failed(errors: Vec<String>) -> Self {
        Self::ValidationFailed { errors }
    }

    /// Create a 500 Internal Server Error from a database error
    ///
    /// The database error details are logged but NOT sent to the user.
    pub fn database(err: DbErr) -> Self {
        Self::Database { internal: err }
    }

    /// Create a 500 Internal Server Error with optional details
    ///
    /// # Example
    /// ```rust,ignore
    /// return Err(ApiError::internal("Failed to process image", Some(err.to_string())));
    /// ```
    pub fn internal(message: impl Into<String>, internal: Option<String>) -> Self {
        Self::Internal {
            message: message.into(),
            internal,
        }
    }

    /// Create a custom error with specific status code
    ///
    /// # Example
    /// ```rust,ignore
    /// return Err(ApiError::custom(
    ///     StatusCode::TOO_MANY_REQUESTS,
    ///     "Too many requests, please try again later",
    /// ));
    /// ```
    pub fn custom(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Custom {
            status,
            message: message.into(),
        }
    }

    // ============================================================================
    // Accessors
    // ============================================================================

    /// Get the HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::BadRequest { .. } | Self::ValidationFailed { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Database { .. } | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Custom { status, .. } => *status,
        }
    }

    /// Get the user-facing error message (sanitized)
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { message }
            | Self::BadRequest { message }
            | Self::Unauthorized { message }
            | Self::Forbidden { message }
            | Self::Conflict { message }
            | Self::Internal { message, .. }
            | Self::Custom { message, .. } => message.clone(),
            Self::ValidationFailed { errors } => {
                format!("Invalid input data. {}", errors.join(". "))
            }
            Self::Database { .. } => "Something went wrong".to_string(),
        }
    }

    /// `fail` for client errors, `error` for everything else.
    fn status_label(&self) -> &'static str {
        if self.status_code().is_client_error() {
            "fail"
        } else {
            "error"
        }
    }

    /// Log internal error details (not sent to user)
    fn log_internal(&self) {
        match self {
            Self::Database { internal } => {
                tracing::error!(error = ?internal, "Database error occurred");
            }
            Self::Internal {
                internal: Some(details),
                ..
            } => {
                tracing::error!(details = %details, "Internal error occurred");
            }
            _ => {
                tracing::debug!(
                    error = %self.user_message(),
                    status = %self.status_code(),
                    "API error"
                );
            }
        }
    }
}

/// Error response sent to users (sanitized)
#[derive(Serialize)]
struct ErrorResponse {
    status: &'static str,
    message: String,
    /// Individual validation messages
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log_internal();

        let body = ErrorResponse {
            status: self.status_label(),
            message: self.user_message(),
            errors: match &self {
                Self::ValidationFailed { errors } => Some(errors.clone()),
                _ => None,
            },
        };

        (self.status_code(), Json(body)).into_response()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// Conversions from common error types
// ============================================================================

/// Convert `SeaORM` `DbErr` to `ApiError`
///
/// **Conversion Rules:**
/// - `DbErr::RecordNotFound` → 404 Not Found
/// - unique constraint violations → 409 Conflict
/// - foreign key violations → 400 Bad Request
/// - All other `DbErr` variants → 500 (logged internally, sanitized for users)
impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        if let DbErr::RecordNotFound(_) = &err {
            return Self::NotFound {
                message: "Resource not found".to_string(),
            };
        }
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                Self::conflict("Duplicate field value. Please use another value")
            }
            Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
                Self::bad_request("Referenced document does not exist")
            }
            _ => Self::Database { internal: err },
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        Self::bad_request(err.to_string())
    }
}

/// Malformed or missing JSON bodies are client errors.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::MissingJsonContentType(_) => {
                Self::bad_request("Expected a JSON body with content-type application/json")
            }
            other if other.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                Self::custom(StatusCode::PAYLOAD_TOO_LARGE, "Request body is too large")
            }
            other => Self::bad_request(format!("Invalid JSON body: {}", other.body_text())),
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        match err.status() {
            StatusCode::PAYLOAD_TOO_LARGE => {
                Self::custom(StatusCode::PAYLOAD_TOO_LARGE, "Request body is too large")
            }
            _ => Self::bad_request(err.body_text()),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for ApiError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                Self::unauthorized("Your token has expired! Please log in again")
            }
            _ => Self::unauthorized("Invalid token! Please log in again"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = ApiError::not_found("tour");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.user_message(), "No tour found with that ID");
    }

    #[test]
    fn test_route_not_found_message() {
        let err = ApiError::route_not_found("/api/v1/nothing");
        assert_eq!(err.user_message(), "Can't find /api/v1/nothing on this server");
    }

    #[test]
    fn test_status_label() {
        assert_eq!(ApiError::bad_request("x").status_label(), "fail");
        assert_eq!(ApiError::forbidden("x").status_label(), "fail");
        assert_eq!(ApiError::internal("x", None).status_label(), "error");
        assert_eq!(
            ApiError::database(DbErr::Custom("x".into())).status_label(),
            "error"
        );
    }

    #[test]
    fn test_validation_failed_joins_messages() {
        let err = ApiError::validation_failed(vec![
            "A tour must have a name".to_string(),
            "Difficulty is either: easy, medium, difficult".to_string(),
        ]);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.user_message(),
            "Invalid input data. A tour must have a name. Difficulty is either: easy, medium, difficult"
        );
    }

    #[test]
    fn test_database_error_is_sanitized() {
        let err = ApiError::database(DbErr::Type("column mismatch".to_string()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.user_message(), "Something went wrong");
    }

    #[test]
    fn test_custom_error() {
        let err = ApiError::custom(StatusCode::TOO_MANY_REQUESTS, "Slow down");
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.status_label(), "fail");
    }

    // ============================================================================
    // Conversion Tests
    // ============================================================================

    #[test]
    fn test_dberr_record_not_found_becomes_404() {
        let api_err: ApiError = DbErr::RecordNotFound("tour".to_string()).into();
        assert_eq!(api_err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_all_other_dberr_become_500() {
        let test_cases = vec![
            DbErr::Custom("Any custom error".to_string()),
            DbErr::Type("Type error".to_string()),
            DbErr::Json("JSON error".to_string()),
        ];

        for db_err in test_cases {
            let api_err: ApiError = db_err.into();
            assert_eq!(api_err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn test_query_error_becomes_400() {
        let api_err: ApiError = QueryError::invalid_value("duration", "abc").into();
        assert_eq!(api_err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(api_err.user_message(), "Invalid duration: abc");
    }

    #[test]
    fn test_jwt_errors_become_401() {
        let expired: ApiError =
            jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::ExpiredSignature)
                .into();
        assert_eq!(expired.status_code(), StatusCode::UNAUTHORIZED);
        assert!(expired.user_message().contains("expired"));

        let invalid: ApiError =
            jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::InvalidToken).into();
        assert_eq!(invalid.user_message(), "Invalid token! Please log in again");
    }

    #[test]
    fn test_display_trait() {
        let err = ApiError::bad_request("Test error");
        assert_eq!(format!("{err}"), "Test error");
    }
}
