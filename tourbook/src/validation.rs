//! Validation Support
//!
//! Create and update payloads implement [`Validatable`]. The generic CRUD
//! handlers call `validate` before touching the database and answer `400`
//! with every collected message when it fails.
//!
//! # Example
//!
//! ```rust,ignore
//! impl Validatable for ReviewCreate {
//!     fn validate(&self) -> Result<(), ValidationErrors> {
//!         let mut errors = ValidationErrors::new();
//!         errors.check(validators::validate_required("review", &self.review, "Review can not be empty"));
//!         errors.check(validators::validate_range("rating", self.rating, Some(1), Some(5), "Rating must be between 1 and 5"));
//!         errors.result()
//!     }
//! }
//! ```

use serde::Serialize;
use std::fmt;

use crate::errors::ApiError;

/// Validation error with field name and message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// The field that failed validation
    pub field: String,
    /// Human-readable error message
    pub message: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Collection of validation errors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Record the error of a single check, if any.
    pub fn check(&mut self, outcome: Result<(), ValidationError>) {
        if let Err(error) = outcome {
            self.add(error);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Convert to Result
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one error was collected.
    pub fn result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed with {} error(s):", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  - {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::validation_failed(errors.errors.into_iter().map(|e| e.message).collect())
    }
}

/// Trait for payloads that are checked before a write.
pub trait Validatable {
    /// # Errors
    ///
    /// Returns every rule the payload breaks.
    fn validate(&self) -> Result<(), ValidationErrors>;
}

/// Helper validators for common patterns
pub mod validators {
    use super::ValidationError;
    use std::fmt::Display;

    /// Validate string length (in characters) is within range
    ///
    /// # Errors
    ///
    /// Returns `message` when the length is out of range.
    pub fn validate_length(
        field: &str,
        value: &str,
        min: Option<usize>,
        max: Option<usize>,
        message: &str,
    ) -> Result<(), ValidationError> {
        let len = value.chars().count();
        let too_short = min.is_some_and(|min| len < min);
        let too_long = max.is_some_and(|max| len > max);
        if too_short || too_long {
            return Err(ValidationError::new(field, message));
        }
        Ok(())
    }

    /// Validate number is within range
    ///
    /// # Errors
    ///
    /// Returns `message` when the value is out of range.
    pub fn validate_range<T: PartialOrd + Display>(
        field: &str,
        value: T,
        min: Option<T>,
        max: Option<T>,
        message: &str,
    ) -> Result<(), ValidationError> {
        let below = min.is_some_and(|min| value < min);
        let above = max.is_some_and(|max| value > max);
        if below || above {
            return Err(ValidationError::new(field, message));
        }
        Ok(())
    }

    /// Basic email validation
    ///
    /// # Errors
    ///
    /// Returns an error for values without a `local@domain.tld` shape.
    pub fn validate_email(field: &str, value: &str) -> Result<(), ValidationError> {
        let valid = value.len() <= 255
            && value.split_once('@').is_some_and(|(local, domain)| {
                !local.is_empty()
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
            })
            && !value.chars().any(char::is_whitespace);
        if !valid {
            return Err(ValidationError::new(field, "Please provide a valid email"));
        }
        Ok(())
    }

    /// Validate value is not empty
    ///
    /// # Errors
    ///
    /// Returns `message` for empty or whitespace-only values.
    pub fn validate_required(field: &str, value: &str, message: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::new(field, message));
        }
        Ok(())
    }

    /// Validate value is one of a fixed set
    ///
    /// # Errors
    ///
    /// Returns `message` when `value` is not listed.
    pub fn validate_one_of(
        field: &str,
        value: &str,
        allowed: &[&str],
        message: &str,
    ) -> Result<(), ValidationError> {
        if !allowed.contains(&value) {
            return Err(ValidationError::new(field, message));
        }
        Ok(())
    }

    /// Validate value only contains letters and spaces
    ///
    /// # Errors
    ///
    /// Returns `message` on any other character.
    pub fn validate_letters_and_spaces(
        field: &str,
        value: &str,
        message: &str,
    ) -> Result<(), ValidationError> {
        if !value.chars().all(|c| c.is_alphabetic() || c == ' ') {
            return Err(ValidationError::new(field, message));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_collection() {
        let mut errors = ValidationErrors::new();
        assert!(errors.is_empty());

        errors.check(Ok(()));
        assert!(errors.is_empty());

        errors.check(Err(ValidationError::new("field1", "error1")));
        errors.add(ValidationError::new("field2", "error2"));
        assert_eq!(errors.len(), 2);

        assert!(errors.result().is_err());
    }

    #[test]
    fn test_into_api_error_keeps_messages() {
        let mut errors = ValidationErrors::new();
        errors.add(ValidationError::new("name", "A tour must have a name"));
        let api: ApiError = errors.into();
        assert_eq!(api.user_message(), "Invalid input data. A tour must have a name");
    }

    #[test]
    fn test_validate_length() {
        use validators::validate_length;

        assert!(validate_length("name", "ab", Some(3), None, "short").is_err());
        assert!(validate_length("name", "abcdef", None, Some(5), "long").is_err());
        assert!(validate_length("name", "abc", Some(3), Some(5), "ok").is_ok());
        // Counted in characters, not bytes
        assert!(validate_length("name", "ééé", None, Some(3), "ok").is_ok());
    }

    #[test]
    fn test_validate_range() {
        use validators::validate_range;

        assert!(validate_range("rating", 0, Some(1), Some(5), "m").is_err());
        assert!(validate_range("rating", 6, Some(1), Some(5), "m").is_err());
        assert!(validate_range("rating", 4.5, Some(1.0), Some(5.0), "m").is_ok());
    }

    #[test]
    fn test_validate_email() {
        use validators::validate_email;

        assert!(validate_email("email", "invalid").is_err());
        assert!(validate_email("email", "a@b").is_err());
        assert!(validate_email("email", "jo n@example.com").is_err());
        assert!(validate_email("email", "test@example.com").is_ok());
    }

    #[test]
    fn test_validate_required() {
        use validators::validate_required;

        assert!(validate_required("name", "", "required").is_err());
        assert!(validate_required("name", "   ", "required").is_err());
        assert!(validate_required("name", "John", "required").is_ok());
    }

    #[test]
    fn test_validate_one_of_and_letters() {
        use validators::{validate_letters_and_spaces, validate_one_of};

        let levels = ["easy", "medium", "difficult"];
        assert!(validate_one_of("difficulty", "easy", &levels, "m").is_ok());
        assert!(validate_one_of("difficulty", "extreme", &levels, "m").is_err());
        assert!(validate_letters_and_spaces("name", "The Sea Explorer", "m").is_ok());
        assert!(validate_letters_and_spaces("name", "Tour 2", "m").is_err());
    }
}
