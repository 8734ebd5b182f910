use thiserror::Error;

/// Errors raised while turning query parameters into a [`QueryDescriptor`].
///
/// Every variant is caused by client input, so all of them map to
/// `400 Bad Request` when converted into an [`ApiError`](crate::ApiError).
///
/// [`QueryDescriptor`]: super::QueryDescriptor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Filtering is not allowed on field: {0}")]
    NotFilterable(String),

    #[error("Sorting is not allowed on field: {0}")]
    NotSortable(String),

    #[error("Field cannot be selected: {0}")]
    NotSelectable(String),

    #[error("Invalid {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Malformed query parameter: {0}")]
    Malformed(String),

    #[error("Cannot mix field inclusion and exclusion in 'fields'")]
    MixedProjection,
}

impl QueryError {
    pub(crate) fn invalid_value(field: &str, value: &str) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}
