//! # Query Builder
//!
//! Turns the query string of a list endpoint into a [`QueryDescriptor`]: the
//! filters, sort keys, field projection and page that the CRUD layer executes.
//!
//! ## Query Parameter Examples
//!
//! ```rust,ignore
//! // Equality and comparators
//! GET /api/v1/tours?difficulty=easy&duration[gte]=5&price[lt]=1500
//!
//! // Repeated keys match any of the values
//! GET /api/v1/tours?difficulty=easy&difficulty=medium
//!
//! // Multi-key sort, `-` for descending
//! GET /api/v1/tours?sort=price,-ratingsAverage
//!
//! // Projection, inclusion or exclusion
//! GET /api/v1/tours?fields=name,duration,price
//! GET /api/v1/tours?fields=-description,-images
//!
//! // Pagination
//! GET /api/v1/tours?page=2&limit=20
//! ```
//!
//! Field names are checked against the resource's [`FieldCatalog`]. Names that
//! are missing from the catalog, or not flagged for the stage that uses them,
//! fail with a [`QueryError`], which the HTTP layer turns into `400`.
//!
//! ## Stages
//!
//! The builder is consumed by each stage, which always run in this order:
//!
//! 1. [`ApiFeatures::filter`]
//! 2. [`ApiFeatures::sort`]
//! 3. [`ApiFeatures::limit_fields`]
//! 4. [`ApiFeatures::paginate`]

pub mod catalog;
pub mod conditions;
pub mod error;
pub mod features;
pub mod pagination;
pub mod projection;
pub mod query_params;
pub mod sort;

// Re-export commonly used items
pub use catalog::{FieldCatalog, FieldKind, FieldSpec, FilterValue};
pub use conditions::{ComparisonOp, FieldFilter, Predicate};
pub use error::QueryError;
pub use features::{ApiFeatures, QueryDescriptor, build_query};
pub use pagination::Pagination;
pub use projection::Projection;
pub use query_params::{ControlKey, ParamValue, QueryParams};
pub use sort::{SortDirection, SortKey};
