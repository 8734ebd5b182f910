//! Axum handlers shared by every [`CrudResource`].
//!
//! ```rust,ignore
//! Router::new()
//!     .route("/", get(handlers::get_all::<Tour>).post(handlers::create::<Tour>))
//!     .route("/{id}", get(handlers::get_one::<Tour>))
//! ```

use axum::{
    Json,
    extract::{Path, RawQuery, State, rejection::JsonRejection},
    http::StatusCode,
};
use sea_orm::{Condition, DatabaseConnection};
use uuid::Uuid;

use super::crud_operations::{self, Document, to_document};
use super::traits::{CreatableResource, CrudResource};
use crate::errors::ApiError;
use crate::filtering::{Projection, QueryParams, build_query};
use crate::response::{Doc, Docs, Success};
use crate::state::AppState;

/// Parse a path id, answering `400 Invalid id: <value>` otherwise.
///
/// # Errors
///
/// Returns a `400` for anything that is not a UUID.
pub fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(format!("Invalid id: {raw}")))
}

/// Run the query builder over `params` and execute the result.
///
/// # Errors
///
/// `400` for rejected parameters, storage errors otherwise.
pub async fn list_with_params<R: CrudResource>(
    db: &DatabaseConnection,
    params: &QueryParams,
    scope: Condition,
) -> Result<Vec<Document>, ApiError> {
    let query = build_query(params, R::catalog())?;
    tracing::debug!(resource = R::RESOURCE_NAME_PLURAL, ?query, "List query");
    crud_operations::get_all::<R>(db, &query, scope).await
}

/// # Errors
///
/// `400` for a malformed query string.
pub async fn list<R: CrudResource>(
    db: &DatabaseConnection,
    raw_query: Option<&str>,
    scope: Condition,
) -> Result<Vec<Document>, ApiError> {
    let params = QueryParams::parse(raw_query.unwrap_or_default())?;
    list_with_params::<R>(db, &params, scope).await
}

fn single<R: CrudResource>(doc: &R) -> Result<Document, ApiError> {
    to_document(doc, &Projection::default())
}

/// `GET /` with filtering, sorting, field selection and pagination.
///
/// # Errors
///
/// `400` for rejected query parameters.
pub async fn get_all<R: CrudResource>(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Success<Docs<Document>>, ApiError> {
    let docs = list::<R>(&state.db, query.as_deref(), Condition::all()).await?;
    Ok(Success::list(docs))
}

/// `GET /{id}`
///
/// # Errors
///
/// `400` for a malformed id, `404` when missing.
pub async fn get_one<R: CrudResource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Success<Doc<Document>>, ApiError> {
    let doc = crud_operations::get_one::<R>(&state.db, parse_id(&id)?).await?;
    Ok(Success::doc(single(&doc)?))
}

/// `POST /`
///
/// # Errors
///
/// `400` for invalid payloads, `409` for duplicates.
pub async fn create<R: CreatableResource>(
    State(state): State<AppState>,
    payload: Result<Json<R::CreateModel>, JsonRejection>,
) -> Result<Success<Doc<Document>>, ApiError> {
    let Json(payload) = payload?;
    let doc = crud_operations::create::<R>(&state.db, payload).await?;
    Ok(Success::created(single(&doc)?))
}

/// `PATCH /{id}`
///
/// # Errors
///
/// `400` for invalid payloads, `404` when missing.
pub async fn update<R: CrudResource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<R::UpdateModel>, JsonRejection>,
) -> Result<Success<Doc<Document>>, ApiError> {
    let id = parse_id(&id)?;
    let Json(payload) = payload?;
    let doc = crud_operations::update::<R>(&state.db, id, payload).await?;
    Ok(Success::doc(single(&doc)?))
}

/// `DELETE /{id}`, answering `204` with an empty body.
///
/// # Errors
///
/// `400` for a malformed id, `404` when missing.
pub async fn delete<R: CrudResource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    crud_operations::delete::<R>(&state.db, parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string()).unwrap(), id);

        let err = parse_id("5c88fa8cf4afda39709c2951").unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.user_message(), "Invalid id: 5c88fa8cf4afda39709c2951");
    }
}
