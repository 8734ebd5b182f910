//! `/api/v1/reviews` and `/api/v1/tours/{id}/reviews`
//!
//! Every route needs a logged in user. Only plain users write reviews, and a
//! review can only be changed by its author or an admin.

use axum::{
    Json, Router,
    extract::{Path, RawQuery, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{MethodRouter, get, patch, post},
};
use sea_orm::{ColumnTrait, Condition};
use uuid::Uuid;

use super::{protected, restricted};
use crate::auth::CurrentUser;
use crate::core::crud_operations::{self, Document, to_document};
use crate::core::handlers::{self, parse_id};
use crate::errors::ApiError;
use crate::filtering::Projection;
use crate::models::review::{self, Review, ReviewCreate, ReviewUpdate};
use crate::models::tour::Tour;
use crate::models::user::{self, Role};
use crate::response::{Doc, Docs, Success};
use crate::state::AppState;

pub const REVIEW_AUTHORS: &[Role] = &[Role::User];
pub const REVIEW_EDITORS: &[Role] = &[Role::User, Role::Admin];

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            protected(get(handlers::get_all::<Review>), state).merge(restricted(
                post(create_review),
                state,
                REVIEW_AUTHORS,
            )),
        )
        .route(
            "/{id}",
            protected(get(handlers::get_one::<Review>), state).merge(restricted(
                patch(update_review).delete(delete_review),
                state,
                REVIEW_EDITORS,
            )),
        )
}

/// `GET|POST /tours/{id}/reviews`
pub fn tour_reviews(state: &AppState) -> MethodRouter<AppState> {
    protected(get(list_tour_reviews), state).merge(restricted(
        post(create_tour_review),
        state,
        REVIEW_AUTHORS,
    ))
}

/// Reviews of one tour, with the usual query features.
///
/// # Errors
///
/// `400` for a malformed id or query.
pub async fn list_tour_reviews(
    State(state): State<AppState>,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Success<Docs<Document>>, ApiError> {
    let tour_id = parse_id(&id)?;
    let scope = Condition::all().add(review::Column::Tour.eq(tour_id));
    let docs = handlers::list::<Review>(&state.db, query.as_deref(), scope).await?;
    Ok(Success::list(docs))
}

async fn create_for(
    state: &AppState,
    author: &user::Model,
    tour_id: Option<Uuid>,
    mut payload: ReviewCreate,
) -> Result<Success<Doc<Document>>, ApiError> {
    payload.tour = payload.tour.or(tour_id);
    payload.user = Some(author.id);
    if let Some(tour_id) = payload.tour {
        crud_operations::find_model::<Tour>(&state.db, tour_id).await?;
    }
    let doc = crud_operations::create::<Review>(&state.db, payload).await?;
    Ok(Success::created(to_document(&doc, &Projection::default())?))
}

/// # Errors
///
/// `400` for invalid payloads, `404` for unknown tours, `409` for a second
/// review of the same tour.
pub async fn create_review(
    State(state): State<AppState>,
    CurrentUser(author): CurrentUser,
    payload: Result<Json<ReviewCreate>, JsonRejection>,
) -> Result<Success<Doc<Document>>, ApiError> {
    let Json(payload) = payload?;
    create_for(&state, &author, None, payload).await
}

/// The tour comes from the path unless the body names one.
///
/// # Errors
///
/// Same as [`create_review`].
pub async fn create_tour_review(
    State(state): State<AppState>,
    CurrentUser(author): CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<ReviewCreate>, JsonRejection>,
) -> Result<Success<Doc<Document>>, ApiError> {
    let tour_id = parse_id(&id)?;
    let Json(payload) = payload?;
    create_for(&state, &author, Some(tour_id), payload).await
}

/// Resolve a review the current user may change.
async fn owned_review(state: &AppState, editor: &user::Model, id: &str) -> Result<Uuid, ApiError> {
    let id = parse_id(id)?;
    let found = crud_operations::find_model::<Review>(&state.db, id).await?;
    if found.user != editor.id && editor.role() != Role::Admin {
        return Err(ApiError::forbidden("You can only change your own reviews"));
    }
    Ok(id)
}

/// # Errors
///
/// `403` for reviews of other users, `404` when missing.
pub async fn update_review(
    State(state): State<AppState>,
    CurrentUser(editor): CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<ReviewUpdate>, JsonRejection>,
) -> Result<Success<Doc<Document>>, ApiError> {
    let id = owned_review(&state, &editor, &id).await?;
    let Json(payload) = payload?;
    let doc = crud_operations::update::<Review>(&state.db, id, payload).await?;
    Ok(Success::doc(to_document(&doc, &Projection::default())?))
}

/// # Errors
///
/// `403` for reviews of other users, `404` when missing.
pub async fn delete_review(
    State(state): State<AppState>,
    CurrentUser(editor): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = owned_review(&state, &editor, &id).await?;
    crud_operations::delete::<Review>(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
