//! `/api/v1/users`: authentication, the current user's own account and
//! administration of all accounts.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State},
    http::{StatusCode, header::CONTENT_TYPE},
    routing::{get, patch, post},
};
use sea_orm::{ActiveValue::Set, IntoActiveModel};
use serde::Deserialize;
use utoipa::ToSchema;

use super::{UPLOAD_BODY_LIMIT, protected, restricted};
use crate::auth::{CurrentUser, handlers as auth};
use crate::core::crud_operations::{self, Document, to_document};
use crate::core::handlers;
use crate::errors::ApiError;
use crate::filtering::Projection;
use crate::images::{self, USER_PHOTO};
use crate::models::user::{self, Role, User, normalize_email, reject_password_fields};
use crate::response::{Doc, Keyed, Success};
use crate::state::AppState;
use crate::validation::{Validatable, ValidationErrors, validators};

pub const ADMINS: &[Role] = &[Role::Admin];

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/forgetpassword", post(auth::forget_password))
        .route("/resetpassword/{token}", patch(auth::reset_password))
        .route("/me", protected(get(get_me), state))
        .route(
            "/updatemypassword",
            protected(patch(auth::update_my_password), state),
        )
        .route(
            "/updateme",
            protected(
                patch(update_me).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
                state,
            ),
        )
        .route(
            "/deleteme",
            protected(patch(delete_me).delete(delete_me), state),
        )
        .route(
            "/",
            restricted(
                get(handlers::get_all::<User>).post(create_user),
                state,
                ADMINS,
            ),
        )
        .route(
            "/{id}",
            restricted(
                get(handlers::get_one::<User>)
                    .patch(handlers::update::<User>)
                    .delete(handlers::delete::<User>),
                state,
                ADMINS,
            ),
        )
}

#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    responses(
        (status = 200, description = "The logged in user", body = User),
        (status = 401, description = "Not logged in")
    ),
    security(("jwt" = [])),
    tag = "users"
)]
pub async fn get_me(CurrentUser(current): CurrentUser) -> Result<Success<Doc<Document>>, ApiError> {
    let doc = to_document(&User::from(current), &Projection::default())?;
    Ok(Success::doc(doc))
}

/// Accounts are only created through `/signup`.
///
/// # Errors
///
/// Always.
pub async fn create_user() -> Result<StatusCode, ApiError> {
    Err(ApiError::internal(
        "This route is not defined! Please use /signup instead",
        None,
    ))
}

/// Fields a user may change on their own account.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    #[schema(ignore)]
    pub password: Option<serde_json::Value>,
    #[schema(ignore)]
    pub password_confirm: Option<serde_json::Value>,
}

impl Validatable for UpdateMeRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check(reject_password_fields(
            self.password.is_some() || self.password_confirm.is_some(),
        ));
        if let Some(name) = &self.name {
            errors.check(validators::validate_required("name", name, "Please tell us your name!"));
        }
        if let Some(email) = &self.email {
            errors.check(validators::validate_email("email", email.trim()));
        }
        errors.result()
    }
}

async fn read_update_me(
    mut multipart: Multipart,
) -> Result<(UpdateMeRequest, Option<Vec<u8>>), ApiError> {
    let mut request = UpdateMeRequest::default();
    let mut photo = None;
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "photo" => {
                images::ensure_image(field.content_type())?;
                photo = Some(field.bytes().await?.to_vec());
            }
            "name" => request.name = Some(field.text().await?),
            "email" => request.email = Some(field.text().await?),
            "password" => request.password = Some(field.text().await?.into()),
            "passwordConfirm" => request.password_confirm = Some(field.text().await?.into()),
            other => tracing::debug!(field = other, "Ignoring multipart field"),
        }
    }
    Ok((request, photo))
}

/// Change name, email or photo. Takes JSON, or multipart when a photo is
/// uploaded.
#[utoipa::path(
    patch,
    path = "/api/v1/users/updateme",
    request_body = UpdateMeRequest,
    responses(
        (status = 200, description = "The updated user", body = User),
        (status = 400, description = "Invalid data or password fields present")
    ),
    security(("jwt" = [])),
    tag = "users"
)]
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(current): CurrentUser,
    request: Request,
) -> Result<Keyed<User>, ApiError> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    let (payload, photo) = if is_multipart {
        read_update_me(Multipart::from_request(request, &state).await?).await?
    } else {
        let Json(payload) = Json::<UpdateMeRequest>::from_request(request, &state).await?;
        (payload, None)
    };
    payload.validate()?;

    let mut active = current.clone().into_active_model();
    if let Some(name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(email) = payload.email {
        active.email = Set(normalize_email(&email));
    }
    if let Some(bytes) = photo {
        let file_name = images::user_photo_name(current.id);
        images::store(
            bytes,
            USER_PHOTO,
            &images::users_dir(&state.config.public_dir),
            &file_name,
        )
        .await?;
        active.photo = Set(file_name);
    }

    let updated = crud_operations::save_with_next_version::<User>(&state.db, &current, active).await?;
    tracing::info!(user_id = %updated.id, "Account updated");
    Ok(Success::keyed("user", User::from(updated)))
}

/// Deactivate the current account. Inactive users disappear from every
/// query and can no longer log in.
#[utoipa::path(
    patch,
    path = "/api/v1/users/deleteme",
    responses((status = 204, description = "Account deactivated")),
    security(("jwt" = [])),
    tag = "users"
)]
pub async fn delete_me(
    State(state): State<AppState>,
    CurrentUser(current): CurrentUser,
) -> Result<StatusCode, ApiError> {
    let mut active: user::ActiveModel = current.clone().into_active_model();
    active.active = Set(false);
    crud_operations::save_with_next_version::<User>(&state.db, &current, active).await?;
    tracing::info!(user_id = %current.id, "Account deactivated");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_me_rejects_passwords() {
        let request = UpdateMeRequest {
            password: Some("pass1234".into()),
            ..UpdateMeRequest::default()
        };
        let errors = request.validate().unwrap_err();
        assert_eq!(
            errors.errors()[0].message,
            "This route is not for password updates. Please use /updatemypassword"
        );
    }

    #[test]
    fn test_update_me_ignores_other_fields() {
        let request: UpdateMeRequest = serde_json::from_value(serde_json::json!({
            "name": "Jonas",
            "role": "admin"
        }))
        .unwrap();
        assert!(request.validate().is_ok());
        assert_eq!(request.name.as_deref(), Some("Jonas"));
    }
}
