//! Signup, login and password management.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::middleware::{CurrentUser, JWT_COOKIE};
use super::{jwt, password};
use crate::config::Config;
use crate::email::Email;
use crate::errors::ApiError;
use crate::models::user::{self, DEFAULT_PHOTO, MIN_PASSWORD_LENGTH, Role, User, normalize_email};
use crate::response::{Message, Success};
use crate::state::AppState;
use crate::validation::{Validatable, ValidationError, ValidationErrors, validators};

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

impl Validatable for SignupRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check(validators::validate_required(
            "name",
            self.name.as_deref().unwrap_or_default(),
            "Please tell us your name!",
        ));
        match self.email.as_deref().map(str::trim) {
            Some(email) if !email.is_empty() => {
                errors.check(validators::validate_email("email", email));
            }
            _ => errors.add(ValidationError::new("email", "Please provide your email")),
        }
        check_new_password(
            &mut errors,
            self.password.as_deref(),
            self.password_confirm.as_deref(),
        );
        errors.result()
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

impl Validatable for ResetPasswordRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_new_password(
            &mut errors,
            self.password.as_deref(),
            self.password_confirm.as_deref(),
        );
        errors.result()
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub password_current: Option<String>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

impl Validatable for UpdatePasswordRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_new_password(
            &mut errors,
            self.password.as_deref(),
            self.password_confirm.as_deref(),
        );
        errors.result()
    }
}

fn check_new_password(errors: &mut ValidationErrors, password: Option<&str>, confirm: Option<&str>) {
    let Some(password) = password else {
        errors.add(ValidationError::new("password", "Please provide a password"));
        return;
    };
    errors.check(validators::validate_length(
        "password",
        password,
        Some(MIN_PASSWORD_LENGTH),
        None,
        "A password must have at least 8 characters",
    ));
    if confirm != Some(password) {
        errors.add(ValidationError::new(
            "passwordConfirm",
            "Passwords are not the same!",
        ));
    }
}

fn session_cookie(token: &str, config: &Config) -> String {
    let secure = if config.is_production() { "; Secure" } else { "" };
    format!(
        "{JWT_COOKIE}={token}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax{secure}",
        config.jwt_cookie_expires_in.as_secs()
    )
}

/// Issue a session token for `user`, as body field and cookie.
///
/// # Errors
///
/// Returns a `500` when the token cannot be signed.
pub fn send_token(user: user::Model, code: StatusCode, config: &Config) -> Result<Response, ApiError> {
    let token = jwt::sign(user.id, config)?;
    let cookie = session_cookie(&token, config);
    let body = Success::keyed("user", User::from(user))
        .with_token(token)
        .with_status(code);
    Ok(([(SET_COOKIE, cookie)], body).into_response())
}

async fn find_active_by_email(
    state: &AppState,
    email: &str,
) -> Result<Option<user::Model>, ApiError> {
    Ok(user::Entity::find()
        .filter(user::Column::Email.eq(normalize_email(email)))
        .filter(user::Column::Active.eq(true))
        .one(&state.db)
        .await?)
}

#[utoipa::path(
    post,
    path = "/api/v1/users/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created, session token issued"),
        (status = 400, description = "Invalid input data"),
        (status = 409, description = "Email already in use")
    ),
    tag = "auth"
)]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    payload.validate()?;

    let hashed = password::hash(payload.password.unwrap_or_default(), state.config.bcrypt_cost).await?;
    let created = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name.unwrap_or_default().trim().to_string()),
        email: Set(normalize_email(&payload.email.unwrap_or_default())),
        photo: Set(DEFAULT_PHOTO.to_string()),
        role: Set(Role::User.to_string()),
        password: Set(hashed),
        password_changed_at: Set(None),
        password_reset_token: Set(None),
        password_reset_expires: Set(None),
        active: Set(true),
        created_at: Set(Utc::now()),
        version: Set(0),
    }
    .insert(&state.db)
    .await?;

    tracing::info!(user_id = %created.id, "User signed up");
    send_token(created, StatusCode::CREATED, &state.config)
}

#[utoipa::path(
    post,
    path = "/api/v1/users/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session token issued"),
        (status = 400, description = "Email or password missing"),
        (status = 401, description = "Incorrect email or password")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let (Some(email), Some(candidate)) = (
        payload.email.filter(|email| !email.trim().is_empty()),
        payload.password.filter(|password| !password.is_empty()),
    ) else {
        return Err(ApiError::bad_request("Please provide email and password"));
    };

    let found = find_active_by_email(&state, &email).await?;
    let Some(found) = found else {
        return Err(ApiError::unauthorized("Incorrect email or password"));
    };
    if !password::verify(candidate, found.password.clone()).await? {
        return Err(ApiError::unauthorized("Incorrect email or password"));
    }

    tracing::info!(user_id = %found.id, "User logged in");
    send_token(found, StatusCode::OK, &state.config)
}

/// Replace the session cookie with one that expires in ten seconds.
#[utoipa::path(
    get,
    path = "/api/v1/users/logout",
    responses((status = 200, description = "Session cookie cleared")),
    tag = "auth"
)]
pub async fn logout() -> impl IntoResponse {
    let cookie = format!("{JWT_COOKIE}=loggedout; Path=/; Max-Age=10; HttpOnly");
    ([(SET_COOKIE, cookie)], Message::status_only())
}

#[utoipa::path(
    post,
    path = "/api/v1/users/forgetpassword",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset token sent by email"),
        (status = 404, description = "No user with that email address"),
        (status = 500, description = "The email could not be sent")
    ),
    tag = "auth"
)]
pub async fn forget_password(
    State(state): State<AppState>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> Result<Message, ApiError> {
    let Json(payload) = payload?;
    let email = payload.email.unwrap_or_default();
    let found = find_active_by_email(&state, &email)
        .await?
        .ok_or_else(|| ApiError::not_found_message("There is no user with that email address"))?;

    let (token, hashed) = password::new_reset_token();
    let mut active = found.into_active_model();
    active.password_reset_token = Set(Some(hashed));
    active.password_reset_expires = Set(Some(password::reset_token_expiry()));
    let found = active.update(&state.db).await?;

    let reset_url = format!(
        "{}/api/v1/users/resetpassword/{token}",
        state.config.app_url.trim_end_matches('/')
    );
    let email = Email {
        to: found.email.clone(),
        subject: format!(
            "Your password reset token (valid for {} min)",
            password::RESET_TOKEN_TTL_MINUTES
        ),
        text: format!(
            "Forgot your password? Submit a PATCH request with your new password and \
             passwordConfirm to: {reset_url}.\nIf you didn't forget your password, please ignore this email!"
        ),
    };

    if let Err(err) = state.mailer.send(email).await {
        let mut active = found.into_active_model();
        active.password_reset_token = Set(None);
        active.password_reset_expires = Set(None);
        active.update(&state.db).await?;
        return Err(ApiError::internal(
            "There was an error sending the email. Try again later!",
            Some(err.to_string()),
        ));
    }

    tracing::info!(user_id = %found.id, "Password reset token issued");
    Ok(Message::new("Token sent to email!"))
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/resetpassword/{token}",
    request_body = ResetPasswordRequest,
    params(("token" = String, Path, description = "Token received by email")),
    responses(
        (status = 200, description = "Password changed, session token issued"),
        (status = 400, description = "Token is invalid or has expired")
    ),
    tag = "auth"
)]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let found = user::Entity::find()
        .filter(user::Column::PasswordResetToken.eq(password::hash_reset_token(&token)))
        .filter(user::Column::Active.eq(true))
        .one(&state.db)
        .await?
        .filter(|found| found.password_reset_expires.is_some_and(|expires| expires > Utc::now()))
        .ok_or_else(|| ApiError::bad_request("Token is invalid or has expired"))?;

    payload.validate()?;
    let hashed = password::hash(payload.password.unwrap_or_default(), state.config.bcrypt_cost).await?;

    let mut active = found.into_active_model();
    active.password = Set(hashed);
    active.password_changed_at = Set(Some(password::changed_at()));
    active.password_reset_token = Set(None);
    active.password_reset_expires = Set(None);
    let updated = active.update(&state.db).await?;

    tracing::info!(user_id = %updated.id, "Password reset");
    send_token(updated, StatusCode::OK, &state.config)
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/updatemypassword",
    request_body = UpdatePasswordRequest,
    responses(
        (status = 200, description = "Password changed, session token issued"),
        (status = 401, description = "Current password is wrong")
    ),
    security(("jwt" = [])),
    tag = "auth"
)]
pub async fn update_my_password(
    State(state): State<AppState>,
    CurrentUser(current): CurrentUser,
    payload: Result<Json<UpdatePasswordRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let candidate = payload.password_current.clone().unwrap_or_default();
    if !password::verify(candidate, current.password.clone()).await? {
        return Err(ApiError::unauthorized("Your current password is wrong"));
    }

    payload.validate()?;
    let hashed = password::hash(payload.password.unwrap_or_default(), state.config.bcrypt_cost).await?;

    let mut active = current.into_active_model();
    active.password = Set(hashed);
    active.password_changed_at = Set(Some(password::changed_at()));
    let updated = active.update(&state.db).await?;

    tracing::info!(user_id = %updated.id, "Password updated");
    send_token(updated, StatusCode::OK, &state.config)
}
