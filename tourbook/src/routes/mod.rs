//! HTTP surface of the API.
//!
//! ```text
//! /api/v1/tours     tours, statistics, geo lookups and nested reviews
//! /api/v1/users     authentication, own account, administration
//! /api/v1/reviews   reviews
//! /img              uploaded images
//! ```

pub mod reviews;
pub mod tours;
pub mod users;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Request},
    http::{HeaderName, HeaderValue, Uri, header},
    middleware::{self, Next},
    routing::{MethodRouter, get},
};
use tower_http::{
    services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::auth::{handlers as auth, protect, restrict_to};
use crate::errors::ApiError;
use crate::models::{
    review::{Review, ReviewCreate, ReviewUpdate},
    tour::{GeoPoint, Tour, TourCreate, TourUpdate},
    user::{Role, User, UserUpdate},
};
use crate::rate_limit::limit_by_ip;
use crate::state::AppState;
use crate::stats::{DifficultyStats, MonthPlan, TourDistance};

/// Limit for JSON bodies.
pub const JSON_BODY_LIMIT: usize = 10 * 1024;
/// Limit for routes accepting image uploads.
pub const UPLOAD_BODY_LIMIT: usize = 10 * 1024 * 1024;

const SECURITY_HEADERS: [(HeaderName, &str); 7] = [
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "SAMEORIGIN"),
    (header::X_XSS_PROTECTION, "0"),
    (header::X_DNS_PREFETCH_CONTROL, "off"),
    (header::REFERRER_POLICY, "no-referrer"),
    (
        header::STRICT_TRANSPORT_SECURITY,
        "max-age=15552000; includeSubDomains",
    ),
    (
        HeaderName::from_static("cross-origin-opener-policy"),
        "same-origin",
    ),
];

#[derive(OpenApi)]
#[openapi(
    info(title = "tourbook", description = "Tour booking API"),
    paths(
        auth::signup,
        auth::login,
        auth::logout,
        auth::forget_password,
        auth::reset_password,
        auth::update_my_password,
        users::get_me,
        users::update_me,
        users::delete_me,
        tours::top_tours,
        tours::tour_stats,
        tours::monthly_plan,
        tours::tours_within,
        tours::distances,
        tours::upload_images,
    ),
    components(schemas(
        Tour,
        TourCreate,
        TourUpdate,
        GeoPoint,
        User,
        UserUpdate,
        Role,
        Review,
        ReviewCreate,
        ReviewUpdate,
        DifficultyStats,
        MonthPlan,
        TourDistance,
        auth::SignupRequest,
        auth::LoginRequest,
        auth::ForgotPasswordRequest,
        auth::ResetPasswordRequest,
        auth::UpdatePasswordRequest,
        users::UpdateMeRequest,
    )),
    modifiers(&JwtSecurity),
    tags(
        (name = "auth", description = "Signup, login and passwords"),
        (name = "users", description = "User accounts"),
        (name = "tours", description = "Tours and tour statistics"),
    )
)]
pub struct ApiDoc;

struct JwtSecurity;

impl Modify for JwtSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "jwt",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Require a logged in user.
pub fn protected(route: MethodRouter<AppState>, state: &AppState) -> MethodRouter<AppState> {
    route.route_layer(middleware::from_fn_with_state(state.clone(), protect))
}

/// Require a logged in user with one of `roles`.
pub fn restricted(
    route: MethodRouter<AppState>,
    state: &AppState,
    roles: &'static [Role],
) -> MethodRouter<AppState> {
    // Layers run outside in, so `protect` is added last.
    let route = route.route_layer(middleware::from_fn(move |request: Request, next: Next| {
        restrict_to(roles, request, next)
    }));
    protected(route, state)
}

async fn route_not_found(uri: Uri) -> ApiError {
    let path = uri.path_and_query().map_or(uri.path(), |target| target.as_str());
    ApiError::route_not_found(path)
}

/// The complete application.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .nest("/tours", tours::router(&state))
        .nest("/users", users::router(&state))
        .nest("/reviews", reviews::router(&state))
        .route("/openapi.json", get(openapi));
    let api = limit_by_ip(api, &state.config);

    let images = ServeDir::new(state.config.public_dir.join("img"));

    let router = Router::new()
        .nest("/api/v1", api)
        .nest_service("/img", images)
        .fallback(route_not_found)
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
        .with_state(state);

    SECURITY_HEADERS
        .into_iter()
        .fold(router, |router, (name, value)| {
            router.layer(SetResponseHeaderLayer::if_not_present(
                name,
                HeaderValue::from_static(value),
            ))
        })
        .layer(TraceLayer::new_for_http())
}
