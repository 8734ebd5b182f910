//! `/api/v1/tours`

use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Path, RawQuery, State},
    routing::{get, patch, post},
};
use chrono::Utc;
use sea_orm::{ActiveValue::Set, Condition, IntoActiveModel};

use super::{UPLOAD_BODY_LIMIT, restricted};
use crate::core::CrudResource;
use crate::core::crud_operations::{self, Document, to_document};
use crate::core::handlers::{self, list_with_params, parse_id};
use crate::errors::ApiError;
use crate::filtering::{Projection, QueryParams};
use crate::images::{self, TOUR_COVER, TOUR_IMAGE};
use crate::models::tour::{self, ImageList, Tour};
use crate::models::user::Role;
use crate::response::{Doc, Docs, Keyed, Success};
use crate::routes::reviews;
use crate::state::AppState;
use crate::stats::{self, Center, DifficultyStats, MonthPlan, TourDistance, Unit};

/// Roles allowed to change tours.
pub const TOUR_MANAGERS: &[Role] = &[Role::Admin, Role::LeadGuide];
/// Roles allowed to read the monthly plan.
pub const TOUR_STAFF: &[Role] = &[Role::Admin, Role::LeadGuide, Role::Guide];
/// At most this many gallery images per upload.
pub const MAX_TOUR_IMAGES: usize = 3;

const TOP_TOURS_FIELDS: &str = "name,duration,ratingsAverage,summary,difficulty";

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::get_all::<Tour>).merge(restricted(
                post(handlers::create::<Tour>),
                state,
                TOUR_MANAGERS,
            )),
        )
        .route("/top-5-tours", get(top_tours))
        .route("/tour-stats", get(tour_stats))
        .route(
            "/monthly-plan/{year}",
            restricted(get(monthly_plan), state, TOUR_STAFF),
        )
        .route(
            "/tour-within/{distance}/center/{latlng}/unit/{unit}",
            get(tours_within),
        )
        .route("/distances/{latlng}/unit/{unit}", get(distances))
        .route(
            "/{id}",
            get(handlers::get_one::<Tour>).merge(restricted(
                patch(handlers::update::<Tour>).delete(handlers::delete::<Tour>),
                state,
                TOUR_MANAGERS,
            )),
        )
        .route(
            "/{id}/images",
            restricted(
                patch(upload_images).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
                state,
                TOUR_MANAGERS,
            ),
        )
        .route("/{id}/reviews", reviews::tour_reviews(state))
}

/// The five cheapest among the best rated tours. Client parameters are kept
/// but `limit`, `sort` and `fields` are overridden.
#[utoipa::path(
    get,
    path = "/api/v1/tours/top-5-tours",
    responses((status = 200, description = "Top five tours")),
    tag = "tours"
)]
pub async fn top_tours(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Success<Docs<Document>>, ApiError> {
    let params = QueryParams::parse(query.as_deref().unwrap_or_default())?
        .with("limit", "5")
        .with("sort", "price,-ratingsAverage")
        .with("fields", TOP_TOURS_FIELDS);
    let docs = list_with_params::<Tour>(&state.db, &params, Condition::all()).await?;
    Ok(Success::list(docs))
}

#[utoipa::path(
    get,
    path = "/api/v1/tours/tour-stats",
    responses((status = 200, description = "Rating and price statistics per difficulty", body = [DifficultyStats])),
    tag = "tours"
)]
pub async fn tour_stats(
    State(state): State<AppState>,
) -> Result<Keyed<Vec<DifficultyStats>>, ApiError> {
    let stats = stats::tour_stats(&state.db).await?;
    Ok(Success::keyed("stats", stats))
}

#[utoipa::path(
    get,
    path = "/api/v1/tours/monthly-plan/{year}",
    params(("year" = String, Path, description = "Calendar year, e.g. 2021")),
    responses(
        (status = 200, description = "Tour starts per month", body = [MonthPlan]),
        (status = 400, description = "Invalid year"),
        (status = 403, description = "Only guides and admins can read the plan")
    ),
    security(("jwt" = [])),
    tag = "tours"
)]
pub async fn monthly_plan(
    State(state): State<AppState>,
    Path(year): Path<String>,
) -> Result<Keyed<Vec<MonthPlan>>, ApiError> {
    let plan = stats::monthly_plan(&state.db, stats::parse_year(&year)?).await?;
    Ok(Success::keyed("plan", plan))
}

#[utoipa::path(
    get,
    path = "/api/v1/tours/tour-within/{distance}/center/{latlng}/unit/{unit}",
    params(
        ("distance" = String, Path, description = "Search radius"),
        ("latlng" = String, Path, description = "Center as `lat,lng`"),
        ("unit" = String, Path, description = "`mi` or `km`")
    ),
    responses(
        (status = 200, description = "Tours starting within the radius"),
        (status = 400, description = "Malformed center, distance or unit")
    ),
    tag = "tours"
)]
pub async fn tours_within(
    State(state): State<AppState>,
    Path((distance, latlng, unit)): Path<(String, String, String)>,
) -> Result<Success<Docs<Document>>, ApiError> {
    let distance = stats::parse_distance(&distance)?;
    let center: Center = latlng.parse()?;
    let unit: Unit = unit.parse()?;

    let tours = stats::tours_within(&state.db, distance, center, unit).await?;
    let docs = tours
        .iter()
        .map(|tour| to_document(tour, &Projection::default()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Success::list(docs))
}

#[utoipa::path(
    get,
    path = "/api/v1/tours/distances/{latlng}/unit/{unit}",
    params(
        ("latlng" = String, Path, description = "Origin as `lat,lng`"),
        ("unit" = String, Path, description = "`mi` or `km`")
    ),
    responses(
        (status = 200, description = "Distance to every located tour, nearest first", body = [TourDistance]),
        (status = 400, description = "Malformed origin or unit")
    ),
    tag = "tours"
)]
pub async fn distances(
    State(state): State<AppState>,
    Path((latlng, unit)): Path<(String, String)>,
) -> Result<Keyed<Vec<TourDistance>>, ApiError> {
    let center: Center = latlng.parse()?;
    let unit: Unit = unit.parse()?;
    let distances = stats::tour_distances(&state.db, center, unit).await?;
    Ok(Success::keyed("distances", distances))
}

struct Upload {
    cover: Option<Vec<u8>>,
    images: Vec<Vec<u8>>,
}

async fn read_tour_images(mut multipart: Multipart) -> Result<Upload, ApiError> {
    let mut upload = Upload {
        cover: None,
        images: Vec::new(),
    };
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "imageCover" => {
                if upload.cover.is_some() {
                    return Err(ApiError::bad_request("Only one cover image can be uploaded"));
                }
                images::ensure_image(field.content_type())?;
                upload.cover = Some(field.bytes().await?.to_vec());
            }
            "images" => {
                if upload.images.len() == MAX_TOUR_IMAGES {
                    return Err(ApiError::bad_request(format!(
                        "At most {MAX_TOUR_IMAGES} images can be uploaded"
                    )));
                }
                images::ensure_image(field.content_type())?;
                upload.images.push(field.bytes().await?.to_vec());
            }
            other => tracing::debug!(field = other, "Ignoring multipart field"),
        }
    }
    Ok(upload)
}

/// Replace the cover and gallery images of a tour.
#[utoipa::path(
    patch,
    path = "/api/v1/tours/{id}/images",
    params(("id" = Uuid, Path, description = "Tour id")),
    request_body(content_type = "multipart/form-data", description = "`imageCover` (one file) and `images` (up to three files)"),
    responses(
        (status = 200, description = "Tour with the new image names"),
        (status = 400, description = "Not an image or too many files"),
        (status = 404, description = "No tour with that id")
    ),
    security(("jwt" = [])),
    tag = "tours"
)]
pub async fn upload_images(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Success<Doc<Document>>, ApiError> {
    let id = parse_id(&id)?;
    let model = crud_operations::find_model::<Tour>(&state.db, id).await?;
    let upload = read_tour_images(multipart).await?;

    let dir = images::tours_dir(&state.config.public_dir);
    let timestamp = Utc::now().timestamp_millis();
    let mut active = model.clone().into_active_model();

    if let Some(cover) = upload.cover {
        let file_name = images::tour_cover_name(id, timestamp);
        images::store(cover, TOUR_COVER, &dir, &file_name).await?;
        active.image_cover = Set(file_name);
    }
    if !upload.images.is_empty() {
        let mut names = Vec::with_capacity(upload.images.len());
        for (index, bytes) in upload.images.into_iter().enumerate() {
            let file_name = images::tour_image_name(id, timestamp, index + 1);
            images::store(bytes, TOUR_IMAGE, &dir, &file_name).await?;
            names.push(file_name);
        }
        active.images = Set(ImageList(names));
    }

    let updated: tour::Model =
        crud_operations::save_with_next_version::<Tour>(&state.db, &model, active).await?;
    tracing::info!(tour_id = %id, "Tour images updated");

    let mut doc = Tour::from(updated);
    Tour::populate(&state.db, std::slice::from_mut(&mut doc)).await?;
    Ok(Success::doc(to_document(&doc, &Projection::default())?))
}
