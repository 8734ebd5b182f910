//! Aggregations over tours: rating statistics per difficulty, the monthly
//! start plan and lookups around a point on the globe.
//!
//! Tours are loaded with the usual visibility rule and aggregated in memory.

use std::{collections::BTreeMap, str::FromStr};

use chrono::Datelike;
use sea_orm::{ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::core::CrudResource;
use crate::errors::ApiError;
use crate::models::tour::{self, GeoPoint, Tour};

/// Only tours rated at least this well appear in the statistics.
pub const STATS_MIN_RATING: f64 = 4.5;
pub const EARTH_RADIUS_MI: f64 = 3963.2;
pub const EARTH_RADIUS_KM: f64 = 6378.1;
const EARTH_RADIUS_M: f64 = EARTH_RADIUS_KM * 1000.0;
const MONTHS_IN_PLAN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Miles,
    Kilometers,
}

impl Unit {
    fn earth_radius(self) -> f64 {
        match self {
            Self::Miles => EARTH_RADIUS_MI,
            Self::Kilometers => EARTH_RADIUS_KM,
        }
    }

    /// Factor converting meters into this unit.
    fn per_meter(self) -> f64 {
        match self {
            Self::Miles => 0.000_621_371,
            Self::Kilometers => 0.001,
        }
    }
}

impl FromStr for Unit {
    type Err = ApiError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "mi" => Ok(Self::Miles),
            "km" => Ok(Self::Kilometers),
            _ => Err(ApiError::bad_request("Unit must be either mi or km")),
        }
    }
}

/// A `lat,lng` pair taken from the path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Center {
    pub lat: f64,
    pub lng: f64,
}

impl FromStr for Center {
    type Err = ApiError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid =
            || ApiError::bad_request("Please provide latitude and longitude in the format lat,lng.");
        let (lat, lng) = raw.split_once(',').ok_or_else(invalid)?;
        let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
        let lng: f64 = lng.trim().parse().map_err(|_| invalid())?;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(invalid());
        }
        Ok(Self { lat, lng })
    }
}

/// # Errors
///
/// `400` unless the distance is a non-negative number.
pub fn parse_distance(raw: &str) -> Result<f64, ApiError> {
    match raw.parse::<f64>() {
        Ok(distance) if distance.is_finite() && distance >= 0.0 => Ok(distance),
        _ => Err(ApiError::bad_request(format!("Invalid distance: {raw}"))),
    }
}

/// # Errors
///
/// `400` for anything but a year number.
pub fn parse_year(raw: &str) -> Result<i32, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid year: {raw}")))
}

/// Central angle in radians between the center and a point.
fn central_angle(center: Center, point: &GeoPoint) -> f64 {
    let (lat1, lat2) = (center.lat.to_radians(), point.lat().to_radians());
    let d_lat = lat2 - lat1;
    let d_lng = (point.lng() - center.lng).to_radians();
    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * a.sqrt().min(1.0).asin()
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyStats {
    pub difficulty: String,
    pub num_tours: usize,
    pub avg_rating: f64,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonthPlan {
    pub month: u32,
    pub num_tour_starts: usize,
    pub tours: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TourDistance {
    pub id: Uuid,
    pub name: String,
    pub distance: f64,
}

/// Group well rated tours by difficulty, cheapest group first.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn difficulty_stats(tours: &[tour::Model]) -> Vec<DifficultyStats> {
    let mut groups: BTreeMap<&str, Vec<&tour::Model>> = BTreeMap::new();
    for tour in tours.iter().filter(|t| t.ratings_average >= STATS_MIN_RATING) {
        groups.entry(tour.difficulty.as_str()).or_default().push(tour);
    }

    let mut stats: Vec<DifficultyStats> = groups
        .into_iter()
        .map(|(difficulty, group)| {
            let count = group.len() as f64;
            DifficultyStats {
                difficulty: difficulty.to_string(),
                num_tours: group.len(),
                avg_rating: group.iter().map(|t| t.ratings_average).sum::<f64>() / count,
                avg_price: group.iter().map(|t| t.price).sum::<f64>() / count,
                min_price: group.iter().map(|t| t.price).fold(f64::INFINITY, f64::min),
                max_price: group.iter().map(|t| t.price).fold(f64::NEG_INFINITY, f64::max),
            }
        })
        .collect();
    stats.sort_by(|a, b| a.avg_price.total_cmp(&b.avg_price));
    stats
}

/// Tour starts within `year` grouped by month, busiest month first.
#[must_use]
pub fn plan_for_year(tours: &[tour::Model], year: i32) -> Vec<MonthPlan> {
    let mut months: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    for tour in tours {
        for start in tour.start_dates.0.iter().filter(|date| date.year() == year) {
            months.entry(start.month()).or_default().push(tour.name.clone());
        }
    }

    let mut plan: Vec<MonthPlan> = months
        .into_iter()
        .map(|(month, tours)| MonthPlan {
            month,
            num_tour_starts: tours.len(),
            tours,
        })
        .collect();
    // Stable: ties keep calendar order.
    plan.sort_by(|a, b| b.num_tour_starts.cmp(&a.num_tour_starts));
    plan.truncate(MONTHS_IN_PLAN);
    plan
}

/// Tours starting within `distance` of the center.
#[must_use]
pub fn within(
    tours: Vec<tour::Model>,
    distance: f64,
    center: Center,
    unit: Unit,
) -> Vec<tour::Model> {
    let radius = distance / unit.earth_radius();
    tours
        .into_iter()
        .filter(|tour| {
            tour.start_location
                .as_ref()
                .is_some_and(|point| central_angle(center, point) <= radius)
        })
        .collect()
}

/// Distance from the center to the start of every located tour, nearest first.
#[must_use]
pub fn distances(tours: &[tour::Model], center: Center, unit: Unit) -> Vec<TourDistance> {
    let mut distances: Vec<TourDistance> = tours
        .iter()
        .filter_map(|tour| {
            let point = tour.start_location.as_ref()?;
            Some(TourDistance {
                id: tour.id,
                name: tour.name.clone(),
                distance: central_angle(center, point) * EARTH_RADIUS_M * unit.per_meter(),
            })
        })
        .collect();
    distances.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    distances
}

async fn visible_tours(
    db: &DatabaseConnection,
    condition: Condition,
) -> Result<Vec<tour::Model>, DbErr> {
    tour::Entity::find()
        .filter(Tour::base_condition())
        .filter(condition)
        .all(db)
        .await
}

/// # Errors
///
/// Storage errors are propagated unchanged.
pub async fn tour_stats(db: &DatabaseConnection) -> Result<Vec<DifficultyStats>, DbErr> {
    let tours = visible_tours(
        db,
        Condition::all().add(tour::Column::RatingsAverage.gte(STATS_MIN_RATING)),
    )
    .await?;
    Ok(difficulty_stats(&tours))
}

/// # Errors
///
/// Storage errors are propagated unchanged.
pub async fn monthly_plan(db: &DatabaseConnection, year: i32) -> Result<Vec<MonthPlan>, DbErr> {
    let tours = visible_tours(db, Condition::all()).await?;
    Ok(plan_for_year(&tours, year))
}

/// # Errors
///
/// Storage errors are propagated unchanged.
pub async fn tours_within(
    db: &DatabaseConnection,
    distance: f64,
    center: Center,
    unit: Unit,
) -> Result<Vec<Tour>, DbErr> {
    let located = visible_tours(
        db,
        Condition::all().add(tour::Column::StartLocation.is_not_null()),
    )
    .await?;
    let mut docs: Vec<Tour> = within(located, distance, center, unit)
        .into_iter()
        .map(Tour::from)
        .collect();
    Tour::populate(db, &mut docs).await?;
    Ok(docs)
}

/// # Errors
///
/// Storage errors are propagated unchanged.
pub async fn tour_distances(
    db: &DatabaseConnection,
    center: Center,
    unit: Unit,
) -> Result<Vec<TourDistance>, DbErr> {
    let located = visible_tours(
        db,
        Condition::all().add(tour::Column::StartLocation.is_not_null()),
    )
    .await?;
    Ok(distances(&located, center, unit))
}
