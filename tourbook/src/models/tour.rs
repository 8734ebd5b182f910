use std::{collections::BTreeSet, sync::LazyLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue::{self, Set},
    ColumnTrait, Condition, DatabaseConnection, DbErr, FromJsonQueryResult,
    entity::prelude::*,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Reference;
use super::review::{self, DEFAULT_RATINGS_AVERAGE, Review};
use super::user::{self, GuideSummary};
use crate::core::{CreatableResource, CrudResource, MergeIntoActiveModel};
use crate::errors::ApiError;
use crate::filtering::{FieldCatalog, FieldKind, FieldSpec};
use crate::validation::{Validatable, ValidationError, ValidationErrors, validators};

pub const DIFFICULTIES: [&str; 3] = ["easy", "medium", "difficult"];

/// A GeoJSON point, `coordinates` being `[longitude, latitude]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, FromJsonQueryResult, ToSchema)]
pub struct GeoPoint {
    #[serde(rename = "type", default = "point_type")]
    pub kind: String,
    #[schema(value_type = Vec<f64>)]
    pub coordinates: [f64; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Day of the tour on which the location is visited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<i32>,
}

fn point_type() -> String {
    "Point".to_string()
}

impl GeoPoint {
    #[must_use]
    pub fn lng(&self) -> f64 {
        self.coordinates[0]
    }

    #[must_use]
    pub fn lat(&self) -> f64 {
        self.coordinates[1]
    }

    fn validate(&self, field: &str) -> Result<(), ValidationError> {
        let in_range = (-180.0..=180.0).contains(&self.lng()) && (-90.0..=90.0).contains(&self.lat());
        if self.kind != "Point" || !in_range {
            return Err(ValidationError::new(
                field,
                format!("{field} must be a Point with [longitude, latitude] coordinates"),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct ImageList(pub Vec<String>);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct StartDates(pub Vec<DateTime<Utc>>);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct Locations(pub Vec<GeoPoint>);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct GuideIds(pub Vec<Uuid>);

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "tours")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub name: String,
    pub slug: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: String,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    pub price: f64,
    pub price_discount: Option<f64>,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: String,
    pub images: ImageList,
    pub start_dates: StartDates,
    pub secret_tour: bool,
    pub start_location: Option<GeoPoint>,
    pub locations: Locations,
    pub guides: GuideIds,
    pub created_at: DateTimeUtc,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::review::Entity")]
    Reviews,
}

impl Related<super::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub duration: i32,
    pub duration_weeks: f64,
    pub max_group_size: i32,
    pub difficulty: String,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    pub price: f64,
    pub price_discount: Option<f64>,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: String,
    pub images: Vec<String>,
    pub start_dates: Vec<DateTime<Utc>>,
    pub secret_tour: bool,
    pub start_location: Option<GeoPoint>,
    pub locations: Vec<GeoPoint>,
    pub guides: Vec<Reference<GuideSummary>>,
    /// Only present on single-tour responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviews: Option<Vec<Review>>,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "__v")]
    pub version: i32,
}

impl From<Model> for Tour {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            slug: model.slug,
            duration: model.duration,
            duration_weeks: f64::from(model.duration) / 7.0,
            max_group_size: model.max_group_size,
            difficulty: model.difficulty,
            ratings_average: model.ratings_average,
            ratings_quantity: model.ratings_quantity,
            price: model.price,
            price_discount: model.price_discount,
            summary: model.summary,
            description: model.description,
            image_cover: model.image_cover,
            images: model.images.0,
            start_dates: model.start_dates.0,
            secret_tour: model.secret_tour,
            start_location: model.start_location,
            locations: model.locations.0,
            guides: model.guides.0.into_iter().map(Reference::Id).collect(),
            reviews: None,
            created_at: model.created_at,
            version: model.version,
        }
    }
}

impl Tour {
    fn guide_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.guides.iter().map(|guide| match guide {
            Reference::Populated(summary) => summary.id,
            Reference::Id(id) => *id,
        })
    }
}

/// Lower-case, ASCII-dash separated form of a tour name.
#[must_use]
pub fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

fn round_rating(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TourCreate {
    pub name: Option<String>,
    pub duration: Option<i32>,
    pub max_group_size: Option<i32>,
    pub difficulty: Option<String>,
    pub ratings_average: Option<f64>,
    pub ratings_quantity: Option<i32>,
    pub price: Option<f64>,
    pub price_discount: Option<f64>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub start_dates: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub secret_tour: bool,
    pub start_location: Option<GeoPoint>,
    #[serde(default)]
    pub locations: Vec<GeoPoint>,
    #[serde(default)]
    pub guides: Vec<Uuid>,
}

impl Validatable for TourCreate {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        match &self.name {
            Some(name) => validate_name(&mut errors, name),
            None => errors.add(ValidationError::new("name", "A tour must have a name")),
        }
        match self.duration {
            Some(duration) => errors.check(validate_positive("duration", duration)),
            None => errors.add(ValidationError::new("duration", "A tour must have a duration")),
        }
        match self.max_group_size {
            Some(size) => errors.check(validate_positive("maxGroupSize", size)),
            None => errors.add(ValidationError::new(
                "maxGroupSize",
                "A tour must have a group size",
            )),
        }
        match &self.difficulty {
            Some(difficulty) => errors.check(validate_difficulty(difficulty)),
            None => errors.add(ValidationError::new(
                "difficulty",
                "A tour must have a difficulty",
            )),
        }
        match self.price {
            Some(price) => errors.check(validate_price(price)),
            None => errors.add(ValidationError::new("price", "A tour must have a price")),
        }
        if let (Some(price), Some(discount)) = (self.price, self.price_discount) {
            errors.check(validate_discount(price, discount));
        }
        if let Some(average) = self.ratings_average {
            errors.check(validate_ratings_average(average));
        }
        errors.check(validators::validate_required(
            "summary",
            self.summary.as_deref().unwrap_or_default(),
            "A tour must have a summary",
        ));
        errors.check(validators::validate_required(
            "imageCover",
            self.image_cover.as_deref().unwrap_or_default(),
            "A tour must have a cover image",
        ));
        if let Some(point) = &self.start_location {
            errors.check(point.validate("startLocation"));
        }
        for point in &self.locations {
            errors.check(point.validate("locations"));
        }
        errors.result()
    }
}

#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TourUpdate {
    pub name: Option<String>,
    pub duration: Option<i32>,
    pub max_group_size: Option<i32>,
    pub difficulty: Option<String>,
    pub ratings_average: Option<f64>,
    pub price: Option<f64>,
    pub price_discount: Option<f64>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
    pub start_dates: Option<Vec<DateTime<Utc>>>,
    pub secret_tour: Option<bool>,
    pub start_location: Option<GeoPoint>,
    pub locations: Option<Vec<GeoPoint>>,
    pub guides: Option<Vec<Uuid>>,
}

impl Validatable for TourUpdate {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &self.name {
            validate_name(&mut errors, name);
        }
        if let Some(duration) = self.duration {
            errors.check(validate_positive("duration", duration));
        }
        if let Some(size) = self.max_group_size {
            errors.check(validate_positive("maxGroupSize", size));
        }
        if let Some(difficulty) = &self.difficulty {
            errors.check(validate_difficulty(difficulty));
        }
        if let Some(price) = self.price {
            errors.check(validate_price(price));
        }
        if let Some(average) = self.ratings_average {
            errors.check(validate_ratings_average(average));
        }
        if let Some(summary) = &self.summary {
            errors.check(validators::validate_required(
                "summary",
                summary,
                "A tour must have a summary",
            ));
        }
        if let Some(point) = &self.start_location {
            errors.check(point.validate("startLocation"));
        }
        for point in self.locations.iter().flatten() {
            errors.check(point.validate("locations"));
        }
        errors.result()
    }
}

impl MergeIntoActiveModel<ActiveModel> for TourUpdate {
    fn merge_into_activemodel(self, mut existing: ActiveModel) -> Result<ActiveModel, ApiError> {
        if let Some(name) = self.name {
            let name = name.trim().to_string();
            existing.slug = Set(slugify(&name));
            existing.name = Set(name);
        }
        if let Some(duration) = self.duration {
            existing.duration = Set(duration);
        }
        if let Some(size) = self.max_group_size {
            existing.max_group_size = Set(size);
        }
        if let Some(difficulty) = self.difficulty {
            existing.difficulty = Set(difficulty);
        }
        if let Some(average) = self.ratings_average {
            existing.ratings_average = Set(round_rating(average));
        }
        if let Some(price) = self.price {
            existing.price = Set(price);
        }
        if let Some(discount) = self.price_discount {
            existing.price_discount = Set(Some(discount));
        }
        if let Some(summary) = self.summary {
            existing.summary = Set(summary.trim().to_string());
        }
        if let Some(description) = self.description {
            existing.description = Set(Some(description.trim().to_string()));
        }
        if let Some(cover) = self.image_cover {
            existing.image_cover = Set(cover);
        }
        if let Some(images) = self.images {
            existing.images = Set(ImageList(images));
        }
        if let Some(dates) = self.start_dates {
            existing.start_dates = Set(StartDates(dates));
        }
        if let Some(secret) = self.secret_tour {
            existing.secret_tour = Set(secret);
        }
        if let Some(point) = self.start_location {
            existing.start_location = Set(Some(point));
        }
        if let Some(locations) = self.locations {
            existing.locations = Set(Locations(locations));
        }
        if let Some(guides) = self.guides {
            existing.guides = Set(GuideIds(guides));
        }

        // The discount is checked against the price the tour ends up with.
        if let (Some(price), Some(Some(discount))) =
            (current(&existing.price), current(&existing.price_discount))
        {
            validate_discount(price, discount)
                .map_err(|error| ApiError::validation_failed(vec![error.message]))?;
        }
        Ok(existing)
    }
}

fn current<V: Into<sea_orm::Value> + Clone>(value: &ActiveValue<V>) -> Option<V> {
    match value {
        ActiveValue::Set(value) | ActiveValue::Unchanged(value) => Some(value.clone()),
        ActiveValue::NotSet => None,
    }
}

fn validate_name(errors: &mut ValidationErrors, name: &str) {
    let name = name.trim();
    errors.check(validators::validate_required("name", name, "A tour must have a name"));
    errors.check(validators::validate_length(
        "name",
        name,
        Some(10),
        Some(40),
        "A tour name must have between 10 and 40 characters",
    ));
    errors.check(validators::validate_letters_and_spaces(
        "name",
        name,
        "Tour name must only contain letters",
    ));
}

fn validate_positive(field: &str, value: i32) -> Result<(), ValidationError> {
    validators::validate_range(field, value, Some(1), None, &format!("{field} must be positive"))
}

fn validate_price(price: f64) -> Result<(), ValidationError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(ValidationError::new("price", "Price must be a positive number"));
    }
    Ok(())
}

fn validate_discount(price: f64, discount: f64) -> Result<(), ValidationError> {
    if !discount.is_finite() || discount < 0.0 || discount >= price {
        return Err(ValidationError::new(
            "priceDiscount",
            format!("Discount price ({discount}) must be smaller than original price"),
        ));
    }
    Ok(())
}

fn validate_difficulty(difficulty: &str) -> Result<(), ValidationError> {
    validators::validate_one_of(
        "difficulty",
        difficulty,
        &DIFFICULTIES,
        "Difficulty is either: easy, medium, difficult",
    )
}

fn validate_ratings_average(average: f64) -> Result<(), ValidationError> {
    validators::validate_range(
        "ratingsAverage",
        average,
        Some(1.0),
        Some(5.0),
        "Rating must be between 1 and 5",
    )
}

static CATALOG: LazyLock<FieldCatalog> = LazyLock::new(|| {
    FieldCatalog::new([
        FieldSpec::new("name", FieldKind::Text).filterable().sortable(),
        FieldSpec::new("slug", FieldKind::Text).filterable().sortable(),
        FieldSpec::new("duration", FieldKind::Integer)
            .filterable()
            .sortable(),
        FieldSpec::new("maxGroupSize", FieldKind::Integer)
            .filterable()
            .sortable(),
        FieldSpec::new("difficulty", FieldKind::Text)
            .filterable()
            .sortable(),
        FieldSpec::new("ratingsAverage", FieldKind::Float)
            .filterable()
            .sortable(),
        FieldSpec::new("ratingsQuantity", FieldKind::Integer)
            .filterable()
            .sortable(),
        FieldSpec::new("price", FieldKind::Float).filterable().sortable(),
        FieldSpec::new("priceDiscount", FieldKind::Float)
            .filterable()
            .sortable(),
        FieldSpec::new("durationWeeks", FieldKind::Float),
        FieldSpec::new("summary", FieldKind::Text),
        FieldSpec::new("description", FieldKind::Text),
        FieldSpec::new("imageCover", FieldKind::Text),
        FieldSpec::new("images", FieldKind::Text),
        FieldSpec::new("startDates", FieldKind::DateTime),
        FieldSpec::new("secretTour", FieldKind::Boolean),
        FieldSpec::new("startLocation", FieldKind::Text),
        FieldSpec::new("locations", FieldKind::Text),
        FieldSpec::new("guides", FieldKind::Uuid),
        FieldSpec::new("reviews", FieldKind::Uuid),
    ])
});

#[async_trait]
impl CrudResource for Tour {
    type EntityType = Entity;
    type ModelType = Model;
    type ActiveModelType = ActiveModel;
    type ColumnType = Column;
    type UpdateModel = TourUpdate;

    const RESOURCE_NAME_SINGULAR: &'static str = "tour";
    const RESOURCE_NAME_PLURAL: &'static str = "tours";
    const ID_COLUMN: Column = Column::Id;
    const VERSION_COLUMN: Column = Column::Version;

    fn from_model(model: Model) -> Self {
        model.into()
    }

    fn catalog() -> &'static FieldCatalog {
        &CATALOG
    }

    fn column_for(field: &str) -> Option<Column> {
        Some(match field {
            "id" => Column::Id,
            "name" => Column::Name,
            "slug" => Column::Slug,
            "duration" => Column::Duration,
            "maxGroupSize" => Column::MaxGroupSize,
            "difficulty" => Column::Difficulty,
            "ratingsAverage" => Column::RatingsAverage,
            "ratingsQuantity" => Column::RatingsQuantity,
            "price" => Column::Price,
            "priceDiscount" => Column::PriceDiscount,
            "summary" => Column::Summary,
            "description" => Column::Description,
            "imageCover" => Column::ImageCover,
            "secretTour" => Column::SecretTour,
            "createdAt" => Column::CreatedAt,
            "__v" => Column::Version,
            _ => return None,
        })
    }

    /// Secret tours are never listed nor fetched.
    fn base_condition() -> Condition {
        Condition::all().add(Column::SecretTour.eq(false))
    }

    async fn populate(db: &DatabaseConnection, docs: &mut [Self]) -> Result<(), DbErr> {
        let ids: BTreeSet<Uuid> = docs.iter().flat_map(|doc| doc.guide_ids()).collect();
        let guides = user::find_active_by_ids(db, ids.into_iter().collect()).await?;
        for doc in docs {
            let ids: Vec<Uuid> = doc.guide_ids().collect();
            doc.guides = ids
                .into_iter()
                .map(|id| match guides.get(&id) {
                    Some(guide) => Reference::Populated(GuideSummary {
                        id: guide.id,
                        name: guide.name.clone(),
                        email: guide.email.clone(),
                        photo: guide.photo.clone(),
                    }),
                    None => Reference::Id(id),
                })
                .collect();
        }
        Ok(())
    }

    async fn populate_detail(db: &DatabaseConnection, doc: &mut Self) -> Result<(), DbErr> {
        Self::populate(db, std::slice::from_mut(doc)).await?;
        doc.reviews = Some(review::for_tour(db, doc.id).await?);
        Ok(())
    }
}

impl CreatableResource for Tour {
    type CreateModel = TourCreate;

    fn create_active_model(create: TourCreate) -> Result<ActiveModel, ApiError> {
        let (Some(name), Some(duration), Some(max_group_size), Some(difficulty), Some(price)) = (
            create.name,
            create.duration,
            create.max_group_size,
            create.difficulty,
            create.price,
        ) else {
            return Err(ApiError::bad_request("Missing required tour fields"));
        };
        let name = name.trim().to_string();
        Ok(ActiveModel {
            id: Set(Uuid::new_v4()),
            slug: Set(slugify(&name)),
            name: Set(name),
            duration: Set(duration),
            max_group_size: Set(max_group_size),
            difficulty: Set(difficulty),
            ratings_average: Set(round_rating(
                create.ratings_average.unwrap_or(DEFAULT_RATINGS_AVERAGE),
            )),
            ratings_quantity: Set(create.ratings_quantity.unwrap_or(0)),
            price: Set(price),
            price_discount: Set(create.price_discount),
            summary: Set(create.summary.unwrap_or_default().trim().to_string()),
            description: Set(create.description.map(|text| text.trim().to_string())),
            image_cover: Set(create.image_cover.unwrap_or_default()),
            images: Set(ImageList(create.images)),
            start_dates: Set(StartDates(create.start_dates)),
            secret_tour: Set(create.secret_tour),
            start_location: Set(create.start_location),
            locations: Set(Locations(create.locations)),
            guides: Set(GuideIds(create.guides)),
            created_at: Set(Utc::now()),
            version: Set(0),
        })
    }
}
