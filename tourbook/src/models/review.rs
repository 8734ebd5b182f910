use std::{collections::BTreeSet, sync::LazyLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue::Set,
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    entity::prelude::*,
    sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Reference;
use super::user::{self, AuthorSummary};
use crate::core::{CreatableResource, CrudResource, MergeIntoActiveModel};
use crate::errors::ApiError;
use crate::filtering::{FieldCatalog, FieldKind, FieldSpec};
use crate::validation::{Validatable, ValidationError, ValidationErrors, validators};

/// Rating of a tour without reviews.
pub const DEFAULT_RATINGS_AVERAGE: f64 = 4.5;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "reviews")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub review: String,
    pub rating: i32,
    pub tour: Uuid,
    pub user: Uuid,
    pub created_at: DateTimeUtc,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tour::Entity",
        from = "Column::Tour",
        to = "super::tour::Column::Id",
        on_delete = "Cascade"
    )]
    Tour,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::User",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::tour::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tour.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub review: String,
    pub rating: i32,
    pub tour: Uuid,
    pub user: Reference<AuthorSummary>,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "__v")]
    pub version: i32,
}

impl From<Model> for Review {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            review: model.review,
            rating: model.rating,
            tour: model.tour,
            user: Reference::Id(model.user),
            created_at: model.created_at,
            version: model.version,
        }
    }
}

impl Review {
    #[must_use]
    pub fn author_id(&self) -> Uuid {
        match &self.user {
            Reference::Populated(author) => author.id,
            Reference::Id(id) => *id,
        }
    }
}

/// Payload for `POST /reviews` and `POST /tours/{tourId}/reviews`.
///
/// `tour` falls back to the path parameter and `user` is always the
/// authenticated user; both are filled in by the handler.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
pub struct ReviewCreate {
    pub review: Option<String>,
    pub rating: Option<i32>,
    pub tour: Option<Uuid>,
    #[serde(skip)]
    #[schema(ignore)]
    pub user: Option<Uuid>,
}

impl Validatable for ReviewCreate {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check(validators::validate_required(
            "review",
            self.review.as_deref().unwrap_or_default(),
            "Review cannot be empty",
        ));
        match self.rating {
            Some(rating) => errors.check(validate_rating(rating)),
            None => errors.add(ValidationError::new("rating", "A review must have a rating")),
        }
        if self.tour.is_none() {
            errors.add(ValidationError::new("tour", "Review must belong to a tour"));
        }
        if self.user.is_none() {
            errors.add(ValidationError::new("user", "Review must belong to a user"));
        }
        errors.result()
    }
}

/// Only the text and the rating of a review can change.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
pub struct ReviewUpdate {
    pub review: Option<String>,
    pub rating: Option<i32>,
}

impl Validatable for ReviewUpdate {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(review) = &self.review {
            errors.check(validators::validate_required("review", review, "Review cannot be empty"));
        }
        if let Some(rating) = self.rating {
            errors.check(validate_rating(rating));
        }
        errors.result()
    }
}

impl MergeIntoActiveModel<ActiveModel> for ReviewUpdate {
    fn merge_into_activemodel(self, mut existing: ActiveModel) -> Result<ActiveModel, ApiError> {
        if let Some(review) = self.review {
            existing.review = Set(review.trim().to_string());
        }
        if let Some(rating) = self.rating {
            existing.rating = Set(rating);
        }
        Ok(existing)
    }
}

fn validate_rating(rating: i32) -> Result<(), ValidationError> {
    validators::validate_range(
        "rating",
        rating,
        Some(1),
        Some(5),
        "Rating must be between 1 and 5",
    )
}

/// Recompute `ratingsQuantity` and `ratingsAverage` of a tour from its
/// reviews. A tour without reviews goes back to 0 and the default average.
///
/// # Errors
///
/// Storage errors are propagated unchanged.
pub async fn recalculate_ratings(db: &DatabaseConnection, tour_id: Uuid) -> Result<(), DbErr> {
    let ratings: Vec<i32> = Entity::find()
        .select_only()
        .column(Column::Rating)
        .filter(Column::Tour.eq(tour_id))
        .into_tuple()
        .all(db)
        .await?;

    let (quantity, average) = rating_summary(&ratings);
    super::tour::Entity::update_many()
        .col_expr(super::tour::Column::RatingsQuantity, Expr::value(quantity))
        .col_expr(super::tour::Column::RatingsAverage, Expr::value(average))
        .filter(super::tour::Column::Id.eq(tour_id))
        .exec(db)
        .await?;

    tracing::debug!(%tour_id, quantity, average, "Tour ratings recalculated");
    Ok(())
}

/// Count and average rounded to one decimal.
fn rating_summary(ratings: &[i32]) -> (i32, f64) {
    if ratings.is_empty() {
        return (0, DEFAULT_RATINGS_AVERAGE);
    }
    let quantity = i32::try_from(ratings.len()).unwrap_or(i32::MAX);
    let sum: f64 = ratings.iter().map(|rating| f64::from(*rating)).sum();
    let average = sum / f64::from(quantity);
    (quantity, (average * 10.0).round() / 10.0)
}

/// Remove every review written by `user_id` and refresh the affected tours.
///
/// # Errors
///
/// Storage errors are propagated unchanged.
pub async fn delete_by_author(db: &DatabaseConnection, user_id: Uuid) -> Result<(), DbErr> {
    let tours: BTreeSet<Uuid> = Entity::find()
        .select_only()
        .column(Column::Tour)
        .filter(Column::User.eq(user_id))
        .into_tuple::<Uuid>()
        .all(db)
        .await?
        .into_iter()
        .collect();

    Entity::delete_many()
        .filter(Column::User.eq(user_id))
        .exec(db)
        .await?;

    for tour_id in tours {
        recalculate_ratings(db, tour_id).await?;
    }
    Ok(())
}

/// Reviews of one tour, newest first, with their authors populated.
///
/// # Errors
///
/// Storage errors are propagated unchanged.
pub async fn for_tour(db: &DatabaseConnection, tour_id: Uuid) -> Result<Vec<Review>, DbErr> {
    let models = Entity::find()
        .filter(Column::Tour.eq(tour_id))
        .order_by_desc(Column::CreatedAt)
        .order_by_asc(Column::Id)
        .all(db)
        .await?;
    let mut reviews: Vec<Review> = models.into_iter().map(Review::from).collect();
    Review::populate(db, &mut reviews).await?;
    Ok(reviews)
}

static CATALOG: LazyLock<FieldCatalog> = LazyLock::new(|| {
    FieldCatalog::new([
        FieldSpec::new("review", FieldKind::Text),
        FieldSpec::new("rating", FieldKind::Integer)
            .filterable()
            .sortable(),
        FieldSpec::new("tour", FieldKind::Uuid).filterable(),
        FieldSpec::new("user", FieldKind::Uuid).filterable(),
    ])
});

#[async_trait]
impl CrudResource for Review {
    type EntityType = Entity;
    type ModelType = Model;
    type ActiveModelType = ActiveModel;
    type ColumnType = Column;
    type UpdateModel = ReviewUpdate;

    const RESOURCE_NAME_SINGULAR: &'static str = "review";
    const RESOURCE_NAME_PLURAL: &'static str = "reviews";
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
            "review" => Column::Review,
            "rating" => Column::Rating,
            "tour" => Column::Tour,
            "user" => Column::User,
            "createdAt" => Column::CreatedAt,
            "__v" => Column::Version,
            _ => return None,
        })
    }

    /// Replace author ids with `{id, name, photo}`. Authors that are gone or
    /// deactivated stay as bare ids.
    async fn populate(db: &DatabaseConnection, docs: &mut [Self]) -> Result<(), DbErr> {
        let ids: BTreeSet<Uuid> = docs.iter().map(Review::author_id).collect();
        let authors = user::find_active_by_ids(db, ids.into_iter().collect()).await?;
        for doc in docs {
            if let Some(author) = authors.get(&doc.author_id()) {
                doc.user = Reference::Populated(AuthorSummary {
                    id: author.id,
                    name: author.name.clone(),
                    photo: author.photo.clone(),
                });
            }
        }
        Ok(())
    }

    async fn after_change(db: &DatabaseConnection, model: &Model) -> Result<(), DbErr> {
        recalculate_ratings(db, model.tour).await
    }
}

impl CreatableResource for Review {
    type CreateModel = ReviewCreate;

    fn create_active_model(create: ReviewCreate) -> Result<ActiveModel, ApiError> {
        let (Some(review), Some(rating), Some(tour), Some(user)) =
            (create.review, create.rating, create.tour, create.user)
        else {
            return Err(ApiError::bad_request("Review must belong to a tour and a user"));
        };
        Ok(ActiveModel {
            id: Set(Uuid::new_v4()),
            review: Set(review.trim().to_string()),
            rating: Set(rating),
            tour: Set(tour),
            user: Set(user),
            created_at: Set(Utc::now()),
            version: Set(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_summary_defaults_without_reviews() {
        assert_eq!(rating_summary(&[]), (0, DEFAULT_RATINGS_AVERAGE));
    }

    #[test]
    fn test_rating_summary_rounds_to_one_decimal() {
        assert_eq!(rating_summary(&[5, 4, 4]), (3, 4.3));
        assert_eq!(rating_summary(&[5, 4]), (2, 4.5));
        assert_eq!(rating_summary(&[1]), (1, 1.0));
    }

    #[test]
    fn test_create_requires_everything() {
        let errors = ReviewCreate::default().validate().unwrap_err();
        let fields: Vec<&str> = errors.errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, ["review", "rating", "tour", "user"]);
    }

    #[test]
    fn test_create_rejects_out_of_range_rating() {
        let create = ReviewCreate {
            review: Some("Amazing".into()),
            rating: Some(6),
            tour: Some(Uuid::new_v4()),
            user: Some(Uuid::new_v4()),
        };
        let errors = create.validate().unwrap_err();
        assert_eq!(errors.errors()[0].message, "Rating must be between 1 and 5");
    }

    #[test]
    fn test_user_is_not_read_from_the_body() {
        let user = Uuid::new_v4();
        let create: ReviewCreate = serde_json::from_value(serde_json::json!({
            "review": "Great",
            "rating": 5,
            "user": user,
        }))
        .unwrap();
        assert_eq!(create.user, None);
    }

    #[test]
    fn test_unpopulated_author_serializes_as_id() {
        let id = Uuid::new_v4();
        let review = Review::from(Model {
            id: Uuid::new_v4(),
            review: "Great".into(),
            rating: 5,
            tour: Uuid::new_v4(),
            user: id,
            created_at: Utc::now(),
            version: 0,
        });
        let json = serde_json::to_value(&review).unwrap();
        assert_eq!(json["user"], serde_json::json!(id));
        assert_eq!(review.author_id(), id);
    }
}
