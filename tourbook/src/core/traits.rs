use async_trait::async_trait;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr,
    EntityTrait, FromQueryResult, IntoActiveModel, ModelTrait,
};
use serde::{Serialize, de::DeserializeOwned};

use crate::errors::ApiError;
use crate::filtering::FieldCatalog;
use crate::validation::Validatable;

/// Apply a partial update payload onto an existing active model.
pub trait MergeIntoActiveModel<ActiveModelType> {
    /// # Errors
    ///
    /// Returns an `ApiError` when the payload cannot be applied, e.g. a
    /// discount that is no longer below the price.
    fn merge_into_activemodel(self, existing: ActiveModelType) -> Result<ActiveModelType, ApiError>;
}

/// A resource served by the generic CRUD handlers.
///
/// `Self` is the API representation returned to clients. It is built from
/// the entity model and may carry computed or populated fields.
#[async_trait]
pub trait CrudResource: Serialize + Sized + Send + Sync + 'static {
    type EntityType: EntityTrait<
            Model = Self::ModelType,
            ActiveModel = Self::ActiveModelType,
            Column = Self::ColumnType,
        > + Send
        + Sync;
    type ModelType: ModelTrait<Entity = Self::EntityType>
        + FromQueryResult
        + IntoActiveModel<Self::ActiveModelType>
        + Clone
        + Send
        + Sync;
    type ActiveModelType: ActiveModelTrait<Entity = Self::EntityType>
        + ActiveModelBehavior
        + From<Self::ModelType>
        + Send
        + Sync;
    type ColumnType: ColumnTrait + Copy;
    type UpdateModel: DeserializeOwned
        + Validatable
        + MergeIntoActiveModel<Self::ActiveModelType>
        + Send;

    const RESOURCE_NAME_SINGULAR: &'static str;
    const RESOURCE_NAME_PLURAL: &'static str;
    const ID_COLUMN: Self::ColumnType;
    /// Column holding the internal document version (`__v`).
    const VERSION_COLUMN: Self::ColumnType;

    fn from_model(model: Self::ModelType) -> Self;

    /// Public fields accepted by the query builder.
    fn catalog() -> &'static FieldCatalog;

    /// Storage column behind a catalogued field. Every filterable or
    /// sortable catalog entry must resolve.
    fn column_for(field: &str) -> Option<Self::ColumnType>;

    /// Visibility rule applied to every query, e.g. hiding secret tours.
    #[must_use]
    fn base_condition() -> Condition {
        Condition::all()
    }

    /// Replace stored references with their documents, for list responses.
    async fn populate(_db: &DatabaseConnection, _docs: &mut [Self]) -> Result<(), DbErr> {
        Ok(())
    }

    /// Population for single-document responses. Defaults to [`populate`].
    ///
    /// [`populate`]: CrudResource::populate
    async fn populate_detail(db: &DatabaseConnection, doc: &mut Self) -> Result<(), DbErr> {
        Self::populate(db, std::slice::from_mut(doc)).await
    }

    /// Runs before a row is deleted, e.g. to clean up dependent rows.
    async fn before_delete(_db: &DatabaseConnection, _model: &Self::ModelType) -> Result<(), DbErr> {
        Ok(())
    }

    /// Runs after a create, update or delete has been committed.
    async fn after_change(_db: &DatabaseConnection, _model: &Self::ModelType) -> Result<(), DbErr> {
        Ok(())
    }
}

/// A resource that clients can create through `POST`.
pub trait CreatableResource: CrudResource {
    type CreateModel: DeserializeOwned + Validatable + Send;

    /// # Errors
    ///
    /// Returns an `ApiError` when the payload cannot be stored.
    fn create_active_model(create: Self::CreateModel) -> Result<Self::ActiveModelType, ApiError>;
}
