//! Execution of CRUD operations for any [`CrudResource`].
//!
//! The query builder only describes a list query; this module turns a
//! [`QueryDescriptor`] into a `SeaORM` select and runs it exactly once.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel,
    ModelTrait, QueryFilter, QueryOrder, QuerySelect, Value,
    sea_query::{Expr, SimpleExpr},
};
use serde::Serialize;
use serde_json::Map;
use uuid::Uuid;

use super::traits::{CreatableResource, CrudResource, MergeIntoActiveModel};
use crate::errors::ApiError;
use crate::filtering::{
    ComparisonOp, FieldFilter, FilterValue, Predicate, Projection, QueryDescriptor,
};
use crate::validation::Validatable;

/// A serialized document after projection.
pub type Document = Map<String, serde_json::Value>;

/// Run a list query. `scope` narrows the result further, e.g. to the reviews
/// of one tour.
///
/// # Errors
///
/// Storage errors are propagated unchanged.
pub async fn get_all<R: CrudResource>(
    db: &DatabaseConnection,
    query: &QueryDescriptor,
    scope: Condition,
) -> Result<Vec<Document>, ApiError> {
    let condition = R::base_condition()
        .add(scope)
        .add(filter_condition::<R>(&query.filters)?);

    let mut select = R::EntityType::find().filter(condition);
    for key in &query.sort {
        select = select.order_by(column::<R>(key.field)?, key.direction.order());
    }

    let models = select
        .offset(query.pagination.skip())
        .limit(query.pagination.limit)
        .all(db)
        .await?;

    let mut docs: Vec<R> = models.into_iter().map(R::from_model).collect();
    R::populate(db, &mut docs).await?;

    docs.iter()
        .map(|doc| to_document(doc, &query.projection))
        .collect()
}

/// Fetch a visible model by id.
///
/// # Errors
///
/// `404` when no visible row has this id.
pub async fn find_model<R: CrudResource>(
    db: &DatabaseConnection,
    id: Uuid,
) -> Result<R::ModelType, ApiError> {
    R::EntityType::find()
        .filter(R::base_condition())
        .filter(R::ID_COLUMN.eq(id))
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found(R::RESOURCE_NAME_SINGULAR))
}

/// # Errors
///
/// `404` when missing, storage errors otherwise.
pub async fn get_one<R: CrudResource>(db: &DatabaseConnection, id: Uuid) -> Result<R, ApiError> {
    let mut doc = R::from_model(find_model::<R>(db, id).await?);
    R::populate_detail(db, &mut doc).await?;
    Ok(doc)
}

/// # Errors
///
/// `400` for invalid payloads, `409` for duplicates.
pub async fn create<R: CreatableResource>(
    db: &DatabaseConnection,
    payload: R::CreateModel,
) -> Result<R, ApiError> {
    payload.validate()?;
    let active = R::create_active_model(payload)?;
    let model = active.insert(db).await?;
    R::after_change(db, &model).await?;

    tracing::info!(resource = R::RESOURCE_NAME_SINGULAR, "Document created");

    let mut doc = R::from_model(model);
    R::populate(db, std::slice::from_mut(&mut doc)).await?;
    Ok(doc)
}

/// Apply a partial update and bump the document version.
///
/// # Errors
///
/// `404` when missing, `400` for invalid payloads.
pub async fn update<R: CrudResource>(
    db: &DatabaseConnection,
    id: Uuid,
    payload: R::UpdateModel,
) -> Result<R, ApiError> {
    payload.validate()?;
    let model = find_model::<R>(db, id).await?;
    let active = payload.merge_into_activemodel(model.clone().into_active_model())?;
    let updated = save_with_next_version::<R>(db, &model, active).await?;
    R::after_change(db, &updated).await?;

    let mut doc = R::from_model(updated);
    R::populate(db, std::slice::from_mut(&mut doc)).await?;
    Ok(doc)
}

/// Persist `active`, incrementing the version read from `previous`.
///
/// # Errors
///
/// Storage errors are propagated unchanged.
pub async fn save_with_next_version<R: CrudResource>(
    db: &DatabaseConnection,
    previous: &R::ModelType,
    mut active: R::ActiveModelType,
) -> Result<R::ModelType, ApiError> {
    let version = match previous.get(R::VERSION_COLUMN) {
        Value::Int(Some(version)) => version,
        _ => 0,
    };
    active.set(R::VERSION_COLUMN, Value::Int(Some(version.saturating_add(1))));
    Ok(active.update(db).await?)
}

/// # Errors
///
/// `404` when missing.
pub async fn delete<R: CrudResource>(db: &DatabaseConnection, id: Uuid) -> Result<(), ApiError> {
    let model = find_model::<R>(db, id).await?;
    R::before_delete(db, &model).await?;
    R::EntityType::delete_many()
        .filter(R::ID_COLUMN.eq(id))
        .exec(db)
        .await?;
    R::after_change(db, &model).await?;

    tracing::info!(resource = R::RESOURCE_NAME_SINGULAR, %id, "Document deleted");
    Ok(())
}

/// Serialize a resource and keep only the projected fields.
///
/// # Errors
///
/// Fails if the resource does not serialize to a JSON object.
pub fn to_document<T: Serialize>(doc: &T, projection: &Projection) -> Result<Document, ApiError> {
    match serde_json::to_value(doc) {
        Ok(serde_json::Value::Object(mut map)) => {
            projection.apply(&mut map);
            Ok(map)
        }
        Ok(_) => Err(ApiError::internal(
            "Failed to serialize document",
            Some("resource did not serialize to an object".to_string()),
        )),
        Err(err) => Err(ApiError::internal(
            "Failed to serialize document",
            Some(err.to_string()),
        )),
    }
}

fn column<R: CrudResource>(field: &str) -> Result<R::ColumnType, ApiError> {
    R::column_for(field).ok_or_else(|| {
        ApiError::internal(
            "Something went wrong",
            Some(format!(
                "{} catalog field '{field}' has no column",
                R::RESOURCE_NAME_SINGULAR
            )),
        )
    })
}

fn filter_condition<R: CrudResource>(filters: &[FieldFilter]) -> Result<Condition, ApiError> {
    let mut condition = Condition::all();
    for filter in filters {
        let column = column::<R>(filter.field)?;
        let expr: SimpleExpr = match &filter.predicate {
            Predicate::Compare(op, value) => compare(column, *op, to_value(value)),
            Predicate::In(values) => column.is_in(values.iter().map(to_value)),
            Predicate::Unsupported { token, value } => {
                tracing::debug!(field = filter.field, %token, %value, "Unsupported operator matches nothing");
                Expr::val(1).eq(0)
            }
        };
        condition = condition.add(expr);
    }
    Ok(condition)
}

fn compare<C: ColumnTrait>(column: C, op: ComparisonOp, value: Value) -> SimpleExpr {
    match op {
        ComparisonOp::Eq => column.eq(value),
        ComparisonOp::Gt => column.gt(value),
        ComparisonOp::Gte => column.gte(value),
        ComparisonOp::Lt => column.lt(value),
        ComparisonOp::Lte => column.lte(value),
    }
}

fn to_value(value: &FilterValue) -> Value {
    match value {
        FilterValue::Text(text) => Value::from(text.clone()),
        FilterValue::Integer(number) => Value::from(*number),
        FilterValue::Float(number) => Value::from(*number),
        FilterValue::Boolean(flag) => Value::from(*flag),
        FilterValue::DateTime(at) => Value::from(*at),
        FilterValue::Uuid(id) => Value::from(*id),
    }
}
