use std::{collections::HashMap, fmt, str::FromStr, sync::LazyLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    entity::prelude::*,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::core::{CrudResource, MergeIntoActiveModel};
use crate::errors::ApiError;
use crate::filtering::{FieldCatalog, FieldKind, FieldSpec};
use crate::validation::{Validatable, ValidationError, ValidationErrors, validators};

pub const DEFAULT_PHOTO: &str = "default.jpg";
pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(unique)]
    pub email: String,
    pub photo: String,
    pub role: String,
    /// bcrypt hash, never serialized
    pub password: String,
    pub password_changed_at: Option<DateTimeUtc>,
    pub password_reset_token: Option<String>,
    pub password_reset_expires: Option<DateTimeUtc>,
    pub active: bool,
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

impl Model {
    #[must_use]
    pub fn role(&self) -> Role {
        self.role.parse().unwrap_or(Role::User)
    }

    /// Whether the password changed after a token issued at `issued_at`
    /// (seconds since the epoch).
    #[must_use]
    pub fn changed_password_after(&self, issued_at: i64) -> bool {
        self.password_changed_at
            .is_some_and(|changed| issued_at < changed.timestamp())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    User,
    Guide,
    LeadGuide,
    Admin,
}

impl Role {
    pub const ALL: [Self; 4] = [Self::User, Self::Guide, Self::LeadGuide, Self::Admin];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Guide => "guide",
            Self::LeadGuide => "lead-guide",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == value)
            .ok_or_else(|| format!("unknown role '{value}'"))
    }
}

/// Public representation of a user. Password material stays private.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "__v")]
    pub version: i32,
}

impl From<Model> for User {
    fn from(model: Model) -> Self {
        let role = model.role();
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            photo: model.photo,
            role,
            created_at: model.created_at,
            version: model.version,
        }
    }
}

/// A tour guide, as embedded in tour documents.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GuideSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo: String,
}

/// A review author, as embedded in review documents.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AuthorSummary {
    pub id: Uuid,
    pub name: String,
    pub photo: String,
}

/// Active users with the given ids, keyed by id.
///
/// # Errors
///
/// Storage errors are propagated unchanged.
pub async fn find_active_by_ids(
    db: &DatabaseConnection,
    ids: Vec<Uuid>,
) -> Result<HashMap<Uuid, Model>, DbErr> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let users = Entity::find()
        .filter(Column::Active.eq(true))
        .filter(Column::Id.is_in(ids))
        .all(db)
        .await?;
    Ok(users.into_iter().map(|user| (user.id, user)).collect())
}

/// Administrative update of another user. Passwords are changed through the
/// dedicated password routes only.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub photo: Option<String>,
    pub role: Option<String>,
    #[schema(ignore)]
    pub password: Option<serde_json::Value>,
    #[schema(ignore)]
    pub password_confirm: Option<serde_json::Value>,
}

impl Validatable for UserUpdate {
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
        if let Some(role) = &self.role {
            errors.check(validate_role(role));
        }
        errors.result()
    }
}

impl MergeIntoActiveModel<ActiveModel> for UserUpdate {
    fn merge_into_activemodel(self, mut existing: ActiveModel) -> Result<ActiveModel, ApiError> {
        if let Some(name) = self.name {
            existing.name = Set(name.trim().to_string());
        }
        if let Some(email) = self.email {
            existing.email = Set(normalize_email(&email));
        }
        if let Some(photo) = self.photo {
            existing.photo = Set(photo);
        }
        if let Some(role) = self.role {
            existing.role = Set(role);
        }
        Ok(existing)
    }
}

pub(crate) fn reject_password_fields(present: bool) -> Result<(), ValidationError> {
    if present {
        return Err(ValidationError::new(
            "password",
            "This route is not for password updates. Please use /updatemypassword",
        ));
    }
    Ok(())
}

fn validate_role(role: &str) -> Result<(), ValidationError> {
    let roles: Vec<&str> = Role::ALL.iter().map(|role| role.as_str()).collect();
    validators::validate_one_of(
        "role",
        role,
        &roles,
        "Role is either: user, guide, lead-guide, admin",
    )
}

#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

static CATALOG: LazyLock<FieldCatalog> = LazyLock::new(|| {
    FieldCatalog::new([
        FieldSpec::new("name", FieldKind::Text).filterable().sortable(),
        FieldSpec::new("email", FieldKind::Text).filterable().sortable(),
        FieldSpec::new("role", FieldKind::Text).filterable().sortable(),
        FieldSpec::new("photo", FieldKind::Text),
    ])
});

#[async_trait]
impl CrudResource for User {
    type EntityType = Entity;
    type ModelType = Model;
    type ActiveModelType = ActiveModel;
    type ColumnType = Column;
    type UpdateModel = UserUpdate;

    const RESOURCE_NAME_SINGULAR: &'static str = "user";
    const RESOURCE_NAME_PLURAL: &'static str = "users";
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
            "email" => Column::Email,
            "role" => Column::Role,
            "photo" => Column::Photo,
            "createdAt" => Column::CreatedAt,
            "__v" => Column::Version,
            _ => return None,
        })
    }

    /// Deactivated accounts are invisible everywhere.
    fn base_condition() -> Condition {
        Condition::all().add(Column::Active.eq(true))
    }

    async fn before_delete(db: &DatabaseConnection, model: &Model) -> Result<(), DbErr> {
        super::review::delete_by_author(db, model.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> Model {
        Model {
            id: Uuid::new_v4(),
            name: "Leo Gillespie".into(),
            email: "leo@example.io".into(),
            photo: DEFAULT_PHOTO.into(),
            role: "lead-guide".into(),
            password: "$2b$04$hash".into(),
            password_changed_at: None,
            password_reset_token: Some("secret".into()),
            password_reset_expires: None,
            active: true,
            created_at: Utc::now(),
            version: 0,
        }
    }

    #[test]
    fn test_public_user_hides_password_material() {
        let json = serde_json::to_value(User::from(model())).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("passwordResetToken").is_none());
        assert_eq!(json["role"], "lead-guide");
        assert_eq!(json["__v"], 0);
    }

    #[test]
    fn test_changed_password_after() {
        let mut user = model();
        assert!(!user.changed_password_after(0));

        let changed = Utc::now();
        user.password_changed_at = Some(changed);
        assert!(user.changed_password_after(changed.timestamp() - 10));
        assert!(!user.changed_password_after(changed.timestamp() + 10));
    }

    #[test]
    fn test_role_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_update_rejects_password_fields() {
        let update = UserUpdate {
            password: Some(serde_json::json!("newpassword")),
            ..UserUpdate::default()
        };
        let errors = update.validate().unwrap_err();
        assert_eq!(errors.errors()[0].field, "password");
    }

    #[test]
    fn test_update_rejects_unknown_role() {
        let update = UserUpdate {
            role: Some("root".into()),
            ..UserUpdate::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Leo@Example.IO "), "leo@example.io");
    }
}
