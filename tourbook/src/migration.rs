//! Schema for users, tours and reviews.

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(CreateUsersTable),
            Box::new(CreateToursTable),
            Box::new(CreateReviewsTable),
        ]
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Name,
    Email,
    Photo,
    Role,
    Password,
    PasswordChangedAt,
    PasswordResetToken,
    PasswordResetExpires,
    Active,
    CreatedAt,
    Version,
}

#[derive(DeriveIden)]
enum Tours {
    Table,
    Id,
    Name,
    Slug,
    Duration,
    MaxGroupSize,
    Difficulty,
    RatingsAverage,
    RatingsQuantity,
    Price,
    PriceDiscount,
    Summary,
    Description,
    ImageCover,
    Images,
    StartDates,
    SecretTour,
    StartLocation,
    Locations,
    Guides,
    CreatedAt,
    Version,
}

#[derive(DeriveIden)]
enum Reviews {
    Table,
    Id,
    Review,
    Rating,
    Tour,
    User,
    CreatedAt,
    Version,
}

fn version_column<T: IntoIden>(column: T) -> ColumnDef {
    ColumnDef::new(column)
        .integer()
        .not_null()
        .default(0)
        .to_owned()
}

fn created_at_column<T: IntoIden>(column: T) -> ColumnDef {
    ColumnDef::new(column)
        .timestamp_with_time_zone()
        .not_null()
        .to_owned()
}

pub struct CreateUsersTable;

impl MigrationName for CreateUsersTable {
    fn name(&self) -> &'static str {
        "m20240101_000001_create_users_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for CreateUsersTable {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let table = Table::create()
            .table(Users::Table)
            .if_not_exists()
            .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
            .col(ColumnDef::new(Users::Name).string().not_null())
            .col(ColumnDef::new(Users::Email).string().not_null().unique_key())
            .col(
                ColumnDef::new(Users::Photo)
                    .string()
                    .not_null()
                    .default("default.jpg"),
            )
            .col(ColumnDef::new(Users::Role).string().not_null().default("user"))
            .col(ColumnDef::new(Users::Password).string().not_null())
            .col(
                ColumnDef::new(Users::PasswordChangedAt)
                    .timestamp_with_time_zone()
                    .null(),
            )
            .col(ColumnDef::new(Users::PasswordResetToken).string().null())
            .col(
                ColumnDef::new(Users::PasswordResetExpires)
                    .timestamp_with_time_zone()
                    .null(),
            )
            .col(ColumnDef::new(Users::Active).boolean().not_null().default(true))
            .col(created_at_column(Users::CreatedAt))
            .col(version_column(Users::Version))
            .to_owned();

        manager.create_table(table).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await
    }
}

pub struct CreateToursTable;

impl MigrationName for CreateToursTable {
    fn name(&self) -> &'static str {
        "m20240101_000002_create_tours_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for CreateToursTable {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let table = Table::create()
            .table(Tours::Table)
            .if_not_exists()
            .col(ColumnDef::new(Tours::Id).uuid().not_null().primary_key())
            .col(ColumnDef::new(Tours::Name).string().not_null().unique_key())
            .col(ColumnDef::new(Tours::Slug).string().not_null())
            .col(ColumnDef::new(Tours::Duration).integer().not_null())
            .col(ColumnDef::new(Tours::MaxGroupSize).integer().not_null())
            .col(ColumnDef::new(Tours::Difficulty).string().not_null())
            .col(
                ColumnDef::new(Tours::RatingsAverage)
                    .double()
                    .not_null()
                    .default(4.5),
            )
            .col(
                ColumnDef::new(Tours::RatingsQuantity)
                    .integer()
                    .not_null()
                    .default(0),
            )
            .col(ColumnDef::new(Tours::Price).double().not_null())
            .col(ColumnDef::new(Tours::PriceDiscount).double().null())
            .col(ColumnDef::new(Tours::Summary).text().not_null())
            .col(ColumnDef::new(Tours::Description).text().null())
            .col(ColumnDef::new(Tours::ImageCover).string().not_null())
            .col(ColumnDef::new(Tours::Images).json().not_null())
            .col(ColumnDef::new(Tours::StartDates).json().not_null())
            .col(
                ColumnDef::new(Tours::SecretTour)
                    .boolean()
                    .not_null()
                    .default(false),
            )
            .col(ColumnDef::new(Tours::StartLocation).json().null())
            .col(ColumnDef::new(Tours::Locations).json().not_null())
            .col(ColumnDef::new(Tours::Guides).json().not_null())
            .col(created_at_column(Tours::CreatedAt))
            .col(version_column(Tours::Version))
            .to_owned();
        manager.create_table(table).await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tours_price_ratings_average")
                    .table(Tours::Table)
                    .col(Tours::Price)
                    .col((Tours::RatingsAverage, IndexOrder::Desc))
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_tours_slug")
                    .table(Tours::Table)
                    .col(Tours::Slug)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Tours::Table).to_owned())
            .await
    }
}

pub struct CreateReviewsTable;

impl MigrationName for CreateReviewsTable {
    fn name(&self) -> &'static str {
        "m20240101_000003_create_reviews_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for CreateReviewsTable {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let table = Table::create()
            .table(Reviews::Table)
            .if_not_exists()
            .col(ColumnDef::new(Reviews::Id).uuid().not_null().primary_key())
            .col(ColumnDef::new(Reviews::Review).text().not_null())
            .col(ColumnDef::new(Reviews::Rating).integer().not_null())
            .col(ColumnDef::new(Reviews::Tour).uuid().not_null())
            .col(ColumnDef::new(Reviews::User).uuid().not_null())
            .col(created_at_column(Reviews::CreatedAt))
            .col(version_column(Reviews::Version))
            .foreign_key(
                ForeignKey::create()
                    .name("fk_review_tour")
                    .from(Reviews::Table, Reviews::Tour)
                    .to(Tours::Table, Tours::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk_review_user")
                    .from(Reviews::Table, Reviews::User)
                    .to(Users::Table, Users::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .to_owned();
        manager.create_table(table).await?;

        // One review per user and tour
        manager
            .create_index(
                Index::create()
                    .name("idx_reviews_tour_user")
                    .table(Reviews::Table)
                    .col(Reviews::Tour)
                    .col(Reviews::User)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Reviews::Table).to_owned())
            .await
    }
}
