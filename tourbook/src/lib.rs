//! # tourbook
//!
//! A tour booking REST API on Axum and Sea-ORM: tours, users and reviews
//! behind generic CRUD handlers, with a query builder for list endpoints.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sea_orm::Database;
//! use sea_orm_migration::MigratorTrait;
//! use tourbook::{AppState, Config, Migrator, email::MemoryMailer, routes};
//!
//! let config = Config::for_tests();
//! let db = Database::connect(&config.database_url).await?;
//! Migrator::up(&db, None).await?;
//!
//! let state = AppState::new(db, config, Arc::new(MemoryMailer::new()));
//! let app = routes::app(state);
//! ```
//!
//! ## List queries
//!
//! Every list endpoint accepts filters, `sort`, `fields`, `page` and `limit`:
//!
//! ```text
//! GET /api/v1/tours?duration[gte]=5&difficulty=easy&sort=-price&fields=name,price&page=2&limit=10
//! ```
//!
//! See [`filtering`] for the accepted syntax.

pub mod auth;
pub mod config;
pub mod core;
pub mod email;
pub mod errors;
pub mod filtering;
pub mod images;
pub mod migration;
pub mod models;
pub mod rate_limit;
pub mod response;
pub mod routes;
pub mod state;
pub mod stats;
pub mod validation;

pub use config::Config;
pub use crate::core::{CreatableResource, CrudResource, MergeIntoActiveModel};
pub use errors::ApiError;
pub use filtering::{ApiFeatures, QueryDescriptor, QueryParams, build_query};
pub use migration::Migrator;
pub use state::AppState;
pub use validation::Validatable;
