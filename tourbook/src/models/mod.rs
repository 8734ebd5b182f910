pub mod review;
pub mod tour;
pub mod user;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A reference to another document: its id, or the document itself once
/// populated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum Reference<T> {
    Populated(T),
    Id(Uuid),
}

