// Generic CRUD operations and the axum handlers built on them

pub mod crud_operations;
pub mod handlers;
pub mod traits;

// Re-export commonly used items
pub use crud_operations::Document;
pub use traits::{CreatableResource, CrudResource, MergeIntoActiveModel};
