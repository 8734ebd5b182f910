//! Authentication: password hashing, JWT sessions and route guards.

pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod password;

pub use middleware::{CurrentUser, protect, restrict_to};
