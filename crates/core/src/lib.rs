//! `fnapp-core`: handler building blocks.
//!
//! This crate is transport-free: envelopes, validation, identifiers, the
//! entity store and the user operations. HTTP status mapping lives in `fnapp-api`.

pub mod entity;
pub mod envelope;
pub mod error;
pub mod id;
pub mod model;
pub mod store;
pub mod users;
pub mod validation;

pub use entity::Entity;
pub use envelope::{iso_timestamp, ApiResponse};
pub use error::{ApiError, ApiResult};
pub use id::generate_id;
pub use model::{Item, Page};
pub use store::{EntityStore, InMemoryStore};
pub use users::{User, UserDirectory, UserPatch};
pub use validation::{is_valid_email, validate_required};
