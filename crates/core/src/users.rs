//! User records and the operations behind the `/users` routes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::entity::Entity;
use crate::envelope::{serialize_iso, serialize_opt_iso};
use crate::error::{ApiError, ApiResult};
use crate::id::generate_id;
use crate::store::EntityStore;
use crate::validation::{is_valid_email, validate_required};

pub const USER_ID_PREFIX: &str = "user";

const REQUIRED_FIELDS: [&str; 2] = ["name", "email"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(serialize_with = "serialize_iso")]
    pub created_at: DateTime<Utc>,
    /// Set only once the user has been modified.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_opt_iso"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for User {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Partial update. Missing or empty values keep the current field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl UserPatch {
    /// Merge onto `current`. `id` and `created_at` never change.
    pub fn apply(&self, current: &User, now: DateTime<Utc>) -> User {
        User {
            id: current.id.clone(),
            name: pick(&self.name, &current.name),
            email: pick(&self.email, &current.email),
            created_at: current.created_at,
            updated_at: Some(now),
        }
    }
}

fn pick(candidate: &Option<String>, current: &str) -> String {
    match candidate.as_deref() {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => current.to_string(),
    }
}

/// User operations over an injected store.
#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn EntityStore<User>>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn EntityStore<User>>) -> Self {
        Self { store }
    }

    pub fn get(&self, id: &str) -> ApiResult<User> {
        self.store.get(id).ok_or_else(user_not_found)
    }

    pub fn list(&self) -> Vec<User> {
        self.store.list()
    }

    pub fn ensure_exists(&self, id: &str) -> ApiResult<()> {
        self.get(id).map(|_| ())
    }

    /// Validate a raw create body and persist the new user.
    ///
    /// Nothing is stored when validation fails.
    pub fn create(&self, body: &Value, now: DateTime<Utc>) -> ApiResult<User> {
        validate_required(body, &REQUIRED_FIELDS)?;

        let name = body
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::validation("Field 'name' must be a string"))?;
        let email = body
            .get("email")
            .and_then(Value::as_str)
            .filter(|e| is_valid_email(e))
            .ok_or_else(|| ApiError::validation("Invalid email format"))?;

        let user = User {
            id: generate_id(Some(USER_ID_PREFIX)),
            name: name.to_string(),
            email: email.to_string(),
            created_at: now,
            updated_at: None,
        };

        self.store.insert(user.clone());
        info!(user_id = %user.id, "user created");
        Ok(user)
    }

    pub fn update(&self, id: &str, patch: &UserPatch, now: DateTime<Utc>) -> ApiResult<User> {
        let updated = self
            .store
            .update(id, &mut |current| patch.apply(current, now))
            .ok_or_else(user_not_found)?;
        info!(user_id = %id, "user updated");
        Ok(updated)
    }

    pub fn delete(&self, id: &str) -> ApiResult<()> {
        if !self.store.delete(id) {
            return Err(user_not_found());
        }
        info!(user_id = %id, "user deleted");
        Ok(())
    }
}

fn user_not_found() -> ApiError {
    ApiError::not_found("User not found")
}
