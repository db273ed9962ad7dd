//! Shared record shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::envelope::{serialize_iso, serialize_opt_iso};

/// Catalogue item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(serialize_with = "serialize_iso")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_opt_iso"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One page of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub has_more: bool,
}

impl<T> Page<T> {
    /// A page holding the whole collection.
    pub fn single(items: Vec<T>) -> Self {
        let total = items.len();
        Self {
            items,
            total,
            page: 1,
            page_size: total,
            has_more: false,
        }
    }
}
