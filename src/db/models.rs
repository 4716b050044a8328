use serde::{Deserialize, Serialize};
use chrono::{NaiveDate, DateTime, Utc};

pub const STATUS_APPROVED: &str = "approved";
pub const STATUS_PENDING: &str = "pending";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Donation {
    pub id: String,
    pub donor_name: String,
    /// Whole rupees. Missing amounts are normalized to 0 before insertion.
    pub amount: i64,
    pub donated_on: NaiveDate,
    pub category_id: String,
    pub notes: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub order_key: i64,
    pub created_at: DateTime<Utc>,
}

// Deliberately not Serialize: the secret must never leave the process.
// Outward-facing views live in the route layer.
#[derive(Debug, Clone)]
pub struct SubAdmin {
    pub id: String,
    pub username: String,
    pub secret: String,
    pub can_add: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_manage_categories: bool,
    /// Empty means every category is accessible.
    pub assigned_categories: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub view_mode: String,
    pub community_enabled: bool,
    pub show_dates: bool,
    pub admin_username: String,
    pub admin_secret: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ActivityLog {
    pub id: String,
    pub action: String,
    pub entity: String,
    pub entity_id: Option<String>,
    pub details: Option<String>,
    pub actor_id: String,
    pub actor_kind: String,
    pub origin: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CommunityPost {
    pub id: String,
    pub alias: Option<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
