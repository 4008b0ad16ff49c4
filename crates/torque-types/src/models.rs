use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A shop mechanic. Owners are shadowed by an employee record with the
/// same discord_id so they can transact sales like anyone else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: Uuid,
    pub character_name: String,
    pub discord_id: String,
    pub is_blocked: bool,
    pub block_reason: Option<String>,
    pub blocked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    pub id: Uuid,
    pub character_name: String,
    pub discord_id: String,
    pub created_at: DateTime<Utc>,
}

/// One customer transaction. Totals are always recomputed from the item
/// set, never carried forward from a previous state of the row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub customer_name: String,
    pub vehicle_plate: String,
    pub discount_percentage: f64,
    pub subtotal: f64,
    pub discount_amount: f64,
    pub tax_amount: f64,
    pub total_amount: f64,
    pub is_fake: bool,
    pub is_verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub discord_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Populated by list endpoints; detail endpoints return the items
    /// themselves instead.
    #[serde(default)]
    pub item_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleItem {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub item_name: String,
    pub item_category: String,
    pub item_type: String,
    pub quantity: u32,
    pub price: f64,
    pub subtotal: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Announcement {
    pub id: Uuid,
    pub message: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub created_by: Uuid,
}
