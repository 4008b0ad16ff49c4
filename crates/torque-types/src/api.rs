use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Announcement, Employee, Owner, Sale, SaleItem};
use crate::session::{Role, Session};

// -- JWT Claims --

/// JWT claims shared across torque-api (REST middleware) and torque-gateway
/// (WebSocket authentication). Canonical definition lives here in
/// torque-types to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// The employees-table id (shadow record id for owners).
    pub sub: Uuid,
    pub character_name: String,
    pub discord_id: String,
    pub role: Role,
    pub exp: usize,
}

impl From<Claims> for Session {
    fn from(claims: Claims) -> Self {
        Session::new(claims.sub, claims.character_name, claims.discord_id, claims.role)
    }
}

// -- Auth --

/// The single combined register/login request. Owners and employees use
/// the same form; the server decides which path applies.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub character_name: String,
    pub discord_id: String,
    pub verification_key: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
    /// Always the employees-table identity the session transacts as.
    pub employee: Employee,
    /// Set for owner logins only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<Owner>,
}

// -- Sales --

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DraftItem {
    pub item_name: String,
    pub item_category: String,
    pub item_type: String,
    pub quantity: u32,
    pub price: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateSaleRequest {
    pub customer_name: String,
    pub vehicle_plate: String,
    pub discount_percentage: f64,
    pub items: Vec<DraftItem>,
    /// Base64-encoded proof images. Supplying both auto-verifies the sale.
    pub car_image: Option<String>,
    pub mechanic_sheet: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifySaleRequest {
    pub car_image: String,
    pub mechanic_sheet: String,
}

/// Response for every sale mutation. `notification_warning` is set when
/// the local change committed but the webhook call failed. Callers
/// surface it as a toast, not an error.
#[derive(Debug, Serialize)]
pub struct SaleResponse {
    pub sale: Sale,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_warning: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SaleItemsResponse {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

// -- Dashboards --

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    /// All of this employee's sales, newest first, with item counts.
    pub sales: Vec<Sale>,
    pub recent_sales: Vec<Sale>,
    pub customer_count: u32,
    /// Revenue excluding fake-flagged sales.
    pub total_sales: f64,
    pub announcement: Option<Announcement>,
}

#[derive(Debug, Serialize)]
pub struct EmployeeStats {
    pub employee: Employee,
    pub today_sales: f64,
    pub weekly_sales: f64,
    pub total_sales: f64,
    pub sales_count: u32,
}

#[derive(Debug, Serialize)]
pub struct OwnerOverviewResponse {
    pub employees: Vec<EmployeeStats>,
    /// Sales transacted by the owner's own shadow employee record.
    pub own_sales: Vec<Sale>,
    pub announcement: Option<Announcement>,
}

// -- Employees (owner operations) --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlockEmployeeRequest {
    pub reason: String,
}

// -- Announcements --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnnouncementRequest {
    pub message: String,
    pub expires_in_hours: u32,
}
