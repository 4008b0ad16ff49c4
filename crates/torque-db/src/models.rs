//! Database row types — these map directly to SQLite rows.
//! Distinct from the torque-types API models to keep the DB layer
//! independent; conversion handles corrupt rows defensively.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use torque_types::models::{Announcement, Employee, Owner, Sale, SaleItem};

#[derive(Debug)]
pub struct EmployeeRow {
    pub id: String,
    pub character_name: String,
    pub discord_id: String,
    pub verification_key: String,
    pub is_blocked: bool,
    pub block_reason: Option<String>,
    pub blocked_at: Option<String>,
    pub created_at: String,
}

pub struct OwnerRow {
    pub id: String,
    pub character_name: String,
    pub discord_id: String,
    pub verification_key: String,
    pub created_at: String,
}

pub struct SaleRow {
    pub id: String,
    pub employee_id: String,
    pub customer_name: String,
    pub vehicle_plate: String,
    pub discount_percentage: f64,
    pub subtotal: f64,
    pub discount_amount: f64,
    pub tax_amount: f64,
    pub total_amount: f64,
    pub is_fake: bool,
    pub is_verified: bool,
    pub verified_at: Option<String>,
    pub discord_message_id: Option<String>,
    pub created_at: String,
    /// Only populated by the list query; zero elsewhere.
    pub item_count: u32,
}

pub struct SaleItemRow {
    pub id: String,
    pub sale_id: String,
    pub item_name: String,
    pub item_category: String,
    pub item_type: String,
    pub quantity: u32,
    pub price: f64,
    pub subtotal: f64,
}

pub struct AnnouncementRow {
    pub id: String,
    pub message: String,
    pub expires_at: String,
    pub created_at: String,
    pub created_by: String,
}

fn parse_uuid(value: &str, context: &str) -> Uuid {
    value.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", context, value, e);
        Uuid::default()
    })
}

fn parse_ts(value: &str, context: &str) -> DateTime<Utc> {
    value
        .parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without
            // timezone. Parse as naive UTC and convert.
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt {} '{}': {}", context, value, e);
            DateTime::default()
        })
}

impl EmployeeRow {
    pub fn into_employee(self) -> Employee {
        Employee {
            id: parse_uuid(&self.id, "employee id"),
            character_name: self.character_name,
            discord_id: self.discord_id,
            is_blocked: self.is_blocked,
            block_reason: self.block_reason,
            blocked_at: self.blocked_at.as_deref().map(|v| parse_ts(v, "blocked_at")),
            created_at: parse_ts(&self.created_at, "employee created_at"),
        }
    }
}

impl OwnerRow {
    pub fn into_owner(self) -> Owner {
        Owner {
            id: parse_uuid(&self.id, "owner id"),
            character_name: self.character_name,
            discord_id: self.discord_id,
            created_at: parse_ts(&self.created_at, "owner created_at"),
        }
    }
}

impl SaleRow {
    pub fn into_sale(self) -> Sale {
        Sale {
            id: parse_uuid(&self.id, "sale id"),
            employee_id: parse_uuid(&self.employee_id, "sale employee_id"),
            customer_name: self.customer_name,
            vehicle_plate: self.vehicle_plate,
            discount_percentage: self.discount_percentage,
            subtotal: self.subtotal,
            discount_amount: self.discount_amount,
            tax_amount: self.tax_amount,
            total_amount: self.total_amount,
            is_fake: self.is_fake,
            is_verified: self.is_verified,
            verified_at: self.verified_at.as_deref().map(|v| parse_ts(v, "verified_at")),
            discord_message_id: self.discord_message_id,
            created_at: parse_ts(&self.created_at, "sale created_at"),
            item_count: self.item_count,
        }
    }
}

impl SaleItemRow {
    pub fn into_sale_item(self) -> SaleItem {
        SaleItem {
            id: parse_uuid(&self.id, "sale item id"),
            sale_id: parse_uuid(&self.sale_id, "sale item sale_id"),
            item_name: self.item_name,
            item_category: self.item_category,
            item_type: self.item_type,
            quantity: self.quantity,
            price: self.price,
            subtotal: self.subtotal,
        }
    }
}

impl AnnouncementRow {
    pub fn into_announcement(self) -> Announcement {
        Announcement {
            id: parse_uuid(&self.id, "announcement id"),
            message: self.message,
            expires_at: parse_ts(&self.expires_at, "announcement expires_at"),
            created_at: parse_ts(&self.created_at, "announcement created_at"),
            created_by: parse_uuid(&self.created_by, "announcement created_by"),
        }
    }
}
