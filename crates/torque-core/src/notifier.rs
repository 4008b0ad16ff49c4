//! The `BillNotifier` trait and the message payload it carries.
//!
//! The trait is implemented by the webhook client (`torque-webhook`) and
//! by test doubles. The coordinator depends on this abstraction, not on
//! any concrete transport.

use std::future::Future;

use thiserror::Error;
use uuid::Uuid;

/// One line of a bill as rendered into the notification message.
#[derive(Debug, Clone)]
pub struct BillLine {
    pub name: String,
    pub category: String,
    pub kind: String,
    pub quantity: u32,
    pub price: f64,
}

/// Everything the notification message needs. Built by the coordinator
/// from the sale, its items and the mechanic's identity; the notifier
/// only formats and transports it.
#[derive(Debug, Clone)]
pub struct BillMessage {
    pub sale_id: Uuid,
    /// Pre-formatted bill date, e.g. "June 5, 2026, 02:30 PM".
    pub date: String,
    pub mechanic_name: String,
    pub mechanic_discord_id: String,
    pub customer_name: String,
    pub vehicle_plate: String,
    pub amount: f64,
    /// This mechanic's sales total for the current week (Monday–Sunday),
    /// including the sale being announced.
    pub weekly_sales: f64,
    pub items: Vec<BillLine>,
    pub verified: bool,
    pub fake: bool,
}

/// Proof images attached to a verified bill.
#[derive(Debug, Clone)]
pub struct VerificationImages {
    pub car_image: Vec<u8>,
    pub mechanic_sheet: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook URL not configured")]
    NotConfigured,

    #[error("webhook request failed: {0}")]
    Transport(String),

    #[error("webhook returned status {0}")]
    Status(u16),

    #[error("unexpected webhook response: {0}")]
    Payload(String),
}

/// Abstraction over the external chat message mirroring a sale.
///
/// Every method is best-effort from the coordinator's point of view: a
/// failure is logged and downgrades the operation's outcome, but never
/// rolls back local state.
pub trait BillNotifier: Send + Sync {
    /// Post a new message for a freshly created bill. Returns the
    /// external message id.
    fn post_bill<'a>(
        &'a self,
        bill: &'a BillMessage,
        images: Option<&'a VerificationImages>,
    ) -> impl Future<Output = Result<String, NotifyError>> + Send + 'a;

    /// Rewrite an existing message's summary. When `images` is `None`,
    /// previously attached verification images must be preserved.
    fn edit_bill<'a>(
        &'a self,
        message_id: &'a str,
        bill: &'a BillMessage,
        images: Option<&'a VerificationImages>,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send + 'a;

    /// Remove the message for a deleted bill.
    fn delete_bill<'a>(
        &'a self,
        message_id: &'a str,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send + 'a;
}
