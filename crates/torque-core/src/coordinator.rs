//! The sale lifecycle coordinator.
//!
//! Every mutation of a sale runs through here as a short saga: validate,
//! write the local rows, then mirror the change to the external chat
//! message. The persistence step is authoritative: its failure aborts
//! the operation. The notification step is best-effort: its failure is
//! logged and reported as a soft status, never rolled back.

use std::sync::Arc;

use chrono::{DateTime, Utc, Weekday};
use tracing::warn;
use uuid::Uuid;

use torque_db::models::{EmployeeRow, SaleItemRow};
use torque_db::queries::{NewSale, NewSaleItem};
use torque_db::{Database, to_sqlite_ts};
use torque_types::models::{Sale, SaleItem};
use torque_types::session::Session;

use crate::error::{LedgerError, Result};
use crate::notifier::{BillLine, BillMessage, BillNotifier, VerificationImages};
use crate::pricing::{self, LineAmount};

/// How the notification half of a saga ended. `Skipped` means there was
/// nothing to notify (no webhook message exists for the sale).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationStatus {
    Delivered,
    Failed,
    Skipped,
}

#[derive(Debug)]
pub struct SaleOutcome {
    pub sale: Sale,
    pub notification: NotificationStatus,
}

#[derive(Debug, Clone)]
pub struct DraftLine {
    pub name: String,
    pub category: String,
    pub kind: String,
    pub quantity: u32,
    pub price: f64,
}

/// A sale before it is persisted.
#[derive(Debug)]
pub struct DraftSale {
    pub customer_name: String,
    pub vehicle_plate: String,
    pub discount_percentage: f64,
    pub items: Vec<DraftLine>,
    /// Supplying both proof images verifies the sale at creation time.
    pub images: Option<VerificationImages>,
}

pub struct SaleCoordinator<N> {
    db: Arc<Database>,
    notifier: N,
}

impl<N: BillNotifier> SaleCoordinator<N> {
    pub fn new(db: Arc<Database>, notifier: N) -> Self {
        Self { db, notifier }
    }

    /// Persist a new sale with its items, then post the webhook message.
    ///
    /// Auto-verifies when the session's policy trusts its sales without
    /// proof (owner-as-employee) or when both images are supplied.
    pub async fn create_sale(&self, session: &Session, draft: DraftSale) -> Result<SaleOutcome> {
        self.create_with_policy(session, draft, false).await
    }

    /// Canned single-item repair bill: $500 "Vehicle Repair", no
    /// discount, always verified.
    pub async fn quick_bill(&self, session: &Session) -> Result<SaleOutcome> {
        let draft = DraftSale {
            customer_name: "Vehicle Repair".into(),
            vehicle_plate: "REPAIR".into(),
            discount_percentage: 0.0,
            items: vec![DraftLine {
                name: "Vehicle Repair".into(),
                category: "Repair".into(),
                kind: "Standard".into(),
                quantity: 1,
                price: 500.0,
            }],
            images: None,
        };
        self.create_with_policy(session, draft, true).await
    }

    async fn create_with_policy(
        &self,
        session: &Session,
        draft: DraftSale,
        force_verified: bool,
    ) -> Result<SaleOutcome> {
        validate_draft(&draft)?;

        let lines: Vec<LineAmount> = draft
            .items
            .iter()
            .map(|i| LineAmount { price: i.price, quantity: i.quantity })
            .collect();
        let breakdown = pricing::price_items(&lines, draft.discount_percentage);

        let verified =
            force_verified || session.capabilities.auto_verify_sales || draft.images.is_some();

        let sale_id = Uuid::new_v4();
        let employee_id = session.employee_id.to_string();
        let items = draft.items;
        let customer_name = draft.customer_name;
        let vehicle_plate = draft.vehicle_plate;
        let discount_percentage = draft.discount_percentage.clamp(0.0, 100.0);

        let (sale_row, item_rows, weekly_sales) = self
            .run_db(move |db| {
                let verified_at = verified.then(torque_db::sqlite_now);
                let row = db.insert_sale(&NewSale {
                    id: &sale_id.to_string(),
                    employee_id: &employee_id,
                    customer_name: &customer_name,
                    vehicle_plate: &vehicle_plate,
                    discount_percentage,
                    subtotal: breakdown.subtotal,
                    discount_amount: breakdown.discount_amount,
                    tax_amount: breakdown.tax_amount,
                    total_amount: breakdown.total,
                    is_verified: verified,
                    verified_at: verified_at.as_deref(),
                })?;

                for item in &items {
                    db.insert_sale_item(&NewSaleItem {
                        id: &Uuid::new_v4().to_string(),
                        sale_id: &row.id,
                        item_name: &item.name,
                        item_category: &item.category,
                        item_type: &item.kind,
                        quantity: item.quantity,
                        price: item.price,
                        subtotal: item.price * item.quantity as f64,
                    })?;
                }
                let item_rows = db.list_items_by_sale(&row.id)?;

                let (from, to) = week_bounds(Utc::now());
                let weekly = db.sales_total_between(&employee_id, &from, &to)?;
                Ok((row, item_rows, weekly))
            })
            .await?;

        let mut sale = sale_row.into_sale();
        let sale_items: Vec<SaleItem> =
            item_rows.into_iter().map(SaleItemRow::into_sale_item).collect();
        sale.item_count = sale_items.len() as u32;

        let bill = bill_message(
            &sale,
            &sale_items,
            &session.character_name,
            &session.discord_id,
            weekly_sales,
        );

        let images = draft.images;
        let notification = match self.notifier.post_bill(&bill, images.as_ref()).await {
            Ok(message_id) => {
                sale.discord_message_id = Some(message_id.clone());
                let id = sale.id.to_string();
                if let Err(e) = self
                    .run_db(move |db| db.set_discord_message_id(&id, &message_id))
                    .await
                {
                    // The message exists but we lost its id; later edits
                    // will be skipped for this sale.
                    warn!("Failed to persist webhook message id for sale {}: {}", sale.id, e);
                }
                NotificationStatus::Delivered
            }
            Err(e) => {
                warn!("Failed to post webhook message for sale {}: {}", sale.id, e);
                NotificationStatus::Failed
            }
        };

        Ok(SaleOutcome { sale, notification })
    }

    /// Mark a sale verified and attach the proof images to its message.
    ///
    /// The local update is authoritative; a failed message edit is
    /// reported as a warning on the outcome.
    pub async fn verify_sale(
        &self,
        session: &Session,
        sale_id: Uuid,
        images: VerificationImages,
    ) -> Result<SaleOutcome> {
        let bundle = self.load_bundle(session, sale_id).await?;
        let mut sale = bundle.sale;

        let verified_at = Utc::now();
        let updated = self
            .run_db({
                let id = sale_id.to_string();
                let ts = to_sqlite_ts(verified_at);
                move |db| db.set_sale_verified(&id, &ts)
            })
            .await?;
        if !updated {
            return Err(LedgerError::SaleNotFound(sale_id));
        }
        sale.is_verified = true;
        sale.verified_at = Some(verified_at);

        let notification = self
            .edit_message(&sale, &bundle.items, bundle.mechanic.as_ref(), Some(&images))
            .await;

        Ok(SaleOutcome { sale, notification })
    }

    /// Remove one item and recompute the sale's totals from whatever
    /// remains, using the sale's stored discount percentage. The webhook
    /// message is untouched; only the explicit save pushes edits out.
    pub async fn delete_item(
        &self,
        session: &Session,
        sale_id: Uuid,
        item_id: Uuid,
    ) -> Result<Sale> {
        let sale = self.load_sale_authorized(session, sale_id).await?;

        let (breakdown, remaining) = self
            .run_db({
                let sale_key = sale_id.to_string();
                let item_key = item_id.to_string();
                let discount = sale.discount_percentage;
                move |db| {
                    let item = db
                        .get_sale_item(&item_key)?
                        .filter(|i| i.sale_id == sale_key);
                    if item.is_none() {
                        return Ok(None);
                    }
                    db.delete_sale_item(&item_key)?;

                    let rows = db.list_items_by_sale(&sale_key)?;
                    let lines: Vec<LineAmount> = rows
                        .iter()
                        .map(|r| LineAmount { price: r.price, quantity: r.quantity })
                        .collect();
                    let breakdown = pricing::price_items(&lines, discount);
                    db.update_sale_totals(
                        &sale_key,
                        breakdown.subtotal,
                        breakdown.discount_amount,
                        breakdown.tax_amount,
                        breakdown.total,
                    )?;
                    Ok(Some((breakdown, rows.len() as u32)))
                }
            })
            .await?
            .ok_or(LedgerError::ItemNotFound(item_id))?;

        let mut sale = sale;
        sale.subtotal = breakdown.subtotal;
        sale.discount_amount = breakdown.discount_amount;
        sale.tax_amount = breakdown.tax_amount;
        sale.total_amount = breakdown.total;
        sale.item_count = remaining;
        Ok(sale)
    }

    /// Explicit "save changes": recompute totals from the current item
    /// set, persist, and push the new summary to the webhook message
    /// (preserving any attached verification images).
    pub async fn save_totals(&self, session: &Session, sale_id: Uuid) -> Result<SaleOutcome> {
        let bundle = self.load_bundle(session, sale_id).await?;
        let mut sale = bundle.sale;

        let lines: Vec<LineAmount> = bundle
            .items
            .iter()
            .map(|i| LineAmount { price: i.price, quantity: i.quantity })
            .collect();
        let breakdown = pricing::price_items(&lines, sale.discount_percentage);

        self.run_db({
            let id = sale_id.to_string();
            move |db| {
                db.update_sale_totals(
                    &id,
                    breakdown.subtotal,
                    breakdown.discount_amount,
                    breakdown.tax_amount,
                    breakdown.total,
                )
            }
        })
        .await?;

        sale.subtotal = breakdown.subtotal;
        sale.discount_amount = breakdown.discount_amount;
        sale.tax_amount = breakdown.tax_amount;
        sale.total_amount = breakdown.total;

        let notification = self
            .edit_message(&sale, &bundle.items, bundle.mechanic.as_ref(), None)
            .await;

        Ok(SaleOutcome { sale, notification })
    }

    /// Delete a sale. The external message goes first so the channel
    /// never shows a bill whose rows are already gone; local deletion
    /// proceeds regardless of the external outcome. The returned sale is
    /// the pre-deletion snapshot.
    pub async fn delete_sale(&self, session: &Session, sale_id: Uuid) -> Result<SaleOutcome> {
        let sale = self.load_sale_authorized(session, sale_id).await?;

        let notification = match &sale.discord_message_id {
            Some(message_id) => match self.notifier.delete_bill(message_id).await {
                Ok(()) => NotificationStatus::Delivered,
                Err(e) => {
                    warn!("Failed to delete webhook message for sale {}: {}", sale_id, e);
                    NotificationStatus::Failed
                }
            },
            None => NotificationStatus::Skipped,
        };

        let deleted = self
            .run_db({
                let id = sale_id.to_string();
                move |db| db.delete_sale(&id)
            })
            .await?;
        if !deleted {
            return Err(LedgerError::SaleNotFound(sale_id));
        }

        Ok(SaleOutcome { sale, notification })
    }

    /// Flip the fake flag. Dashboards exclude flagged sales from revenue
    /// aggregates; the webhook message's title and color change to match.
    pub async fn toggle_fake(&self, session: &Session, sale_id: Uuid) -> Result<SaleOutcome> {
        if !session.capabilities.can_mark_fake {
            return Err(LedgerError::Forbidden);
        }

        let bundle = self.load_bundle(session, sale_id).await?;
        let mut sale = bundle.sale;
        let flagged = !sale.is_fake;

        self.run_db({
            let id = sale_id.to_string();
            move |db| db.set_sale_fake(&id, flagged)
        })
        .await?;
        sale.is_fake = flagged;

        let notification = self
            .edit_message(&sale, &bundle.items, bundle.mechanic.as_ref(), None)
            .await;

        Ok(SaleOutcome { sale, notification })
    }

    /// Edit the sale's webhook message if one exists. Never fails the
    /// surrounding operation.
    async fn edit_message(
        &self,
        sale: &Sale,
        items: &[SaleItem],
        mechanic: Option<&EmployeeRow>,
        images: Option<&VerificationImages>,
    ) -> NotificationStatus {
        let Some(message_id) = sale.discord_message_id.as_deref() else {
            return NotificationStatus::Skipped;
        };
        let Some(mechanic) = mechanic else {
            warn!("No employee record for sale {}; skipping message edit", sale.id);
            return NotificationStatus::Skipped;
        };

        let weekly = match self
            .run_db({
                let employee_id = sale.employee_id.to_string();
                move |db| {
                    let (from, to) = week_bounds(Utc::now());
                    db.sales_total_between(&employee_id, &from, &to)
                }
            })
            .await
        {
            Ok(total) => total,
            Err(e) => {
                warn!("Failed to load weekly sales for message edit: {}", e);
                0.0
            }
        };

        let bill = bill_message(
            sale,
            items,
            &mechanic.character_name,
            &mechanic.discord_id,
            weekly,
        );

        match self.notifier.edit_bill(message_id, &bill, images).await {
            Ok(()) => NotificationStatus::Delivered,
            Err(e) => {
                warn!("Failed to edit webhook message for sale {}: {}", sale.id, e);
                NotificationStatus::Failed
            }
        }
    }

    async fn load_sale_authorized(&self, session: &Session, sale_id: Uuid) -> Result<Sale> {
        let row = self
            .run_db({
                let id = sale_id.to_string();
                move |db| db.get_sale(&id)
            })
            .await?
            .ok_or(LedgerError::SaleNotFound(sale_id))?;
        let sale = row.into_sale();

        if sale.employee_id != session.employee_id && !session.capabilities.can_see_all_sales {
            return Err(LedgerError::Forbidden);
        }
        Ok(sale)
    }

    async fn load_bundle(&self, session: &Session, sale_id: Uuid) -> Result<SaleBundle> {
        let sale = self.load_sale_authorized(session, sale_id).await?;

        let (item_rows, mechanic) = self
            .run_db({
                let sale_key = sale_id.to_string();
                let employee_key = sale.employee_id.to_string();
                move |db| {
                    let items = db.list_items_by_sale(&sale_key)?;
                    let mechanic = db.get_employee(&employee_key)?;
                    Ok((items, mechanic))
                }
            })
            .await?;

        Ok(SaleBundle {
            sale,
            items: item_rows.into_iter().map(SaleItemRow::into_sale_item).collect(),
            mechanic,
        })
    }

    async fn run_db<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<Database>) -> anyhow::Result<T> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(db))
            .await
            .map_err(|e| LedgerError::Persistence(anyhow::anyhow!("blocking join error: {}", e)))?
            .map_err(LedgerError::Persistence)
    }
}

struct SaleBundle {
    sale: Sale,
    items: Vec<SaleItem>,
    mechanic: Option<EmployeeRow>,
}

fn validate_draft(draft: &DraftSale) -> Result<()> {
    if draft.customer_name.trim().is_empty() {
        return Err(LedgerError::Validation("customer name is required".into()));
    }
    if draft.vehicle_plate.trim().is_empty() {
        return Err(LedgerError::Validation("vehicle plate is required".into()));
    }
    if draft.items.is_empty() {
        return Err(LedgerError::Validation("a sale needs at least one item".into()));
    }
    if draft.items.iter().any(|i| i.quantity == 0) {
        return Err(LedgerError::Validation("item quantity must be at least 1".into()));
    }
    Ok(())
}

/// Monday 00:00:00 through Sunday 23:59:59 of the week containing `now`,
/// as SQLite timestamp strings.
fn week_bounds(now: DateTime<Utc>) -> (String, String) {
    let week = now.date_naive().week(Weekday::Mon);
    let from = week.first_day().and_hms_opt(0, 0, 0).unwrap().and_utc();
    let to = week.last_day().and_hms_opt(23, 59, 59).unwrap().and_utc();
    (to_sqlite_ts(from), to_sqlite_ts(to))
}

fn bill_message(
    sale: &Sale,
    items: &[SaleItem],
    mechanic_name: &str,
    mechanic_discord_id: &str,
    weekly_sales: f64,
) -> BillMessage {
    BillMessage {
        sale_id: sale.id,
        date: sale.created_at.format("%B %-d, %Y, %I:%M %p").to_string(),
        mechanic_name: mechanic_name.to_string(),
        mechanic_discord_id: mechanic_discord_id.to_string(),
        customer_name: sale.customer_name.clone(),
        vehicle_plate: sale.vehicle_plate.clone(),
        amount: sale.total_amount,
        weekly_sales,
        items: items
            .iter()
            .map(|i| BillLine {
                name: i.item_name.clone(),
                category: i.item_category.clone(),
                kind: i.item_type.clone(),
                quantity: i.quantity,
                price: i.price,
            })
            .collect(),
        verified: sale.is_verified,
        fake: sale.is_fake,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::NotifyError;
    use std::sync::Mutex;
    use torque_types::session::{Role, Session};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Post { with_images: bool },
        Edit { message_id: String, with_images: bool, fake: bool },
        Delete { message_id: String },
    }

    #[derive(Default)]
    struct MockNotifier {
        fail_post: bool,
        fail_edit: bool,
        fail_delete: bool,
        calls: Mutex<Vec<Call>>,
    }

    impl MockNotifier {
        fn failing_post() -> Self {
            Self { fail_post: true, ..Default::default() }
        }

        fn failing_delete() -> Self {
            Self { fail_delete: true, ..Default::default() }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl BillNotifier for MockNotifier {
        async fn post_bill(
            &self,
            _bill: &BillMessage,
            images: Option<&VerificationImages>,
        ) -> Result<String, NotifyError> {
            self.calls.lock().unwrap().push(Call::Post { with_images: images.is_some() });
            if self.fail_post {
                return Err(NotifyError::Status(502));
            }
            Ok("msg-1".to_string())
        }

        async fn edit_bill(
            &self,
            message_id: &str,
            bill: &BillMessage,
            images: Option<&VerificationImages>,
        ) -> Result<(), NotifyError> {
            self.calls.lock().unwrap().push(Call::Edit {
                message_id: message_id.to_string(),
                with_images: images.is_some(),
                fake: bill.fake,
            });
            if self.fail_edit {
                return Err(NotifyError::Status(502));
            }
            Ok(())
        }

        async fn delete_bill(&self, message_id: &str) -> Result<(), NotifyError> {
            self.calls.lock().unwrap().push(Call::Delete { message_id: message_id.to_string() });
            if self.fail_delete {
                return Err(NotifyError::Status(502));
            }
            Ok(())
        }
    }

    fn setup(notifier: MockNotifier) -> (SaleCoordinator<MockNotifier>, Session) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let employee_id = Uuid::new_v4();
        db.create_employee(&employee_id.to_string(), "mara vey", "445566", "KEY-123")
            .unwrap();
        let session = Session::new(employee_id, "mara vey".into(), "445566".into(), Role::Employee);
        (SaleCoordinator::new(db, notifier), session)
    }

    fn owner_session(coordinator: &SaleCoordinator<MockNotifier>) -> Session {
        let employee_id = Uuid::new_v4();
        coordinator
            .db
            .create_employee(&employee_id.to_string(), "boss hale", "990011", "KEY-123")
            .unwrap();
        Session::new(employee_id, "boss hale".into(), "990011".into(), Role::Owner)
    }

    fn draft(discount: f64, items: Vec<(f64, u32)>) -> DraftSale {
        DraftSale {
            customer_name: "Roy Vance".into(),
            vehicle_plate: "ZX81KT".into(),
            discount_percentage: discount,
            items: items
                .into_iter()
                .map(|(price, quantity)| DraftLine {
                    name: "ENGINE UPGRADE".into(),
                    category: "Performance".into(),
                    kind: "Lv 1".into(),
                    quantity,
                    price,
                })
                .collect(),
            images: None,
        }
    }

    fn images() -> VerificationImages {
        VerificationImages { car_image: vec![1, 2, 3], mechanic_sheet: vec![4, 5, 6] }
    }

    #[tokio::test]
    async fn create_persists_sale_and_stores_message_id() {
        let (coordinator, session) = setup(MockNotifier::default());
        let outcome = coordinator
            .create_sale(&session, draft(10.0, vec![(8000.0, 1), (1500.0, 2)]))
            .await
            .unwrap();

        assert_eq!(outcome.notification, NotificationStatus::Delivered);
        let sale = &outcome.sale;
        assert_eq!(sale.subtotal, 11000.0);
        assert_eq!(sale.discount_amount, 1100.0);
        assert!((sale.tax_amount - 1386.0).abs() < 1e-9);
        assert!((sale.total_amount - 11286.0).abs() < 1e-9);
        assert!(!sale.is_verified);
        assert_eq!(sale.discord_message_id.as_deref(), Some("msg-1"));

        let stored = coordinator.db.get_sale(&sale.id.to_string()).unwrap().unwrap();
        assert_eq!(stored.discord_message_id.as_deref(), Some("msg-1"));
        assert_eq!(coordinator.db.list_items_by_sale(&sale.id.to_string()).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn create_with_both_images_auto_verifies() {
        let (coordinator, session) = setup(MockNotifier::default());
        let mut d = draft(0.0, vec![(1500.0, 1)]);
        d.images = Some(images());

        let outcome = coordinator.create_sale(&session, d).await.unwrap();
        assert!(outcome.sale.is_verified);
        assert!(outcome.sale.verified_at.is_some());
        assert_eq!(coordinator.notifier.calls(), vec![Call::Post { with_images: true }]);
    }

    #[tokio::test]
    async fn owner_sales_are_trusted_without_images() {
        let (coordinator, _) = setup(MockNotifier::default());
        let owner = owner_session(&coordinator);

        let outcome = coordinator
            .create_sale(&owner, draft(0.0, vec![(1500.0, 1)]))
            .await
            .unwrap();
        assert!(outcome.sale.is_verified);
        assert!(outcome.sale.verified_at.is_some());
    }

    #[tokio::test]
    async fn notification_failure_never_rolls_back_the_sale() {
        let (coordinator, session) = setup(MockNotifier::failing_post());
        let outcome = coordinator
            .create_sale(&session, draft(0.0, vec![(1500.0, 1)]))
            .await
            .unwrap();

        assert_eq!(outcome.notification, NotificationStatus::Failed);
        assert!(outcome.sale.discord_message_id.is_none());
        assert!(coordinator.db.get_sale(&outcome.sale.id.to_string()).unwrap().is_some());
    }

    #[tokio::test]
    async fn invalid_draft_fails_before_any_side_effect() {
        let (coordinator, session) = setup(MockNotifier::default());
        let err = coordinator.create_sale(&session, draft(0.0, vec![])).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert!(coordinator.notifier.calls().is_empty());
        assert!(
            coordinator
                .db
                .list_sales_by_employee(&session.employee_id.to_string())
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn quick_bill_is_canned_and_verified() {
        let (coordinator, session) = setup(MockNotifier::default());
        let outcome = coordinator.quick_bill(&session).await.unwrap();

        let sale = &outcome.sale;
        assert_eq!(sale.customer_name, "Vehicle Repair");
        assert_eq!(sale.vehicle_plate, "REPAIR");
        assert_eq!(sale.subtotal, 500.0);
        assert!((sale.tax_amount - 70.0).abs() < 1e-9);
        assert!((sale.total_amount - 570.0).abs() < 1e-9);
        assert!(sale.is_verified);
        assert_eq!(sale.item_count, 1);
    }

    #[tokio::test]
    async fn verify_updates_row_and_attaches_images() {
        let (coordinator, session) = setup(MockNotifier::default());
        let created = coordinator
            .create_sale(&session, draft(0.0, vec![(1500.0, 1)]))
            .await
            .unwrap();
        assert!(!created.sale.is_verified);

        let outcome = coordinator
            .verify_sale(&session, created.sale.id, images())
            .await
            .unwrap();
        assert!(outcome.sale.is_verified);
        assert_eq!(outcome.notification, NotificationStatus::Delivered);

        let stored = coordinator.db.get_sale(&created.sale.id.to_string()).unwrap().unwrap();
        assert!(stored.is_verified);
        assert!(stored.verified_at.is_some());
        assert_eq!(
            coordinator.notifier.calls().last(),
            Some(&Call::Edit { message_id: "msg-1".into(), with_images: true, fake: false })
        );
    }

    #[tokio::test]
    async fn verify_survives_a_failed_message_edit() {
        let (coordinator, session) = setup(MockNotifier {
            fail_edit: true,
            ..Default::default()
        });
        let created = coordinator
            .create_sale(&session, draft(0.0, vec![(1500.0, 1)]))
            .await
            .unwrap();

        let outcome = coordinator
            .verify_sale(&session, created.sale.id, images())
            .await
            .unwrap();
        assert_eq!(outcome.notification, NotificationStatus::Failed);
        let stored = coordinator.db.get_sale(&created.sale.id.to_string()).unwrap().unwrap();
        assert!(stored.is_verified);
    }

    #[tokio::test]
    async fn delete_item_recomputes_totals_and_skips_the_webhook() {
        let (coordinator, session) = setup(MockNotifier::default());
        let created = coordinator
            .create_sale(&session, draft(10.0, vec![(8000.0, 1), (1500.0, 2)]))
            .await
            .unwrap();
        let items = coordinator
            .db
            .list_items_by_sale(&created.sale.id.to_string())
            .unwrap();
        let doomed = items.iter().find(|i| i.price == 1500.0).unwrap().id.clone();
        let calls_before = coordinator.notifier.calls().len();

        let sale = coordinator
            .delete_item(&session, created.sale.id, doomed.parse().unwrap())
            .await
            .unwrap();

        // 8000 × 0.9 × 1.14
        assert_eq!(sale.subtotal, 8000.0);
        assert!((sale.total_amount - 8208.0).abs() < 1e-9);
        assert_eq!(sale.item_count, 1);
        assert_eq!(coordinator.notifier.calls().len(), calls_before);
    }

    #[tokio::test]
    async fn deleting_the_last_item_zeroes_the_sale() {
        let (coordinator, session) = setup(MockNotifier::default());
        let created = coordinator
            .create_sale(&session, draft(25.0, vec![(1500.0, 1)]))
            .await
            .unwrap();
        let item = &coordinator
            .db
            .list_items_by_sale(&created.sale.id.to_string())
            .unwrap()[0];

        let sale = coordinator
            .delete_item(&session, created.sale.id, item.id.parse().unwrap())
            .await
            .unwrap();
        assert_eq!(sale.subtotal, 0.0);
        assert_eq!(sale.total_amount, 0.0);
        assert!(!sale.total_amount.is_nan());
        assert_eq!(sale.item_count, 0);
    }

    #[tokio::test]
    async fn save_totals_pushes_summary_to_the_message() {
        let (coordinator, session) = setup(MockNotifier::default());
        let created = coordinator
            .create_sale(&session, draft(0.0, vec![(1500.0, 2)]))
            .await
            .unwrap();

        let outcome = coordinator.save_totals(&session, created.sale.id).await.unwrap();
        assert_eq!(outcome.notification, NotificationStatus::Delivered);
        assert_eq!(outcome.sale.subtotal, 3000.0);
        assert_eq!(
            coordinator.notifier.calls().last(),
            Some(&Call::Edit { message_id: "msg-1".into(), with_images: false, fake: false })
        );
    }

    #[tokio::test]
    async fn delete_sale_attempts_external_delete_first_and_always_removes_rows() {
        let (coordinator, session) = setup(MockNotifier::failing_delete());
        let created = coordinator
            .create_sale(&session, draft(0.0, vec![(1500.0, 1)]))
            .await
            .unwrap();
        let sale_id = created.sale.id;

        let outcome = coordinator.delete_sale(&session, sale_id).await.unwrap();
        assert_eq!(outcome.notification, NotificationStatus::Failed);
        assert_eq!(
            coordinator.notifier.calls().last(),
            Some(&Call::Delete { message_id: "msg-1".into() })
        );
        assert!(coordinator.db.get_sale(&sale_id.to_string()).unwrap().is_none());
        assert!(coordinator.db.list_items_by_sale(&sale_id.to_string()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn toggle_fake_requires_the_capability() {
        let (coordinator, session) = setup(MockNotifier::default());
        let created = coordinator
            .create_sale(&session, draft(0.0, vec![(1500.0, 1)]))
            .await
            .unwrap();

        let err = coordinator.toggle_fake(&session, created.sale.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::Forbidden));
    }

    #[tokio::test]
    async fn toggle_fake_flips_the_flag_and_recolors_the_message() {
        let (coordinator, session) = setup(MockNotifier::default());
        let owner = owner_session(&coordinator);
        let created = coordinator
            .create_sale(&session, draft(0.0, vec![(1500.0, 1)]))
            .await
            .unwrap();

        let outcome = coordinator.toggle_fake(&owner, created.sale.id).await.unwrap();
        assert!(outcome.sale.is_fake);
        assert_eq!(
            coordinator.notifier.calls().last(),
            Some(&Call::Edit { message_id: "msg-1".into(), with_images: false, fake: true })
        );

        let outcome = coordinator.toggle_fake(&owner, created.sale.id).await.unwrap();
        assert!(!outcome.sale.is_fake);
    }

    #[tokio::test]
    async fn employees_cannot_touch_other_peoples_sales() {
        let (coordinator, session) = setup(MockNotifier::default());
        let created = coordinator
            .create_sale(&session, draft(0.0, vec![(1500.0, 1)]))
            .await
            .unwrap();

        let stranger_id = Uuid::new_v4();
        coordinator
            .db
            .create_employee(&stranger_id.to_string(), "nix caro", "778899", "KEY-123")
            .unwrap();
        let stranger =
            Session::new(stranger_id, "nix caro".into(), "778899".into(), Role::Employee);

        let err = coordinator.delete_sale(&stranger, created.sale.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::Forbidden));
    }
}
