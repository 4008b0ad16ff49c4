use crate::Database;
use crate::models::{AnnouncementRow, EmployeeRow, OwnerRow, SaleItemRow, SaleRow};
use anyhow::Result;
use rusqlite::Connection;

/// Insert payload for a sale. `created_at` is defaulted by the database;
/// callers re-read the row to get it.
pub struct NewSale<'a> {
    pub id: &'a str,
    pub employee_id: &'a str,
    pub customer_name: &'a str,
    pub vehicle_plate: &'a str,
    pub discount_percentage: f64,
    pub subtotal: f64,
    pub discount_amount: f64,
    pub tax_amount: f64,
    pub total_amount: f64,
    pub is_verified: bool,
    pub verified_at: Option<&'a str>,
}

pub struct NewSaleItem<'a> {
    pub id: &'a str,
    pub sale_id: &'a str,
    pub item_name: &'a str,
    pub item_category: &'a str,
    pub item_type: &'a str,
    pub quantity: u32,
    pub price: f64,
    pub subtotal: f64,
}

impl Database {
    // -- Employees --

    pub fn create_employee(
        &self,
        id: &str,
        character_name: &str,
        discord_id: &str,
        verification_key: &str,
    ) -> Result<EmployeeRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO employees (id, character_name, discord_id, verification_key)
                 VALUES (?1, ?2, ?3, ?4)",
                (id, character_name, discord_id, verification_key),
            )?;
            query_employee(conn, "id", id)?
                .ok_or_else(|| anyhow::anyhow!("employee vanished after insert: {}", id))
        })
    }

    pub fn get_employee(&self, id: &str) -> Result<Option<EmployeeRow>> {
        self.with_conn(|conn| query_employee(conn, "id", id))
    }

    pub fn get_employee_by_name(&self, character_name: &str) -> Result<Option<EmployeeRow>> {
        self.with_conn(|conn| query_employee(conn, "character_name", character_name))
    }

    pub fn get_employee_by_discord_id(&self, discord_id: &str) -> Result<Option<EmployeeRow>> {
        self.with_conn(|conn| query_employee(conn, "discord_id", discord_id))
    }

    /// All employees except the owner's shadow record, newest first.
    pub fn list_employees_excluding_discord_id(&self, discord_id: &str) -> Result<Vec<EmployeeRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EMPLOYEE_COLS} FROM employees
                 WHERE discord_id != ?1
                 ORDER BY created_at DESC"
            ))?;
            let rows = stmt
                .query_map([discord_id], map_employee)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn block_employee(&self, id: &str, reason: &str, blocked_at: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE employees SET is_blocked = 1, block_reason = ?2, blocked_at = ?3 WHERE id = ?1",
                (id, reason, blocked_at),
            )?;
            Ok(n > 0)
        })
    }

    pub fn unblock_employee(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE employees SET is_blocked = 0, block_reason = NULL, blocked_at = NULL WHERE id = ?1",
                [id],
            )?;
            Ok(n > 0)
        })
    }

    /// Delete an employee together with all their sales and sale items.
    pub fn delete_employee_cascade(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM sale_items
                 WHERE sale_id IN (SELECT id FROM sales WHERE employee_id = ?1)",
                [id],
            )?;
            tx.execute("DELETE FROM sales WHERE employee_id = ?1", [id])?;
            let n = tx.execute("DELETE FROM employees WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(n > 0)
        })
    }

    // -- Owners --

    pub fn get_owner_by_name(&self, character_name: &str) -> Result<Option<OwnerRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, character_name, discord_id, verification_key, created_at
                 FROM owners WHERE character_name = ?1",
            )?;
            let row = stmt
                .query_row([character_name], |row| {
                    Ok(OwnerRow {
                        id: row.get(0)?,
                        character_name: row.get(1)?,
                        discord_id: row.get(2)?,
                        verification_key: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })
                .optional()?;
            Ok(row)
        })
    }

    // -- Sales --

    pub fn insert_sale(&self, sale: &NewSale) -> Result<SaleRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO sales (id, employee_id, customer_name, vehicle_plate,
                                    discount_percentage, subtotal, discount_amount,
                                    tax_amount, total_amount, is_verified, verified_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    sale.id,
                    sale.employee_id,
                    sale.customer_name,
                    sale.vehicle_plate,
                    sale.discount_percentage,
                    sale.subtotal,
                    sale.discount_amount,
                    sale.tax_amount,
                    sale.total_amount,
                    sale.is_verified,
                    sale.verified_at,
                ],
            )?;
            query_sale(conn, sale.id)?
                .ok_or_else(|| anyhow::anyhow!("sale vanished after insert: {}", sale.id))
        })
    }

    pub fn get_sale(&self, id: &str) -> Result<Option<SaleRow>> {
        self.with_conn(|conn| query_sale(conn, id))
    }

    /// All sales for one employee, newest first, with item counts.
    pub fn list_sales_by_employee(&self, employee_id: &str) -> Result<Vec<SaleRow>> {
        self.with_conn(|conn| {
            // Correlated count subquery to fetch item_count in one pass
            // (eliminates N+1).
            let mut stmt = conn.prepare(&format!(
                "SELECT {SALE_COLS},
                        (SELECT COUNT(*) FROM sale_items si WHERE si.sale_id = s.id)
                 FROM sales s
                 WHERE s.employee_id = ?1
                 ORDER BY s.created_at DESC"
            ))?;
            let rows = stmt
                .query_map([employee_id], map_sale_with_count)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_sale_totals(
        &self,
        id: &str,
        subtotal: f64,
        discount_amount: f64,
        tax_amount: f64,
        total_amount: f64,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE sales SET subtotal = ?2, discount_amount = ?3,
                                  tax_amount = ?4, total_amount = ?5
                 WHERE id = ?1",
                rusqlite::params![id, subtotal, discount_amount, tax_amount, total_amount],
            )?;
            Ok(n > 0)
        })
    }

    pub fn set_sale_verified(&self, id: &str, verified_at: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE sales SET is_verified = 1, verified_at = ?2 WHERE id = ?1",
                (id, verified_at),
            )?;
            Ok(n > 0)
        })
    }

    pub fn set_sale_fake(&self, id: &str, is_fake: bool) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("UPDATE sales SET is_fake = ?2 WHERE id = ?1", (id, is_fake))?;
            Ok(n > 0)
        })
    }

    pub fn set_discord_message_id(&self, id: &str, message_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE sales SET discord_message_id = ?2 WHERE id = ?1",
                (id, message_id),
            )?;
            Ok(n > 0)
        })
    }

    /// Delete a sale and its items. Items go first so the sale row never
    /// points at orphans mid-way.
    pub fn delete_sale(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM sale_items WHERE sale_id = ?1", [id])?;
            let n = tx.execute("DELETE FROM sales WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(n > 0)
        })
    }

    /// Sum of total_amount for one employee in a created_at range
    /// (inclusive). Used for the weekly-sales figure on notifications;
    /// intentionally does NOT filter fake sales, matching the message the
    /// shop has always posted.
    pub fn sales_total_between(&self, employee_id: &str, from: &str, to: &str) -> Result<f64> {
        self.with_conn(|conn| {
            let total = conn.query_row(
                "SELECT COALESCE(SUM(total_amount), 0) FROM sales
                 WHERE employee_id = ?1 AND created_at >= ?2 AND created_at <= ?3",
                (employee_id, from, to),
                |row| row.get(0),
            )?;
            Ok(total)
        })
    }

    // -- Sale items --

    pub fn insert_sale_item(&self, item: &NewSaleItem) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO sale_items (id, sale_id, item_name, item_category,
                                         item_type, quantity, price, subtotal)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    item.id,
                    item.sale_id,
                    item.item_name,
                    item.item_category,
                    item.item_type,
                    item.quantity,
                    item.price,
                    item.subtotal,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_sale_item(&self, id: &str) -> Result<Option<SaleItemRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {ITEM_COLS} FROM sale_items WHERE id = ?1"))?;
            let row = stmt.query_row([id], map_sale_item).optional()?;
            Ok(row)
        })
    }

    pub fn list_items_by_sale(&self, sale_id: &str) -> Result<Vec<SaleItemRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {ITEM_COLS} FROM sale_items WHERE sale_id = ?1"))?;
            let rows = stmt
                .query_map([sale_id], map_sale_item)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_sale_item(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM sale_items WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    // -- Announcements --

    pub fn insert_announcement(
        &self,
        id: &str,
        message: &str,
        expires_at: &str,
        created_by: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO announcements (id, message, expires_at, created_by)
                 VALUES (?1, ?2, ?3, ?4)",
                (id, message, expires_at, created_by),
            )?;
            Ok(())
        })
    }

    pub fn get_announcement(&self, id: &str) -> Result<Option<AnnouncementRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, message, expires_at, created_at, created_by
                 FROM announcements WHERE id = ?1",
            )?;
            let row = stmt.query_row([id], map_announcement).optional()?;
            Ok(row)
        })
    }

    /// Latest announcement that has not yet expired, if any.
    pub fn active_announcement(&self, now: &str) -> Result<Option<AnnouncementRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, message, expires_at, created_at, created_by
                 FROM announcements
                 WHERE expires_at > ?1
                 ORDER BY created_at DESC
                 LIMIT 1",
            )?;
            let row = stmt.query_row([now], map_announcement).optional()?;
            Ok(row)
        })
    }

    pub fn update_announcement(&self, id: &str, message: &str, expires_at: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE announcements SET message = ?2, expires_at = ?3 WHERE id = ?1",
                (id, message, expires_at),
            )?;
            Ok(n > 0)
        })
    }

    pub fn delete_announcement(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM announcements WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    /// Remove rows past their expiry. Reads already filter by expiry, so
    /// this is hygiene only.
    pub fn prune_expired_announcements(&self, now: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM announcements WHERE expires_at <= ?1", [now])?;
            Ok(n)
        })
    }
}

const EMPLOYEE_COLS: &str = "id, character_name, discord_id, verification_key, \
                             is_blocked, block_reason, blocked_at, created_at";

const SALE_COLS: &str = "s.id, s.employee_id, s.customer_name, s.vehicle_plate, \
                         s.discount_percentage, s.subtotal, s.discount_amount, \
                         s.tax_amount, s.total_amount, s.is_fake, s.is_verified, \
                         s.verified_at, s.discord_message_id, s.created_at";

const ITEM_COLS: &str = "id, sale_id, item_name, item_category, item_type, \
                         quantity, price, subtotal";

fn map_employee(row: &rusqlite::Row) -> rusqlite::Result<EmployeeRow> {
    Ok(EmployeeRow {
        id: row.get(0)?,
        character_name: row.get(1)?,
        discord_id: row.get(2)?,
        verification_key: row.get(3)?,
        is_blocked: row.get(4)?,
        block_reason: row.get(5)?,
        blocked_at: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn map_sale_with_count(row: &rusqlite::Row) -> rusqlite::Result<SaleRow> {
    let mut sale = map_sale(row)?;
    sale.item_count = row.get(14)?;
    Ok(sale)
}

fn map_sale(row: &rusqlite::Row) -> rusqlite::Result<SaleRow> {
    Ok(SaleRow {
        id: row.get(0)?,
        employee_id: row.get(1)?,
        customer_name: row.get(2)?,
        vehicle_plate: row.get(3)?,
        discount_percentage: row.get(4)?,
        subtotal: row.get(5)?,
        discount_amount: row.get(6)?,
        tax_amount: row.get(7)?,
        total_amount: row.get(8)?,
        is_fake: row.get(9)?,
        is_verified: row.get(10)?,
        verified_at: row.get(11)?,
        discord_message_id: row.get(12)?,
        created_at: row.get(13)?,
        item_count: 0,
    })
}

fn map_announcement(row: &rusqlite::Row) -> rusqlite::Result<AnnouncementRow> {
    Ok(AnnouncementRow {
        id: row.get(0)?,
        message: row.get(1)?,
        expires_at: row.get(2)?,
        created_at: row.get(3)?,
        created_by: row.get(4)?,
    })
}

fn map_sale_item(row: &rusqlite::Row) -> rusqlite::Result<SaleItemRow> {
    Ok(SaleItemRow {
        id: row.get(0)?,
        sale_id: row.get(1)?,
        item_name: row.get(2)?,
        item_category: row.get(3)?,
        item_type: row.get(4)?,
        quantity: row.get(5)?,
        price: row.get(6)?,
        subtotal: row.get(7)?,
    })
}

fn query_employee(conn: &Connection, column: &str, value: &str) -> Result<Option<EmployeeRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EMPLOYEE_COLS} FROM employees WHERE {column} = ?1"
    ))?;
    let row = stmt.query_row([value], map_employee).optional()?;
    Ok(row)
}

fn query_sale(conn: &Connection, id: &str) -> Result<Option<SaleRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {SALE_COLS} FROM sales s WHERE s.id = ?1"))?;
    let row = stmt.query_row([id], map_sale).optional()?;
    Ok(row)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, is_unique_violation, to_sqlite_ts};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn seed_employee(db: &Database, name: &str, discord: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.create_employee(&id, name, discord, "KEY-123").unwrap();
        id
    }

    fn seed_sale(db: &Database, employee_id: &str, total: f64) -> String {
        let id = Uuid::new_v4().to_string();
        db.insert_sale(&NewSale {
            id: &id,
            employee_id,
            customer_name: "Roy Vance",
            vehicle_plate: "ZX81KT",
            discount_percentage: 0.0,
            subtotal: total / 1.14,
            discount_amount: 0.0,
            tax_amount: total - total / 1.14,
            total_amount: total,
            is_verified: false,
            verified_at: None,
        })
        .unwrap();
        id
    }

    fn seed_item(db: &Database, sale_id: &str, price: f64, quantity: u32) -> String {
        let id = Uuid::new_v4().to_string();
        db.insert_sale_item(&NewSaleItem {
            id: &id,
            sale_id,
            item_name: "SPOILER",
            item_category: "Exterior Visuals",
            item_type: "Stock",
            quantity,
            price,
            subtotal: price * quantity as f64,
        })
        .unwrap();
        id
    }

    #[test]
    fn duplicate_discord_id_is_unique_violation() {
        let db = test_db();
        seed_employee(&db, "mara", "111");
        let err = db
            .create_employee(&Uuid::new_v4().to_string(), "other", "111", "KEY-123")
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn deleting_sale_removes_items() {
        let db = test_db();
        let emp = seed_employee(&db, "mara", "111");
        let sale = seed_sale(&db, &emp, 570.0);
        seed_item(&db, &sale, 500.0, 1);
        seed_item(&db, &sale, 1500.0, 2);

        assert!(db.delete_sale(&sale).unwrap());
        assert!(db.get_sale(&sale).unwrap().is_none());
        assert!(db.list_items_by_sale(&sale).unwrap().is_empty());
    }

    #[test]
    fn deleting_employee_cascades_to_sales_and_items() {
        let db = test_db();
        let emp = seed_employee(&db, "mara", "111");
        let sale = seed_sale(&db, &emp, 570.0);
        seed_item(&db, &sale, 500.0, 1);

        assert!(db.delete_employee_cascade(&emp).unwrap());
        assert!(db.get_employee(&emp).unwrap().is_none());
        assert!(db.get_sale(&sale).unwrap().is_none());
        assert!(db.list_items_by_sale(&sale).unwrap().is_empty());
    }

    #[test]
    fn sale_list_carries_item_counts() {
        let db = test_db();
        let emp = seed_employee(&db, "mara", "111");
        let sale = seed_sale(&db, &emp, 570.0);
        seed_item(&db, &sale, 500.0, 1);
        seed_item(&db, &sale, 1500.0, 1);

        let sales = db.list_sales_by_employee(&emp).unwrap();
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].item_count, 2);
    }

    #[test]
    fn sales_total_between_respects_range() {
        let db = test_db();
        let emp = seed_employee(&db, "mara", "111");
        seed_sale(&db, &emp, 570.0);
        seed_sale(&db, &emp, 1140.0);

        let from = to_sqlite_ts(Utc::now() - Duration::hours(1));
        let to = to_sqlite_ts(Utc::now() + Duration::hours(1));
        let total = db.sales_total_between(&emp, &from, &to).unwrap();
        assert!((total - 1710.0).abs() < 1e-9);

        let stale_to = to_sqlite_ts(Utc::now() - Duration::hours(2));
        let none = db.sales_total_between(&emp, &from, &stale_to).unwrap();
        assert_eq!(none, 0.0);
    }

    #[test]
    fn active_announcement_skips_expired_rows() {
        let db = test_db();
        let owner = Uuid::new_v4().to_string();
        let now = Utc::now();

        db.insert_announcement(
            &Uuid::new_v4().to_string(),
            "old news",
            &to_sqlite_ts(now - Duration::hours(1)),
            &owner,
        )
        .unwrap();
        assert!(db.active_announcement(&to_sqlite_ts(now)).unwrap().is_none());

        db.insert_announcement(
            &Uuid::new_v4().to_string(),
            "double pay weekend",
            &to_sqlite_ts(now + Duration::hours(24)),
            &owner,
        )
        .unwrap();
        let active = db.active_announcement(&to_sqlite_ts(now)).unwrap().unwrap();
        assert_eq!(active.message, "double pay weekend");
    }

    #[test]
    fn prune_removes_only_expired_announcements() {
        let db = test_db();
        let owner = Uuid::new_v4().to_string();
        let now = Utc::now();

        db.insert_announcement(
            &Uuid::new_v4().to_string(),
            "expired",
            &to_sqlite_ts(now - Duration::hours(1)),
            &owner,
        )
        .unwrap();
        db.insert_announcement(
            &Uuid::new_v4().to_string(),
            "live",
            &to_sqlite_ts(now + Duration::hours(1)),
            &owner,
        )
        .unwrap();

        assert_eq!(db.prune_expired_announcements(&to_sqlite_ts(now)).unwrap(), 1);
        let active = db.active_announcement(&to_sqlite_ts(now)).unwrap().unwrap();
        assert_eq!(active.message, "live");
    }

    #[test]
    fn block_and_unblock_round_trip() {
        let db = test_db();
        let emp = seed_employee(&db, "mara", "111");

        db.block_employee(&emp, "selling to rivals", &crate::sqlite_now()).unwrap();
        let row = db.get_employee(&emp).unwrap().unwrap();
        assert!(row.is_blocked);
        assert_eq!(row.block_reason.as_deref(), Some("selling to rivals"));
        assert!(row.blocked_at.is_some());

        db.unblock_employee(&emp).unwrap();
        let row = db.get_employee(&emp).unwrap().unwrap();
        assert!(!row.is_blocked);
        assert!(row.block_reason.is_none());
        assert!(row.blocked_at.is_none());
    }
}
