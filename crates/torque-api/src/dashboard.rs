use axum::{Extension, Json, extract::State, response::IntoResponse};

use torque_types::api::DashboardResponse;
use torque_types::models::Sale;
use torque_types::session::Session;

use crate::auth::{AppState, run_db};
use crate::error::ApiResult;

/// The employee read model: the full sale set is re-fetched and the
/// aggregates recomputed from scratch on every load. Clients call this
/// again whenever the change feed fires for their scope.
pub async fn get_dashboard(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    let employee_id = session.employee_id.to_string();
    let (sale_rows, announcement_row) = run_db(&state, move |db| {
        let sales = db.list_sales_by_employee(&employee_id)?;
        let announcement = db.active_announcement(&torque_db::sqlite_now())?;
        Ok((sales, announcement))
    })
    .await?;

    let sales: Vec<Sale> = sale_rows.into_iter().map(|r| r.into_sale()).collect();

    Ok(Json(DashboardResponse {
        customer_count: sales.len() as u32,
        total_sales: revenue_total(&sales),
        recent_sales: sales.iter().take(5).cloned().collect(),
        sales,
        announcement: announcement_row.map(|r| r.into_announcement()),
    }))
}

/// Revenue shown on dashboards. Fake-flagged sales stay in the list but
/// never count toward the figure.
pub(crate) fn revenue_total(sales: &[Sale]) -> f64 {
    sales.iter().filter(|s| !s.is_fake).map(|s| s.total_amount).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn sale(total: f64, fake: bool) -> Sale {
        Sale {
            id: Uuid::new_v4(),
            employee_id: Uuid::new_v4(),
            customer_name: "Roy Vance".into(),
            vehicle_plate: "ZX81KT".into(),
            discount_percentage: 0.0,
            subtotal: total / 1.14,
            discount_amount: 0.0,
            tax_amount: total - total / 1.14,
            total_amount: total,
            is_fake: fake,
            is_verified: true,
            verified_at: None,
            discord_message_id: None,
            created_at: Utc::now(),
            item_count: 1,
        }
    }

    #[test]
    fn fake_sales_are_excluded_from_revenue() {
        let mut sales = vec![sale(570.0, false), sale(11286.0, false)];
        let before = revenue_total(&sales);
        assert!((before - 11856.0).abs() < 1e-9);

        sales[1].is_fake = true;
        assert!((revenue_total(&sales) - 570.0).abs() < 1e-9);

        // Re-including restores the prior aggregate.
        sales[1].is_fake = false;
        assert!((revenue_total(&sales) - before).abs() < 1e-9);
    }
}
