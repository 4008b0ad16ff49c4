use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use torque_types::api::{BlockEmployeeRequest, EmployeeStats, OwnerOverviewResponse};
use torque_types::events::LedgerEvent;
use torque_types::models::{Employee, Sale};
use torque_types::session::Session;

use crate::auth::{AppState, run_db};
use crate::error::{ApiError, ApiResult};

fn require_owner(session: &Session) -> ApiResult<()> {
    if !session.capabilities.can_see_all_sales {
        return Err(ApiError::Forbidden("owner access required".into()));
    }
    Ok(())
}

/// The owner read model: per-employee aggregates over their full sale
/// sets, the owner's own sales, and the active announcement. Everything
/// is recomputed from scratch per request.
pub async fn owner_overview(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    require_owner(&session)?;

    let discord_id = session.discord_id.clone();
    let own_employee_id = session.employee_id.to_string();

    let (per_employee, own_sale_rows, announcement_row) = run_db(&state, move |db| {
        let employees = db.list_employees_excluding_discord_id(&discord_id)?;
        let mut per_employee = Vec::with_capacity(employees.len());
        for employee in employees {
            let sales = db.list_sales_by_employee(&employee.id)?;
            per_employee.push((employee, sales));
        }
        let own_sales = db.list_sales_by_employee(&own_employee_id)?;
        let announcement = db.active_announcement(&torque_db::sqlite_now())?;
        Ok((per_employee, own_sales, announcement))
    })
    .await?;

    let now = Utc::now();
    let employees = per_employee
        .into_iter()
        .map(|(employee_row, sale_rows)| {
            let sales: Vec<Sale> = sale_rows.into_iter().map(|r| r.into_sale()).collect();
            build_stats(employee_row.into_employee(), &sales, now)
        })
        .collect();

    Ok(Json(OwnerOverviewResponse {
        employees,
        own_sales: own_sale_rows.into_iter().map(|r| r.into_sale()).collect(),
        announcement: announcement_row.map(|r| r.into_announcement()),
    }))
}

pub async fn employee_sales(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(employee_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    require_owner(&session)?;

    let sale_rows = run_db(&state, move |db| db.list_sales_by_employee(&employee_id.to_string()))
        .await?;
    let sales: Vec<Sale> = sale_rows.into_iter().map(|r| r.into_sale()).collect();
    Ok(Json(sales))
}

pub async fn block_employee(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(employee_id): Path<Uuid>,
    Json(req): Json<BlockEmployeeRequest>,
) -> ApiResult<impl IntoResponse> {
    if !session.capabilities.can_block_employees {
        return Err(ApiError::Forbidden("owner access required".into()));
    }
    let reason = req.reason.trim().to_string();
    if reason.is_empty() {
        return Err(ApiError::BadRequest(
            "Please provide a reason for blocking this employee.".into(),
        ));
    }

    let row = run_db(&state, move |db| {
        let blocked =
            db.block_employee(&employee_id.to_string(), &reason, &torque_db::sqlite_now())?;
        if !blocked {
            return Ok(None);
        }
        db.get_employee(&employee_id.to_string())
    })
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("employee not found: {employee_id}")))?;

    state.dispatcher.broadcast(LedgerEvent::EmployeeUpdated { employee_id });
    Ok(Json(row.into_employee()))
}

pub async fn unblock_employee(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(employee_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    if !session.capabilities.can_block_employees {
        return Err(ApiError::Forbidden("owner access required".into()));
    }

    let row = run_db(&state, move |db| {
        let unblocked = db.unblock_employee(&employee_id.to_string())?;
        if !unblocked {
            return Ok(None);
        }
        db.get_employee(&employee_id.to_string())
    })
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("employee not found: {employee_id}")))?;

    state.dispatcher.broadcast(LedgerEvent::EmployeeUpdated { employee_id });
    Ok(Json(row.into_employee()))
}

/// Remove an employee together with every sale and item they own.
pub async fn delete_employee(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(employee_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    if !session.capabilities.can_block_employees {
        return Err(ApiError::Forbidden("owner access required".into()));
    }

    let deleted =
        run_db(&state, move |db| db.delete_employee_cascade(&employee_id.to_string())).await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("employee not found: {employee_id}")));
    }

    state.dispatcher.broadcast(LedgerEvent::EmployeeUpdated { employee_id });
    Ok(StatusCode::NO_CONTENT)
}

/// Aggregates for one employee. "Today" starts at UTC midnight and
/// "weekly" is a rolling seven days, distinct from the Monday-anchored
/// week on notification messages. Fake sales stay in the count but never
/// in the totals.
pub(crate) fn build_stats(employee: Employee, sales: &[Sale], now: DateTime<Utc>) -> EmployeeStats {
    let today_start = now.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc();
    let week_start = now - Duration::days(7);

    let real: Vec<&Sale> = sales.iter().filter(|s| !s.is_fake).collect();
    let sum = |pred: &dyn Fn(&Sale) -> bool| -> f64 {
        real.iter().filter(|s| pred(s)).map(|s| s.total_amount).sum()
    };

    EmployeeStats {
        today_sales: sum(&|s| s.created_at >= today_start),
        weekly_sales: sum(&|s| s.created_at >= week_start),
        total_sales: sum(&|_| true),
        sales_count: sales.len() as u32,
        employee,
    }
}
