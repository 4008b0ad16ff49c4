use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use uuid::Uuid;

use torque_core::coordinator::{DraftLine, DraftSale, NotificationStatus};
use torque_core::notifier::VerificationImages;
use torque_types::api::{CreateSaleRequest, SaleItemsResponse, SaleResponse, VerifySaleRequest};
use torque_types::events::LedgerEvent;
use torque_types::models::Sale;
use torque_types::session::Session;

use crate::auth::{AppState, run_db};
use crate::error::{ApiError, ApiResult};

pub async fn create_sale(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<CreateSaleRequest>,
) -> ApiResult<impl IntoResponse> {
    let images = paired_images(req.car_image.as_deref(), req.mechanic_sheet.as_deref())?;

    let draft = DraftSale {
        customer_name: req.customer_name,
        vehicle_plate: req.vehicle_plate.to_uppercase(),
        discount_percentage: req.discount_percentage,
        items: req
            .items
            .into_iter()
            .map(|i| DraftLine {
                name: i.item_name,
                category: i.item_category,
                kind: i.item_type,
                quantity: i.quantity,
                price: i.price,
            })
            .collect(),
        images,
    };

    let outcome = state.coordinator.create_sale(&session, draft).await?;

    state.dispatcher.broadcast(LedgerEvent::SaleCreated {
        sale_id: outcome.sale.id,
        employee_id: outcome.sale.employee_id,
    });

    Ok((
        StatusCode::CREATED,
        Json(SaleResponse {
            notification_warning: warning(outcome.notification, "Failed to upload bill to Discord"),
            sale: outcome.sale,
        }),
    ))
}

pub async fn quick_bill(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    let outcome = state.coordinator.quick_bill(&session).await?;

    state.dispatcher.broadcast(LedgerEvent::SaleCreated {
        sale_id: outcome.sale.id,
        employee_id: outcome.sale.employee_id,
    });

    Ok((
        StatusCode::CREATED,
        Json(SaleResponse {
            notification_warning: warning(outcome.notification, "Failed to upload bill to Discord"),
            sale: outcome.sale,
        }),
    ))
}

pub async fn get_sale_items(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(sale_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let (sale_row, item_rows) = run_db(&state, move |db| {
        let sale = db.get_sale(&sale_id.to_string())?;
        let items = db.list_items_by_sale(&sale_id.to_string())?;
        Ok((sale, items))
    })
    .await?;

    let sale_row = sale_row.ok_or_else(|| ApiError::NotFound(format!("sale not found: {sale_id}")))?;
    let mut sale = sale_row.into_sale();
    authorize_sale_access(&session, &sale)?;
    sale.item_count = item_rows.len() as u32;

    Ok(Json(SaleItemsResponse {
        sale,
        items: item_rows.into_iter().map(|r| r.into_sale_item()).collect(),
    }))
}

pub async fn delete_item(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((sale_id, item_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<impl IntoResponse> {
    let sale = state.coordinator.delete_item(&session, sale_id, item_id).await?;

    state.dispatcher.broadcast(LedgerEvent::SaleUpdated {
        sale_id: sale.id,
        employee_id: sale.employee_id,
    });

    Ok(Json(SaleResponse { sale, notification_warning: None }))
}

/// Explicit "save changes": recompute totals and push them to the
/// webhook message.
pub async fn save_totals(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(sale_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let outcome = state.coordinator.save_totals(&session, sale_id).await?;

    state.dispatcher.broadcast(LedgerEvent::SaleUpdated {
        sale_id: outcome.sale.id,
        employee_id: outcome.sale.employee_id,
    });

    Ok(Json(SaleResponse {
        notification_warning: warning(outcome.notification, "Failed to update bill on Discord"),
        sale: outcome.sale,
    }))
}

pub async fn verify_sale(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(sale_id): Path<Uuid>,
    Json(req): Json<VerifySaleRequest>,
) -> ApiResult<impl IntoResponse> {
    let images = VerificationImages {
        car_image: decode_image("car_image", &req.car_image)?,
        mechanic_sheet: decode_image("mechanic_sheet", &req.mechanic_sheet)?,
    };

    let outcome = state.coordinator.verify_sale(&session, sale_id, images).await?;

    state.dispatcher.broadcast(LedgerEvent::SaleUpdated {
        sale_id: outcome.sale.id,
        employee_id: outcome.sale.employee_id,
    });

    Ok(Json(SaleResponse {
        notification_warning: warning(outcome.notification, "Failed to update bill on Discord"),
        sale: outcome.sale,
    }))
}

pub async fn delete_sale(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(sale_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let outcome = state.coordinator.delete_sale(&session, sale_id).await?;

    state.dispatcher.broadcast(LedgerEvent::SaleDeleted {
        sale_id: outcome.sale.id,
        employee_id: outcome.sale.employee_id,
    });

    Ok(Json(SaleResponse {
        notification_warning: warning(outcome.notification, "Failed to delete bill from Discord"),
        sale: outcome.sale,
    }))
}

pub async fn toggle_fake(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(sale_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let outcome = state.coordinator.toggle_fake(&session, sale_id).await?;

    state.dispatcher.broadcast(LedgerEvent::SaleUpdated {
        sale_id: outcome.sale.id,
        employee_id: outcome.sale.employee_id,
    });

    Ok(Json(SaleResponse {
        notification_warning: warning(outcome.notification, "Failed to update bill on Discord"),
        sale: outcome.sale,
    }))
}

pub(crate) fn authorize_sale_access(session: &Session, sale: &Sale) -> ApiResult<()> {
    if sale.employee_id != session.employee_id && !session.capabilities.can_see_all_sales {
        return Err(ApiError::Forbidden("operation not permitted for this session".into()));
    }
    Ok(())
}

fn warning(status: NotificationStatus, message: &str) -> Option<String> {
    matches!(status, NotificationStatus::Failed).then(|| message.to_string())
}

fn decode_image(field: &str, value: &str) -> ApiResult<Vec<u8>> {
    B64.decode(value)
        .map_err(|_| ApiError::BadRequest(format!("{field} is not valid base64")))
}

/// Verification needs both proof shots; anything less is treated as no
/// attachment at all, matching how bills have always been created.
fn paired_images(
    car: Option<&str>,
    sheet: Option<&str>,
) -> ApiResult<Option<VerificationImages>> {
    match (car, sheet) {
        (Some(car), Some(sheet)) => Ok(Some(VerificationImages {
            car_image: decode_image("car_image", car)?,
            mechanic_sheet: decode_image("mechanic_sheet", sheet)?,
        })),
        _ => Ok(None),
    }
}
