use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use uuid::Uuid;

use torque_db::to_sqlite_ts;
use torque_types::api::AnnouncementRequest;
use torque_types::events::LedgerEvent;
use torque_types::session::Session;

use crate::auth::{AppState, run_db};
use crate::error::{ApiError, ApiResult};

/// The single active announcement, surfaced on every dashboard.
pub async fn get_active(
    State(state): State<AppState>,
    Extension(_session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    let row = run_db(&state, |db| db.active_announcement(&torque_db::sqlite_now())).await?;
    Ok(Json(row.map(|r| r.into_announcement())))
}

pub async fn create_announcement(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<AnnouncementRequest>,
) -> ApiResult<impl IntoResponse> {
    let (message, expires_at) = validate(&session, &req)?;

    let id = Uuid::new_v4();
    let created_by = session.employee_id.to_string();
    let row = run_db(&state, move |db| {
        db.insert_announcement(&id.to_string(), &message, &to_sqlite_ts(expires_at), &created_by)?;
        db.get_announcement(&id.to_string())
    })
    .await?
    .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("announcement vanished after insert")))?;

    state.dispatcher.broadcast(LedgerEvent::AnnouncementChanged);
    Ok((StatusCode::CREATED, Json(row.into_announcement())))
}

pub async fn update_announcement(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
    Json(req): Json<AnnouncementRequest>,
) -> ApiResult<impl IntoResponse> {
    let (message, expires_at) = validate(&session, &req)?;

    let row = run_db(&state, move |db| {
        let updated =
            db.update_announcement(&id.to_string(), &message, &to_sqlite_ts(expires_at))?;
        if !updated {
            return Ok(None);
        }
        db.get_announcement(&id.to_string())
    })
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("announcement not found: {id}")))?;

    state.dispatcher.broadcast(LedgerEvent::AnnouncementChanged);
    Ok(Json(row.into_announcement()))
}

pub async fn delete_announcement(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    if !session.capabilities.can_manage_announcements {
        return Err(ApiError::Forbidden("owner access required".into()));
    }

    let deleted = run_db(&state, move |db| db.delete_announcement(&id.to_string())).await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("announcement not found: {id}")));
    }

    state.dispatcher.broadcast(LedgerEvent::AnnouncementChanged);
    Ok(StatusCode::NO_CONTENT)
}

fn validate(
    session: &Session,
    req: &AnnouncementRequest,
) -> ApiResult<(String, chrono::DateTime<Utc>)> {
    if !session.capabilities.can_manage_announcements {
        return Err(ApiError::Forbidden("owner access required".into()));
    }
    let message = req.message.trim().to_string();
    if message.is_empty() {
        return Err(ApiError::BadRequest("announcement message is required".into()));
    }
    if req.expires_in_hours == 0 {
        return Err(ApiError::BadRequest("expiry must be at least one hour".into()));
    }
    Ok((message, Utc::now() + Duration::hours(req.expires_in_hours as i64)))
}
