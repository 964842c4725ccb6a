use super::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::excel::XLSX_CONTENT_TYPE;
use crate::services::ImportReport;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

/// GET .../periods/{period_id}/export: the period as an `.xlsx` download
pub async fn export_period(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((room_id, period_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Response> {
    let workbook = state
        .excel
        .export_period(room_id, caller.user.id, period_id)
        .await?;
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", workbook.file_name))
        .map_err(|e| AppError::Excel(format!("Invalid export file name: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(XLSX_CONTENT_TYPE)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        workbook.bytes,
    )
        .into_response())
}

/// POST .../import: raw workbook bytes in the body
pub async fn import_workbook(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
    body: Bytes,
) -> AppResult<Json<ImportReport>> {
    if body.is_empty() {
        return Err(AppError::Validation("Request body must be an .xlsx workbook".to_string()));
    }
    Ok(Json(
        state
            .excel
            .import_workbook(room_id, caller.user.id, body.to_vec())
            .await?,
    ))
}
