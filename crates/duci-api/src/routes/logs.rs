//! Log retrieval endpoint.

use axum::Json;
use axum::extract::{Path, State};

use duci_core::{JobId, LogRecord};

use crate::AppState;
use crate::error::ApiError;

/// `GET /logs/{uuid}` — the persisted record for a job, including the
/// terminal `finished` flag pollers use to detect completion.
pub async fn get_log(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LogRecord>, ApiError> {
    let id: JobId = id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid job id: {id}")))?;

    let record = state.store.get(id).await?;
    Ok(Json(record))
}
