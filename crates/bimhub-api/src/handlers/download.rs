//! Download handlers.

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::Response;
use validator::Validate;

use bimhub_core::error::AppError;
use bimhub_core::types::id::Ticket;

use crate::dto::request::{ListDownloadsQuery, SubmitDownloadRequest};
use crate::dto::response::{ApiResponse, CancelResponse, DownloadStatusResponse, TicketResponse};
use crate::error::ApiError;
use crate::state::AppState;

/// POST /api/downloads
pub async fn submit_download(
    State(state): State<AppState>,
    Json(req): Json<SubmitDownloadRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TicketResponse>>), ApiError> {
    req.validate()?;
    let ticket = state.downloads.submit(req.into()).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::ok(TicketResponse { ticket })),
    ))
}

/// GET /api/downloads?caller_id=...
pub async fn list_downloads(
    State(state): State<AppState>,
    Query(query): Query<ListDownloadsQuery>,
) -> Result<Json<ApiResponse<Vec<DownloadStatusResponse>>>, ApiError> {
    query.validate()?;
    let downloads = state
        .downloads
        .tickets_for(&query.caller_id)
        .into_iter()
        .filter_map(|ticket| {
            // Reaped between listing and polling.
            let snapshot = state.downloads.poll(ticket).ok()?;
            Some(DownloadStatusResponse {
                ticket,
                state: snapshot,
            })
        })
        .collect();
    Ok(Json(ApiResponse::ok(downloads)))
}

/// GET /api/downloads/{ticket}
pub async fn get_download(
    State(state): State<AppState>,
    Path(ticket): Path<Ticket>,
) -> Result<Json<ApiResponse<DownloadStatusResponse>>, ApiError> {
    let download = state.downloads.poll(ticket)?;
    Ok(Json(ApiResponse::ok(DownloadStatusResponse {
        ticket,
        state: download,
    })))
}

/// POST /api/downloads/{ticket}/cancel
pub async fn cancel_download(
    State(state): State<AppState>,
    Path(ticket): Path<Ticket>,
) -> Result<Json<ApiResponse<CancelResponse>>, ApiError> {
    let cancelled = state.downloads.cancel(ticket)?;
    Ok(Json(ApiResponse::ok(CancelResponse { ticket, cancelled })))
}

/// GET /api/downloads/{ticket}/data
pub async fn download_data(
    State(state): State<AppState>,
    Path(ticket): Path<Ticket>,
) -> Result<Response, ApiError> {
    let result = state
        .downloads
        .result(ticket)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Download {ticket} produced no result")))?;

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, result.artifact.content_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", result.file_name),
        )
        .header(header::CONTENT_LENGTH, result.artifact.data.len())
        .body(Body::from(result.artifact.data))
        .map_err(|e| AppError::internal(format!("Response build failed: {e}")))?;

    Ok(response)
}
