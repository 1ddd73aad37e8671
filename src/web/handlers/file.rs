//! File handlers for the HTTP API.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, Multipart, Path, Query, State},
    http::{header, HeaderMap, Response, StatusCode},
    Json,
};
use uuid::Uuid;

use super::AppState;
use crate::file::RequesterInfo;
use crate::lifecycle::UploadRequest;
use crate::web::dto::{
    sanitize_filename, AccessLogResponse, ApiResponse, FileDetailResponse, FileResponse,
    MessageResponse, PaginatedResponse, PaginationQuery, ShareRequest, ShareResponse,
    ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::{AuthUser, OptionalAuthUser};

/// Maximum page size for listings.
const MAX_PER_PAGE: u32 = 100;

/// Generate a safe Content-Disposition header value for file downloads.
///
/// - Removes control characters (including CR, LF which could cause header injection)
/// - Escapes double quotes and backslashes
/// - Uses RFC 5987 filename* parameter for proper Unicode support
fn content_disposition_header(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            _ => c,
        })
        .collect();

    if filename.is_ascii() && !filename.chars().any(|c| c.is_control() || c == '"' || c == '\\') {
        return format!("attachment; filename=\"{}\"", filename);
    }

    let encoded = urlencoding::encode(filename);
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized, encoded
    )
}

/// Identify the downloading client.
///
/// The first `X-Forwarded-For` hop wins over the socket address.
fn requester_info(headers: &HeaderMap, peer: Option<SocketAddr>) -> RequesterInfo {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let origin = forwarded
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string());
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    RequesterInfo::new(origin, user_agent)
}

fn parse_number_field(name: &str, value: &str) -> Result<i64, ApiError> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("{name} must be an integer")))
}

/// POST /api/files - Upload a file.
///
/// Multipart fields: `file` (required), `expiry_hours`, `max_downloads`.
/// Anonymous uploads are allowed; a valid bearer token makes the caller the
/// owner.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    auth: OptionalAuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<FileResponse>>), ApiError> {
    let mut filename: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut content: Option<Vec<u8>> = None;
    let mut expiry_hours: Option<i64> = None;
    let mut max_downloads: Option<i64> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::debug!("Failed to read multipart field: {}", e);
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::payload_too_large("File too large")
        } else {
            ApiError::bad_request("Invalid multipart data")
        }
    })? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                filename = field.file_name().map(sanitize_filename);
                content_type = field.content_type().map(|s| s.to_string());
                content = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| {
                            tracing::debug!("Failed to read file content: {}", e);
                            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                                ApiError::payload_too_large("File too large")
                            } else {
                                ApiError::bad_request("Failed to read file")
                            }
                        })?
                        .to_vec(),
                );
            }
            "expiry_hours" | "max_downloads" => {
                let text = field
                    .text()
                    .await
                    .map_err(|_| ApiError::bad_request(format!("Invalid {name}")))?;
                let value = parse_number_field(&name, &text)?;
                if name == "expiry_hours" {
                    expiry_hours = Some(value);
                } else {
                    max_downloads = Some(value);
                }
            }
            _ => {}
        }
    }

    let filename = filename.ok_or_else(|| ApiError::bad_request("No file provided"))?;
    let content = content.ok_or_else(|| ApiError::bad_request("No file content"))?;

    let request = UploadRequest {
        original_name: filename,
        content,
        // Browsers send octet-stream for unknown types; let the name decide then.
        content_type: content_type.filter(|ct| ct != crate::file::DEFAULT_CONTENT_TYPE),
        expiry_hours,
        max_downloads,
        owner_id: auth.user_id(),
    };

    let record = state.service.create_file(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(FileResponse::from_record(
            &record,
            &state.service,
        ))),
    ))
}

/// GET /api/files/:id - File information.
///
/// The owner additionally receives the access log.
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    auth: OptionalAuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<FileDetailResponse>>, ApiError> {
    let record = state.service.get_file_info(id).await?;

    let access_log = match auth.user_id() {
        Some(user_id) if record.is_owned_by(user_id) => Some(
            record
                .access_log
                .iter()
                .map(AccessLogResponse::from)
                .collect(),
        ),
        _ => None,
    };

    Ok(Json(ApiResponse::new(FileDetailResponse {
        file: FileResponse::from_record(&record, &state.service),
        access_log,
    })))
}

/// GET /api/files/:id/download - Download a file.
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
) -> Result<Response<Body>, ApiError> {
    let requester = requester_info(&headers, peer.map(|ConnectInfo(addr)| addr));
    let download = state.service.download_file(id, &requester).await?;

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, &download.record.content_type)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_header(&download.record.original_name),
        )
        .header(header::CONTENT_LENGTH, download.content.len())
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from(download.content))
        .map_err(|e| {
            tracing::error!("Failed to build response: {}", e);
            ApiError::internal("Failed to build response")
        })?;

    Ok(response)
}

/// DELETE /api/files/:id - Delete a file.
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    auth: OptionalAuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.service.delete_file(id, auth.user_id()).await?;

    Ok(Json(ApiResponse::new(MessageResponse::new("File deleted"))))
}

/// POST /api/files/:id/share - Email a share link.
pub async fn share_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<ShareRequest>,
) -> Result<Json<ApiResponse<ShareResponse>>, ApiError> {
    let link = state.service.send_share_link(id, &req.email).await?;

    Ok(Json(ApiResponse::new(ShareResponse { link })))
}

/// GET /api/me/files - The caller's uploads, newest first.
pub async fn list_my_files(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PaginatedResponse<FileResponse>>, ApiError> {
    let page = query.page.max(1);
    let per_page = query.per_page.clamp(1, MAX_PER_PAGE);

    let listing = state
        .service
        .list_owner_files(claims.sub, page as i64, per_page as i64)
        .await?;

    let files = listing
        .files
        .iter()
        .map(|record| FileResponse::from_record(record, &state.service))
        .collect();

    Ok(Json(PaginatedResponse::new(
        files,
        page,
        per_page,
        listing.total.max(0) as u64,
    )))
}
