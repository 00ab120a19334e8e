//! Handlers for rom detail, downloads, uploads and maintenance.

use axum::body::Body;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, HeaderName, StatusCode};
use axum::response::Response;
use axum::Json;
use romshelf_core::catalog::{Rom, RomFile, RomPatch};
use romshelf_core::delivery::{self, Delivery, DeliveryHead, DeliveryRequest};
use romshelf_core::error::CoreError;
use romshelf_core::library::UploadedRom;
use romshelf_core::manifest::{self, ARCHIVE_FILES_HEADER, ARCHIVE_FILES_ZIP};
use romshelf_core::types::DbId;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

use crate::error::{AppError, AppResult};
use crate::middleware::rbac::{DownloadAccess, RequireRomsRead, RequireRomsWrite};
use crate::response::DataResponse;
use crate::state::AppState;

/// Target platform of an upload.
pub const UPLOAD_PLATFORM_HEADER: &str = "x-upload-platform";

/// Name of the uploaded file; also the name of the multipart field carrying it.
pub const UPLOAD_FILENAME_HEADER: &str = "x-upload-filename";

/// Internal redirect understood by nginx.
const ACCEL_REDIRECT_HEADER: &str = "x-accel-redirect";

const OCTET_STREAM: &str = "application/octet-stream";
const ZIP_CONTENT_TYPE: &str = "application/zip";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Query parameters of the rom download endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ContentParams {
    /// Comma-separated file ids, e.g. `1,2,3`.
    pub file_ids: Option<String>,
    /// Group multi-file members under a hidden folder (`true`, `1`, `yes`).
    pub hidden_folder: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRomsRequest {
    pub roms: Vec<DbId>,
    #[serde(default)]
    pub delete_from_fs: Vec<DbId>,
}

#[derive(Debug, Serialize)]
pub struct DeleteRomsResponse {
    pub deleted: usize,
}

// ---------------------------------------------------------------------------
// Detail
// ---------------------------------------------------------------------------

/// GET /api/v1/roms/{id}
pub async fn get_rom(
    _access: DownloadAccess,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Rom>>> {
    let rom = state
        .catalog
        .find_rom(id)
        .await?
        .ok_or(CoreError::NotFound { entity: "Rom", id })?;
    Ok(Json(DataResponse { data: rom }))
}

/// GET /api/v1/roms/files/{id}
pub async fn get_rom_file(
    RequireRomsRead(_user): RequireRomsRead,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<RomFile>>> {
    let file = state
        .catalog
        .find_rom_file(id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "RomFile",
            id,
        })?;
    Ok(Json(DataResponse { data: file }))
}

// ---------------------------------------------------------------------------
// Downloads
// ---------------------------------------------------------------------------

/// GET /api/v1/roms/{id}/content/{file_name}
///
/// A single member is streamed or redirected to the proxy; several members
/// become a ZIP (local) or a `mod_zip` manifest (proxied). `file_name` names
/// the archive.
pub async fn get_rom_content(
    DownloadAccess(user): DownloadAccess,
    State(state): State<AppState>,
    Path((id, file_name)): Path<(DbId, String)>,
    Query(params): Query<ContentParams>,
) -> AppResult<Response> {
    let request = delivery_request(&params, file_name)?;
    tracing::info!(
        rom_id = id,
        user_id = user.as_ref().map(|u| u.user_id),
        "Downloading rom",
    );

    let delivery = state.delivery.deliver(id, &request).await?;
    delivery_response(delivery).await
}

/// HEAD /api/v1/roms/{id}/content/{file_name}
///
/// Same headers as the GET without reading file contents.
pub async fn head_rom_content(
    _access: DownloadAccess,
    State(state): State<AppState>,
    Path((id, file_name)): Path<(DbId, String)>,
    Query(params): Query<ContentParams>,
) -> AppResult<Response> {
    let request = delivery_request(&params, file_name)?;
    let head = state.delivery.describe(id, &request).await?;

    let builder = match head {
        DeliveryHead::LocalFile { size, filename } => Response::builder()
            .header(header::CONTENT_TYPE, OCTET_STREAM)
            .header(header::CONTENT_LENGTH, size.to_string())
            .header(header::CONTENT_DISPOSITION, attachment(&filename)),
        DeliveryHead::Redirect { location, filename } => Response::builder()
            .header(ACCEL_REDIRECT_HEADER, location)
            .header(header::CONTENT_DISPOSITION, redirect_attachment(&filename)),
        DeliveryHead::Archive { filename } | DeliveryHead::Manifest { filename } => {
            Response::builder()
                .header(header::CONTENT_TYPE, ZIP_CONTENT_TYPE)
                .header(header::CONTENT_DISPOSITION, attachment(&filename))
        }
    };

    finish(builder.status(StatusCode::OK).body(Body::empty()))
}

/// GET /api/v1/roms/files/{id}/content/{file_name}
pub async fn get_rom_file_content(
    DownloadAccess(user): DownloadAccess,
    State(state): State<AppState>,
    Path((id, file_name)): Path<(DbId, String)>,
) -> AppResult<Response> {
    tracing::info!(
        file_id = id,
        user_id = user.as_ref().map(|u| u.user_id),
        "Downloading rom file",
    );
    let delivery = state.delivery.deliver_file(id, Some(&file_name)).await?;
    delivery_response(delivery).await
}

fn delivery_request(params: &ContentParams, file_name: String) -> AppResult<DeliveryRequest> {
    let file_ids = params
        .file_ids
        .as_deref()
        .map(delivery::parse_file_ids)
        .transpose()?
        .filter(|ids| !ids.is_empty());

    Ok(DeliveryRequest {
        file_ids,
        hidden_folder: params.hidden_folder.as_deref().is_some_and(str_to_bool),
        archive_name: Some(file_name),
    })
}

fn str_to_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

async fn delivery_response(delivery: Delivery) -> AppResult<Response> {
    let response = match delivery {
        Delivery::LocalFile {
            path,
            size,
            filename,
        } => {
            let file = tokio::fs::File::open(&path)
                .await
                .map_err(|e| CoreError::from_source_io(e, &path))?;
            Response::builder()
                .header(header::CONTENT_TYPE, OCTET_STREAM)
                .header(header::CONTENT_LENGTH, size.to_string())
                .header(header::CONTENT_DISPOSITION, attachment(&filename))
                .body(Body::from_stream(ReaderStream::new(file)))
        }
        Delivery::Redirect { location, filename } => Response::builder()
            .header(ACCEL_REDIRECT_HEADER, location)
            .header(header::CONTENT_DISPOSITION, redirect_attachment(&filename))
            .body(Body::empty()),
        Delivery::Archive { bytes, filename } => Response::builder()
            .header(header::CONTENT_TYPE, ZIP_CONTENT_TYPE)
            .header(header::CONTENT_LENGTH, bytes.len().to_string())
            .header(header::CONTENT_DISPOSITION, attachment(&filename))
            .body(Body::from(bytes)),
        Delivery::Manifest { lines, filename } => Response::builder()
            .header(
                HeaderName::from_static(ARCHIVE_FILES_HEADER),
                ARCHIVE_FILES_ZIP,
            )
            .header(header::CONTENT_DISPOSITION, attachment(&filename))
            .body(Body::from(manifest::render(&lines))),
    };

    finish(response)
}

/// `Content-Disposition` with both the RFC 5987 and the legacy parameter.
fn attachment(filename: &str) -> String {
    let quoted = manifest::quote(filename);
    format!("attachment; filename*=UTF-8''{quoted}; filename=\"{quoted}\"")
}

fn redirect_attachment(filename: &str) -> String {
    format!("attachment; filename=\"{}\"", manifest::quote(filename))
}

fn finish(response: Result<Response, axum::http::Error>) -> AppResult<Response> {
    response.map_err(|e| AppError::InternalError(format!("Failed to build response: {e}")))
}

// ---------------------------------------------------------------------------
// Uploads
// ---------------------------------------------------------------------------

/// POST /api/v1/roms
///
/// Streams the multipart field named after `x-upload-filename` into the
/// platform folder given by `x-upload-platform`. Other fields are ignored.
pub async fn upload_rom(
    RequireRomsWrite(user): RequireRomsWrite,
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<UploadedRom>>)> {
    let platform_id: DbId = required_header(&headers, UPLOAD_PLATFORM_HEADER)?
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid {UPLOAD_PLATFORM_HEADER} header")))?;
    let file_name = required_header(&headers, UPLOAD_FILENAME_HEADER)?.to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some(file_name.as_str()) {
            continue;
        }

        tracing::info!(user_id = user.user_id, platform_id, file_name = %file_name, "Rom upload");
        let uploaded = state
            .library
            .upload_rom(platform_id, &file_name, field)
            .await?;
        return Ok((StatusCode::CREATED, Json(DataResponse { data: uploaded })));
    }

    Err(AppError::BadRequest(format!(
        "No multipart field named '{file_name}'"
    )))
}

/// POST /api/v1/roms/{id}/manuals
///
/// Stores the field named after `x-upload-filename` as the rom's manual,
/// replacing any previous one.
pub async fn upload_manual(
    RequireRomsWrite(user): RequireRomsWrite,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> AppResult<Json<DataResponse<Rom>>> {
    let file_name = required_header(&headers, UPLOAD_FILENAME_HEADER)?.to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some(file_name.as_str()) {
            continue;
        }

        tracing::info!(user_id = user.user_id, rom_id = id, "Manual upload");
        let rom = state.library.store_manual(id, field).await?;
        return Ok(Json(DataResponse { data: rom }));
    }

    Err(AppError::BadRequest(format!(
        "No multipart field named '{file_name}'"
    )))
}

fn required_header<'a>(headers: &'a HeaderMap, name: &str) -> AppResult<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("Missing {name} header")))
}

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

/// PUT /api/v1/roms/{id}
///
/// Applies a partial update; a changed `fs_name` renames the rom on disk.
pub async fn update_rom(
    RequireRomsWrite(user): RequireRomsWrite,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(patch): Json<RomPatch>,
) -> AppResult<Json<DataResponse<Rom>>> {
    tracing::debug!(user_id = user.user_id, rom_id = id, "Updating rom");
    let rom = state.library.update_rom(id, &patch).await?;
    Ok(Json(DataResponse { data: rom }))
}

/// POST /api/v1/roms/delete
pub async fn delete_roms(
    RequireRomsWrite(user): RequireRomsWrite,
    State(state): State<AppState>,
    Json(input): Json<DeleteRomsRequest>,
) -> AppResult<Json<DataResponse<DeleteRomsResponse>>> {
    tracing::info!(user_id = user.user_id, count = input.roms.len(), "Deleting roms");
    let deleted = state
        .library
        .delete_roms(&input.roms, &input.delete_from_fs)
        .await?;
    Ok(Json(DataResponse {
        data: DeleteRomsResponse { deleted },
    }))
}
