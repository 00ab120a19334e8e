pub mod health;
pub mod roms;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /roms                                   upload (POST, roms.write)
/// /roms/delete                            bulk delete (POST, roms.write)
/// /roms/files/{id}                        file detail (GET, roms.read)
/// /roms/files/{id}/content/{file_name}    single-file download (GET)
/// /roms/{id}                              detail (GET), update (PUT, roms.write)
/// /roms/{id}/content/{file_name}          download (GET, HEAD)
/// /roms/{id}/manuals                      manual upload (POST, roms.write)
/// ```
///
/// Download routes require `roms.read` unless
/// `DISABLE_DOWNLOAD_ENDPOINT_AUTH` is set.
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/roms", roms::router())
}
