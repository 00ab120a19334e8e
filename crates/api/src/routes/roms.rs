//! Route definitions for roms, their files and manuals.
//!
//! Mounted at `/roms` by `api_routes()`.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::roms;
use crate::state::AppState;

/// Rom routes.
///
/// ```text
/// POST   /                                   -> upload_rom
/// POST   /delete                             -> delete_roms
/// GET    /files/{id}                         -> get_rom_file
/// GET    /files/{id}/content/{file_name}     -> get_rom_file_content
/// GET    /{id}                               -> get_rom
/// PUT    /{id}                               -> update_rom
/// GET    /{id}/content/{file_name}           -> get_rom_content
/// HEAD   /{id}/content/{file_name}           -> head_rom_content
/// POST   /{id}/manuals                       -> upload_manual
/// ```
///
/// Upload routes lift axum's default body limit; files are streamed to disk.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(roms::upload_rom).layer(DefaultBodyLimit::disable()),
        )
        .route("/delete", post(roms::delete_roms))
        .route("/files/{id}", get(roms::get_rom_file))
        .route(
            "/files/{id}/content/{file_name}",
            get(roms::get_rom_file_content),
        )
        .route("/{id}", get(roms::get_rom).put(roms::update_rom))
        .route(
            "/{id}/content/{file_name}",
            get(roms::get_rom_content).head(roms::head_rom_content),
        )
        .route(
            "/{id}/manuals",
            post(roms::upload_manual).layer(DefaultBodyLimit::disable()),
        )
}
