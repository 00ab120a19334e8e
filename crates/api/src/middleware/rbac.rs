//! Scope-based access control extractors.
//!
//! Each extractor wraps [`AuthUser`] and rejects requests whose token lacks
//! the required scope.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use romshelf_core::error::CoreError;
use romshelf_core::scopes::{SCOPE_ROMS_READ, SCOPE_ROMS_WRITE};

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

async fn require_scope(
    parts: &mut Parts,
    state: &AppState,
    scope: &str,
) -> Result<AuthUser, AppError> {
    let user = AuthUser::from_request_parts(parts, state).await?;
    if !user.has_scope(scope) {
        return Err(AppError::Core(CoreError::Forbidden(format!(
            "Scope '{scope}' required"
        ))));
    }
    Ok(user)
}

/// Requires the `roms.read` scope. Rejects with 403 Forbidden otherwise.
///
/// ```ignore
/// async fn get_rom(RequireRomsRead(user): RequireRomsRead) -> AppResult<Json<()>> {
///     Ok(Json(()))
/// }
/// ```
pub struct RequireRomsRead(pub AuthUser);

impl FromRequestParts<AppState> for RequireRomsRead {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        require_scope(parts, state, SCOPE_ROMS_READ)
            .await
            .map(RequireRomsRead)
    }
}

/// Requires the `roms.write` scope. Rejects with 403 Forbidden otherwise.
pub struct RequireRomsWrite(pub AuthUser);

impl FromRequestParts<AppState> for RequireRomsWrite {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        require_scope(parts, state, SCOPE_ROMS_WRITE)
            .await
            .map(RequireRomsWrite)
    }
}

/// Gate for download endpoints.
///
/// Behaves like [`RequireRomsRead`] unless `DISABLE_DOWNLOAD_ENDPOINT_AUTH`
/// is set, in which case anonymous requests pass with `None`.
pub struct DownloadAccess(pub Option<AuthUser>);

impl FromRequestParts<AppState> for DownloadAccess {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if state.config.disable_download_auth {
            return Ok(DownloadAccess(None));
        }
        require_scope(parts, state, SCOPE_ROMS_READ)
            .await
            .map(|user| DownloadAccess(Some(user)))
    }
}
