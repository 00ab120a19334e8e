//! Authentication and authorization middleware extractors.
//!
//! - [`auth::AuthUser`] -- Extracts the authenticated user from a JWT Bearer token.
//! - [`rbac::RequireRomsRead`] -- Requires the `roms.read` scope.
//! - [`rbac::RequireRomsWrite`] -- Requires the `roms.write` scope.
//! - [`rbac::DownloadAccess`] -- `roms.read`, unless download auth is disabled.

pub mod auth;
pub mod rbac;
