//! Platform row.

use romshelf_core::catalog::Platform;
use romshelf_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `platforms` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PlatformRow {
    pub id: DbId,
    pub slug: String,
    pub fs_slug: String,
    pub name: String,
    pub custom_name: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<PlatformRow> for Platform {
    fn from(row: PlatformRow) -> Self {
        Platform {
            id: row.id,
            slug: row.slug,
            fs_slug: row.fs_slug,
            name: row.name,
            custom_name: row.custom_name,
        }
    }
}
