//! Rom file row.

use romshelf_core::catalog::RomFile;
use romshelf_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `rom_files` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RomFileRow {
    pub id: DbId,
    pub rom_id: DbId,
    pub file_name: String,
    pub file_path: String,
    pub file_size_bytes: i64,
    pub crc_hash: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<RomFileRow> for RomFile {
    fn from(row: RomFileRow) -> Self {
        RomFile {
            id: row.id,
            rom_id: row.rom_id,
            file_name: row.file_name,
            file_path: row.file_path,
            file_size_bytes: row.file_size_bytes,
            // Empty means not hashed.
            crc_hash: row.crc_hash.filter(|crc| !crc.is_empty()),
        }
    }
}
