//! Rom row.

use romshelf_core::catalog::{Rom, RomFile};
use romshelf_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use crate::models::rom_file::RomFileRow;

/// A row from the `roms` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RomRow {
    pub id: DbId,
    pub platform_id: DbId,
    pub name: Option<String>,
    pub summary: Option<String>,
    pub fs_name: String,
    pub fs_path: String,
    pub fs_name_no_tags: String,
    pub fs_name_no_ext: String,
    pub path_manual: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl RomRow {
    /// Combine the rom with its file rows.
    pub fn into_domain(self, files: Vec<RomFileRow>) -> Rom {
        Rom {
            id: self.id,
            platform_id: self.platform_id,
            name: self.name,
            summary: self.summary,
            fs_name: self.fs_name,
            fs_path: self.fs_path,
            fs_name_no_tags: self.fs_name_no_tags,
            fs_name_no_ext: self.fs_name_no_ext,
            path_manual: self.path_manual,
            files: files.into_iter().map(RomFile::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> Timestamp {
        chrono::Utc::now()
    }

    #[test]
    fn into_domain_attaches_files_and_drops_empty_hashes() {
        let rom = RomRow {
            id: 3,
            platform_id: 1,
            name: Some("Game".into()),
            summary: None,
            fs_name: "Game".into(),
            fs_path: "roms/psx".into(),
            fs_name_no_tags: "Game".into(),
            fs_name_no_ext: "Game".into(),
            path_manual: None,
            created_at: now(),
            updated_at: now(),
        };
        let file = |id: DbId, crc: Option<&str>| RomFileRow {
            id,
            rom_id: 3,
            file_name: format!("disc{id}.bin"),
            file_path: "roms/psx/Game".into(),
            file_size_bytes: 10,
            crc_hash: crc.map(str::to_string),
            created_at: now(),
            updated_at: now(),
        };

        let domain = rom.into_domain(vec![file(1, Some("0a1b2c3d")), file(2, Some(""))]);
        assert_eq!(domain.files.len(), 2);
        assert_eq!(domain.files[0].crc_hash.as_deref(), Some("0a1b2c3d"));
        assert_eq!(domain.files[1].crc_hash, None);
        assert_eq!(domain.files[1].full_path(), "roms/psx/Game/disc2.bin");
    }
}
