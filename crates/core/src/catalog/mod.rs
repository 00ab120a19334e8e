//! Catalog domain types and the storage port the delivery subsystem consumes.
//!
//! The catalog owns roms, their member files and platforms. Everything in
//! this crate talks to storage through [`RomCatalog`]; the Postgres
//! implementation lives in `romshelf-db`, and [`memory::InMemoryCatalog`]
//! backs tests and local tooling.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::entries;
use crate::error::CoreError;
use crate::types::DbId;

/// A platform a rom belongs to. Only the folder slug matters here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    pub id: DbId,
    pub slug: String,
    pub fs_slug: String,
    pub name: String,
    pub custom_name: Option<String>,
}

/// One physical file belonging to a rom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RomFile {
    pub id: DbId,
    pub rom_id: DbId,
    pub file_name: String,
    /// Directory of the file, relative to the library root.
    pub file_path: String,
    pub file_size_bytes: i64,
    /// Lowercase hex CRC32, `None` when the platform is not hashed.
    pub crc_hash: Option<String>,
}

impl RomFile {
    /// Path relative to the library root.
    pub fn full_path(&self) -> String {
        join_relative(&self.file_path, &self.file_name)
    }

    /// Whether this file is itself an M3U playlist.
    pub fn is_playlist(&self) -> bool {
        entries::is_playlist_name(&self.file_name)
    }
}

/// A catalogued downloadable title, possibly spanning several files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rom {
    pub id: DbId,
    pub platform_id: DbId,
    pub name: Option<String>,
    pub summary: Option<String>,
    /// File or directory name on disk.
    pub fs_name: String,
    /// Directory containing `fs_name`, relative to the library root.
    pub fs_path: String,
    pub fs_name_no_tags: String,
    pub fs_name_no_ext: String,
    /// Manual location relative to the resources root.
    pub path_manual: Option<String>,
    pub files: Vec<RomFile>,
}

impl Rom {
    /// Path of the rom (file or directory) relative to the library root.
    pub fn full_path(&self) -> String {
        join_relative(&self.fs_path, &self.fs_name)
    }

    pub fn has_multiple_files(&self) -> bool {
        self.files.len() > 1
    }
}

/// Partial update of a rom. Absent fields are left untouched.
///
/// `summary` distinguishes "absent" (`None`) from an explicit `null`
/// (`Some(None)`), which clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RomPatch {
    pub name: Option<String>,
    pub fs_name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub summary: Option<Option<String>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// New on-disk identity of a rom after a rename.
#[derive(Debug, Clone, PartialEq)]
pub struct RomRename {
    pub fs_name: String,
    pub fs_name_no_tags: String,
    pub fs_name_no_ext: String,
    pub files: Vec<RomFileRename>,
}

/// New name and directory of a member file after its rom was renamed.
#[derive(Debug, Clone, PartialEq)]
pub struct RomFileRename {
    pub id: DbId,
    pub file_name: String,
    pub file_path: String,
}

/// Fully resolved update applied by [`RomCatalog::update_rom`] in one
/// transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RomUpdate {
    pub name: Option<String>,
    pub summary: Option<Option<String>>,
    pub rename: Option<RomRename>,
}

/// Storage capability needed by delivery and library maintenance.
#[async_trait]
pub trait RomCatalog: Send + Sync {
    /// Load a rom with all of its member files.
    async fn find_rom(&self, id: DbId) -> Result<Option<Rom>, CoreError>;

    async fn find_rom_file(&self, id: DbId) -> Result<Option<RomFile>, CoreError>;

    async fn find_platform(&self, id: DbId) -> Result<Option<Platform>, CoreError>;

    /// Apply `update` atomically; returns the refreshed rom, `None` if it
    /// does not exist.
    async fn update_rom(&self, id: DbId, update: &RomUpdate) -> Result<Option<Rom>, CoreError>;

    /// Delete a rom and its file rows. Returns `false` if nothing was deleted.
    async fn delete_rom(&self, id: DbId) -> Result<bool, CoreError>;

    async fn set_manual_path(&self, id: DbId, path_manual: &str) -> Result<(), CoreError>;

    async fn health_check(&self) -> Result<(), CoreError>;
}

fn join_relative(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}
