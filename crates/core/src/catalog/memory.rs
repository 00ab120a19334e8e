//! In-process [`RomCatalog`] backed by ordered maps.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{Platform, Rom, RomCatalog, RomFile, RomUpdate};
use crate::error::CoreError;
use crate::types::DbId;

#[derive(Debug, Default)]
struct Tables {
    platforms: BTreeMap<DbId, Platform>,
    roms: BTreeMap<DbId, Rom>,
}

/// Catalog kept entirely in memory. Rom files are stored inside their rom.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    tables: Mutex<Tables>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_platform(&self, platform: Platform) {
        if let Ok(mut tables) = self.tables.lock() {
            tables.platforms.insert(platform.id, platform);
        }
    }

    pub fn insert_rom(&self, rom: Rom) {
        if let Ok(mut tables) = self.tables.lock() {
            tables.roms.insert(rom.id, rom);
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, CoreError> {
        self.tables
            .lock()
            .map_err(|_| CoreError::Internal("in-memory catalog lock poisoned".into()))
    }
}

#[async_trait]
impl RomCatalog for InMemoryCatalog {
    async fn find_rom(&self, id: DbId) -> Result<Option<Rom>, CoreError> {
        Ok(self.lock()?.roms.get(&id).cloned())
    }

    async fn find_rom_file(&self, id: DbId) -> Result<Option<RomFile>, CoreError> {
        Ok(self
            .lock()?
            .roms
            .values()
            .flat_map(|rom| rom.files.iter())
            .find(|file| file.id == id)
            .cloned())
    }

    async fn find_platform(&self, id: DbId) -> Result<Option<Platform>, CoreError> {
        Ok(self.lock()?.platforms.get(&id).cloned())
    }

    async fn update_rom(&self, id: DbId, update: &RomUpdate) -> Result<Option<Rom>, CoreError> {
        let mut tables = self.lock()?;
        let Some(rom) = tables.roms.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(name) = &update.name {
            rom.name = Some(name.clone());
        }
        if let Some(summary) = &update.summary {
            rom.summary = summary.clone();
        }
        if let Some(rename) = &update.rename {
            rom.fs_name = rename.fs_name.clone();
            rom.fs_name_no_tags = rename.fs_name_no_tags.clone();
            rom.fs_name_no_ext = rename.fs_name_no_ext.clone();
            for change in &rename.files {
                if let Some(file) = rom.files.iter_mut().find(|f| f.id == change.id) {
                    file.file_name = change.file_name.clone();
                    file.file_path = change.file_path.clone();
                }
            }
        }

        Ok(Some(rom.clone()))
    }

    async fn delete_rom(&self, id: DbId) -> Result<bool, CoreError> {
        Ok(self.lock()?.roms.remove(&id).is_some())
    }

    async fn set_manual_path(&self, id: DbId, path_manual: &str) -> Result<(), CoreError> {
        let mut tables = self.lock()?;
        let rom = tables.roms.get_mut(&id).ok_or(CoreError::NotFound {
            entity: "Rom",
            id,
        })?;
        rom.path_manual = Some(path_manual.to_string());
        Ok(())
    }

    async fn health_check(&self) -> Result<(), CoreError> {
        self.lock().map(|_| ())
    }
}
