//! Library maintenance that touches both the catalog and the filesystem:
//! uploads, renames, bulk deletes and manuals.
//!
//! The filesystem is changed first and the catalog second. When the catalog
//! update of a rename fails, the rename on disk is undone.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use serde::Serialize;

use crate::catalog::{Rom, RomCatalog, RomFile, RomFileRename, RomPatch, RomRename, RomUpdate};
use crate::error::CoreError;
use crate::layout::LibraryLayout;
use crate::naming;
use crate::paths;
use crate::types::DbId;
use crate::upload::{self, UploadSink};

/// Result of storing a new rom file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedRom {
    /// Directory of the stored file, relative to the library root.
    pub fs_path: String,
    pub fs_name: String,
    pub size_bytes: u64,
}

/// Catalog plus filesystem operations on roms.
pub struct LibraryService {
    catalog: Arc<dyn RomCatalog>,
    layout: LibraryLayout,
}

impl LibraryService {
    pub fn new(catalog: Arc<dyn RomCatalog>, layout: LibraryLayout) -> Self {
        Self { catalog, layout }
    }

    /// Stream a new rom file into its platform folder.
    ///
    /// The catalog is not touched; the next library scan picks the file up.
    /// An unknown `platform_id` comes from the client, so it is reported as
    /// a validation error rather than a missing resource.
    pub async fn upload_rom<S, E>(
        &self,
        platform_id: DbId,
        file_name: &str,
        stream: S,
    ) -> Result<UploadedRom, CoreError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: std::fmt::Display,
    {
        let platform = self
            .catalog
            .find_platform(platform_id)
            .await?
            .ok_or_else(|| CoreError::Validation("Platform not found".into()))?;

        let destination = self.layout.upload_destination(&platform, file_name)?;
        tracing::info!(
            platform = %platform.slug,
            path = %destination.display(),
            "Uploading rom",
        );

        let size_bytes = upload::receive(stream, &destination).await?;
        Ok(UploadedRom {
            fs_path: self.layout.platform_roms_dir(&platform),
            fs_name: file_name.to_string(),
            size_bytes,
        })
    }

    /// Apply `patch` to rom `id`, renaming it on disk when `fs_name` changes.
    pub async fn update_rom(&self, id: DbId, patch: &RomPatch) -> Result<Rom, CoreError> {
        let rom = self.find_rom(id).await?;

        let new_fs_name = match patch.fs_name.as_deref() {
            Some(requested) => {
                let sanitized = paths::sanitize_filename(requested);
                paths::validate_filename(&sanitized).map_err(|_| {
                    CoreError::Validation(format!("'{requested}' is not a usable file name"))
                })?;
                Some(sanitized).filter(|name| *name != rom.fs_name)
            }
            None => None,
        };

        let mut update = RomUpdate {
            name: patch.name.clone(),
            summary: patch.summary.clone(),
            rename: None,
        };

        let Some(new_fs_name) = new_fs_name else {
            return self.persist(id, &update).await;
        };

        let old_path = self.layout.rom_path(&rom)?;
        let new_path = self
            .layout
            .library()
            .resolve([rom.fs_path.as_str(), new_fs_name.as_str()])?;
        rename_on_disk(&old_path, &new_path).await?;

        update.rename = Some(rename_plan(&rom, &new_fs_name));
        match self.persist(id, &update).await {
            Ok(updated) => {
                tracing::info!(rom_id = id, from = %rom.fs_name, to = %new_fs_name, "Rom renamed");
                Ok(updated)
            }
            Err(e) => {
                tracing::error!(rom_id = id, error = %e, "Catalog update failed, reverting rename");
                if let Err(revert) = tokio::fs::rename(&new_path, &old_path).await {
                    tracing::error!(
                        from = %new_path.display(),
                        to = %old_path.display(),
                        error = %revert,
                        "Failed to revert rom rename",
                    );
                }
                Err(e)
            }
        }
    }

    /// Delete roms from the catalog, their resources, and for ids listed in
    /// `delete_from_fs` their files on disk. Returns the number deleted.
    ///
    /// Stops at the first failure; roms processed before it stay deleted.
    pub async fn delete_roms(
        &self,
        ids: &[DbId],
        delete_from_fs: &[DbId],
    ) -> Result<usize, CoreError> {
        for &id in ids {
            let rom = self.find_rom(id).await?;

            tracing::info!(rom_id = id, fs_name = %rom.fs_name, "Deleting rom from catalog");
            self.catalog.delete_rom(id).await?;

            let resources = self.layout.rom_resources_path(&rom)?;
            match tokio::fs::remove_dir_all(&resources).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::warn!(
                        rom_id = id,
                        path = %resources.display(),
                        "No resources to delete",
                    );
                }
                Err(e) => return Err(CoreError::from_source_io(e, &resources)),
            }

            if delete_from_fs.contains(&id) {
                let path = self.layout.rom_path(&rom)?;
                tracing::info!(rom_id = id, path = %path.display(), "Deleting rom from filesystem");
                remove_path(&path).await.map_err(|e| match e {
                    CoreError::SourceMissing { path } => {
                        tracing::error!(rom_id = id, path = %path.display(), "Rom not found on disk");
                        CoreError::NotFound {
                            entity: "Rom file",
                            id,
                        }
                    }
                    other => other,
                })?;
            }
        }

        Ok(ids.len())
    }

    /// Store the manual of rom `id`, replacing any previous one.
    pub async fn store_manual<S, E>(&self, id: DbId, stream: S) -> Result<Rom, CoreError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: std::fmt::Display,
    {
        let rom = self.find_rom(id).await?;
        let destination = self.layout.manual_path(&rom)?;
        tracing::info!(rom_id = id, path = %destination.display(), "Uploading manual");

        let mut sink = UploadSink::replace(&destination).await?;
        sink.write_stream(stream).await?;
        sink.commit().await?;

        self.catalog
            .set_manual_path(id, &LibraryLayout::manual_relative_path(&rom))
            .await?;
        self.find_rom(id).await
    }

    async fn find_rom(&self, id: DbId) -> Result<Rom, CoreError> {
        self.catalog
            .find_rom(id)
            .await?
            .ok_or(CoreError::NotFound { entity: "Rom", id })
    }

    async fn persist(&self, id: DbId, update: &RomUpdate) -> Result<Rom, CoreError> {
        self.catalog
            .update_rom(id, update)
            .await?
            .ok_or(CoreError::NotFound { entity: "Rom", id })
    }
}

async fn rename_on_disk(from: &Path, to: &Path) -> Result<(), CoreError> {
    if tokio::fs::try_exists(to)
        .await
        .map_err(|e| CoreError::from_source_io(e, to))?
    {
        return Err(CoreError::AlreadyExists {
            path: to.to_path_buf(),
        });
    }
    tokio::fs::rename(from, to)
        .await
        .map_err(|e| CoreError::from_source_io(e, from))
}

/// Remove a file or a whole directory.
async fn remove_path(path: &Path) -> Result<(), CoreError> {
    let metadata = tokio::fs::symlink_metadata(path)
        .await
        .map_err(|e| CoreError::from_source_io(e, path))?;
    let result = if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };
    result.map_err(|e| CoreError::from_source_io(e, path))
}

/// New names of a rom and its members once `fs_name` becomes `new_fs_name`.
///
/// Members inside the rom directory move with it. A single-file rom's own
/// file is renamed; other file names are kept as they are on disk.
fn rename_plan(rom: &Rom, new_fs_name: &str) -> RomRename {
    let old_root = rom.full_path();
    let new_root = Rom {
        fs_name: new_fs_name.to_string(),
        files: Vec::new(),
        ..rom.clone()
    }
    .full_path();

    RomRename {
        fs_name: new_fs_name.to_string(),
        fs_name_no_tags: naming::name_without_tags(new_fs_name),
        fs_name_no_ext: naming::name_without_extension(new_fs_name).to_string(),
        files: rom
            .files
            .iter()
            .map(|file| renamed_member(file, rom, &old_root, &new_root, new_fs_name))
            .collect(),
    }
}

fn renamed_member(
    file: &RomFile,
    rom: &Rom,
    old_root: &str,
    new_root: &str,
    new_fs_name: &str,
) -> RomFileRename {
    let dir = file.file_path.trim_end_matches('/');
    let file_path = if dir == old_root {
        new_root.to_string()
    } else if let Some(rest) = dir.strip_prefix(old_root).and_then(|r| r.strip_prefix('/')) {
        format!("{new_root}/{rest}")
    } else {
        file.file_path.clone()
    };

    let file_name = if file.file_name == rom.fs_name {
        new_fs_name.to_string()
    } else {
        file.file_name.clone()
    };

    RomFileRename {
        id: file.id,
        file_name,
        file_path,
    }
}
