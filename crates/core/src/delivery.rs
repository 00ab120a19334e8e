//! Content delivery: decides how a rom (or a subset of its files) reaches
//! the client.
//!
//! | members | [`DeliveryMode::Local`] | [`DeliveryMode::Proxied`] |
//! |---|---|---|
//! | one | stream the file | `X-Accel-Redirect` to the proxy |
//! | several | ZIP assembled in memory | `mod_zip` manifest |
//!
//! Multi-file deliveries get an M3U playlist unless one of the delivered
//! members already is a playlist. Members are always ordered by file name.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;

use crate::archive;
use crate::catalog::{Rom, RomCatalog, RomFile};
use crate::entries::{self, SourceFile, SyntheticEntry};
use crate::error::CoreError;
use crate::layout::LibraryLayout;
use crate::manifest::{self, ManifestLine};
use crate::naming;
use crate::types::DbId;

/// Proxy location serving single library files.
pub const LIBRARY_LOCATION_PREFIX: &str = "/library";

/// Proxy location `mod_zip` fetches archive members from.
pub const LIBRARY_ZIP_LOCATION_PREFIX: &str = "/library-zip";

const ARCHIVE_EXTENSION: &str = ".zip";

/// Who moves the bytes: this process or the reverse proxy in front of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Stream files and assemble archives in-process.
    Local,
    /// Delegate transfers to the proxy through response headers.
    #[default]
    Proxied,
}

impl FromStr for DeliveryMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "proxied" | "proxy" => Ok(Self::Proxied),
            other => Err(CoreError::Validation(format!(
                "Unknown delivery mode '{other}', expected 'local' or 'proxied'"
            ))),
        }
    }
}

/// Per-request options of a rom download.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliveryRequest {
    /// Restrict the download to these files of the rom.
    pub file_ids: Option<Vec<DbId>>,
    /// Group multi-file members under `.<fs_name>/`.
    #[serde(default)]
    pub hidden_folder: bool,
    /// Base name of the archive; defaults to the rom's `fs_name`.
    pub archive_name: Option<String>,
}

/// Parse a comma-separated id list such as `1,2,3`. Blank items are skipped.
pub fn parse_file_ids(raw: &str) -> Result<Vec<DbId>, CoreError> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<DbId>()
                .map_err(|_| CoreError::Validation(format!("Invalid file id '{item}'")))
        })
        .collect()
}

/// What a download resolves to.
#[derive(Debug)]
pub enum Delivery {
    /// Stream `path` from this process.
    LocalFile {
        path: PathBuf,
        size: u64,
        filename: String,
    },
    /// Let the proxy serve `location` (already percent-encoded).
    Redirect { location: String, filename: String },
    /// A complete ZIP held in memory.
    Archive { bytes: Vec<u8>, filename: String },
    /// A `mod_zip` manifest for the proxy to stream.
    Manifest {
        lines: Vec<ManifestLine>,
        filename: String,
    },
}

/// Header-only view of a [`Delivery`], computed without reading contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryHead {
    LocalFile { size: u64, filename: String },
    Redirect { location: String, filename: String },
    Archive { filename: String },
    Manifest { filename: String },
}

/// Members selected for one request, sorted and resolved.
#[derive(Debug)]
struct Selection {
    files: Vec<SourceFile>,
    synthetic: Vec<SyntheticEntry>,
    archive_filename: String,
}

/// Routes download requests to the right delivery strategy.
pub struct DeliveryService {
    catalog: Arc<dyn RomCatalog>,
    layout: LibraryLayout,
    mode: DeliveryMode,
}

impl DeliveryService {
    pub fn new(catalog: Arc<dyn RomCatalog>, layout: LibraryLayout, mode: DeliveryMode) -> Self {
        Self {
            catalog,
            layout,
            mode,
        }
    }

    /// Resolve the download of rom `rom_id`.
    pub async fn deliver(
        &self,
        rom_id: DbId,
        request: &DeliveryRequest,
    ) -> Result<Delivery, CoreError> {
        let selection = self.select(rom_id, request).await?;

        if let [file] = selection.files.as_slice() {
            return self.deliver_single(file).await;
        }

        tracing::debug!(
            rom_id,
            members = selection.files.len(),
            synthetic = selection.synthetic.len(),
            mode = ?self.mode,
            "Delivering multi-file rom",
        );

        match self.mode {
            DeliveryMode::Local => {
                let Selection {
                    files,
                    synthetic,
                    archive_filename,
                } = selection;
                let modified = chrono::Local::now().naive_local();
                let bytes = tokio::task::spawn_blocking(move || {
                    archive::assemble(&files, &synthetic, modified)
                })
                .await
                .map_err(|e| CoreError::Internal(format!("Archive task failed: {e}")))??;

                Ok(Delivery::Archive {
                    bytes,
                    filename: archive_filename,
                })
            }
            DeliveryMode::Proxied => {
                let lines = manifest::encode(
                    &selection.files,
                    &selection.synthetic,
                    LIBRARY_ZIP_LOCATION_PREFIX,
                )
                .await?;
                Ok(Delivery::Manifest {
                    lines,
                    filename: selection.archive_filename,
                })
            }
        }
    }

    /// Resolve the same plan as [`deliver`](Self::deliver) without reading
    /// file contents or building archives.
    pub async fn describe(
        &self,
        rom_id: DbId,
        request: &DeliveryRequest,
    ) -> Result<DeliveryHead, CoreError> {
        let selection = self.select(rom_id, request).await?;

        if let [file] = selection.files.as_slice() {
            return Ok(match self.deliver_single(file).await? {
                Delivery::LocalFile { size, filename, .. } => {
                    DeliveryHead::LocalFile { size, filename }
                }
                Delivery::Redirect { location, filename } => {
                    DeliveryHead::Redirect { location, filename }
                }
                Delivery::Archive { filename, .. } => DeliveryHead::Archive { filename },
                Delivery::Manifest { filename, .. } => DeliveryHead::Manifest { filename },
            });
        }

        Ok(match self.mode {
            DeliveryMode::Local => DeliveryHead::Archive {
                filename: selection.archive_filename,
            },
            DeliveryMode::Proxied => DeliveryHead::Manifest {
                filename: selection.archive_filename,
            },
        })
    }

    /// Serve one catalog file by id, regardless of how many files its rom has.
    ///
    /// `download_name` is offered to the client instead of the stored file
    /// name when it is not blank.
    pub async fn deliver_file(
        &self,
        file_id: DbId,
        download_name: Option<&str>,
    ) -> Result<Delivery, CoreError> {
        let file = self
            .catalog
            .find_rom_file(file_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "RomFile",
                id: file_id,
            })?;

        let name = download_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(&file.file_name)
            .to_string();
        let source = self.source_file(&file, name).await?;
        self.deliver_single(&source).await
    }

    async fn deliver_single(&self, file: &SourceFile) -> Result<Delivery, CoreError> {
        // The catalog size may be stale.
        let metadata = tokio::fs::metadata(&file.absolute_path)
            .await
            .map_err(|e| CoreError::from_source_io(e, &file.absolute_path))?;

        let filename = file_name_of(&file.archive_name).to_string();
        Ok(match self.mode {
            DeliveryMode::Local => Delivery::LocalFile {
                path: file.absolute_path.clone(),
                size: metadata.len(),
                filename,
            },
            DeliveryMode::Proxied => Delivery::Redirect {
                location: manifest::quote(&format!(
                    "{LIBRARY_LOCATION_PREFIX}/{}",
                    file.relative_path
                )),
                filename,
            },
        })
    }

    async fn select(&self, rom_id: DbId, request: &DeliveryRequest) -> Result<Selection, CoreError> {
        let rom = self
            .catalog
            .find_rom(rom_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Rom",
                id: rom_id,
            })?;

        let mut files: Vec<RomFile> = match &request.file_ids {
            Some(ids) => rom
                .files
                .iter()
                .filter(|file| ids.contains(&file.id))
                .cloned()
                .collect(),
            None => rom.files.clone(),
        };
        if files.is_empty() {
            return Err(CoreError::NotFound {
                entity: "RomFile",
                id: rom_id,
            });
        }
        files.sort_by(|a, b| a.file_name.cmp(&b.file_name).then(a.id.cmp(&b.id)));

        let names: Vec<String> = files
            .iter()
            .map(|file| naming::name_for_download(&rom, file, request.hidden_folder))
            .collect();

        let synthetic = if files.len() > 1 {
            entries::synthetic_entries(&rom, &files, &names)
        } else {
            Vec::new()
        };

        let mut sources = Vec::with_capacity(files.len());
        for (file, name) in files.iter().zip(names) {
            sources.push(self.source_file(file, name).await?);
        }

        Ok(Selection {
            files: sources,
            synthetic,
            archive_filename: archive_filename(&rom, request.archive_name.as_deref()),
        })
    }

    /// Resolve a catalog file on disk. Symlinks leading outside the library
    /// root are refused.
    async fn source_file(
        &self,
        file: &RomFile,
        archive_name: String,
    ) -> Result<SourceFile, CoreError> {
        let absolute_path = self
            .layout
            .library()
            .resolve_existing([file.file_path.as_str(), file.file_name.as_str()])
            .await
            .inspect_err(|err| match err {
                CoreError::SourceMissing { path } => tracing::error!(
                    path = %path.display(),
                    file_id = file.id,
                    "Requested file not found on disk",
                ),
                CoreError::PathTraversal(reason) => tracing::warn!(
                    file_id = file.id,
                    %reason,
                    "Refusing to serve file outside the library",
                ),
                _ => {}
            })?;

        Ok(SourceFile {
            file_id: file.id,
            archive_name,
            relative_path: file.full_path(),
            absolute_path,
            crc_hash: file.crc_hash.clone(),
        })
    }
}

/// `<base>.zip`, with `base` taken from the request or the rom.
fn archive_filename(rom: &Rom, requested: Option<&str>) -> String {
    let base = requested
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(&rom.fs_name);
    let base = base.strip_suffix(ARCHIVE_EXTENSION).unwrap_or(base);
    format!("{base}{ARCHIVE_EXTENSION}")
}

/// Last component of an archive entry name.
fn file_name_of(archive_name: &str) -> &str {
    archive_name.rsplit('/').next().unwrap_or(archive_name)
}
