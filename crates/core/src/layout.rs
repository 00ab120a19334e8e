//! Where things live on disk: platform folders inside the library and
//! per-rom resource folders (manuals) inside the resources root.

use std::path::PathBuf;
use std::str::FromStr;

use crate::catalog::{Platform, Rom};
use crate::error::CoreError;
use crate::paths::PathResolver;
use crate::types::DbId;

/// Name of the folder holding roms inside the library.
pub const ROMS_FOLDER: &str = "roms";

/// Folder below a rom's resource directory holding its manual.
pub const MANUAL_FOLDER: &str = "manual";

/// How platform folders are arranged inside the library root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LibraryStructure {
    /// `roms/<platform>/...`
    #[default]
    A,
    /// `<platform>/roms/...`
    B,
}

impl FromStr for LibraryStructure {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" => Ok(Self::A),
            "b" => Ok(Self::B),
            other => Err(CoreError::Validation(format!(
                "Unknown library structure '{other}', expected 'a' or 'b'"
            ))),
        }
    }
}

/// Library and resources roots plus the folder convention in use.
#[derive(Debug, Clone)]
pub struct LibraryLayout {
    library: PathResolver,
    resources: PathResolver,
    structure: LibraryStructure,
}

impl LibraryLayout {
    pub fn new(
        library_base: impl Into<PathBuf>,
        resources_base: impl Into<PathBuf>,
        structure: LibraryStructure,
    ) -> Self {
        Self {
            library: PathResolver::new(library_base),
            resources: PathResolver::new(resources_base),
            structure,
        }
    }

    pub fn library(&self) -> &PathResolver {
        &self.library
    }

    /// Folder holding a platform's roms, relative to the library root.
    pub fn platform_roms_dir(&self, platform: &Platform) -> String {
        match self.structure {
            LibraryStructure::A => format!("{ROMS_FOLDER}/{}", platform.fs_slug),
            LibraryStructure::B => format!("{}/{ROMS_FOLDER}", platform.fs_slug),
        }
    }

    /// Absolute target of a new upload named `file_name` for `platform`.
    pub fn upload_destination(
        &self,
        platform: &Platform,
        file_name: &str,
    ) -> Result<PathBuf, CoreError> {
        crate::paths::validate_filename(file_name)?;
        self.library
            .resolve([self.platform_roms_dir(platform).as_str(), file_name])
    }

    /// A rom's file or directory on disk.
    pub fn rom_path(&self, rom: &Rom) -> Result<PathBuf, CoreError> {
        self.library.resolve([rom.fs_path.as_str(), rom.fs_name.as_str()])
    }

    /// Resource folder of a rom, relative to the resources root.
    pub fn rom_resources_dir(platform_id: DbId, rom_id: DbId) -> String {
        format!("{ROMS_FOLDER}/{platform_id}/{rom_id}")
    }

    /// Manual location relative to the resources root.
    pub fn manual_relative_path(rom: &Rom) -> String {
        format!(
            "{}/{MANUAL_FOLDER}/{}.pdf",
            Self::rom_resources_dir(rom.platform_id, rom.id),
            rom.id
        )
    }

    pub fn rom_resources_path(&self, rom: &Rom) -> Result<PathBuf, CoreError> {
        self.resources
            .resolve([Self::rom_resources_dir(rom.platform_id, rom.id)])
    }

    pub fn manual_path(&self, rom: &Rom) -> Result<PathBuf, CoreError> {
        self.resources.resolve([Self::manual_relative_path(rom)])
    }
}
