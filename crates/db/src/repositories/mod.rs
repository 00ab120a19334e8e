//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async queries that
//! accept `&PgPool` (or an open transaction) as the first argument.

pub mod platform_repo;
pub mod rom_file_repo;
pub mod rom_repo;

pub use platform_repo::PlatformRepo;
pub use rom_file_repo::RomFileRepo;
pub use rom_repo::RomRepo;
