//! Row structs for the catalog tables.
//!
//! Each submodule holds a `FromRow` struct matching the table and the
//! conversion into the domain type from `romshelf_core::catalog`.

pub mod platform;
pub mod rom;
pub mod rom_file;
