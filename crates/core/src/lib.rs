//! Domain logic for rom storage and delivery.
//!
//! Nothing in this crate knows about HTTP or SQL. Storage is reached through
//! [`catalog::RomCatalog`]; the filesystem through [`layout::LibraryLayout`]
//! and [`paths::PathResolver`].

pub mod archive;
pub mod catalog;
pub mod delivery;
pub mod entries;
pub mod error;
pub mod layout;
pub mod library;
pub mod manifest;
pub mod naming;
pub mod paths;
pub mod retry;
pub mod scopes;
pub mod types;
pub mod upload;
