//! Well-known authorization scope names carried in access tokens.

pub const SCOPE_ROMS_READ: &str = "roms.read";
pub const SCOPE_ROMS_WRITE: &str = "roms.write";
