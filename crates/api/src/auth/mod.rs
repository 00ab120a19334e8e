//! Authentication primitives.
//!
//! - [`jwt`] -- access-token generation and validation with scope claims.

pub mod jwt;
