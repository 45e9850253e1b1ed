//! Command implementations

pub mod api;
pub mod luau;
pub mod profile;
pub mod universe;
