//! Command implementations for the spool CLI

pub mod check;
pub mod write;
