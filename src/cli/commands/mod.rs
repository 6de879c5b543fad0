//! Command implementations for the Meridian CLI

pub mod ingest;
pub mod init;
pub mod journey;
pub mod validate;
