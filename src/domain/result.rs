//! Result type alias for pipeline operations

use super::errors::MeridianError;

/// Crate-wide result alias
///
/// All fallible pipeline operations return this type so errors compose with
/// the `?` operator without exposing third-party error types.
pub type Result<T> = std::result::Result<T, MeridianError>;
