//! Errors reported when constructing a table.

/// A table could not be built from the requested configuration.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// The load factor was not strictly between 0 and 1.
    #[error("load factor must lie strictly between 0 and 1, got {0}")]
    InvalidLoadFactor(f64),
}
