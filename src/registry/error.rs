//! Registry error types
//!
//! Error types for registry operations.

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Registry already holds the configured maximum number of participants
    Full(usize),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::Full(limit) => {
                write!(f, "Registry full: {} participants registered", limit)
            }
        }
    }
}

impl std::error::Error for RegistryError {}
