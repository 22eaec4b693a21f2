use crate::error::Error;

/// Result type alias used throughout vexc.
pub type Result<T> = std::result::Result<T, Error>;
