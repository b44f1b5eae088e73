use thiserror::Error;

/// Top-level error type for the VulWeb assistant.
///
/// Subsystem crates define their own error types and implement conversions
/// from `VulwebError` so that `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VulwebError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Platform query failed: {0}")]
    Platform(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for VulwebError {
    fn from(err: toml::de::Error) -> Self {
        VulwebError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for VulwebError {
    fn from(err: toml::ser::Error) -> Self {
        VulwebError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for VulwebError {
    fn from(err: serde_json::Error) -> Self {
        VulwebError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for VulWeb operations.
pub type Result<T> = std::result::Result<T, VulwebError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VulwebError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: VulwebError = io_err.into();
        assert!(matches!(err, VulwebError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(VulwebError, &str)> = vec![
            (
                VulwebError::Config("bad key".to_string()),
                "Configuration error: bad key",
            ),
            (
                VulwebError::Storage("disk full".to_string()),
                "Storage error: disk full",
            ),
            (
                VulwebError::Search("index corrupt".to_string()),
                "Search error: index corrupt",
            ),
            (
                VulwebError::DependencyUnavailable("no model".to_string()),
                "Dependency unavailable: no model",
            ),
            (
                VulwebError::Retrieval("timeout".to_string()),
                "Retrieval failed: timeout",
            ),
            (
                VulwebError::Platform("db offline".to_string()),
                "Platform query failed: db offline",
            ),
            (
                VulwebError::Serialization("invalid json".to_string()),
                "Serialization error: invalid json",
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.to_string(), expected);
        }
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: VulwebError = json_err.into();
        assert!(matches!(err, VulwebError::Serialization(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let err: VulwebError = toml_err.into();
        assert!(matches!(err, VulwebError::Config(_)));
    }
}
