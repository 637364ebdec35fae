use thiserror::Error;

/// Top-level error type for EcoBot.
///
/// Subsystem crates define their own error types and implement
/// `From<EcobotError>` so configuration and I/O failures flow through `?`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EcobotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for EcobotError {
    fn from(err: toml::de::Error) -> Self {
        EcobotError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for EcobotError {
    fn from(err: toml::ser::Error) -> Self {
        EcobotError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for EcobotError {
    fn from(err: serde_json::Error) -> Self {
        EcobotError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for EcoBot operations.
pub type Result<T> = std::result::Result<T, EcobotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EcobotError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");

        let err = EcobotError::Serialization("invalid json".to_string());
        assert_eq!(err.to_string(), "Serialization error: invalid json");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: EcobotError = io_err.into();
        assert!(matches!(err, EcobotError::Io(_)));
        assert!(err.to_string().starts_with("I/O error:"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let err: EcobotError = err.unwrap_err().into();
        assert!(matches!(err, EcobotError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let err: EcobotError = err.unwrap_err().into();
        assert!(matches!(err, EcobotError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let value = io_result?;
            Ok(value.to_string())
        }

        assert_eq!(inner().unwrap(), "42");
    }
}
