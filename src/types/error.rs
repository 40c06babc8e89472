//! Error types for the wallet workers

/// Main error type for relay, creation and supervision operations
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Broker error: {0}")]
    Broker(String),

    #[error("Height lookup error: {0}")]
    Lookup(String),

    #[error("Invalid payload: {0}")]
    Payload(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        Self::Process(err.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Payload(format!("JSON error: {}", err))
    }
}

impl From<lapin::Error> for RelayError {
    fn from(err: lapin::Error) -> Self {
        Self::Broker(err.to_string())
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        Self::Lookup(err.to_string())
    }
}

/// Result type alias for wallet worker operations
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_error_maps_to_payload() {
        let err: RelayError = serde_json::from_str::<serde_json::Value>("{nope")
            .unwrap_err()
            .into();
        assert!(matches!(err, RelayError::Payload(_)));
    }
}
