use std::path::PathBuf;

use thiserror::Error;

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {message}", path.display())]
    Read { path: PathBuf, message: String },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidValue {
            key: "HANDSON_MAX_REQUESTS_PER_DAY".to_string(),
            value: "lots".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid value for HANDSON_MAX_REQUESTS_PER_DAY: 'lots'"
        );
    }
}
