//! Error handling for the `stencil` CLI.
//!
//! Wraps [`stencil_util::TemplateError`] (the library's own error type)
//! alongside the IO/serialization failures the CLI layer introduces on top
//! of it: reading template/data files, parsing config, and writing output.

use thiserror::Error;

/// The CLI-level error type. Library failures pass through via `#[from]`;
/// everything else is a thin, message-carrying variant in the same shape
/// as the teacher's CLI error enum.
#[derive(Error, Debug)]
pub enum CliError {
    /// A lex/parse/compile/render failure from the `stencil` library.
    #[error(transparent)]
    Template(#[from] stencil_util::TemplateError),

    /// Error when a required configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Error when file operations fail.
    #[error("file operation failed: {0}")]
    FileOperation(String),

    /// Error when IO operations fail.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error when JSON parsing of a `--data` file fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error when the data file's top-level JSON value isn't an object.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Result type alias used throughout the CLI binary.
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = CliError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "configuration error: missing field");
    }

    #[test]
    fn template_error_passes_through_display() {
        let err: CliError = stencil_util::TemplateError::internal("boom").into();
        assert_eq!(err.to_string(), "internal error: boom");
    }

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let cli_err: CliError = io_err.into();
        assert!(matches!(cli_err, CliError::Io(_)));
    }

    #[test]
    fn json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let cli_err: CliError = json_err.into();
        assert!(matches!(cli_err, CliError::Json(_)));
    }
}
