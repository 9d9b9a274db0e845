//! Error types for Alfred Core

/// Result type alias for Alfred operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for Alfred
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid helper syntax: {message}")]
    InvalidHelperSyntax { message: String },

    #[error("helper kind '{kind}' is not handled by Alfred")]
    UnknownHelperKind { kind: String },

    #[error("bad date format: {message}")]
    BadDateFormat { message: String },

    #[error("the random method name '{name}' does not exist")]
    UnknownRandomMethod { name: String },

    #[error("bad add duration: {message}")]
    BadAddDuration { message: String },

    #[error("mock error: {message}")]
    Mock { message: String },

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("action error: {message}")]
    Action { message: String },

    #[error("{file}: {message}")]
    Script { file: String, message: String },

    #[error("function file {file} does not contain a {function} function")]
    ScriptMissing { file: String, function: String },

    #[error("key-value store error: {message}")]
    Kv { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl Error {
    /// Create an invalid-helper-syntax error
    pub fn invalid_helper_syntax<S: Into<String>>(message: S) -> Self {
        Self::InvalidHelperSyntax {
            message: message.into(),
        }
    }

    /// Create a bad-date-format error
    pub fn bad_date_format<S: Into<String>>(message: S) -> Self {
        Self::BadDateFormat {
            message: message.into(),
        }
    }

    /// Create a bad-add-duration error
    pub fn bad_add_duration<S: Into<String>>(message: S) -> Self {
        Self::BadAddDuration {
            message: message.into(),
        }
    }

    /// Create a mock error
    pub fn mock<S: Into<String>>(message: S) -> Self {
        Self::Mock {
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an action error
    pub fn action<S: Into<String>>(message: S) -> Self {
        Self::Action {
            message: message.into(),
        }
    }

    /// Create a script error carrying the offending file name
    pub fn script<S: Into<String>>(file: &str, message: S) -> Self {
        Self::Script {
            file: file.to_string(),
            message: message.into(),
        }
    }

    /// Create a kv error
    pub fn kv<S: Into<String>>(message: S) -> Self {
        Self::Kv {
            message: message.into(),
        }
    }
}
