use crate::input::ValidationErrors;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum PharmGuardError {
    #[error("HTTP client initialization failed: {0}")]
    HttpClientInit(reqwest::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error from {api}: {message}")]
    Api { api: String, message: String },

    #[error("API JSON error from {api}: {source}")]
    ApiJson {
        api: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Analysis failed (HTTP {status}): {message}\n\nDetails: {details}")]
    Backend {
        status: u16,
        message: String,
        details: String,
    },

    #[error("Invalid input:\n{0}")]
    Validation(ValidationErrors),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Clipboard unavailable: {0}")]
    Clipboard(String),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ValidationErrors> for PharmGuardError {
    fn from(value: ValidationErrors) -> Self {
        Self::Validation(value)
    }
}
