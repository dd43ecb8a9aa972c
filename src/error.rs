use thiserror::Error;

pub type Result<T> = std::result::Result<T, GateError>;

#[derive(Error, Debug)]
pub enum GateError {
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("All scanners failed: {0}")]
    AllScannersFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl GateError {
    /// Process exit code for this error. The gate verdict owns 0 and 1;
    /// errors only ever map to 2 (caller gave us something unusable) or
    /// 3 (the run itself broke).
    pub fn exit_code(&self) -> i32 {
        if self.is_client_error() {
            2
        } else {
            3
        }
    }

    /// True when the caller supplied something unusable. An HTTP wrapper
    /// would map these to 4xx and everything else to 5xx.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            GateError::Input(_) | GateError::Config(_) | GateError::Toml(_)
        )
    }
}
