use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] locus_core::ValidationError),

    #[error("configuration error: {0}")]
    Config(#[from] locus_core::CoreError),

    #[error("invalid provider spec '{spec}': {reason}")]
    ProviderSpec { spec: String, reason: String },

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) | Self::Config(_) | Self::ProviderSpec { .. } => 2,
            Self::Logging(_) | Self::Serialization(_) | Self::Io(_) => 10,
        }
    }
}
