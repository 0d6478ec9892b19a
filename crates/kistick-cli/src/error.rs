use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
///
/// Per-ticker collection failures never reach this type; they are logged
/// and counted inside the round. Only errors that abort a command land
/// here.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] kistick_core::ConfigError),

    #[error(transparent)]
    Collect(#[from] kistick_core::CollectError),

    #[error(transparent)]
    Store(#[from] kistick_warehouse::StoreError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Collect(_) => 3,
            Self::Store(_) => 4,
            Self::Serialization(_) => 5,
        }
    }
}
