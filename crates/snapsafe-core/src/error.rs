use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Setup error: {0}")]
    Setup(String),

    #[error("Resume ledger error: {0}")]
    Ledger(String),

    #[error("Accounting mismatch: {0}")]
    Accounting(String),

    #[error("Interrupted")]
    Interrupted,
}
