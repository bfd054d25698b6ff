use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid token key: {0}")]
    InvalidKey(String),

    // Startup errors
    #[error("Template store error: {0}")]
    TemplateStore(String),

    // Replay state persistence
    #[error("Replay state error: {0}")]
    ReplayState(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
