use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatekeeperError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("could not determine client identity: {0}")]
    IdentityExtraction(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type GatekeeperResult<T> = Result<T, GatekeeperError>;
