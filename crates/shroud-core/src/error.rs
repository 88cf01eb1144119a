use thiserror::Error;

pub type ShroudResult<T> = Result<T, ShroudError>;

#[derive(Debug, Error)]
pub enum ShroudError {
    #[error("config error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
