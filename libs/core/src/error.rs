use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Unknown arg scheme: {0}")]
    UnknownArgScheme(String),

    #[error("Unknown error type code: {0:#04x}")]
    UnknownErrorType(u8),

    #[error("Unknown response code: {0:#04x}")]
    UnknownResponseCode(u8),

    #[error("{0}")]
    Custom(String),
}

impl Error {
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
