use std::sync::Arc;
use std::time::Duration;

use switchboard_core::{ArgScheme, ErrorType};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Fabric(#[from] switchboard_fabric::Error),

    #[error(transparent)]
    Protocol(#[from] switchboard_core::Error),

    #[error("No peer available")]
    NoPeerAvailable,

    #[error("Connection not identified within {0:?}")]
    ConnectionTimeout(Duration),

    #[error("Network error: {0}")]
    Network(#[source] Arc<Error>),

    #[error("Request {id} timed out after {timeout:?}")]
    RequestTimeout { id: u32, timeout: Duration },

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Remote error ({kind}): {message}")]
    Remote { kind: ErrorType, message: String },

    #[error("Unsupported arg scheme: {0}")]
    UnsupportedScheme(ArgScheme),

    #[error("Service channel dropped")]
    ChannelClosed,
}

impl Error {
    /// The transport error behind a `Network` failure
    pub fn network_cause(&self) -> Option<&Error> {
        match self {
            Error::Network(cause) => Some(cause),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
