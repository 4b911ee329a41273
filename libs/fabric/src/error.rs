use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// Transport and codec failures
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Connect to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: SocketAddr, timeout: Duration },

    #[error("{op} timeout exceeded after {timeout:?}")]
    Timeout { op: &'static str, timeout: Duration },

    #[error("Protocol error: {0}")]
    Protocol(#[from] switchboard_core::Error),

    #[error("{0}")]
    Custom(String),
}

pub type Result<T> = std::result::Result<T, Error>;
