use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Version announced in the init handshake
pub const PROTOCOL_VERSION: u16 = 2;

/// Which side opened a connection
///
/// Used as a preference on service channels, where `None` accepts either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    None,
    Inbound,
    Outbound,
}

impl Direction {
    /// Whether a connection opened in `actual` direction satisfies this preference
    pub fn accepts(&self, actual: Direction) -> bool {
        *self == Direction::None || *self == actual
    }
}

/// Error codes carried by error frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorType {
    Timeout,
    Cancelled,
    Busy,
    Declined,
    UnexpectedError,
    BadRequest,
    NetworkError,
    Unhealthy,
    FatalProtocolError,
}

impl ErrorType {
    pub fn code(&self) -> u8 {
        match self {
            ErrorType::Timeout => 0x01,
            ErrorType::Cancelled => 0x02,
            ErrorType::Busy => 0x03,
            ErrorType::Declined => 0x04,
            ErrorType::UnexpectedError => 0x05,
            ErrorType::BadRequest => 0x06,
            ErrorType::NetworkError => 0x07,
            ErrorType::Unhealthy => 0x08,
            ErrorType::FatalProtocolError => 0xff,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0x01 => Ok(ErrorType::Timeout),
            0x02 => Ok(ErrorType::Cancelled),
            0x03 => Ok(ErrorType::Busy),
            0x04 => Ok(ErrorType::Declined),
            0x05 => Ok(ErrorType::UnexpectedError),
            0x06 => Ok(ErrorType::BadRequest),
            0x07 => Ok(ErrorType::NetworkError),
            0x08 => Ok(ErrorType::Unhealthy),
            0xff => Ok(ErrorType::FatalProtocolError),
            other => Err(Error::UnknownErrorType(other)),
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Application-level outcome flag of a call response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResponseCode {
    #[default]
    Ok,
    Error,
}

impl ResponseCode {
    pub fn code(&self) -> u8 {
        match self {
            ResponseCode::Ok => 0x00,
            ResponseCode::Error => 0x01,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0x00 => Ok(ResponseCode::Ok),
            0x01 => Ok(ResponseCode::Error),
            other => Err(Error::UnknownResponseCode(other)),
        }
    }
}
