//! Switchboard Core - protocol vocabulary shared by every layer
//!
//! Transport header keys, argument schemes, connection directions and the
//! error/response codes carried in frames.

pub mod error;
pub mod headers;
pub mod protocol;

pub use error::{Error, Result};
pub use headers::{ArgScheme, TransportHeaders};
pub use protocol::{Direction, ErrorType, ResponseCode, PROTOCOL_VERSION};
