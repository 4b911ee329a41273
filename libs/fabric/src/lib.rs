//! Switchboard Fabric - transport, framing and codec layer
//!
//! Provides transport abstractions (TCP, in-memory duplex), the protocol
//! frames exchanged on a connection, and payload codecs (bincode and JSON).
//!
//! # Example
//!
//! ```no_run
//! use switchboard_fabric::{Channel, codec::BincodeCodec, frame::{Frame, InitParams}};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let addr = "127.0.0.1:8080".parse()?;
//! let mut channel = Channel::tcp(addr, BincodeCodec).await?;
//! channel
//!     .send(&Frame::InitRequest(InitParams {
//!         version: switchboard_core::PROTOCOL_VERSION,
//!         host_port: "0.0.0.0:0".to_string(),
//!         process_name: "example".to_string(),
//!     }))
//!     .await?;
//! let reply: Frame = channel.receive().await?;
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod codec;
pub mod error;
pub mod frame;
pub mod transport;

// Re-exports for convenience
pub use channel::{Channel, ChannelReceiver, ChannelSender};
pub use error::{Error, Result};
pub use frame::Frame;
