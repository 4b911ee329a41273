//! Switchboard Dispatch - client-side dispatch core
//!
//! Turns "call endpoint X of service Y" into a correlated request on a
//! handshake-verified connection:
//!
//! - [`ServiceChannel`] picks a healthy [`Peer`] (randomized circular scan)
//!   or uses an explicit address
//! - [`ConnectionRegistry`] hands out one shared [`Connection`] per address
//! - each connection's [`ResponseRouter`] correlates responses and resolves
//!   the caller's [`ResponseFuture`] exactly once
//!
//! # Example
//!
//! ```no_run
//! use switchboard_dispatch::{Multiplexer, Request};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize)]
//! struct Lookup { account: u64 }
//!
//! #[derive(Deserialize)]
//! struct Balance { cents: i64 }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mux = Multiplexer::builder("billing").build();
//! let ledger = mux.channel("ledger");
//! ledger.set_peers(["10.0.0.1:4040".parse()?, "10.0.0.2:4040".parse()?]);
//!
//! let request = Request::builder("ledger", "balance").body(Lookup { account: 7 });
//! let response = ledger.send_json::<_, Balance>(request).await?.await?;
//! println!("{}", response.body().cents);
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod codec_registry;
pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod message;
pub mod multiplexer;
pub mod peer;
pub mod registry;
pub mod response;
pub mod router;

// Re-exports for convenience
pub use channel::ServiceChannel;
pub use codec_registry::CodecRegistry;
pub use config::MultiplexerConfig;
pub use connection::{Connection, ConnectionSettings, HandshakeState};
pub use error::{Error, Result};
pub use handler::RequestHandler;
pub use message::{RawRequest, RawResponse, Request, RequestBuilder, Response};
pub use multiplexer::{Multiplexer, MultiplexerBuilder};
pub use peer::{ConnectionStateScorer, Peer, PeerScorer, Score};
pub use registry::ConnectionRegistry;
pub use response::ResponseFuture;
pub use router::ResponseRouter;
