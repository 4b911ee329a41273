use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::channel::ServiceChannel;
use crate::connection::{Connection, HandshakeState};
use crate::error::{Error, Result};

/// Outcome of one health evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    pub value: i64,
    /// Pick this peer immediately, ending the selection scan
    pub fast_path: bool,
}

/// Health evaluation for a peer, given its cached connection
pub trait PeerScorer: Send + Sync {
    fn score(&self, address: SocketAddr, connection: Option<&Connection>) -> Score;
}

/// Scores peers by the state of their cached connection
///
/// Identified connections win outright and rank by how few calls they have
/// in flight; a pending handshake beats having no connection at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionStateScorer;

impl ConnectionStateScorer {
    const IDENTIFIED: i64 = 1 << 32;
}

impl PeerScorer for ConnectionStateScorer {
    fn score(&self, _address: SocketAddr, connection: Option<&Connection>) -> Score {
        match connection.map(Connection::state) {
            Some(HandshakeState::Identified) => {
                let pending = connection.map_or(0, |c| c.router().pending_count()) as i64;
                Score {
                    value: Self::IDENTIFIED - pending,
                    fast_path: true,
                }
            }
            Some(HandshakeState::Pending) => Score {
                value: 1,
                fast_path: false,
            },
            Some(HandshakeState::Failed) | None => Score {
                value: 0,
                fast_path: false,
            },
        }
    }
}

/// One remote address serving a channel's service
pub struct Peer {
    address: SocketAddr,
    score: AtomicI64,
    channel: Weak<ServiceChannel>,
    scorer: Arc<dyn PeerScorer>,
    preferred: Mutex<Option<Weak<Connection>>>,
}

impl Peer {
    pub(crate) fn new(
        address: SocketAddr,
        channel: Weak<ServiceChannel>,
        scorer: Arc<dyn PeerScorer>,
    ) -> Self {
        Self {
            address,
            score: AtomicI64::new(0),
            channel,
            scorer,
            preferred: Mutex::new(None),
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Score from the most recent `update_score`
    pub fn score(&self) -> i64 {
        self.score.load(Ordering::Acquire)
    }

    /// Re-evaluate health; true asks selection to stop at this peer
    pub fn update_score(&self) -> bool {
        let connection = self.preferred_connection();
        let score = self.scorer.score(self.address, connection.as_deref());
        self.score.store(score.value, Ordering::Release);
        score.fast_path
    }

    /// The cached connection, if it is still alive and usable
    ///
    /// Stale entries (dropped, failed, cleaned, or in a direction the channel
    /// does not accept) are evicted.
    pub fn preferred_connection(&self) -> Option<Arc<Connection>> {
        let mut preferred = self.preferred.lock();
        let connection = preferred.as_ref().and_then(Weak::upgrade);

        match connection {
            Some(connection) if connection.is_usable() && self.accepts(&connection) => {
                Some(connection)
            }
            _ => {
                *preferred = None;
                None
            }
        }
    }

    /// Acquire a connection through the channel's registry and cache it
    pub fn connect(&self) -> Result<Arc<Connection>> {
        let channel = self.channel.upgrade().ok_or(Error::ChannelClosed)?;
        let connection = channel.registry().find_or_new(self.address);
        *self.preferred.lock() = Some(Arc::downgrade(&connection));
        Ok(connection)
    }

    fn accepts(&self, connection: &Connection) -> bool {
        self.channel
            .upgrade()
            .map_or(true, |channel| {
                channel.preferred_direction().accepts(connection.direction())
            })
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("address", &self.address)
            .field("score", &self.score())
            .finish()
    }
}
