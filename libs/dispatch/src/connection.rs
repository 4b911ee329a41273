use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use switchboard_core::{Direction, ErrorType, PROTOCOL_VERSION};
use switchboard_fabric::codec::BincodeCodec;
use switchboard_fabric::frame::{Frame, InitParams};
use switchboard_fabric::transport::Connector;
use switchboard_fabric::Channel;
use tokio::sync::{mpsc, watch, Notify};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::router::ResponseRouter;

/// Progress of a connection's init handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Pending,
    Identified,
    Failed,
}

/// What every new connection announces and applies
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub host_port: String,
    pub process_name: String,
    /// Deadline for calls that carry no timeout
    pub request_timeout: Duration,
}

impl ConnectionSettings {
    fn init_params(&self) -> InitParams {
        InitParams {
            version: PROTOCOL_VERSION,
            host_port: self.host_port.clone(),
            process_name: self.process_name.clone(),
        }
    }
}

/// One logical link to a remote peer
///
/// A background driver task dials the transport, performs the init
/// handshake, then pumps frames: outbound calls queued by the router are
/// written, inbound responses are routed back to it. Connections are shared
/// by every peer and channel that targets the same address.
pub struct Connection {
    remote: SocketAddr,
    direction: Direction,
    state: watch::Sender<HandshakeState>,
    last_error: Mutex<Option<Arc<Error>>>,
    remote_identity: Mutex<Option<InitParams>>,
    router: Arc<ResponseRouter>,
    shutdown: Notify,
    cleaned: AtomicBool,
}

impl Connection {
    /// Start an outbound connection to `remote`
    ///
    /// Returns at once with the handshake pending. Must be called from within a
    /// tokio runtime.
    pub fn open(
        remote: SocketAddr,
        connector: Arc<dyn Connector>,
        settings: &ConnectionSettings,
    ) -> Arc<Self> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(HandshakeState::Pending);

        let connection = Arc::new(Self {
            remote,
            direction: Direction::Outbound,
            state,
            last_error: Mutex::new(None),
            remote_identity: Mutex::new(None),
            router: ResponseRouter::new(remote, outbound_tx, settings.request_timeout),
            shutdown: Notify::new(),
            cleaned: AtomicBool::new(false),
        });

        debug!(remote = %remote, "opening connection");
        tokio::spawn(
            connection
                .clone()
                .run(connector, settings.init_params(), outbound_rx),
        );
        connection
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn state(&self) -> HandshakeState {
        *self.state.borrow()
    }

    pub fn is_identified(&self) -> bool {
        self.state() == HandshakeState::Identified
    }

    /// False once the connection failed or was cleaned; it must not be reused
    pub fn is_usable(&self) -> bool {
        !self.cleaned.load(Ordering::Acquire) && self.state() != HandshakeState::Failed
    }

    /// Most recent transport error, if the connection broke
    pub fn last_error(&self) -> Option<Arc<Error>> {
        self.last_error.lock().clone()
    }

    /// Identity the remote announced during the handshake
    pub fn remote_identity(&self) -> Option<InitParams> {
        self.remote_identity.lock().clone()
    }

    pub fn router(&self) -> &Arc<ResponseRouter> {
        &self.router
    }

    /// Suspend until the handshake settles or `timeout` elapses
    ///
    /// True only if the connection is identified.
    pub async fn wait_for_identified(&self, timeout: Duration) -> bool {
        let mut state = self.state.subscribe();
        let settled = state.wait_for(|state| *state != HandshakeState::Pending);
        let identified = match tokio::time::timeout(timeout, settled).await {
            Ok(Ok(state)) => *state == HandshakeState::Identified,
            _ => false,
        };
        identified
    }

    /// Invalidate the connection
    ///
    /// Stops the driver and fails every pending call. Idempotent.
    pub fn clean(&self) {
        if self.cleaned.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(remote = %self.remote, state = ?self.state(), "cleaning connection");

        self.state.send_replace(HandshakeState::Failed);
        self.shutdown.notify_one();

        let cause = self
            .last_error()
            .unwrap_or_else(|| Arc::new(switchboard_fabric::Error::ConnectionClosed.into()));
        self.router.fail_all(cause);
    }

    async fn run(
        self: Arc<Self>,
        connector: Arc<dyn Connector>,
        local: InitParams,
        outbound: mpsc::UnboundedReceiver<Frame>,
    ) {
        let outcome = tokio::select! {
            outcome = self.drive(connector, local, outbound) => outcome,
            _ = self.shutdown.notified() => Ok(()),
        };

        match outcome {
            Ok(()) => {
                debug!(remote = %self.remote, "connection closed");
                self.state.send_replace(HandshakeState::Failed);
                self.router
                    .fail_all(Arc::new(switchboard_fabric::Error::ConnectionClosed.into()));
            }
            Err(error) => self.fail(error),
        }
    }

    fn fail(&self, error: Error) {
        warn!(remote = %self.remote, %error, "connection failed");
        let cause = Arc::new(error);
        {
            let mut last_error = self.last_error.lock();
            if last_error.is_none() {
                *last_error = Some(cause.clone());
            }
        }
        self.state.send_replace(HandshakeState::Failed);
        self.router.fail_all(cause);
    }

    async fn drive(
        &self,
        connector: Arc<dyn Connector>,
        local: InitParams,
        mut outbound: mpsc::UnboundedReceiver<Frame>,
    ) -> Result<()> {
        let transport = connector.connect(self.remote).await?;
        let (mut sender, mut receiver) = Channel::from_boxed(transport, BincodeCodec).into_split();

        sender.send(&Frame::InitRequest(local)).await?;
        let identity = match receiver.receive::<Frame>().await? {
            Frame::InitResponse(identity) => identity,
            Frame::Error(error) => return Err(Error::Handshake(error.message)),
            other => {
                return Err(Error::Handshake(format!(
                    "expected init response, got {:?}",
                    other
                )))
            }
        };
        if identity.version != PROTOCOL_VERSION {
            return Err(Error::Handshake(format!(
                "unsupported protocol version {}",
                identity.version
            )));
        }

        debug!(
            remote = %self.remote,
            host_port = %identity.host_port,
            process = %identity.process_name,
            "connection identified"
        );
        *self.remote_identity.lock() = Some(identity);
        self.state.send_if_modified(|state| {
            if *state == HandshakeState::Pending {
                *state = HandshakeState::Identified;
                true
            } else {
                false
            }
        });

        let reading = async {
            loop {
                let frame = match receiver.receive::<Frame>().await {
                    Ok(frame) => frame,
                    Err(error) => break Err::<(), Error>(error.into()),
                };
                if let Err(error) = self.route(frame) {
                    break Err(error);
                }
            }
        };
        let writing = async {
            while let Some(frame) = outbound.recv().await {
                sender.send(&frame).await?;
            }
            Ok::<(), Error>(())
        };

        tokio::select! {
            outcome = reading => outcome,
            outcome = writing => outcome,
        }
    }

    fn route(&self, frame: Frame) -> Result<()> {
        match frame {
            Frame::CallResponse(response) => {
                self.router.handle_response(response);
            }
            Frame::Error(error) if error.kind == ErrorType::FatalProtocolError => {
                return Err(Error::Remote {
                    kind: error.kind,
                    message: error.message,
                });
            }
            Frame::Error(error) => {
                self.router.handle_error(error);
            }
            // Inbound calls are not served on client connections
            other => trace!(remote = %self.remote, id = ?other.id(), "ignoring frame"),
        }
        Ok(())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("remote", &self.remote)
            .field("direction", &self.direction)
            .field("state", &self.state())
            .field("pending", &self.router.pending_count())
            .finish()
    }
}
