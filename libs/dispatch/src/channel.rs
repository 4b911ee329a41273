use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use rand::Rng;
use serde::{de::DeserializeOwned, Serialize};
use switchboard_core::headers::keys;
use switchboard_core::{ArgScheme, Direction};
use tracing::{debug, warn};

use crate::codec_registry::CodecRegistry;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::handler::RequestHandler;
use crate::message::{RawRequest, RawResponse, Request, Response};
use crate::peer::{Peer, PeerScorer};
use crate::registry::ConnectionRegistry;
use crate::response::ResponseFuture;

/// Per-channel knobs fixed at creation
#[derive(Clone)]
pub(crate) struct ChannelOptions {
    pub init_timeout: Duration,
    pub preferred_direction: Direction,
    pub scorer: Arc<dyn PeerScorer>,
    pub codecs: CodecRegistry,
}

/// Client façade for one remote service
///
/// Picks a peer, waits for its connection to be identified and hands the
/// call to that connection's response router.
///
/// The peer list is meant to be configured once, before traffic starts.
pub struct ServiceChannel {
    service: String,
    caller: String,
    registry: Arc<ConnectionRegistry>,
    init_timeout: Duration,
    preferred_direction: Direction,
    handlers: RwLock<HashMap<String, Arc<dyn RequestHandler>>>,
    peers: RwLock<Vec<Arc<Peer>>>,
    codecs: CodecRegistry,
    scorer: Arc<dyn PeerScorer>,
}

impl ServiceChannel {
    pub(crate) fn new(
        service: impl Into<String>,
        caller: impl Into<String>,
        registry: Arc<ConnectionRegistry>,
        options: ChannelOptions,
    ) -> Arc<Self> {
        Arc::new(Self {
            service: service.into(),
            caller: caller.into(),
            registry,
            init_timeout: options.init_timeout,
            preferred_direction: options.preferred_direction,
            handlers: RwLock::new(HashMap::new()),
            peers: RwLock::new(Vec::new()),
            codecs: options.codecs,
            scorer: options.scorer,
        })
    }

    pub fn service_name(&self) -> &str {
        &self.service
    }

    /// Name sent in the `cn` header
    pub fn caller_name(&self) -> &str {
        &self.caller
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn preferred_direction(&self) -> Direction {
        self.preferred_direction
    }

    pub fn init_timeout(&self) -> Duration {
        self.init_timeout
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    /// Register the handler for `endpoint`, replacing any previous one
    pub fn register(&self, endpoint: impl Into<String>, handler: impl RequestHandler + 'static) -> &Self {
        self.handlers
            .write()
            .insert(endpoint.into(), Arc::new(handler));
        self
    }

    pub fn request_handler(&self, endpoint: &str) -> Option<Arc<dyn RequestHandler>> {
        self.handlers.read().get(endpoint).cloned()
    }

    /// Add peers serving this service
    pub fn set_peers(self: &Arc<Self>, addresses: impl IntoIterator<Item = SocketAddr>) -> &Arc<Self> {
        let mut peers = self.peers.write();
        for address in addresses {
            peers.push(Arc::new(Peer::new(
                address,
                Arc::downgrade(self),
                self.scorer.clone(),
            )));
        }
        debug!(service = %self.service, count = peers.len(), "peers configured");
        drop(peers);
        self
    }

    pub fn peers(&self) -> Vec<Arc<Peer>> {
        self.peers.read().clone()
    }

    /// Pick the healthiest peer, starting the scan at a random position
    ///
    /// None only when no peers are configured.
    pub fn choose_peer(&self) -> Option<Arc<Peer>> {
        let peers = self.peers.read();
        if peers.is_empty() {
            return None;
        }
        let start = rand::rng().random_range(0..peers.len());
        scan_peers(&peers, start)
    }

    /// Connection to a selected peer, reusing its cached one when healthy
    pub fn connect(&self) -> Result<Arc<Connection>> {
        let peer = self.choose_peer().ok_or(Error::NoPeerAvailable)?;
        match peer.preferred_connection() {
            Some(connection) => Ok(connection),
            None => peer.connect(),
        }
    }

    /// Dispatch an encoded request
    ///
    /// With a `target` the registry connection for that exact address is used
    /// and peer selection is skipped. Fails synchronously only when there is
    /// nowhere to send; every later failure resolves the returned handle.
    pub async fn send_request(
        &self,
        mut request: RawRequest,
        target: Option<SocketAddr>,
    ) -> Result<ResponseFuture<RawResponse>> {
        let has_peers = !self.peers.read().is_empty();
        let connection = match target {
            Some(addr) => self.registry.find_or_new(addr),
            None if !has_peers => return Err(Error::NoPeerAvailable),
            None => self.connect()?,
        };

        if !connection.wait_for_identified(self.init_timeout).await {
            drop(request);
            connection.clean();
            let error = match connection.last_error() {
                Some(cause) => Error::Network(cause),
                None => Error::ConnectionTimeout(self.init_timeout),
            };
            warn!(
                service = %self.service,
                remote = %connection.remote(),
                %error,
                "connection not identified"
            );
            return Ok(ResponseFuture::failed(error));
        }

        request.default_transport_header(keys::ARG_SCHEME, ArgScheme::Raw.as_str());
        Ok(connection.router().expect(request))
    }

    /// Send a structured-schema (bincode) request to a selected peer
    pub async fn send_thrift<T, U>(&self, request: Request<T>) -> Result<ResponseFuture<Response<U>>>
    where
        T: Serialize + Send,
        U: DeserializeOwned + Send + 'static,
    {
        self.send_encoded(request, ArgScheme::Thrift, None).await
    }

    pub async fn send_thrift_to<T, U>(
        &self,
        request: Request<T>,
        target: SocketAddr,
    ) -> Result<ResponseFuture<Response<U>>>
    where
        T: Serialize + Send,
        U: DeserializeOwned + Send + 'static,
    {
        self.send_encoded(request, ArgScheme::Thrift, Some(target))
            .await
    }

    /// Send a JSON request to a selected peer
    pub async fn send_json<T, U>(&self, request: Request<T>) -> Result<ResponseFuture<Response<U>>>
    where
        T: Serialize + Send,
        U: DeserializeOwned + Send + 'static,
    {
        self.send_encoded(request, ArgScheme::Json, None).await
    }

    pub async fn send_json_to<T, U>(
        &self,
        request: Request<T>,
        target: SocketAddr,
    ) -> Result<ResponseFuture<Response<U>>>
    where
        T: Serialize + Send,
        U: DeserializeOwned + Send + 'static,
    {
        self.send_encoded(request, ArgScheme::Json, Some(target))
            .await
    }

    /// Send raw bytes to a selected peer
    pub async fn send_raw(&self, request: RawRequest) -> Result<ResponseFuture<RawResponse>> {
        self.send_raw_inner(request, None).await
    }

    pub async fn send_raw_to(
        &self,
        request: RawRequest,
        target: SocketAddr,
    ) -> Result<ResponseFuture<RawResponse>> {
        self.send_raw_inner(request, Some(target)).await
    }

    async fn send_raw_inner(
        &self,
        mut request: RawRequest,
        target: Option<SocketAddr>,
    ) -> Result<ResponseFuture<RawResponse>> {
        request.set_transport_header(keys::CALLER_NAME, self.caller.as_str());
        self.send_request(request, target).await
    }

    async fn send_encoded<T, U>(
        &self,
        request: Request<T>,
        scheme: ArgScheme,
        target: Option<SocketAddr>,
    ) -> Result<ResponseFuture<Response<U>>>
    where
        T: Serialize + Send,
        U: DeserializeOwned + Send + 'static,
    {
        let codec = self.codecs.resolve(scheme)?;
        let mut request = request.encode_with(&codec, scheme)?;
        request.set_transport_header(keys::CALLER_NAME, self.caller.as_str());

        let pending = self.send_request(request, target).await?;
        Ok(pending.map(move |response| response.decode_with(&codec)))
    }
}

/// Circular scan over `peers` beginning after index `start`
///
/// Each visited peer re-scores itself; a fast-path signal returns that peer
/// immediately, otherwise the strictly highest score wins, ties going to the
/// earliest visited.
fn scan_peers(peers: &[Arc<Peer>], start: usize) -> Option<Arc<Peer>> {
    let len = peers.len();
    let mut best: Option<&Arc<Peer>> = None;

    for step in 1..=len {
        let peer = &peers[(start + step) % len];
        if peer.update_score() {
            return Some(peer.clone());
        }
        if best.map_or(true, |best| peer.score() > best.score()) {
            best = Some(peer);
        }
    }

    best.cloned()
}

impl std::fmt::Debug for ServiceChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceChannel")
            .field("service", &self.service)
            .field("caller", &self.caller)
            .field("peers", &self.peers.read().len())
            .finish()
    }
}
