use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use switchboard_core::Direction;
use switchboard_fabric::transport::{Connector, TcpConnector};
use tracing::debug;

use crate::channel::{ChannelOptions, ServiceChannel};
use crate::codec_registry::CodecRegistry;
use crate::config::MultiplexerConfig;
use crate::connection::ConnectionSettings;
use crate::peer::{ConnectionStateScorer, PeerScorer};
use crate::registry::ConnectionRegistry;

/// Announced by client-only processes that do not listen
const EPHEMERAL_HOST_PORT: &str = "0.0.0.0:0";

/// Top-level handle of one process on the RPC fabric
///
/// Owns the connection registry shared by all of its service channels, so
/// two channels targeting the same address share one connection.
pub struct Multiplexer {
    config: MultiplexerConfig,
    registry: Arc<ConnectionRegistry>,
    scorer: Arc<dyn PeerScorer>,
    codecs: CodecRegistry,
    channels: Mutex<HashMap<String, Arc<ServiceChannel>>>,
}

impl Multiplexer {
    pub fn builder(service_name: impl Into<String>) -> MultiplexerBuilder {
        MultiplexerBuilder::new(MultiplexerConfig::new(service_name))
    }

    /// Multiplexer dialing plain TCP with the given settings
    pub fn from_config(config: MultiplexerConfig) -> Self {
        MultiplexerBuilder::new(config).build()
    }

    pub fn service_name(&self) -> &str {
        &self.config.service_name
    }

    pub fn config(&self) -> &MultiplexerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Channel for `service`, created on first use
    pub fn channel(&self, service: &str) -> Arc<ServiceChannel> {
        self.channel_with_direction(service, Direction::None)
    }

    /// Channel for `service` preferring connections opened in `direction`
    ///
    /// The direction only applies when the channel is first created.
    pub fn channel_with_direction(&self, service: &str, direction: Direction) -> Arc<ServiceChannel> {
        let mut channels = self.channels.lock();
        if let Some(channel) = channels.get(service) {
            return channel.clone();
        }

        debug!(service, caller = %self.config.service_name, ?direction, "creating service channel");
        let channel = ServiceChannel::new(
            service,
            self.config.service_name.clone(),
            self.registry.clone(),
            ChannelOptions {
                init_timeout: self.config.init_timeout(),
                preferred_direction: direction,
                scorer: self.scorer.clone(),
                codecs: self.codecs.clone(),
            },
        );
        channels.insert(service.to_string(), channel.clone());
        channel
    }

    /// Clean every connection; pending calls fail with a network error
    pub fn shutdown(&self) {
        debug!(service = %self.config.service_name, connections = self.registry.len(), "shutting down");
        self.registry.close_all();
    }
}

/// Builder for `Multiplexer`
pub struct MultiplexerBuilder {
    config: MultiplexerConfig,
    connector: Option<Arc<dyn Connector>>,
    scorer: Option<Arc<dyn PeerScorer>>,
    codecs: CodecRegistry,
}

impl MultiplexerBuilder {
    pub fn new(config: MultiplexerConfig) -> Self {
        Self {
            config,
            connector: None,
            scorer: None,
            codecs: CodecRegistry::new(),
        }
    }

    pub fn process_name(mut self, name: impl Into<String>) -> Self {
        self.config.process_name = name.into();
        self
    }

    /// How long a dispatch waits for a connection handshake
    pub fn init_timeout(mut self, timeout: Duration) -> Self {
        self.config.init_timeout_ms = millis(timeout);
        self
    }

    /// Default deadline for requests without their own timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_ms = millis(timeout);
        self
    }

    /// Dial timeout used by the default TCP connector
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout_ms = millis(timeout);
        self
    }

    /// Replace the TCP connector, e.g. with an in-memory one
    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    pub fn scorer(mut self, scorer: impl PeerScorer + 'static) -> Self {
        self.scorer = Some(Arc::new(scorer));
        self
    }

    pub fn codecs(mut self, codecs: CodecRegistry) -> Self {
        self.codecs = codecs;
        self
    }

    pub fn build(self) -> Multiplexer {
        let connector = self.connector.unwrap_or_else(|| {
            Arc::new(TcpConnector::with_connect_timeout(
                self.config.connect_timeout(),
            ))
        });
        let settings = ConnectionSettings {
            host_port: EPHEMERAL_HOST_PORT.to_string(),
            process_name: self.config.process_name.clone(),
            request_timeout: self.config.request_timeout(),
        };

        Multiplexer {
            registry: Arc::new(ConnectionRegistry::new(connector, settings)),
            scorer: self
                .scorer
                .unwrap_or_else(|| Arc::new(ConnectionStateScorer)),
            codecs: self.codecs,
            channels: Mutex::new(HashMap::new()),
            config: self.config,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
