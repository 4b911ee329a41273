use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use switchboard_fabric::transport::Connector;
use tracing::debug;

use crate::connection::{Connection, ConnectionSettings};

/// Address-keyed table of live connections, shared by every service channel
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<SocketAddr, Arc<Connection>>>,
    connector: Arc<dyn Connector>,
    settings: ConnectionSettings,
}

impl ConnectionRegistry {
    pub fn new(connector: Arc<dyn Connector>, settings: ConnectionSettings) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            connector,
            settings,
        }
    }

    /// The usable connection to `addr`, opening one if there is none
    ///
    /// Lookup and insertion happen under one lock, so concurrent callers for
    /// the same address always get the same instance. A registered connection
    /// that failed or was cleaned is replaced.
    pub fn find_or_new(&self, addr: SocketAddr) -> Arc<Connection> {
        let mut connections = self.connections.lock();
        if let Some(existing) = connections.get(&addr) {
            if existing.is_usable() {
                return existing.clone();
            }
            debug!(remote = %addr, "replacing unusable connection");
        }

        let connection = Connection::open(addr, self.connector.clone(), &self.settings);
        connections.insert(addr, connection.clone());
        connection
    }

    /// The registered connection to `addr`, usable or not
    pub fn get(&self, addr: SocketAddr) -> Option<Arc<Connection>> {
        self.connections.lock().get(&addr).cloned()
    }

    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }

    /// Clean and forget every connection
    pub fn close_all(&self) {
        let drained: Vec<_> = self.connections.lock().drain().map(|(_, c)| c).collect();
        for connection in drained {
            connection.clean();
        }
    }
}
