//! Cache of live broker connections.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::connection::BrokerConnection;
use crate::error::Result;

/// Lazy, unbounded cache of connections keyed by `(host, port)`.
///
/// The pool never connects by node id alone; the cluster resolves node ids
/// to host/port pairs first. Connections that poisoned themselves (socket
/// failure, untrusted frame) are replaced transparently on the next
/// `connect` for the same endpoint.
#[derive(Debug)]
pub struct BrokerPool {
    client_id: String,
    connect_timeout: Duration,
    socket_timeout: Duration,
    connections: HashMap<(String, u16), BrokerConnection>,
}

impl BrokerPool {
    pub fn new(client_id: String, connect_timeout: Duration, socket_timeout: Duration) -> Self {
        Self {
            client_id,
            connect_timeout,
            socket_timeout,
            connections: HashMap::new(),
        }
    }

    /// Returns the live connection for `(host, port)`, opening one if none
    /// exists yet.
    pub async fn connect(&mut self, host: &str, port: u16) -> Result<&mut BrokerConnection> {
        let key = (host.to_string(), port);

        if self
            .connections
            .get(&key)
            .is_some_and(BrokerConnection::is_poisoned)
        {
            debug!(host, port, "replacing poisoned broker connection");
            self.connections.remove(&key);
        }

        match self.connections.entry(key) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let connection = BrokerConnection::open(
                    host,
                    port,
                    &self.client_id,
                    self.connect_timeout,
                    self.socket_timeout,
                )
                .await?;
                Ok(entry.insert(connection))
            }
        }
    }

    /// Drops one endpoint's connection; the next `connect` reopens it.
    pub fn drop_connection(&mut self, host: &str, port: u16) {
        self.connections.remove(&(host.to_string(), port));
    }

    pub fn close_all(&mut self) {
        debug!(count = self.connections.len(), "closing all broker connections");
        self.connections.clear();
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
