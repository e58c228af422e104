use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use redis::{Client, aio::ConnectionManager};

use crate::FailgateError;

/// Connections used by [`RedisAtomicCounter`](crate::RedisAtomicCounter).
///
/// Every counter operation is one script or command on one connection, so the
/// limiter never needs a dedicated connection per call. Calls are spread over
/// the held [`ConnectionManager`]s in turn; each manager pipelines concurrent
/// requests and reconnects after a dropped connection.
///
/// One connection is enough for most services. Raise the count when a hot login
/// endpoint keeps a single connection saturated.
pub struct FailgateRedisClient {
    connections: Arc<Vec<ConnectionManager>>,
    next: AtomicUsize,
}

impl FailgateRedisClient {
    /// Open a single managed connection.
    pub async fn default_from_client(client: Client) -> Result<Self, FailgateError> {
        Self::from_client(client, 1).await
    }

    /// Open `connection_count` managed connections.
    ///
    /// Fails with [`FailgateError::InvalidConnectionCount`] for `0` and with
    /// [`FailgateError::RedisError`] if a connection cannot be established.
    pub async fn from_client(
        client: Client,
        connection_count: usize,
    ) -> Result<Self, FailgateError> {
        if connection_count == 0 {
            return Err(FailgateError::InvalidConnectionCount(
                "connection count must be > 0".to_string(),
            ));
        }

        let mut connections = Vec::with_capacity(connection_count);
        for _ in 0..connection_count {
            connections.push(client.get_connection_manager().await?);
        }

        Self::from_connection_managers(connections)
    }

    /// Share connection managers the application already owns.
    pub fn from_connection_managers(
        connections: Vec<ConnectionManager>,
    ) -> Result<Self, FailgateError> {
        if connections.is_empty() {
            return Err(FailgateError::InvalidConnectionCount(
                "at least one connection manager is required".to_string(),
            ));
        }

        Ok(Self {
            connections: Arc::new(connections),
            next: AtomicUsize::new(0),
        })
    }

    /// Number of managed connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Connection for the next counter call.
    pub(crate) fn connection(&self) -> ConnectionManager {
        let turn = self.next.fetch_add(1, Ordering::Relaxed);
        self.connections[turn % self.connections.len()].clone()
    }
}

impl fmt::Debug for FailgateRedisClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailgateRedisClient")
            .field("connection_count", &self.connection_count())
            .finish_non_exhaustive()
    }
}

// Clones share the connections and start their own rotation.
impl Clone for FailgateRedisClient {
    fn clone(&self) -> Self {
        Self {
            connections: self.connections.clone(),
            next: AtomicUsize::new(0),
        }
    }
}

impl From<ConnectionManager> for FailgateRedisClient {
    fn from(connection: ConnectionManager) -> Self {
        Self {
            connections: Arc::new(vec![connection]),
            next: AtomicUsize::new(0),
        }
    }
}
