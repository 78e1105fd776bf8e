use std::time::Duration;

use indexmap::IndexMap;
use log::debug;

use crate::{
    connection::{Connection, QueryResponse},
    insert::RowSource,
    protocol::CompressionMethod,
    Result,
};

/// Immutable configuration for a connection: endpoint, credentials,
/// timeouts, compression, and the settings map forwarded verbatim with every
/// query.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub default_database: String,
    /// Per-operation deadline for blocking socket reads and writes. Not a
    /// total-query deadline; it resets with every block.
    pub query_timeout: Duration,
    pub connect_timeout: Duration,
    pub compression: CompressionMethod,
    pub settings: IndexMap<String, String>,
    pub client_name: String,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        ConnectionOptions {
            host: "localhost".to_string(),
            port: 9000,
            username: "default".to_string(),
            password: String::new(),
            default_database: String::new(),
            query_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            compression: CompressionMethod::default(),
            settings: IndexMap::new(),
            client_name: concat!("rowhouse ", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ConnectionOptions {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        ConnectionOptions {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.default_database = database.into();
        self
    }

    pub fn compression(mut self, compression: CompressionMethod) -> Self {
        self.compression = compression;
        self
    }

    pub fn setting(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(name.into(), value.into());
        self
    }
}

/// Single-endpoint client that keeps one healthy physical connection.
///
/// Before each request the connection is pinged; on failure a fresh
/// connection is swapped in and the old one closed. This is the sole
/// reconnect path.
pub struct Client {
    options: ConnectionOptions,
    connection: Option<Connection>,
}

impl Client {
    /// Connects eagerly so configuration errors surface immediately.
    pub async fn connect(options: ConnectionOptions) -> Result<Self> {
        let connection = Connection::connect(options.clone()).await?;
        Ok(Client {
            options,
            connection: Some(connection),
        })
    }

    async fn healthy_connection(&mut self) -> Result<&mut Connection> {
        let alive = match self.connection.as_mut() {
            Some(connection) => connection.ping(self.options.query_timeout).await,
            None => false,
        };
        if !alive {
            debug!("connection unhealthy, reconnecting to {}", self.options.host);
            let fresh = Connection::connect(self.options.clone()).await?;
            if let Some(mut old) = self.connection.replace(fresh) {
                old.close().await;
            }
        }
        self.connection
            .as_mut()
            .ok_or_else(|| crate::Error::ConnectionClosed("client has no connection".to_string()))
    }

    /// Runs a statement, draining the full response stream.
    pub async fn query(&mut self, query: &str) -> Result<QueryResponse> {
        self.healthy_connection().await?.send_query(query).await
    }

    /// Streams an INSERT with a `VALUES (` clause from a row source.
    pub async fn insert(&mut self, query: &str, source: &mut impl RowSource) -> Result<u64> {
        self.healthy_connection().await?.send_insert(query, source).await
    }

    /// Liveness of the current physical connection, without reconnecting.
    pub async fn ping(&mut self) -> bool {
        match self.connection.as_mut() {
            Some(connection) => connection.ping(self.options.query_timeout).await,
            None => false,
        }
    }

    /// Idempotent.
    pub async fn close(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close().await;
        }
    }
}
