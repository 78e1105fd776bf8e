use std::future::Future;
use std::time::Duration;

use log::{debug, trace};
use tokio::{
    io::{BufReader, BufWriter},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
};
use uuid::Uuid;

use crate::{
    block::Block,
    client::ConnectionOptions,
    insert::{self, RowSource},
    internal_client_in::InternalClientIn,
    internal_client_out::{ClientHello, ClientInfo, InternalClientOut, Query, QueryKind,
        QueryProcessingStage},
    progress::Progress,
    protocol::{self, BlockStreamProfileInfo, ServerHello, ServerPacket},
    query_parser, Error, Result,
};

/// Lifecycle of a physical connection. Owned exclusively by the
/// [`Connection`]; callers serialise operations on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Handshaking,
    Idle,
    AwaitingResponseStream,
    AwaitingSampleHeader,
    SendingInsertData,
    AwaitingEndOfStream,
}

/// One non-progress item of a query response stream, in arrival order.
#[derive(Debug, Clone)]
pub enum ResponseItem {
    Data(Block),
    Totals(Block),
    Extremes(Block),
    ProfileInfo(BlockStreamProfileInfo),
}

/// Everything a query returned up to EndOfStream, plus accumulated progress.
#[derive(Debug, Default)]
pub struct QueryResponse {
    pub items: Vec<ResponseItem>,
    pub progress: Progress,
}

impl QueryResponse {
    /// Data blocks only, in arrival order.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.items.iter().filter_map(|item| match item {
            ResponseItem::Data(block) => Some(block),
            _ => None,
        })
    }

    pub fn total_rows(&self) -> u64 {
        self.blocks().map(|block| block.rows).sum()
    }
}

/// A single physical connection: socket, codec, and protocol state machine.
///
/// Not safe for concurrent use; one request at a time. Use one connection per
/// task, or the reconnecting [`crate::Client`].
pub struct Connection {
    input: InternalClientIn<BufReader<OwnedReadHalf>>,
    output: InternalClientOut<BufWriter<OwnedWriteHalf>>,
    state: ConnectionState,
    options: ConnectionOptions,
    client_address: String,
    client_hostname: String,
}

async fn deadline<T, F: Future<Output = Result<T>>>(limit: Duration, fut: F) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout),
    }
}

impl Connection {
    /// Opens the socket and performs the hello handshake.
    pub async fn connect(options: ConnectionOptions) -> Result<Self> {
        let address = format!("{}:{}", options.host, options.port);
        let stream = deadline(options.connect_timeout, async {
            Ok(TcpStream::connect(&address).await?)
        })
        .await?;
        stream.set_nodelay(true)?;
        let client_address = stream
            .local_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "0.0.0.0:0".to_string());
        let (read, write) = stream.into_split();

        let mut connection = Connection {
            input: InternalClientIn::new(BufReader::new(read)),
            output: InternalClientOut::new(BufWriter::new(write)),
            state: ConnectionState::Handshaking,
            client_address,
            client_hostname: std::env::var("HOSTNAME")
                .unwrap_or_else(|_| "localhost".to_string()),
            options,
        };
        match connection.handshake().await {
            Ok(()) => {
                connection.state = ConnectionState::Idle;
                Ok(connection)
            }
            Err(e) => {
                connection.state = ConnectionState::Closed;
                Err(e)
            }
        }
    }

    async fn handshake(&mut self) -> Result<()> {
        self.output
            .send_hello(ClientHello {
                client_name: &self.options.client_name,
                default_database: &self.options.default_database,
                username: &self.options.username,
                password: &self.options.password,
            })
            .await?;
        let hello = deadline(self.options.query_timeout, self.input.receive_hello()).await?;
        debug!(
            "connected to {} {}.{} (revision {})",
            hello.server_name, hello.major_version, hello.minor_version, hello.revision
        );
        self.input.server_hello = hello.clone();
        self.output.server_hello = hello;
        Ok(())
    }

    pub fn server_hello(&self) -> &ServerHello {
        &self.output.server_hello
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    fn ensure_idle(&self) -> Result<()> {
        match self.state {
            ConnectionState::Idle => Ok(()),
            ConnectionState::Closed => Err(Error::ConnectionClosed(
                "connection is closed".to_string(),
            )),
            state => Err(Error::ProtocolViolation(format!(
                "connection is busy in state {state:?}"
            ))),
        }
    }

    // Server exceptions drain back to Idle; everything else is fatal and
    // closes the connection.
    fn settle(&mut self, error: Error) -> Error {
        if matches!(error, Error::ServerException(_)) {
            self.state = ConnectionState::Idle;
        } else {
            self.state = ConnectionState::Closed;
        }
        error
    }

    async fn receive_packet(&mut self, limit: Duration) -> Result<ServerPacket> {
        deadline(limit, self.input.receive_packet(self.options.compression)).await
    }

    // Query packet followed by the empty Data packet that marks end of query.
    async fn write_query_packets(&mut self, query: &str) -> Result<()> {
        let id = Uuid::new_v4().to_string();
        trace!("sending query {id}: {query}");
        self.output
            .send_query(Query {
                id: &id,
                info: ClientInfo {
                    kind: QueryKind::InitialQuery,
                    initial_user: "",
                    initial_query_id: "",
                    initial_address: &self.client_address,
                    os_user: "",
                    client_hostname: &self.client_hostname,
                    client_name: &self.options.client_name,
                    client_version_major: crate::VERSION_MAJOR,
                    client_version_minor: crate::VERSION_MINOR,
                    client_tcp_protocol_version: protocol::DBMS_TCP_PROTOCOL_VERSION,
                    quota_key: "",
                    client_version_patch: 0,
                },
                settings: &self.options.settings,
                stage: QueryProcessingStage::Complete,
                compression: self.options.compression,
                query,
            })
            .await?;
        self.output
            .send_data(&Block::new(), self.options.compression, "")
            .await?;
        Ok(())
    }

    /// Runs a statement and drains the response stream to EndOfStream.
    pub async fn send_query(&mut self, query: &str) -> Result<QueryResponse> {
        self.ensure_idle()?;
        self.state = ConnectionState::AwaitingResponseStream;
        match self.send_query_inner(query).await {
            Ok(response) => Ok(response),
            Err(e) => Err(self.settle(e)),
        }
    }

    async fn send_query_inner(&mut self, query: &str) -> Result<QueryResponse> {
        self.write_query_packets(query).await?;
        let mut response = QueryResponse::default();
        loop {
            match self.receive_packet(self.options.query_timeout).await? {
                ServerPacket::Data(data) => {
                    if !data.block.is_empty() {
                        response.items.push(ResponseItem::Data(data.block));
                    }
                }
                ServerPacket::Progress(progress) => {
                    trace!(
                        "progress: {} rows, {} bytes of ~{}",
                        progress.rows,
                        progress.bytes,
                        progress.total_rows
                    );
                    response.progress.accumulate(&progress);
                }
                ServerPacket::ProfileInfo(info) => {
                    response.items.push(ResponseItem::ProfileInfo(info));
                }
                ServerPacket::Totals(data) => {
                    response.items.push(ResponseItem::Totals(data.block));
                }
                ServerPacket::Extremes(data) => {
                    response.items.push(ResponseItem::Extremes(data.block));
                }
                ServerPacket::EndOfStream => {
                    self.state = ConnectionState::Idle;
                    return Ok(response);
                }
                ServerPacket::Exception(e) => return Err(e.emit()),
                packet => return Err(Error::UnknownPacket(packet.id() as u64)),
            }
        }
    }

    /// Streams an INSERT whose statement carries a `VALUES (` clause: the
    /// prefix is sent as the query, then blocks drawn from `source` follow
    /// the server's sample header. Returns the number of rows written.
    pub async fn send_insert(
        &mut self,
        query: &str,
        source: &mut impl RowSource,
    ) -> Result<u64> {
        self.ensure_idle()?;
        let Some((prefix, _tail)) = query_parser::split_values_clause(query) else {
            return Err(Error::ProtocolViolation(
                "INSERT statement has no VALUES clause".to_string(),
            ));
        };
        self.state = ConnectionState::AwaitingSampleHeader;
        match self.send_insert_inner(prefix.to_string(), source).await {
            Ok(rows) => Ok(rows),
            Err(e) => Err(self.settle(e)),
        }
    }

    async fn send_insert_inner(
        &mut self,
        prefix: String,
        source: &mut impl RowSource,
    ) -> Result<u64> {
        self.write_query_packets(&prefix).await?;

        let header = loop {
            match self.receive_packet(self.options.query_timeout).await? {
                ServerPacket::Data(data) => break data.block,
                ServerPacket::Progress(_) => continue,
                ServerPacket::Exception(e) => return Err(e.emit()),
                packet => return Err(Error::UnknownPacket(packet.id() as u64)),
            }
        };
        trace!(
            "insert sample header: {} columns",
            header.column_count()
        );

        self.state = ConnectionState::SendingInsertData;
        let mut written = 0u64;
        while let Some(block) =
            insert::next_batch(&header, source, insert::DEFAULT_INSERT_BATCH, written)?
        {
            written += block.rows;
            self.output
                .send_data(&block, self.options.compression, "")
                .await?;
        }
        // empty Data block is the insert terminator
        self.output
            .send_data(&Block::new(), self.options.compression, "")
            .await?;
        self.state = ConnectionState::AwaitingEndOfStream;

        loop {
            match self.receive_packet(self.options.query_timeout).await? {
                ServerPacket::EndOfStream => {
                    self.state = ConnectionState::Idle;
                    return Ok(written);
                }
                ServerPacket::Data(_) | ServerPacket::Progress(_) | ServerPacket::ProfileInfo(_) => {
                    continue
                }
                ServerPacket::Exception(e) => return Err(e.emit()),
                packet => return Err(Error::UnknownPacket(packet.id() as u64)),
            }
        }
    }

    /// Liveness check. A failed ping is silent: the connection is marked
    /// closed and `false` comes back, so a holder can swap in a fresh one.
    pub async fn ping(&mut self, limit: Duration) -> bool {
        if self.state != ConnectionState::Idle {
            return false;
        }
        match self.ping_inner(limit).await {
            Ok(()) => true,
            Err(e) => {
                debug!("ping failed: {e}");
                self.state = ConnectionState::Closed;
                false
            }
        }
    }

    async fn ping_inner(&mut self, limit: Duration) -> Result<()> {
        self.output.send_ping().await?;
        loop {
            match self.receive_packet(limit).await? {
                ServerPacket::Pong => return Ok(()),
                ServerPacket::Progress(_) => continue,
                packet => return Err(Error::UnknownPacket(packet.id() as u64)),
            }
        }
    }

    /// Requests cancellation of an in-flight query. The connection should be
    /// closed afterwards; the response stream is not drained.
    pub async fn cancel(&mut self) -> Result<()> {
        if self.state == ConnectionState::Closed {
            return Err(Error::ConnectionClosed(
                "connection is closed".to_string(),
            ));
        }
        self.output.send_cancel().await
    }

    /// Idempotent; aborts any pending operation.
    pub async fn close(&mut self) {
        if self.state != ConnectionState::Closed {
            self.state = ConnectionState::Closed;
            let _ = self.output.shutdown().await;
        }
    }
}
