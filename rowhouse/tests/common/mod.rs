//! In-process mock server speaking the server side of the wire protocol,
//! used to exercise the client end-to-end over loopback TCP.

use rowhouse::{
    compression,
    io::{WireRead, WireWrite},
    protocol::{
        ClientPacketId, CompressionMethod, ServerPacketId, DBMS_MIN_REVISION_WITH_VERSION_PATCH,
    },
    Block, BlockInfo, ConnectionOptions,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::{
    tcp::{OwnedReadHalf, OwnedWriteHalf},
    TcpListener,
};

pub const SERVER_REVISION: u64 = DBMS_MIN_REVISION_WITH_VERSION_PATCH;

pub struct MockServer {
    listener: TcpListener,
    port: u16,
}

impl MockServer {
    pub async fn start() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        MockServer { listener, port }
    }

    pub fn options(&self) -> ConnectionOptions {
        let mut options = ConnectionOptions::new("127.0.0.1", self.port);
        options.compression = CompressionMethod::None;
        options
    }

    /// Accepts one connection and answers its hello handshake.
    pub async fn accept(&self, compression: CompressionMethod) -> ServerConn {
        let (stream, _) = self.listener.accept().await.unwrap();
        let (read, write) = stream.into_split();
        let mut conn = ServerConn {
            reader: BufReader::new(read),
            writer: BufWriter::new(write),
            compression,
        };
        conn.handshake().await;
        conn
    }

    /// Accepts one connection without handshaking, for failure scenarios.
    pub async fn accept_raw(&self) -> ServerConn {
        let (stream, _) = self.listener.accept().await.unwrap();
        let (read, write) = stream.into_split();
        ServerConn {
            reader: BufReader::new(read),
            writer: BufWriter::new(write),
            compression: CompressionMethod::None,
        }
    }
}

pub struct ClientHelloFields {
    pub client_name: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

pub struct ServerConn {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
    compression: CompressionMethod,
}

impl ServerConn {
    async fn handshake(&mut self) {
        let hello = self.read_client_hello().await;
        assert!(!hello.client_name.is_empty());
        self.send_hello().await;
    }

    pub async fn read_client_hello(&mut self) -> ClientHelloFields {
        let tag = self.reader.read_var_uint().await.unwrap();
        assert_eq!(tag, ClientPacketId::Hello as u64);
        let client_name = self.reader.read_utf8_string().await.unwrap();
        let _major = self.reader.read_var_uint().await.unwrap();
        let _minor = self.reader.read_var_uint().await.unwrap();
        let _protocol = self.reader.read_var_uint().await.unwrap();
        let database = self.reader.read_utf8_string().await.unwrap();
        let username = self.reader.read_utf8_string().await.unwrap();
        let password = self.reader.read_utf8_string().await.unwrap();
        ClientHelloFields {
            client_name,
            database,
            username,
            password,
        }
    }

    pub async fn send_hello(&mut self) {
        let w = &mut self.writer;
        w.write_var_uint(ServerPacketId::Hello as u64).await.unwrap();
        w.write_string("MockHouse").await.unwrap();
        w.write_var_uint(23).await.unwrap();
        w.write_var_uint(8).await.unwrap();
        w.write_var_uint(SERVER_REVISION).await.unwrap();
        w.write_string("UTC").await.unwrap();
        w.write_string("mockhouse").await.unwrap();
        w.write_var_uint(1).await.unwrap();
        w.flush().await.unwrap();
    }

    /// Reads a full Query packet plus the empty Data packet that terminates
    /// it, returning the query text.
    pub async fn read_query(&mut self) -> String {
        let tag = self.reader.read_var_uint().await.unwrap();
        assert_eq!(tag, ClientPacketId::Query as u64);
        let _query_id = self.reader.read_utf8_string().await.unwrap();

        // client info
        let kind = self.reader.read_u8().await.unwrap();
        assert_eq!(kind, 1);
        let _initial_user = self.reader.read_utf8_string().await.unwrap();
        let _initial_query_id = self.reader.read_utf8_string().await.unwrap();
        let _initial_address = self.reader.read_utf8_string().await.unwrap();
        let interface = self.reader.read_u8().await.unwrap();
        assert_eq!(interface, 1);
        let _os_user = self.reader.read_utf8_string().await.unwrap();
        let _hostname = self.reader.read_utf8_string().await.unwrap();
        let _client_name = self.reader.read_utf8_string().await.unwrap();
        let _version_major = self.reader.read_var_uint().await.unwrap();
        let _version_minor = self.reader.read_var_uint().await.unwrap();
        let _protocol = self.reader.read_var_uint().await.unwrap();
        let _quota_key = self.reader.read_utf8_string().await.unwrap();
        let _patch = self.reader.read_var_uint().await.unwrap();

        // settings until empty name
        loop {
            let name = self.reader.read_utf8_string().await.unwrap();
            if name.is_empty() {
                break;
            }
            let _value = self.reader.read_utf8_string().await.unwrap();
        }

        let stage = self.reader.read_var_uint().await.unwrap();
        assert_eq!(stage, 2);
        let _compression = self.reader.read_u8().await.unwrap();
        let query = self.reader.read_utf8_string().await.unwrap();

        // the empty Data packet marking end of query
        let terminator = self.read_data_block().await;
        assert!(terminator.is_empty());

        query
    }

    /// Reads one client Data packet and returns its block.
    pub async fn read_data_block(&mut self) -> Block {
        let tag = self.reader.read_var_uint().await.unwrap();
        assert_eq!(tag, ClientPacketId::Data as u64);
        let _table_name = self.reader.read_utf8_string().await.unwrap();
        let info = BlockInfo::read(&mut self.reader).await.unwrap();
        if self.compression.is_none() {
            Block::read_body(&mut self.reader, info).await.unwrap()
        } else {
            let body = compression::read_frame(&mut self.reader).await.unwrap();
            Block::read_body(&mut &body[..], info).await.unwrap()
        }
    }

    pub async fn read_ping(&mut self) {
        let tag = self.reader.read_var_uint().await.unwrap();
        assert_eq!(tag, ClientPacketId::Ping as u64);
    }

    pub async fn send_pong(&mut self) {
        self.writer
            .write_var_uint(ServerPacketId::Pong as u64)
            .await
            .unwrap();
        self.writer.flush().await.unwrap();
    }

    pub async fn send_data(&mut self, block: &Block) {
        self.send_data_tagged(ServerPacketId::Data, block).await;
    }

    pub async fn send_totals(&mut self, block: &Block) {
        self.send_data_tagged(ServerPacketId::Totals, block).await;
    }

    pub async fn send_extremes(&mut self, block: &Block) {
        self.send_data_tagged(ServerPacketId::Extremes, block).await;
    }

    async fn send_data_tagged(&mut self, tag: ServerPacketId, block: &Block) {
        let w = &mut self.writer;
        w.write_var_uint(tag as u64).await.unwrap();
        w.write_string("").await.unwrap();
        block.info.write(w).await.unwrap();
        if self.compression.is_none() {
            block.write_body(w).await.unwrap();
        } else {
            let mut body = vec![];
            block.write_body(&mut body).await.unwrap();
            compression::write_frame(w, self.compression, &body)
                .await
                .unwrap();
        }
        w.flush().await.unwrap();
    }

    pub async fn send_progress(&mut self, rows: u64, bytes: u64, total_rows: u64) {
        let w = &mut self.writer;
        w.write_var_uint(ServerPacketId::Progress as u64).await.unwrap();
        w.write_var_uint(rows).await.unwrap();
        w.write_var_uint(bytes).await.unwrap();
        w.write_var_uint(total_rows).await.unwrap();
        w.flush().await.unwrap();
    }

    pub async fn send_profile_info(&mut self, rows: u64, blocks: u64, bytes: u64) {
        let w = &mut self.writer;
        w.write_var_uint(ServerPacketId::ProfileInfo as u64)
            .await
            .unwrap();
        w.write_var_uint(rows).await.unwrap();
        w.write_var_uint(blocks).await.unwrap();
        w.write_var_uint(bytes).await.unwrap();
        w.write_u8(0).await.unwrap();
        w.write_var_uint(rows).await.unwrap();
        w.write_u8(0).await.unwrap();
        w.flush().await.unwrap();
    }

    pub async fn send_end_of_stream(&mut self) {
        self.writer
            .write_var_uint(ServerPacketId::EndOfStream as u64)
            .await
            .unwrap();
        self.writer.flush().await.unwrap();
    }

    pub async fn send_exception(&mut self, code: i32, name: &str, message: &str) {
        let w = &mut self.writer;
        w.write_var_uint(ServerPacketId::Exception as u64)
            .await
            .unwrap();
        w.write_i32_le(code).await.unwrap();
        w.write_string(name).await.unwrap();
        w.write_string(message).await.unwrap();
        w.write_string("<stack>").await.unwrap();
        w.write_u8(0).await.unwrap();
        w.flush().await.unwrap();
    }

    pub async fn send_raw_tag(&mut self, tag: u64) {
        self.writer.write_var_uint(tag).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Drops the socket, closing it mid-conversation.
    pub fn abort(self) {}
}
