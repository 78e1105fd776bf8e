use indexmap::IndexMap;
use tokio::io::AsyncWriteExt;

use crate::{
    block::Block,
    compression,
    io::WireWrite,
    protocol::{
        self, CompressionMethod, ServerHello, DBMS_MIN_REVISION_WITH_CLIENT_INFO,
        DBMS_MIN_REVISION_WITH_QUOTA_KEY_IN_CLIENT_INFO, DBMS_MIN_REVISION_WITH_VERSION_PATCH,
    },
    Result,
};

pub struct InternalClientOut<W: WireWrite> {
    writer: W,
    pub server_hello: ServerHello,
}

pub struct ClientHello<'a> {
    pub client_name: &'a str,
    pub default_database: &'a str,
    pub username: &'a str,
    pub password: &'a str,
}

#[repr(u8)]
#[derive(PartialEq, Clone, Copy)]
#[allow(unused)]
pub enum QueryKind {
    NoQuery = 0,
    InitialQuery = 1,
    SecondaryQuery = 2,
}

pub struct ClientInfo<'a> {
    pub kind: QueryKind,
    pub initial_user: &'a str,
    pub initial_query_id: &'a str,
    pub initial_address: &'a str,
    // interface = TCP = 1
    pub os_user: &'a str,
    pub client_hostname: &'a str,
    pub client_name: &'a str,
    pub client_version_major: u64,
    pub client_version_minor: u64,
    pub client_tcp_protocol_version: u64,
    // if DBMS_MIN_REVISION_WITH_QUOTA_KEY_IN_CLIENT_INFO
    pub quota_key: &'a str,
    // if DBMS_MIN_REVISION_WITH_VERSION_PATCH
    pub client_version_patch: u64,
}

impl ClientInfo<'_> {
    pub async fn write<W: WireWrite>(&self, to: &mut W, revision: u64) -> Result<()> {
        to.write_u8(self.kind as u8).await?;
        if self.kind == QueryKind::NoQuery {
            return Ok(());
        }
        to.write_string(self.initial_user).await?;
        to.write_string(self.initial_query_id).await?;
        to.write_string(self.initial_address).await?;
        to.write_u8(1).await?;
        to.write_string(self.os_user).await?;
        to.write_string(self.client_hostname).await?;
        to.write_string(self.client_name).await?;
        to.write_var_uint(self.client_version_major).await?;
        to.write_var_uint(self.client_version_minor).await?;
        to.write_var_uint(self.client_tcp_protocol_version).await?;
        if revision >= DBMS_MIN_REVISION_WITH_QUOTA_KEY_IN_CLIENT_INFO {
            to.write_string(self.quota_key).await?;
        }
        if revision >= DBMS_MIN_REVISION_WITH_VERSION_PATCH {
            to.write_var_uint(self.client_version_patch).await?;
        }
        Ok(())
    }
}

#[repr(u64)]
#[derive(Clone, Copy, Debug)]
#[allow(unused)]
pub enum QueryProcessingStage {
    FetchColumns = 0,
    WithMergeableState = 1,
    Complete = 2,
}

pub struct Query<'a> {
    pub id: &'a str,
    pub info: ClientInfo<'a>,
    pub settings: &'a IndexMap<String, String>,
    pub stage: QueryProcessingStage,
    pub compression: CompressionMethod,
    pub query: &'a str,
}

impl<W: WireWrite> InternalClientOut<W> {
    pub fn new(writer: W) -> Self {
        InternalClientOut {
            writer,
            server_hello: ServerHello::default(),
        }
    }

    pub async fn send_hello(&mut self, params: ClientHello<'_>) -> Result<()> {
        self.writer
            .write_var_uint(protocol::ClientPacketId::Hello as u64)
            .await?;
        self.writer.write_string(params.client_name).await?;
        self.writer.write_var_uint(crate::VERSION_MAJOR).await?;
        self.writer.write_var_uint(crate::VERSION_MINOR).await?;
        self.writer
            .write_var_uint(protocol::DBMS_TCP_PROTOCOL_VERSION)
            .await?;
        self.writer.write_string(params.default_database).await?;
        self.writer.write_string(params.username).await?;
        self.writer.write_string(params.password).await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub async fn send_query(&mut self, params: Query<'_>) -> Result<()> {
        self.writer
            .write_var_uint(protocol::ClientPacketId::Query as u64)
            .await?;
        self.writer.write_string(params.id).await?;
        if self.server_hello.revision >= DBMS_MIN_REVISION_WITH_CLIENT_INFO {
            params
                .info
                .write(&mut self.writer, self.server_hello.revision)
                .await?;
        }
        // settings: name/value pairs, terminated by an empty name
        for (name, value) in params.settings {
            self.writer.write_string(name).await?;
            self.writer.write_string(value).await?;
        }
        self.writer.write_string("").await?;
        self.writer.write_var_uint(params.stage as u64).await?;
        self.writer
            .write_u8(if params.compression.is_none() { 0 } else { 1 })
            .await?;
        self.writer.write_string(params.query).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Data packet: tag, table name, block info, then the columnar body,
    /// framed per [`crate::compression`] when compression is negotiated.
    pub async fn send_data(
        &mut self,
        block: &Block,
        compression: CompressionMethod,
        name: &str,
    ) -> Result<()> {
        self.writer
            .write_var_uint(protocol::ClientPacketId::Data as u64)
            .await?;
        self.writer.write_string(name).await?;
        block.info.write(&mut self.writer).await?;
        if compression.is_none() {
            block.write_body(&mut self.writer).await?;
        } else {
            let mut body = vec![];
            block.write_body(&mut body).await?;
            compression::write_frame(&mut self.writer, compression, &body).await?;
        }
        self.writer.flush().await?;
        Ok(())
    }

    pub async fn send_ping(&mut self) -> Result<()> {
        self.writer
            .write_var_uint(protocol::ClientPacketId::Ping as u64)
            .await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub async fn send_cancel(&mut self) -> Result<()> {
        self.writer
            .write_var_uint(protocol::ClientPacketId::Cancel as u64)
            .await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
