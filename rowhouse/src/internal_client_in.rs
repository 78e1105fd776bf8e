use log::trace;
use tokio::io::AsyncReadExt;

use crate::{
    block::{Block, BlockInfo},
    compression,
    io::WireRead,
    progress::Progress,
    protocol::{
        BlockStreamProfileInfo, CompressionMethod, ServerData, ServerException, ServerHello,
        ServerPacket, ServerPacketId, DBMS_MIN_REVISION_WITH_SERVER_DISPLAY_NAME,
        DBMS_MIN_REVISION_WITH_SERVER_TIMEZONE, DBMS_MIN_REVISION_WITH_VERSION_PATCH,
    },
    Error, Result,
};

pub struct InternalClientIn<R: WireRead> {
    reader: R,
    pub server_hello: ServerHello,
}

impl<R: WireRead> InternalClientIn<R> {
    pub fn new(reader: R) -> Self {
        InternalClientIn {
            reader,
            server_hello: ServerHello::default(),
        }
    }

    async fn read_exception(&mut self) -> Result<ServerException> {
        // chain of exceptions linked by has_nested
        let mut chain: Vec<ServerException> = vec![];
        loop {
            let code = self.reader.read_i32_le().await?;
            let name = self.reader.read_utf8_string().await?;
            let message = self.reader.read_utf8_string().await?;
            let stack_trace = self.reader.read_utf8_string().await?;
            let has_nested = self.reader.read_u8().await? != 0;
            chain.push(ServerException {
                code,
                name,
                message,
                stack_trace,
                nested: None,
            });
            if !has_nested {
                break;
            }
        }
        chain
            .into_iter()
            .rev()
            .reduce(|nested, mut outer| {
                outer.nested = Some(Box::new(nested));
                outer
            })
            .ok_or_else(|| Error::MalformedFrame("empty exception chain".to_string()))
    }

    async fn receive_data(&mut self, compression: CompressionMethod) -> Result<ServerData> {
        let table_name = self.reader.read_utf8_string().await?;
        let info = BlockInfo::read(&mut self.reader).await?;
        let block = if compression.is_none() {
            Block::read_body(&mut self.reader, info).await?
        } else {
            let body = compression::read_frame(&mut self.reader).await?;
            Block::read_body(&mut &body[..], info).await?
        };
        Ok(ServerData { table_name, block })
    }

    // A socket that closes cleanly between packets is a closed connection;
    // running dry inside a packet is a malformed frame.
    async fn read_packet_tag(&mut self) -> Result<u64> {
        let first = match self.reader.read_u8().await {
            Ok(byte) => byte,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(Error::ConnectionClosed(
                    "server closed the connection".to_string(),
                ))
            }
            Err(e) => return Err(e.into()),
        };
        let mut tag = (first & 0x7F) as u64;
        let mut shift = 7;
        let mut octet = first;
        while octet & 0x80 != 0 {
            if shift >= 64 {
                return Err(Error::MalformedFrame("packet tag exceeds 64 bits".to_string()));
            }
            octet = self.reader.read_u8().await?;
            tag |= ((octet & 0x7F) as u64) << shift;
            shift += 7;
        }
        Ok(tag)
    }

    pub async fn receive_packet(&mut self, compression: CompressionMethod) -> Result<ServerPacket> {
        let packet_id = ServerPacketId::from_u64(self.read_packet_tag().await?)?;
        let packet = match packet_id {
            ServerPacketId::Hello => {
                let server_name = self.reader.read_utf8_string().await?;
                let major_version = self.reader.read_var_uint().await?;
                let minor_version = self.reader.read_var_uint().await?;
                let revision = self.reader.read_var_uint().await?;
                let timezone = if revision >= DBMS_MIN_REVISION_WITH_SERVER_TIMEZONE {
                    Some(self.reader.read_utf8_string().await?)
                } else {
                    None
                };
                let display_name = if revision >= DBMS_MIN_REVISION_WITH_SERVER_DISPLAY_NAME {
                    Some(self.reader.read_utf8_string().await?)
                } else {
                    None
                };
                let patch_version = if revision >= DBMS_MIN_REVISION_WITH_VERSION_PATCH {
                    self.reader.read_var_uint().await?
                } else {
                    0
                };
                ServerPacket::Hello(ServerHello {
                    server_name,
                    major_version,
                    minor_version,
                    revision,
                    timezone,
                    display_name,
                    patch_version,
                })
            }
            ServerPacketId::Data => ServerPacket::Data(self.receive_data(compression).await?),
            ServerPacketId::Exception => ServerPacket::Exception(self.read_exception().await?),
            ServerPacketId::Progress => {
                let rows = self.reader.read_var_uint().await?;
                let bytes = self.reader.read_var_uint().await?;
                let total_rows = self.reader.read_var_uint().await?;
                ServerPacket::Progress(Progress {
                    rows,
                    bytes,
                    total_rows,
                })
            }
            ServerPacketId::Pong => ServerPacket::Pong,
            ServerPacketId::EndOfStream => ServerPacket::EndOfStream,
            ServerPacketId::ProfileInfo => {
                let rows = self.reader.read_var_uint().await?;
                let blocks = self.reader.read_var_uint().await?;
                let bytes = self.reader.read_var_uint().await?;
                let applied_limit = self.reader.read_u8().await? != 0;
                let rows_before_limit = self.reader.read_var_uint().await?;
                let calculated_rows_before_limit = self.reader.read_u8().await? != 0;
                ServerPacket::ProfileInfo(BlockStreamProfileInfo {
                    rows,
                    blocks,
                    bytes,
                    applied_limit,
                    rows_before_limit,
                    calculated_rows_before_limit,
                })
            }
            ServerPacketId::Totals => ServerPacket::Totals(self.receive_data(compression).await?),
            ServerPacketId::Extremes => {
                ServerPacket::Extremes(self.receive_data(compression).await?)
            }
        };

        trace!("server packet received: {:?}", packet.id());
        Ok(packet)
    }

    pub async fn receive_hello(&mut self) -> Result<ServerHello> {
        match self.receive_packet(CompressionMethod::None).await? {
            ServerPacket::Hello(hello) => Ok(hello),
            ServerPacket::Exception(e) => Err(e.emit()),
            packet => Err(Error::ProtocolViolation(format!(
                "unexpected packet {:?}, expected server hello",
                packet.id()
            ))),
        }
    }
}
