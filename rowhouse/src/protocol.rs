use std::fmt;

use crate::{block::Block, progress::Progress, Error, Result};

pub const DBMS_MIN_REVISION_WITH_CLIENT_INFO: u64 = 54032;
pub const DBMS_MIN_REVISION_WITH_SERVER_TIMEZONE: u64 = 54058;
pub const DBMS_MIN_REVISION_WITH_QUOTA_KEY_IN_CLIENT_INFO: u64 = 54060;
pub const DBMS_MIN_REVISION_WITH_SERVER_DISPLAY_NAME: u64 = 54372;
pub const DBMS_MIN_REVISION_WITH_VERSION_PATCH: u64 = 54401;

pub const DBMS_TCP_PROTOCOL_VERSION: u64 = 54401;

pub const MAX_STRING_SIZE: usize = 1 << 30;

#[repr(u64)]
#[derive(Clone, Copy, Debug)]
pub enum ClientPacketId {
    Hello = 0,
    Query = 1,
    Data = 2,
    Cancel = 3,
    Ping = 4,
}

#[repr(u64)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerPacketId {
    Hello = 0,
    Data = 1,
    Exception = 2,
    Progress = 3,
    Pong = 4,
    EndOfStream = 5,
    ProfileInfo = 6,
    Totals = 7,
    Extremes = 8,
}

impl ServerPacketId {
    pub fn from_u64(i: u64) -> Result<Self> {
        Ok(match i {
            0 => ServerPacketId::Hello,
            1 => ServerPacketId::Data,
            2 => ServerPacketId::Exception,
            3 => ServerPacketId::Progress,
            4 => ServerPacketId::Pong,
            5 => ServerPacketId::EndOfStream,
            6 => ServerPacketId::ProfileInfo,
            7 => ServerPacketId::Totals,
            8 => ServerPacketId::Extremes,
            x => return Err(Error::UnknownPacket(x)),
        })
    }
}

/// Server identity received during the handshake. Immutable for the
/// connection lifetime.
#[derive(Debug, Clone, Default)]
pub struct ServerHello {
    pub server_name: String,
    pub major_version: u64,
    pub minor_version: u64,
    pub revision: u64,
    pub timezone: Option<String>,
    pub display_name: Option<String>,
    pub patch_version: u64,
}

#[derive(Debug, Clone)]
pub struct ServerData {
    pub table_name: String,
    pub block: Block,
}

/// Server-side exception, possibly chained through `nested`.
#[derive(Debug, Clone)]
pub struct ServerException {
    pub code: i32,
    pub name: String,
    pub message: String,
    pub stack_trace: String,
    pub nested: Option<Box<ServerException>>,
}

impl ServerException {
    pub fn emit(self) -> Error {
        Error::ServerException(Box::new(self))
    }
}

impl fmt::Display for ServerException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name, self.code, self.message)?;
        if let Some(nested) = &self.nested {
            write!(f, "; caused by: {nested}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct BlockStreamProfileInfo {
    pub rows: u64,
    pub blocks: u64,
    pub bytes: u64,
    pub applied_limit: bool,
    pub rows_before_limit: u64,
    pub calculated_rows_before_limit: bool,
}

#[derive(Debug, Clone)]
pub enum ServerPacket {
    Hello(ServerHello),
    Data(ServerData),
    Exception(ServerException),
    Progress(Progress),
    Pong,
    EndOfStream,
    ProfileInfo(BlockStreamProfileInfo),
    Totals(ServerData),
    Extremes(ServerData),
}

impl ServerPacket {
    pub fn id(&self) -> ServerPacketId {
        match self {
            ServerPacket::Hello(_) => ServerPacketId::Hello,
            ServerPacket::Data(_) => ServerPacketId::Data,
            ServerPacket::Exception(_) => ServerPacketId::Exception,
            ServerPacket::Progress(_) => ServerPacketId::Progress,
            ServerPacket::Pong => ServerPacketId::Pong,
            ServerPacket::EndOfStream => ServerPacketId::EndOfStream,
            ServerPacket::ProfileInfo(_) => ServerPacketId::ProfileInfo,
            ServerPacket::Totals(_) => ServerPacketId::Totals,
            ServerPacket::Extremes(_) => ServerPacketId::Extremes,
        }
    }
}

/// Wire compression negotiated for data packets. Control frames are never
/// compressed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompressionMethod {
    None,
    #[default]
    Lz4,
    Zstd,
}

impl CompressionMethod {
    pub fn byte(&self) -> u8 {
        match self {
            CompressionMethod::None => 0x02,
            CompressionMethod::Lz4 => 0x82,
            CompressionMethod::Zstd => 0x90,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, CompressionMethod::None)
    }
}
