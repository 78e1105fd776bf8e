//! Native TCP wire client for ClickHouse-protocol columnar databases.
//!
//! The crate covers the wire protocol engine and its type system: the framed
//! and optionally compressed binary codec, the handshake and query/insert
//! state machine, the column-oriented block format with per-type bulk
//! serialisers, and the parser for the server's textual type descriptors.
//! Result-set conveniences, pooling and SQL handling belong to outer layers.

/// Client version advertised in the handshake.
pub const VERSION_MAJOR: u64 = 0;
pub const VERSION_MINOR: u64 = 1;

mod block;
mod client;
pub mod compression;
mod connection;
mod errors;
mod insert;
mod internal_client_in;
mod internal_client_out;
pub mod io;
mod progress;
pub mod protocol;
mod query_parser;
mod types;
mod values;

pub use block::{Block, BlockInfo, BlockRowIter};
pub use client::{Client, ConnectionOptions};
pub use connection::{Connection, ConnectionState, QueryResponse, ResponseItem};
pub use errors::{Error, Result};
pub use insert::{RowSource, VecRowSource, DEFAULT_INSERT_BATCH};
pub use progress::Progress;
pub use protocol::{CompressionMethod, ServerException, ServerHello};
pub use query_parser::{parse_value_literal, split_values_clause, SqlValuesSource};
pub use types::{SqlType, Type, Tz};
pub use uuid::Uuid;
pub use values::{Date, DateTime, Value};
