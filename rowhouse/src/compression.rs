use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::{
    io::{WireRead, WireWrite},
    protocol::CompressionMethod,
    Error, Result,
};

/// method byte + compressed size + uncompressed size
const FRAME_HEADER_SIZE: usize = 9;

/// 1GB cap on either side of a frame.
const MAX_FRAME_SIZE: usize = 0x4000_0000;

/// Wraps one compressible packet body:
/// `[checksum: CityHash128][method: u8][compressed: u32][uncompressed: u32][payload]`.
/// The compressed size counts the 9-byte header. The checksum covers header
/// and payload, written as two little-endian u64 halves, high first.
pub async fn write_frame<W: WireWrite>(
    writer: &mut W,
    method: CompressionMethod,
    body: &[u8],
) -> Result<()> {
    let compressed = match method {
        CompressionMethod::None => body.to_vec(),
        CompressionMethod::Lz4 => lz4::block::compress(body, None, false)
            .map_err(|e| Error::MalformedFrame(format!("lz4 compression failed: {e}")))?,
        CompressionMethod::Zstd => zstd::bulk::compress(body, 3)
            .map_err(|e| Error::MalformedFrame(format!("zstd compression failed: {e}")))?,
    };

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + compressed.len());
    frame.push(method.byte());
    frame.extend_from_slice(&((compressed.len() + FRAME_HEADER_SIZE) as u32).to_le_bytes());
    frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
    frame.extend_from_slice(&compressed);

    let checksum = cityhash_rs::cityhash_102_128(&frame);
    writer.write_u64_le((checksum >> 64) as u64).await?;
    writer.write_u64_le(checksum as u64).await?;
    writer.write_all(&frame).await?;
    Ok(())
}

/// Reads one frame and returns the decompressed body.
pub async fn read_frame<R: WireRead>(reader: &mut R) -> Result<Vec<u8>> {
    let checksum_high = reader.read_u64_le().await?;
    let checksum_low = reader.read_u64_le().await?;
    let expected = ((checksum_high as u128) << 64) | checksum_low as u128;

    let header = reader.read_fixed(FRAME_HEADER_SIZE).await?;
    let method = header[0];
    let compressed_size =
        u32::from_le_bytes([header[1], header[2], header[3], header[4]]) as usize;
    let uncompressed_size =
        u32::from_le_bytes([header[5], header[6], header[7], header[8]]) as usize;
    if compressed_size < FRAME_HEADER_SIZE
        || compressed_size > MAX_FRAME_SIZE
        || uncompressed_size > MAX_FRAME_SIZE
    {
        return Err(Error::MalformedFrame(format!(
            "compressed frame sizes out of bounds: {compressed_size}/{uncompressed_size}"
        )));
    }

    let payload = reader.read_fixed(compressed_size - FRAME_HEADER_SIZE).await?;

    let mut frame = header;
    frame.extend_from_slice(&payload);
    if cityhash_rs::cityhash_102_128(&frame) != expected {
        return Err(Error::ChecksumMismatch);
    }

    let body = match method {
        0x02 => payload,
        0x82 => lz4::block::decompress(&payload, Some(uncompressed_size as i32))
            .map_err(|e| Error::MalformedFrame(format!("lz4 decompression failed: {e}")))?,
        0x90 => zstd::bulk::decompress(&payload, uncompressed_size)
            .map_err(|e| Error::MalformedFrame(format!("zstd decompression failed: {e}")))?,
        other => {
            return Err(Error::MalformedFrame(format!(
                "unknown compression method byte 0x{other:02x}"
            )))
        }
    };
    if body.len() != uncompressed_size {
        return Err(Error::MalformedFrame(format!(
            "decompressed {} bytes, frame declared {uncompressed_size}",
            body.len()
        )));
    }
    Ok(body)
}
