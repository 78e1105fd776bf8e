use std::future::Future;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::MAX_STRING_SIZE;
use crate::{Error, Result};

/// Extension trait with the primitive reads of the wire format.
///
/// All multi-byte integers are little-endian. `var_uint` is LEB128: 7-bit
/// groups, high bit set on continuation.
pub trait WireRead: AsyncRead + Unpin + Send + Sync {
    fn read_var_uint(&mut self) -> impl Future<Output = Result<u64>> + Send;

    fn read_utf8_string(&mut self) -> impl Future<Output = Result<String>> + Send;

    fn read_binary(&mut self) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Exactly `n` raw bytes, returned verbatim.
    fn read_fixed(&mut self, n: usize) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

impl<T: AsyncRead + Unpin + Send + Sync> WireRead for T {
    fn read_var_uint(&mut self) -> impl Future<Output = Result<u64>> + Send {
        async move {
            let mut out = 0u64;
            for i in 0..10u64 {
                let octet = self.read_u8().await?;
                out |= ((octet & 0x7F) as u64) << (7 * i);
                if (octet & 0x80) == 0 {
                    return Ok(out);
                }
            }
            Err(Error::MalformedFrame("var_uint exceeds 64 bits".to_string()))
        }
    }

    fn read_utf8_string(&mut self) -> impl Future<Output = Result<String>> + Send {
        async move { Ok(String::from_utf8(self.read_binary().await?)?) }
    }

    fn read_binary(&mut self) -> impl Future<Output = Result<Vec<u8>>> + Send {
        async move {
            let len = self.read_var_uint().await? as usize;
            if len > MAX_STRING_SIZE {
                return Err(Error::MalformedFrame(format!(
                    "string of {len} bytes too large"
                )));
            }
            self.read_fixed(len).await
        }
    }

    fn read_fixed(&mut self, n: usize) -> impl Future<Output = Result<Vec<u8>>> + Send {
        async move {
            let mut buf = vec![0u8; n];
            self.read_exact(&mut buf[..]).await?;
            Ok(buf)
        }
    }
}

/// Write-side counterpart of [`WireRead`].
pub trait WireWrite: AsyncWrite + Unpin + Send + Sync {
    fn write_var_uint(&mut self, value: u64) -> impl Future<Output = Result<()>> + Send;

    fn write_string(
        &mut self,
        value: impl AsRef<[u8]> + Send,
    ) -> impl Future<Output = Result<()>> + Send;
}

impl<T: AsyncWrite + Unpin + Send + Sync> WireWrite for T {
    fn write_var_uint(&mut self, mut value: u64) -> impl Future<Output = Result<()>> + Send {
        async move {
            loop {
                let mut byte = (value & 0x7F) as u8;
                value >>= 7;
                if value != 0 {
                    byte |= 0x80;
                }
                self.write_all(&[byte]).await?;
                if value == 0 {
                    return Ok(());
                }
            }
        }
    }

    fn write_string(
        &mut self,
        value: impl AsRef<[u8]> + Send,
    ) -> impl Future<Output = Result<()>> + Send {
        async move {
            let bytes = value.as_ref();
            self.write_var_uint(bytes.len() as u64).await?;
            self.write_all(bytes).await?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn var_uint_roundtrip() {
        for value in [0u64, 1, 127, 128, 255, 0x3FFF, 0x4000, u32::MAX as u64, u64::MAX] {
            let mut buf = vec![];
            buf.write_var_uint(value).await.unwrap();
            let read = (&mut &buf[..]).read_var_uint().await.unwrap();
            assert_eq!(read, value, "value {value}");
        }
    }

    #[tokio::test]
    async fn var_uint_single_byte_boundary() {
        let mut buf = vec![];
        buf.write_var_uint(127).await.unwrap();
        assert_eq!(buf, vec![0x7F]);
        buf.clear();
        buf.write_var_uint(128).await.unwrap();
        assert_eq!(buf, vec![0x80, 0x01]);
    }

    #[tokio::test]
    async fn string_roundtrip() {
        for value in ["", "x", "hello", "日本語"] {
            let mut buf = vec![];
            buf.write_string(value).await.unwrap();
            let read = (&mut &buf[..]).read_utf8_string().await.unwrap();
            assert_eq!(read, value);
        }
    }

    #[tokio::test]
    async fn truncated_string_is_malformed() {
        let mut buf = vec![];
        buf.write_var_uint(16).await.unwrap();
        buf.extend_from_slice(b"short");
        let err = (&mut &buf[..]).read_utf8_string().await.unwrap_err();
        assert!(matches!(err, Error::MalformedFrame(_)));
    }
}
