// ── Length-prefixed framing ──
//
// One frame = 4-byte big-endian payload length + payload. Generic over the
// tokio I/O traits so both the client transport and test doubles share it.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Error;

/// Size of the length prefix.
pub const HEADER_LEN: usize = 4;

/// Default ceiling for an incoming frame.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// Write one frame. Header and payload go out in a single buffer.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(payload.len()).map_err(|_| Error::FrameTooLarge {
        len: u64::try_from(payload.len()).unwrap_or(u64::MAX),
        max: usize::try_from(u32::MAX).unwrap_or(usize::MAX),
    })?;

    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(payload);

    writer.write_all(&buf).await.map_err(|source| Error::Io {
        operation: "writing frame",
        source,
    })?;
    writer.flush().await.map_err(|source| Error::Io {
        operation: "flushing frame",
        source,
    })
}

/// Read one frame. Does not return until the full declared length has
/// arrived; EOF before that is an error, never a short success.
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> Result<Vec<u8>, Error>
where
    R: AsyncRead + Unpin,
{
    let declared = reader.read_u32().await.map_err(|source| Error::Io {
        operation: "reading frame header",
        source,
    })?;

    let len = usize::try_from(declared)
        .ok()
        .filter(|len| *len <= max_len)
        .ok_or(Error::FrameTooLarge {
            len: u64::from(declared),
            max: max_len,
        })?;

    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|source| Error::Io {
            operation: "reading frame payload",
            source,
        })?;
    Ok(payload)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn write_prefixes_big_endian_length() {
        let mut mock = Builder::new().write(&[0, 0, 0, 3, b'a', b'b', b'c']).build();
        write_frame(&mut mock, b"abc").await.unwrap();
    }

    #[tokio::test]
    async fn read_waits_for_split_payload() {
        let mut mock = Builder::new()
            .read(&[0, 0])
            .read(&[0, 5, b'h', b'e'])
            .read(b"llo")
            .build();
        assert_eq!(read_frame(&mut mock, 64).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn short_payload_is_an_error() {
        let mut mock = Builder::new().read(&[0, 0, 0, 10, b'x', b'y']).build();
        let err = read_frame(&mut mock, 64).await.unwrap_err();
        assert!(err.is_transport(), "expected transport error, got {err:?}");
    }

    #[tokio::test]
    async fn truncated_header_is_an_error() {
        let mut mock = Builder::new().read(&[0, 0]).build();
        assert!(read_frame(&mut mock, 64).await.unwrap_err().is_transport());
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected_before_reading_payload() {
        let mut mock = Builder::new().read(&[0, 1, 0, 0]).build();
        let err = read_frame(&mut mock, 1024).await.unwrap_err();
        assert!(matches!(err, Error::FrameTooLarge { len: 65536, max: 1024 }));
    }

    #[tokio::test]
    async fn empty_frame_round_trips() {
        let mut mock = Builder::new().read(&[0, 0, 0, 0]).build();
        assert!(read_frame(&mut mock, 64).await.unwrap().is_empty());
    }
}
