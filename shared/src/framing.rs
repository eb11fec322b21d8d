//! Length-prefixed JSON framing over a byte stream
//!
//! Every frame is a 4-byte unsigned big-endian payload length followed by
//! exactly that many bytes of UTF-8 JSON. Readers loop over partial reads
//! until the whole frame has arrived; a peer closing mid-frame surfaces as
//! [`FramingError::ConnectionClosed`]. Any other failure is fatal to the
//! connection it happened on.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Upper bound on a single payload. Anything larger is treated as a corrupt prefix.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum FramingError {
    /// The peer closed the stream before a full frame arrived.
    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("frame of {0} bytes exceeds the frame size limit")]
    FrameTooLarge(usize),

    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl FramingError {
    /// True when the error is an orderly or abrupt close rather than a corrupt frame.
    pub fn is_closed(&self) -> bool {
        match self {
            FramingError::ConnectionClosed => true,
            FramingError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

/// Serializes `message` and prepends its byte length.
pub fn encode<T: Serialize + ?Sized>(message: &T) -> Result<Vec<u8>, FramingError> {
    let payload = serde_json::to_vec(message)?;
    if payload.len() > MAX_FRAME_SIZE {
        return Err(FramingError::FrameTooLarge(payload.len()));
    }

    let mut buffer = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    buffer.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buffer.extend_from_slice(&payload);
    Ok(buffer)
}

/// Decodes a payload (without its prefix).
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, FramingError> {
    let text = std::str::from_utf8(payload)?;
    Ok(serde_json::from_str(text)?)
}

/// Writes one complete frame. Either every byte reaches the stream or an error is returned.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), FramingError>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let frame = encode(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one complete frame, however many partial reads it takes.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T, FramingError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    fill(reader, &mut prefix).await?;

    let len = u32::from_be_bytes(prefix) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(FramingError::FrameTooLarge(len));
    }

    let mut payload = vec![0u8; len];
    fill(reader, &mut payload).await?;
    decode(&payload)
}

async fn fill<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> Result<(), FramingError> {
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(FramingError::ConnectionClosed),
        Err(e) => Err(e.into()),
    }
}
