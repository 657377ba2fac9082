//! Length-prefixed framing shared by the TCP-based transports.
//!
//! Wire format: `[u32 big-endian length][payload]`.

use super::{TransportError, MAX_MESSAGE_SIZE};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Write one frame.
pub(crate) async fn write_frame<W>(writer: &mut W, data: &[u8]) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(TransportError::MessageTooLarge {
            size: data.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }

    let len = (data.len() as u32).to_be_bytes();
    writer
        .write_all(&len)
        .await
        .map_err(|e| TransportError::SendFailed(format!("Failed to write length: {e}")))?;
    writer
        .write_all(data)
        .await
        .map_err(|e| TransportError::SendFailed(format!("Failed to write data: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| TransportError::SendFailed(format!("Failed to flush: {e}")))?;

    Ok(())
}

/// Read one frame.
pub(crate) async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            TransportError::ConnectionClosed
        } else {
            TransportError::ReceiveFailed(format!("Failed to read length: {e}"))
        }
    })?;

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(TransportError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut data = vec![0u8; len];
    reader
        .read_exact(&mut data)
        .await
        .map_err(|e| TransportError::ReceiveFailed(format!("Failed to read data: {e}")))?;

    Ok(data)
}
