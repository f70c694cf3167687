//! Length-prefixed framing of control messages.
//!
//! Format:
//! - 4 bytes: body length (big-endian)
//! - N bytes: UTF-8 message text
//!
//! A `DATA` header is one frame; the file bytes follow it unframed.

use crate::{Message, ProtocolError, Result, MAX_FRAME_SIZE};
use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Encodes a message into a complete frame.
///
/// # Errors
///
/// Returns an error if the message does not validate or is too large.
pub fn encode_frame(message: &Message) -> Result<Bytes> {
    message.validate()?;
    let text = message.encode();
    if text.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::TooLarge {
            size: text.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    let mut buf = BytesMut::with_capacity(4 + text.len());
    // Bounded by MAX_FRAME_SIZE above.
    #[allow(clippy::cast_possible_truncation)]
    buf.put_u32(text.len() as u32);
    buf.put_slice(text.as_bytes());
    Ok(buf.freeze())
}

/// Writes one message frame and flushes the writer.
///
/// # Errors
///
/// Returns an error if the message is invalid or the write fails.
pub async fn write_message<W>(writer: &mut W, message: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame body.
///
/// Returns `Ok(None)` on a clean end of stream before a frame begins.
///
/// # Errors
///
/// Returns [`ProtocolError::Truncated`] if the stream ends inside a frame
/// and [`ProtocolError::TooLarge`] if the announced length is over the limit.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Bytes>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < len_buf.len() {
        let n = reader.read(&mut len_buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(ProtocolError::Truncated);
        }
        filled += n;
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(ProtocolError::TooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut body = vec![0u8; len];
    match reader.read_exact(&mut body).await {
        Ok(_) => Ok(Some(Bytes::from(body))),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(ProtocolError::Truncated),
        Err(e) => Err(e.into()),
    }
}

/// Reads and decodes one message.
///
/// Returns `Ok(None)` on a clean end of stream.
///
/// # Errors
///
/// Returns a framing error or [`ProtocolError::Malformed`] if the frame does
/// not hold a valid message.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Message>>
where
    R: AsyncRead + Unpin,
{
    match read_frame(reader).await? {
        Some(body) => Message::decode_bytes(&body).map(Some),
        None => Ok(None),
    }
}
