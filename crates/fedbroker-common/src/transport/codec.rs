use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::envelope::Envelope;
use crate::protocol::error::{BrokerError, Result};

/// Maximum size of a single frame (16 MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Maximum number of frames in one envelope
///
/// An envelope grows by one address frame per routing hop, so even deeply
/// federated deployments stay far below this.
pub const MAX_FRAMES: usize = 64;

/// Reads one envelope from the stream.
///
/// Wire format: `[u32 frame count]` followed by `[u32 length][data]` per
/// frame, all integers big-endian.
///
/// # Errors
///
/// Returns [`BrokerError::ConnectionClosed`] on EOF at a message boundary,
/// [`BrokerError::MalformedMessage`] if the frame count or a frame length
/// exceeds its limit, and an IO error otherwise.
pub async fn read_envelope<R>(stream: &mut R) -> Result<Envelope>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    match stream.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(BrokerError::ConnectionClosed);
        }
        Err(e) => return Err(e.into()),
    }

    let count = u32::from_be_bytes(header) as usize;
    if count == 0 || count > MAX_FRAMES {
        return Err(BrokerError::MalformedMessage(format!(
            "frame count {} outside 1..={}",
            count, MAX_FRAMES
        )));
    }

    let mut frames = Vec::with_capacity(count);
    for _ in 0..count {
        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).await?;
        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_FRAME_SIZE {
            return Err(BrokerError::MalformedMessage(format!(
                "frame of {} bytes exceeds {} byte limit",
                len, MAX_FRAME_SIZE
            )));
        }
        let mut data = vec![0u8; len];
        stream.read_exact(&mut data).await?;
        frames.push(Bytes::from(data));
    }

    Ok(Envelope::from_frames(frames))
}

/// Writes one envelope to the stream and flushes it.
///
/// # Errors
///
/// Returns [`BrokerError::MalformedMessage`] for an empty envelope (the wire
/// format has no representation for zero frames) and an IO error if the write
/// fails.
pub async fn write_envelope<W>(stream: &mut W, envelope: &Envelope) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frames = envelope.frames();
    if frames.is_empty() {
        return Err(BrokerError::MalformedMessage(
            "cannot send an empty envelope".to_string(),
        ));
    }
    if frames.len() > MAX_FRAMES {
        return Err(BrokerError::MalformedMessage(format!(
            "frame count {} outside 1..={}",
            frames.len(),
            MAX_FRAMES
        )));
    }

    stream.write_all(&(frames.len() as u32).to_be_bytes()).await?;
    for frame in frames {
        stream.write_all(&(frame.len() as u32).to_be_bytes()).await?;
        stream.write_all(frame).await?;
    }
    stream.flush().await?;
    Ok(())
}
