use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::{FRAME_LEN_SIZE, FrameLen, MAX_FRAME_LEN, msg::Msg};

/// Writes messages onto the link with one member of the group.
///
/// The length prefix, the kind and any control body are staged in a reused
/// buffer. A data buffer goes to the stream straight from the caller's slice.
pub struct OnoSender<W>
where
    W: AsyncWrite + Unpin,
{
    tx: W,
    head: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> OnoSender<W> {
    pub(super) fn new(tx: W) -> Self {
        Self {
            tx,
            head: Vec::new(),
        }
    }

    /// Writes `msg` as a single frame and flushes it.
    ///
    /// # Returns
    /// An `InvalidInput` error if the frame would exceed `MAX_FRAME_LEN`, or the
    /// error of the underlying stream.
    pub async fn send(&mut self, msg: &Msg<'_>) -> io::Result<()> {
        let Self { tx, head } = self;

        head.clear();
        head.resize(FRAME_LEN_SIZE, 0);
        let payload = msg.encode(head)?;

        let body_len = head.len() - FRAME_LEN_SIZE + payload.map_or(0, <[u8]>::len);
        if body_len > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} frame of {body_len} bytes is over the {MAX_FRAME_LEN} byte limit", msg.kind()),
            ));
        }

        head[..FRAME_LEN_SIZE].copy_from_slice(&(body_len as FrameLen).to_be_bytes());
        tx.write_all(head).await?;

        if let Some(payload) = payload {
            tx.write_all(payload).await?;
        }

        tx.flush().await
    }
}
