use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{FRAME_LEN_SIZE, FrameLen, MAX_FRAME_LEN, msg::Msg};

/// Reads messages off the link with one member of the group.
///
/// Frames land in storage owned by the receiver and aligned for `f32`, so a
/// received data buffer is viewed in place. A message borrows the receiver
/// until the next `recv`.
pub struct OnoReceiver<R: AsyncRead + Unpin> {
    rx: R,
    frame: Vec<u32>,
    max_frame_len: usize,
}

impl<R: AsyncRead + Unpin> OnoReceiver<R> {
    pub(super) fn new(rx: R) -> Self {
        Self {
            rx,
            frame: Vec::new(),
            max_frame_len: MAX_FRAME_LEN,
        }
    }

    /// Lowers the largest frame body this receiver accepts.
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len.min(MAX_FRAME_LEN);
        self
    }

    /// Waits for the next message.
    ///
    /// # Returns
    /// The message, or an error if the stream closed, the frame is over the
    /// limit or its body doesn't decode.
    pub async fn recv(&mut self) -> io::Result<Msg<'_>> {
        let len = self.read_len().await?;

        self.frame.clear();
        self.frame.resize(len.div_ceil(size_of::<u32>()), 0);

        let body = &mut bytemuck::cast_slice_mut::<u32, u8>(&mut self.frame)[..len];
        self.rx.read_exact(body).await?;

        Msg::decode(body)
    }

    async fn read_len(&mut self) -> io::Result<usize> {
        let mut prefix = [0; FRAME_LEN_SIZE];
        self.rx.read_exact(&mut prefix).await?;
        let len = FrameLen::from_be_bytes(prefix);

        usize::try_from(len)
            .ok()
            .filter(|&len| len <= self.max_frame_len)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("frame of {len} bytes is over the {} byte limit", self.max_frame_len),
                )
            })
    }
}
