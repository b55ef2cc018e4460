//! Framed messages over the byte streams that link a process group.
//!
//! A frame is a big endian `u64` body length followed by the body: a big endian
//! `u32` kind and then the kind's payload. Control commands travel as JSON, data
//! buffers as raw native `f32`s that are neither copied on send nor on receive.

pub mod msg;
mod receiver;
mod sender;

use tokio::io::{AsyncRead, AsyncWrite};

pub use receiver::OnoReceiver;
pub use sender::OnoSender;

type FrameLen = u64;
const FRAME_LEN_SIZE: usize = size_of::<FrameLen>();

/// The largest frame body accepted by default.
///
/// A length prefix above it means the stream is out of sync or corrupt.
pub const MAX_FRAME_LEN: usize = 1 << 30;

/// Frames both halves of a stream linking two members of a group.
///
/// # Arguments
/// * `rx` - The half the other member writes into.
/// * `tx` - The half the other member reads from.
///
/// # Returns
/// The receiving and sending ends of the link.
pub fn channel<R, W>(rx: R, tx: W) -> (OnoReceiver<R>, OnoSender<W>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    (OnoReceiver::new(rx), OnoSender::new(tx))
}
