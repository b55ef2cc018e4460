use comms::{
    OnoReceiver, OnoSender,
    msg::{Command, Msg, Payload},
};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{CollectiveErr, Result};

/// One end of the channel between the master and a single worker.
pub(crate) struct Peer<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub(crate) rank: usize,
    rx: OnoReceiver<R>,
    tx: OnoSender<W>,
}

impl<R, W> Peer<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a new `Peer`.
    ///
    /// # Arguments
    /// * `rank` - The rank of the process at the other end.
    /// * `rx` - The receiving end of the communication.
    /// * `tx` - The sending end of the communication.
    pub(crate) fn new(rank: usize, rx: OnoReceiver<R>, tx: OnoSender<W>) -> Self {
        Self { rank, rx, tx }
    }

    pub(crate) async fn send(&mut self, msg: &Msg<'_>) -> Result<()> {
        let peer = self.rank;
        self.tx
            .send(msg)
            .await
            .map_err(|source| CollectiveErr::Transport { peer, source })
    }

    /// Waits for the next message, turning a remote `Err` into a `CollectiveErr`.
    pub(crate) async fn recv(&mut self) -> Result<Msg<'_>> {
        let peer = self.rank;

        match self.rx.recv().await {
            Ok(Msg::Err(detail)) => Err(CollectiveErr::Remote {
                peer,
                detail: detail.into_owned(),
            }),
            Ok(msg) => Ok(msg),
            Err(source) => Err(CollectiveErr::Transport { peer, source }),
        }
    }

    /// Waits for exactly the `expected` control command.
    pub(crate) async fn expect(&mut self, expected: Command) -> Result<()> {
        let peer = self.rank;

        match self.recv().await? {
            Msg::Control(cmd) if cmd == expected => Ok(()),
            other => Err(CollectiveErr::Protocol {
                peer,
                expected: format!("{expected:?}"),
                got: other.kind(),
            }),
        }
    }

    /// Waits for a data buffer of exactly `len` elements.
    ///
    /// # Returns
    /// A view of the received buffer, valid until the next receive on this peer.
    pub(crate) async fn recv_buffer(&mut self, len: usize) -> Result<&[f32]> {
        let peer = self.rank;

        match self.recv().await? {
            Msg::Data(Payload::Buffer(nums)) if nums.len() == len => Ok(nums),
            Msg::Data(Payload::Buffer(nums)) => Err(CollectiveErr::LengthMismatch {
                peer,
                expected: len,
                got: nums.len(),
            }),
            other => Err(CollectiveErr::Protocol {
                peer,
                expected: "a data buffer".to_string(),
                got: other.kind(),
            }),
        }
    }

    /// Says goodbye and drains the channel until the other end does the same.
    pub(crate) async fn disconnect(&mut self) -> Result<()> {
        self.send(&Msg::Control(Command::Disconnect)).await?;
        while !matches!(self.recv().await?, Msg::Control(Command::Disconnect)) {}
        Ok(())
    }
}
