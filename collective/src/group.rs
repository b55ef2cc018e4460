use comms::msg::{Command, Msg, Payload};
use futures::future;
use log::{debug, trace};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{CollectiveErr, Result, peer::Peer};

/// The rank of the coordinating process, the only valid collective root.
pub const MASTER_RANK: usize = 0;

/// The channels a member holds depending on its place in the star.
enum Links<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// The master, holding one peer per worker ordered by rank.
    Root { workers: Vec<Peer<R, W>> },
    /// A worker, holding the peer of the master.
    Leaf { master: Peer<R, W> },
}

/// An established coordination session among `world_size` processes.
///
/// Every collective must be called by all members in the same order, otherwise
/// the group either deadlocks or fails with a protocol error.
pub struct ProcessGroup<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    rank: usize,
    world_size: usize,
    endpoint: String,
    links: Links<R, W>,
    barrier_seq: u64,
}

impl<R, W> ProcessGroup<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates the master's side of a group.
    ///
    /// # Arguments
    /// * `endpoint` - The endpoint the group was formed on.
    /// * `workers` - One peer per worker, in any order.
    pub(crate) fn root(endpoint: String, mut workers: Vec<Peer<R, W>>) -> Self {
        workers.sort_by_key(|peer| peer.rank);

        Self {
            rank: MASTER_RANK,
            world_size: workers.len() + 1,
            endpoint,
            links: Links::Root { workers },
            barrier_seq: 0,
        }
    }

    /// Creates a worker's side of a group.
    ///
    /// # Arguments
    /// * `endpoint` - The endpoint the group was formed on.
    /// * `world_size` - The total amount of members, master included.
    /// * `rank` - This worker's rank.
    /// * `master` - The peer of the master.
    pub(crate) fn leaf(endpoint: String, world_size: usize, rank: usize, master: Peer<R, W>) -> Self {
        Self {
            rank,
            world_size,
            endpoint,
            links: Links::Leaf { master },
            barrier_seq: 0,
        }
    }

    /// Checks the group parameters before doing any I/O.
    pub(crate) fn validate(world_size: usize, rank: usize) -> Result<()> {
        if world_size < 2 || rank >= world_size {
            return Err(CollectiveErr::InvalidGroup { world_size, rank });
        }

        Ok(())
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn world_size(&self) -> usize {
        self.world_size
    }

    /// The amount of training members, the master excluded.
    pub fn workers(&self) -> usize {
        self.world_size - 1
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_master(&self) -> bool {
        self.rank == MASTER_RANK
    }

    /// Blocks until every member of the group has called `barrier`.
    ///
    /// Each call carries a sequence number, so members that diverged on the amount
    /// of barriers they went through fail with a protocol error instead of pairing
    /// unrelated rounds.
    ///
    /// # Returns
    /// A `CollectiveErr` if any connection fails or the protocol is violated.
    pub async fn barrier(&mut self) -> Result<()> {
        self.barrier_seq += 1;
        let seq = self.barrier_seq;

        match &mut self.links {
            Links::Root { workers } => {
                let arrivals = workers
                    .iter_mut()
                    .map(|peer| peer.expect(Command::Barrier { seq }));
                future::try_join_all(arrivals).await?;

                let msg = Msg::Control(Command::Release { seq });
                let releases = workers.iter_mut().map(|peer| peer.send(&msg));
                future::try_join_all(releases).await?;
            }
            Links::Leaf { master } => {
                master.send(&Msg::Control(Command::Barrier { seq })).await?;
                master.expect(Command::Release { seq }).await?;
            }
        }

        trace!(rank = self.rank, seq = seq; "barrier released");
        Ok(())
    }

    /// Sums `buf` elementwise across all members into the root's `buf`.
    ///
    /// Non-root buffers are left untouched, callers must not rely on their value
    /// until the following `broadcast` overwrites them.
    ///
    /// # Arguments
    /// * `buf` - This member's contribution, and the result on the root.
    /// * `root` - The receiving rank, must be `MASTER_RANK`.
    ///
    /// # Returns
    /// A `CollectiveErr` if any connection fails, a worker's buffer length differs
    /// from the root's, or `root` isn't the master.
    pub async fn reduce_sum(&mut self, buf: &mut [f32], root: usize) -> Result<()> {
        Self::check_root(root)?;

        match &mut self.links {
            Links::Root { workers } => {
                let len = buf.len();
                let contributions = workers.iter_mut().map(|peer| peer.recv_buffer(len));
                let contributions = future::try_join_all(contributions).await?;

                // Rank order keeps the sum bit-for-bit reproducible.
                for contribution in contributions {
                    for (acc, x) in buf.iter_mut().zip(contribution) {
                        *acc += *x;
                    }
                }
            }
            Links::Leaf { master } => {
                master.send(&Msg::Data(Payload::Buffer(buf))).await?;
            }
        }

        trace!(rank = self.rank, len = buf.len(); "reduce finished");
        Ok(())
    }

    /// Replicates the root's `buf` into every member's `buf`.
    ///
    /// # Arguments
    /// * `buf` - The value to send on the root, the destination everywhere else.
    /// * `root` - The sending rank, must be `MASTER_RANK`.
    ///
    /// # Returns
    /// A `CollectiveErr` if any connection fails, the lengths differ, or `root`
    /// isn't the master.
    pub async fn broadcast(&mut self, buf: &mut [f32], root: usize) -> Result<()> {
        Self::check_root(root)?;

        match &mut self.links {
            Links::Root { workers } => {
                let msg = Msg::Data(Payload::Buffer(buf));
                let sends = workers.iter_mut().map(|peer| peer.send(&msg));
                future::try_join_all(sends).await?;
            }
            Links::Leaf { master } => {
                let nums = master.recv_buffer(buf.len()).await?;
                buf.copy_from_slice(nums);
            }
        }

        trace!(rank = self.rank, len = buf.len(); "broadcast finished");
        Ok(())
    }

    /// Tears the group down, waiting for every peer to acknowledge.
    ///
    /// # Returns
    /// A `CollectiveErr` if any connection fails before the goodbye completes.
    pub async fn disconnect(mut self) -> Result<()> {
        match &mut self.links {
            Links::Root { workers } => {
                let goodbyes = workers.iter_mut().map(|peer| peer.disconnect());
                future::try_join_all(goodbyes).await?;
            }
            Links::Leaf { master } => master.disconnect().await?,
        }

        debug!(rank = self.rank; "disconnected from the group");
        Ok(())
    }

    fn check_root(root: usize) -> Result<()> {
        if root != MASTER_RANK {
            return Err(CollectiveErr::InvalidRoot { root });
        }

        Ok(())
    }
}
