use tokio::io::{self, DuplexStream, ReadHalf, WriteHalf};

use crate::{MASTER_RANK, ProcessGroup, Result, peer::Peer};

/// A process group whose members live in the same process, wired with in-memory pipes.
pub type MemoryGroup = ProcessGroup<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

const PIPE_SIZE: usize = 4096;

/// Builds every member of an in-memory group at once.
///
/// # Arguments
/// * `world_size` - The amount of members, master included.
///
/// # Returns
/// The members ordered by rank, the master first.
pub fn duplex_group(world_size: usize) -> Result<Vec<MemoryGroup>> {
    MemoryGroup::validate(world_size, MASTER_RANK)?;

    let mut workers = Vec::with_capacity(world_size - 1);
    let mut leaves = Vec::with_capacity(world_size - 1);

    for rank in 1..world_size {
        let (master_end, worker_end) = io::duplex(PIPE_SIZE);

        let (rx, tx) = io::split(master_end);
        let (rx, tx) = comms::channel(rx, tx);
        workers.push(Peer::new(rank, rx, tx));

        let (rx, tx) = io::split(worker_end);
        let (rx, tx) = comms::channel(rx, tx);
        let master = Peer::new(MASTER_RANK, rx, tx);
        leaves.push(ProcessGroup::leaf("memory".to_string(), world_size, rank, master));
    }

    let mut group = Vec::with_capacity(world_size);
    group.push(ProcessGroup::root("memory".to_string(), workers));
    group.extend(leaves);
    Ok(group)
}
