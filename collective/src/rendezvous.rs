use std::{net::SocketAddr, time::Duration};

use comms::{
    OnoReceiver,
    msg::{Command, Msg},
};
use futures::future;
use log::{debug, info, warn};
use tokio::{
    io::AsyncRead,
    net::{
        TcpListener, TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    time,
};

use crate::{CollectiveErr, MASTER_RANK, ProcessGroup, Result, peer::Peer};

/// A process group whose members talk over TCP.
pub type TcpGroup = ProcessGroup<OwnedReadHalf, OwnedWriteHalf>;

const RETRY_DELAY: Duration = Duration::from_millis(200);

/// Joins the process group formed on `endpoint`.
///
/// The master binds `endpoint` and waits for every worker, each worker dials it.
/// The call only returns once all `world_size` members are connected.
///
/// # Arguments
/// * `endpoint` - The `host:port` the master listens on.
/// * `world_size` - The amount of members, master included.
/// * `rank` - This process' rank, `MASTER_RANK` for the master.
/// * `timeout` - How long to wait for the whole group to form.
///
/// # Returns
/// The established group, `RendezvousTimeout` if it didn't form in time or
/// `Membership` if some member disagrees on the group parameters.
pub async fn join(endpoint: &str, world_size: usize, rank: usize, timeout: Duration) -> Result<TcpGroup> {
    TcpGroup::validate(world_size, rank)?;
    info!(rank = rank, world_size = world_size, endpoint = endpoint; "joining process group");

    let rendezvous = async {
        if rank == MASTER_RANK {
            accept_members(endpoint, world_size).await
        } else {
            connect_master(endpoint, world_size, rank).await
        }
    };

    match time::timeout(timeout, rendezvous).await {
        Ok(res) => res,
        Err(_) => {
            warn!(rank = rank; "rendezvous timed out");
            Err(CollectiveErr::RendezvousTimeout { rank, timeout })
        }
    }
}

/// Binds `endpoint` and admits `world_size - 1` workers.
async fn accept_members(endpoint: &str, world_size: usize) -> Result<TcpGroup> {
    let listener = TcpListener::bind(endpoint)
        .await
        .map_err(|source| CollectiveErr::Transport {
            peer: MASTER_RANK,
            source,
        })?;

    let expected = world_size - 1;
    let mut workers: Vec<Peer<OwnedReadHalf, OwnedWriteHalf>> = Vec::with_capacity(expected);

    while workers.len() < expected {
        let (stream, addr) = listener
            .accept()
            .await
            .map_err(|source| CollectiveErr::Transport {
                peer: MASTER_RANK,
                source,
            })?;

        let (rx, tx) = split(stream);
        let (mut rx, mut tx) = comms::channel(rx, tx);

        let rank = match read_join(&mut rx, addr, world_size).await {
            Ok(rank) if workers.iter().any(|peer| peer.rank == rank) => {
                Err(format!("rank {rank} joined twice, the second time from {addr}"))
            }
            res => res,
        };

        let rank = match rank {
            Ok(rank) => rank,
            Err(detail) => {
                warn!("rejecting member from {addr}: {detail}");
                if let Err(e) = tx.send(&Msg::Err(detail.as_str().into())).await {
                    debug!("couldn't tell {addr} why it was rejected: {e}");
                }
                return Err(CollectiveErr::Membership(detail));
            }
        };

        workers.push(Peer::new(rank, rx, tx));
        info!(rank = rank, joined = workers.len(), expected = expected; "member joined from {addr}");
    }

    let welcome = Msg::Control(Command::Welcome { world_size });
    let sends = workers.iter_mut().map(|peer| peer.send(&welcome));
    future::try_join_all(sends).await?;

    Ok(ProcessGroup::root(endpoint.to_string(), workers))
}

/// Reads and validates the `Join` request of a freshly accepted connection.
///
/// # Returns
/// The rank the member claims, or why it can't be admitted.
async fn read_join<R>(
    rx: &mut OnoReceiver<R>,
    addr: SocketAddr,
    world_size: usize,
) -> std::result::Result<usize, String>
where
    R: AsyncRead + Unpin,
{
    match rx.recv().await {
        Ok(Msg::Control(Command::Join {
            rank,
            world_size: theirs,
        })) => {
            if theirs != world_size {
                Err(format!(
                    "member at {addr} expects world size {theirs}, the group has {world_size}"
                ))
            } else if rank == MASTER_RANK || rank >= world_size {
                Err(format!("member at {addr} claims invalid rank {rank}"))
            } else {
                Ok(rank)
            }
        }
        Ok(msg) => Err(format!("member at {addr} sent {} instead of joining", msg.kind())),
        Err(e) => Err(format!("member at {addr} failed while joining: {e}")),
    }
}

/// Dials the master until it answers, then asks to be admitted.
async fn connect_master(endpoint: &str, world_size: usize, rank: usize) -> Result<TcpGroup> {
    let stream = loop {
        match TcpStream::connect(endpoint).await {
            Ok(stream) => break stream,
            Err(e) => {
                debug!(rank = rank; "master not reachable yet: {e}");
                time::sleep(RETRY_DELAY).await;
            }
        }
    };

    let (rx, tx) = split(stream);
    let (rx, tx) = comms::channel(rx, tx);
    let mut master = Peer::new(MASTER_RANK, rx, tx);

    master
        .send(&Msg::Control(Command::Join { rank, world_size }))
        .await?;

    match master.recv().await {
        Ok(Msg::Control(Command::Welcome { world_size: theirs })) if theirs == world_size => {}
        Ok(msg) => {
            return Err(CollectiveErr::Membership(format!(
                "master answered {} to rank {rank}",
                msg.kind()
            )));
        }
        Err(CollectiveErr::Remote { detail, .. }) => {
            return Err(CollectiveErr::Membership(detail));
        }
        Err(e) => return Err(e),
    }

    info!(rank = rank; "admitted into the process group");
    Ok(ProcessGroup::leaf(endpoint.to_string(), world_size, rank, master))
}

fn split(stream: TcpStream) -> (OwnedReadHalf, OwnedWriteHalf) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("couldn't disable nagle: {e}");
    }

    stream.into_split()
}
