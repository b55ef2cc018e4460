use std::{
    error::Error,
    fmt::{self, Display},
    io,
    time::Duration,
};

/// The result type used across the collective module.
pub type Result<T> = std::result::Result<T, CollectiveErr>;

/// Failures of the rendezvous and of every collective call.
#[derive(Debug)]
pub enum CollectiveErr {
    /// The group parameters can never form a valid group.
    InvalidGroup { world_size: usize, rank: usize },
    /// Only the master may be the root of a reduce or broadcast.
    InvalidRoot { root: usize },
    /// Not every member joined within the join timeout.
    RendezvousTimeout { rank: usize, timeout: Duration },
    /// A member tried to join with parameters that don't match the group.
    Membership(String),
    /// The connection with `peer` was lost or failed mid-operation.
    Transport { peer: usize, source: io::Error },
    /// `peer` sent a message that doesn't belong at this point of the protocol.
    Protocol {
        peer: usize,
        expected: String,
        got: &'static str,
    },
    /// `peer` sent a buffer of a different length than the local one.
    LengthMismatch {
        peer: usize,
        expected: usize,
        got: usize,
    },
    /// `peer` reported a failure on its side.
    Remote { peer: usize, detail: String },
}

impl CollectiveErr {
    /// Whether this error came from the rendezvous rather than from a round.
    pub fn is_rendezvous(&self) -> bool {
        matches!(
            self,
            Self::RendezvousTimeout { .. } | Self::Membership(_) | Self::InvalidGroup { .. }
        )
    }
}

impl Display for CollectiveErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidGroup { world_size, rank } => write!(
                f,
                "invalid process group: rank {rank} with world size {world_size}, a group needs a master and at least one worker"
            ),
            Self::InvalidRoot { root } => {
                write!(f, "rank {root} can't be a collective root, only the master can")
            }
            Self::RendezvousTimeout { rank, timeout } => write!(
                f,
                "rank {rank} timed out after {}s waiting for the group to form",
                timeout.as_secs_f64()
            ),
            Self::Membership(detail) => write!(f, "membership mismatch: {detail}"),
            Self::Transport { peer, source } => {
                write!(f, "transport failure with rank {peer}: {source}")
            }
            Self::Protocol {
                peer,
                expected,
                got,
            } => write!(f, "protocol violation by rank {peer}: expected {expected}, got {got}"),
            Self::LengthMismatch {
                peer,
                expected,
                got,
            } => write!(
                f,
                "rank {peer} sent a buffer of length {got}, expected {expected}"
            ),
            Self::Remote { peer, detail } => write!(f, "rank {peer} failed: {detail}"),
        }
    }
}

impl Error for CollectiveErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Transport { source, .. } => Some(source),
            _ => None,
        }
    }
}
