use std::{
    error::Error,
    fmt::{self, Display},
};

use collective::CollectiveErr;

use crate::{checkpoint::CheckpointErr, provenance::ProvenanceErr};

/// The result type of a training run.
pub type Result<T> = std::result::Result<T, TrainingError>;

/// Why a training run stopped before completing.
///
/// None of these are retried, recovering is an operator action.
#[derive(Debug)]
pub enum TrainingError {
    /// The run configuration can never work.
    Config(String),
    /// The process group didn't form: the join timeout ran out, a member
    /// disagreed on the group or a link dropped before everyone joined.
    RendezvousTimeout(CollectiveErr),
    /// A collective call failed, the whole run is lost.
    CollectiveTransport(CollectiveErr),
    /// Anything else that broke the run: the model, the chain or the checkpoint.
    Runtime(String),
}

impl Display for TrainingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(detail) => write!(f, "invalid configuration: {detail}"),
            Self::RendezvousTimeout(e) => write!(f, "rendezvous failed: {e}"),
            Self::CollectiveTransport(e) => write!(f, "collective failed: {e}"),
            Self::Runtime(detail) => write!(f, "runtime failure: {detail}"),
        }
    }
}

impl Error for TrainingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::RendezvousTimeout(e) | Self::CollectiveTransport(e) => Some(e),
            _ => None,
        }
    }
}

impl TrainingError {
    /// Classifies a failure of the rendezvous, whatever the collective layer
    /// reported it as.
    pub fn rendezvous(err: CollectiveErr) -> Self {
        match err {
            CollectiveErr::InvalidGroup { .. } => Self::Config(err.to_string()),
            other => Self::RendezvousTimeout(other),
        }
    }
}

impl From<CollectiveErr> for TrainingError {
    fn from(value: CollectiveErr) -> Self {
        if value.is_rendezvous() {
            Self::rendezvous(value)
        } else {
            Self::CollectiveTransport(value)
        }
    }
}

impl From<CheckpointErr> for TrainingError {
    fn from(value: CheckpointErr) -> Self {
        Self::Runtime(value.to_string())
    }
}

impl From<ProvenanceErr> for TrainingError {
    fn from(value: ProvenanceErr) -> Self {
        Self::Runtime(value.to_string())
    }
}
