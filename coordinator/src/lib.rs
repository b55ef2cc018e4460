//! The coordination core of a synchronous data-parallel training run.
//!
//! A `Session` forms the process group, then an `EpochDriver` runs one averaging
//! round per epoch over every buffer of the local model, advances the provenance
//! chain on the master and finally persists a checkpoint.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod model;
pub mod protocol;
pub mod provenance;
pub mod role;
pub mod session;
pub mod status;
pub mod step;
pub mod telemetry;

pub use checkpoint::{Checkpoint, CheckpointErr, CheckpointWriter};
pub use config::RunConfig;
pub use error::{Result, TrainingError};
pub use model::{LocalModel, ModelResult};
pub use protocol::{EpochDriver, TrainingOutcome};
pub use provenance::{ProvenanceChain, ProvenanceLink};
pub use role::{Master, Role, Worker};
pub use session::Session;
pub use status::StatusRecord;
pub use step::RoleStep;
pub use telemetry::{EpochContext, EpochTelemetry};
