//! Process group membership and the blocking collectives built on top of it.
//!
//! The group is a star: rank 0 (the master) holds one channel per worker and is
//! the only rank allowed to act as root of `reduce_sum` and `broadcast`.

pub mod error;
mod group;
mod memory;
mod peer;
mod rendezvous;


pub use error::{CollectiveErr, Result};
pub use group::{MASTER_RANK, ProcessGroup};
pub use memory::{MemoryGroup, duplex_group};
pub use rendezvous::{TcpGroup, join};
