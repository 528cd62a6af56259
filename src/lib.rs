//! # partcomm
//!
//! Partitioned MPI process groups with scoped abort localization.
//!
//! This crate manages rank/partition topology for jobs that run many
//! independent simulation replicas inside one allocation, providing:
//! - Deterministic, communication-free splitting of the world group into
//!   equal-sized partitions
//! - A [`Communicator`] façade with safe single-process defaults when no
//!   MPI backend is compiled in
//! - World-wide and partition-local barrier synchronization
//! - Scoped localization of fatal aborts, so an unrecoverable error tears
//!   down one partition instead of the whole job
//!
//! ## Quick Start
//!
//! ```no_run
//! use partcomm::{abort, Communicator};
//!
//! fn main() -> Result<(), partcomm::Error> {
//!     // Split the world into partitions of 4 ranks each
//!     let comm = std::sync::Arc::new(Communicator::with_nrank(4)?);
//!     println!(
//!         "partition {} of {}, local rank {} of {}",
//!         comm.partition(),
//!         comm.num_partitions(),
//!         comm.rank(),
//!         comm.num_ranks()
//!     );
//!
//!     {
//!         // An unrecoverable error in here aborts only this partition
//!         let _scope = abort::scoped_activate(&comm);
//!         comm.barrier();
//!     }
//!
//!     comm.barrier_all();
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description | Requirements |
//! |---------|-------------|--------------|
//! | `mpi`   | Native MPI backend via the C shim | MPICH or OpenMPI at build time |
//!
//! Without the `mpi` feature the crate is pure Rust: every topology query
//! returns the single-process defaults (`num_ranks() == 1`, `rank() == 0`,
//! `partition() == 0`), barriers return immediately, and requesting
//! distributed-only options (`nrank`, external communicators) fails with
//! [`Error::Configuration`].
//!
//! ## Hazards
//!
//! Barriers have no timeout: every member of the target group must issue
//! the same barrier calls in the same order, or the call blocks forever.
//! A mismatched call count across the group is a permanent deadlock, not a
//! recoverable error.

#![warn(missing_docs)]
#![warn(clippy::all)]
// Allow certain pedantic lints for existing code
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod abort;
mod comm;
mod error;
#[cfg(feature = "mpi")]
mod ffi;
pub mod slurm;
pub mod topology;

pub use comm::Communicator;
pub use error::{Error, Result};
pub use topology::{ExternalComm, HandleKind, PartitionMap};

#[cfg(feature = "mpi")]
pub use topology::ProcessTopology;

/// Whether this build carries a distributed (MPI) backend.
///
/// When `false`, every communicator uses the single-process defaults.
pub fn mpi_enabled() -> bool {
    cfg!(feature = "mpi")
}

#[cfg(test)]
mod tests {
    #[test]
    fn capability_flag_matches_build() {
        assert_eq!(super::mpi_enabled(), cfg!(feature = "mpi"));
    }
}
