//! Error types for partcomm

use thiserror::Error;

/// Result type for process-group operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for process-group operations
#[derive(Error, Debug)]
pub enum Error {
    /// Distributed features requested in an unsupported configuration,
    /// typically a build without an MPI backend
    #[error("unsupported configuration: {0}")]
    Configuration(&'static str),

    /// Partition size does not evenly divide the world size
    #[error("world size {world_size} is not a multiple of partition size {nrank}")]
    Partition {
        /// Number of ranks in the world group
        world_size: i32,
        /// Requested ranks per partition
        nrank: i32,
    },

    /// Externally supplied reference is not a live process-group handle
    #[error("invalid external communicator reference")]
    InvalidHandle,

    /// Abort scope exited out of LIFO order
    #[error("abort scope exited out of LIFO order")]
    StackDiscipline,

    /// The C shim's process-group handle registry is exhausted
    #[error("process-group handle registry exhausted")]
    RegistryFull,

    /// MPI error reported by the backend
    #[error("MPI error (code {0})")]
    Mpi(i32),
}

impl Error {
    /// Create an error from a C-shim return code.
    ///
    /// Must not be called with the success code (0).
    pub(crate) fn from_code(code: i32) -> Self {
        debug_assert_ne!(code, 0, "from_code called with success code");
        match code {
            // PARTCOMM_ERR_INVALID
            2 => Error::InvalidHandle,
            // PARTCOMM_ERR_NOSLOT
            3 => Error::RegistryFull,
            _ => Error::Mpi(code),
        }
    }

    /// Check a C-shim return code, returning Ok(()) for success.
    #[cfg_attr(not(feature = "mpi"), allow(dead_code))]
    pub(crate) fn check(code: i32) -> Result<()> {
        if code == 0 {
            Ok(())
        } else {
            Err(Error::from_code(code))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shim_codes_map_to_variants() {
        assert!(matches!(Error::from_code(2), Error::InvalidHandle));
        assert!(matches!(Error::from_code(3), Error::RegistryFull));
        assert!(matches!(Error::from_code(1), Error::Mpi(1)));
        assert!(matches!(Error::from_code(7), Error::Mpi(7)));
    }

    #[test]
    fn registry_exhaustion_is_not_reported_as_mpi_failure() {
        let msg = Error::from_code(3).to_string();
        assert!(msg.contains("registry exhausted"));
        assert!(!msg.contains("MPI error"));
    }

    #[test]
    fn check_passes_success_through() {
        assert!(Error::check(0).is_ok());
        assert!(Error::check(1).is_err());
    }

    #[test]
    fn partition_error_names_both_sizes() {
        let err = Error::Partition {
            world_size: 6,
            nrank: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains('6'));
        assert!(msg.contains('4'));
    }
}
