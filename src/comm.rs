//! User-facing communicator façade over the process-group topology.

use std::sync::Arc;

use crate::error::Result;
use crate::topology::ExternalComm;

#[cfg(not(feature = "mpi"))]
use crate::error::Error;
#[cfg(feature = "mpi")]
use crate::topology::ProcessTopology;

/// Process-group provider, negotiated once at construction.
///
/// Call sites never branch on "is MPI available": the provider variant fixes
/// the answer for the communicator's whole lifetime. `None` serves the
/// single-process defaults; the other two wrap a native topology acquired
/// from `MPI_COMM_WORLD` or adopted from a caller-owned communicator.
#[derive(Debug)]
enum GroupProvider {
    /// No distributed backend; single-process defaults.
    #[cfg(not(feature = "mpi"))]
    None,
    /// Native topology rooted at `MPI_COMM_WORLD`.
    #[cfg(feature = "mpi")]
    NativeWorld(ProcessTopology),
    /// Native topology rooted at an adopted foreign communicator.
    #[cfg(feature = "mpi")]
    ExternalAdopted(ProcessTopology),
}

/// A communicator over a distributed process group.
///
/// Manages rank and partition topology for one job. Without the `mpi`
/// feature every query degrades to the single-process defaults (one rank,
/// rank 0, partition 0) and barriers are no-ops.
///
/// # Example
///
/// ```
/// use partcomm::Communicator;
///
/// let comm = Communicator::new()?;
/// println!("rank {} of {}", comm.rank(), comm.num_ranks());
/// # Ok::<(), partcomm::Error>(())
/// ```
///
/// Splitting the world into partitions of 2 ranks each (requires the `mpi`
/// feature and a multi-rank launch):
///
/// ```no_run
/// use partcomm::Communicator;
///
/// let comm = Communicator::with_nrank(2)?;
/// println!("partition {} local rank {}", comm.partition(), comm.rank());
/// # Ok::<(), partcomm::Error>(())
/// ```
#[derive(Debug)]
pub struct Communicator {
    provider: GroupProvider,
}

impl Communicator {
    /// Create a communicator over the world group.
    ///
    /// # Errors
    ///
    /// Fails only when the `mpi` feature is enabled and MPI itself cannot
    /// be brought up.
    pub fn new() -> Result<Self> {
        Self::build(None, None)
    }

    /// Create a communicator and split the world into partitions of `nrank`
    /// ranks each.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`](crate::Error::Configuration) without the
    /// `mpi` feature; [`Error::Partition`](crate::Error::Partition) when
    /// `nrank` does not evenly divide the world size.
    pub fn with_nrank(nrank: i32) -> Result<Self> {
        Self::build(None, Some(nrank))
    }

    /// Create a communicator over a caller-owned communicator.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`](crate::Error::Configuration) without the
    /// `mpi` feature; [`Error::InvalidHandle`](crate::Error::InvalidHandle)
    /// when the reference does not denote a live communicator.
    pub fn from_external(ext: ExternalComm) -> Result<Self> {
        Self::build(Some(ext), None)
    }

    /// Create a communicator over a caller-owned communicator and split it
    /// into partitions of `nrank` ranks each.
    pub fn from_external_nrank(ext: ExternalComm, nrank: i32) -> Result<Self> {
        Self::build(Some(ext), Some(nrank))
    }

    /// Convenience for the abort-scope API, which tracks communicators by
    /// shared reference.
    pub fn new_shared() -> Result<Arc<Self>> {
        Ok(Arc::new(Self::new()?))
    }

    #[cfg(feature = "mpi")]
    fn build(external: Option<ExternalComm>, nrank: Option<i32>) -> Result<Self> {
        let mut topo = match external {
            Some(ext) => ProcessTopology::adopt_external(ext)?,
            None => ProcessTopology::create_world()?,
        };
        if let Some(nrank) = nrank {
            topo.split(nrank)?;
        }
        let provider = match external {
            Some(_) => GroupProvider::ExternalAdopted(topo),
            None => GroupProvider::NativeWorld(topo),
        };
        Ok(Communicator { provider })
    }

    #[cfg(not(feature = "mpi"))]
    fn build(external: Option<ExternalComm>, nrank: Option<i32>) -> Result<Self> {
        if external.is_some() {
            return Err(Error::Configuration(
                "external communicators are not supported in serial builds",
            ));
        }
        if nrank.is_some() {
            return Err(Error::Configuration(
                "the nrank option is only available in MPI builds",
            ));
        }
        Ok(Communicator {
            provider: GroupProvider::None,
        })
    }

    /// Number of ranks in this partition.
    ///
    /// Returns 1 without a distributed backend.
    pub fn num_ranks(&self) -> i32 {
        match &self.provider {
            #[cfg(not(feature = "mpi"))]
            GroupProvider::None => 1,
            #[cfg(feature = "mpi")]
            GroupProvider::NativeWorld(topo) | GroupProvider::ExternalAdopted(topo) => {
                topo.num_ranks()
            }
        }
    }

    /// Rank of this process within its partition.
    ///
    /// Returns 0 without a distributed backend.
    pub fn rank(&self) -> i32 {
        match &self.provider {
            #[cfg(not(feature = "mpi"))]
            GroupProvider::None => 0,
            #[cfg(feature = "mpi")]
            GroupProvider::NativeWorld(topo) | GroupProvider::ExternalAdopted(topo) => topo.rank(),
        }
    }

    /// Partition id of this process.
    ///
    /// Returns 0 without a distributed backend.
    pub fn partition(&self) -> i32 {
        match &self.provider {
            #[cfg(not(feature = "mpi"))]
            GroupProvider::None => 0,
            #[cfg(feature = "mpi")]
            GroupProvider::NativeWorld(topo) | GroupProvider::ExternalAdopted(topo) => {
                topo.partition()
            }
        }
    }

    /// Number of partitions in the job.
    ///
    /// Returns 1 without a distributed backend.
    pub fn num_partitions(&self) -> i32 {
        match &self.provider {
            #[cfg(not(feature = "mpi"))]
            GroupProvider::None => 1,
            #[cfg(feature = "mpi")]
            GroupProvider::NativeWorld(topo) | GroupProvider::ExternalAdopted(topo) => {
                topo.num_partitions()
            }
        }
    }

    /// Total number of ranks in the world group.
    ///
    /// Returns 1 without a distributed backend.
    pub fn world_size(&self) -> i32 {
        match &self.provider {
            #[cfg(not(feature = "mpi"))]
            GroupProvider::None => 1,
            #[cfg(feature = "mpi")]
            GroupProvider::NativeWorld(topo) | GroupProvider::ExternalAdopted(topo) => {
                topo.world_size()
            }
        }
    }

    /// Rank of this process within the world group.
    ///
    /// Returns 0 without a distributed backend.
    pub fn world_rank(&self) -> i32 {
        match &self.provider {
            #[cfg(not(feature = "mpi"))]
            GroupProvider::None => 0,
            #[cfg(feature = "mpi")]
            GroupProvider::NativeWorld(topo) | GroupProvider::ExternalAdopted(topo) => {
                topo.world_rank()
            }
        }
    }

    /// Node-local rank reported by the job launcher, if any.
    ///
    /// Useful for pinning one GPU or NUMA domain per rank before MPI
    /// topology is consulted.
    pub fn node_local_rank(&self) -> Option<i32> {
        crate::slurm::node_local_rank()
    }

    /// Barrier across the entire world group.
    ///
    /// Every rank in the world must call this the same number of times in
    /// the same order or the call blocks forever. No-op without a
    /// distributed backend.
    pub fn barrier_all(&self) {
        match &self.provider {
            #[cfg(not(feature = "mpi"))]
            GroupProvider::None => {}
            #[cfg(feature = "mpi")]
            GroupProvider::NativeWorld(topo) | GroupProvider::ExternalAdopted(topo) => {
                topo.barrier_world();
            }
        }
    }

    /// Barrier across the current partition only.
    ///
    /// Every rank in the partition must call this the same number of times
    /// in the same order or the call blocks forever. No-op without a
    /// distributed backend.
    pub fn barrier(&self) {
        match &self.provider {
            #[cfg(not(feature = "mpi"))]
            GroupProvider::None => {}
            #[cfg(feature = "mpi")]
            GroupProvider::NativeWorld(topo) | GroupProvider::ExternalAdopted(topo) => {
                topo.barrier_partition();
            }
        }
    }

    /// Terminate every process in this communicator's partition.
    ///
    /// This is the unrecoverable-error path, not a normal error return: it
    /// tears down exactly the partition's processes so that other
    /// partitions keep running. Exits the current process without a
    /// distributed backend.
    pub fn abort(&self, errcode: i32) -> ! {
        tracing::error!(errcode, partition = self.partition(), "aborting process group");
        match &self.provider {
            #[cfg(not(feature = "mpi"))]
            GroupProvider::None => std::process::exit(errcode),
            #[cfg(feature = "mpi")]
            GroupProvider::NativeWorld(topo) | GroupProvider::ExternalAdopted(topo) => {
                topo.abort_group(errcode)
            }
        }
    }

    /// Terminate every process in the job, regardless of partitioning.
    pub(crate) fn abort_world(&self, errcode: i32) -> ! {
        match &self.provider {
            #[cfg(not(feature = "mpi"))]
            GroupProvider::None => std::process::exit(errcode),
            #[cfg(feature = "mpi")]
            GroupProvider::NativeWorld(topo) | GroupProvider::ExternalAdopted(topo) => {
                topo.abort_world(errcode)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Multi-rank behavior needs a launcher; run the demos under mpiexec:
    //   cargo build --features mpi --examples
    //   mpiexec -n 4 ./target/debug/examples/hello_partition

    #[test]
    #[cfg(not(feature = "mpi"))]
    fn serial_defaults() {
        let comm = Communicator::new().unwrap();
        assert_eq!(comm.num_ranks(), 1);
        assert_eq!(comm.rank(), 0);
        assert_eq!(comm.partition(), 0);
        assert_eq!(comm.num_partitions(), 1);
        assert_eq!(comm.world_size(), 1);
        assert_eq!(comm.world_rank(), 0);
    }

    #[test]
    #[cfg(not(feature = "mpi"))]
    fn serial_barriers_return_immediately() {
        let comm = Communicator::new().unwrap();
        comm.barrier_all();
        comm.barrier();
        comm.barrier_all();
    }

    #[test]
    #[cfg(not(feature = "mpi"))]
    fn nrank_rejected_without_backend() {
        let err = Communicator::with_nrank(2).unwrap_err();
        assert!(matches!(err, crate::Error::Configuration(_)));
    }

    #[test]
    #[cfg(not(feature = "mpi"))]
    fn external_rejected_without_backend() {
        let mut dummy: u64 = 0;
        let ptr = std::ptr::NonNull::new((&mut dummy as *mut u64).cast()).unwrap();
        let ext = unsafe { ExternalComm::from_ptr(ptr) };
        let err = Communicator::from_external(ext).unwrap_err();
        assert!(matches!(err, crate::Error::Configuration(_)));

        let err = Communicator::from_external_nrank(ext, 2).unwrap_err();
        assert!(matches!(err, crate::Error::Configuration(_)));
    }

    #[test]
    fn shared_constructor_wraps_in_arc() {
        let comm = Communicator::new_shared().unwrap();
        let other = Arc::clone(&comm);
        assert!(Arc::ptr_eq(&comm, &other));
    }
}
