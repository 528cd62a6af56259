//! Process-group topology: partition arithmetic and native handle management.
//!
//! [`PartitionMap`] is the communication-free core of the split operation and
//! compiles in every build, so its properties are checkable without an MPI
//! backend. [`ProcessTopology`] wraps the native handles and only exists when
//! the `mpi` feature is enabled.

use std::os::raw::c_void;
use std::ptr::NonNull;

use crate::error::{Error, Result};

/// Origin of a process-group handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    /// The world group covering every rank in the job.
    World,
    /// A group adopted from a caller-owned MPI library.
    External,
    /// A partition derived by splitting the world group.
    Split,
}

/// Deterministic mapping of world ranks to equal-sized partitions.
///
/// Every rank computes the same mapping from its own rank alone:
/// `partition = rank / nrank`, `local = rank % nrank`. No coordination
/// round-trip is needed, but that is only safe if the divisibility
/// precondition reaches the same verdict on every rank — so the check lives
/// here, ahead of any collective call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionMap {
    world_size: i32,
    nrank: i32,
}

impl PartitionMap {
    /// Map `world_size` ranks into contiguous blocks of `nrank`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Partition`] when `nrank` is not a positive divisor
    /// of `world_size`.
    pub fn new(world_size: i32, nrank: i32) -> Result<Self> {
        if nrank <= 0 || world_size <= 0 || world_size % nrank != 0 {
            return Err(Error::Partition { world_size, nrank });
        }
        Ok(PartitionMap { world_size, nrank })
    }

    /// Number of ranks in every partition.
    pub fn nrank(&self) -> i32 {
        self.nrank
    }

    /// Total number of ranks in the world group.
    pub fn world_size(&self) -> i32 {
        self.world_size
    }

    /// Number of partitions.
    pub fn partition_count(&self) -> i32 {
        self.world_size / self.nrank
    }

    /// Partition owning a world rank.
    pub fn partition_of(&self, world_rank: i32) -> i32 {
        world_rank / self.nrank
    }

    /// Rank of a world rank within its partition.
    pub fn local_rank_of(&self, world_rank: i32) -> i32 {
        world_rank % self.nrank
    }
}

/// Reference to a communicator owned by foreign code, e.g. another MPI
/// binding loaded in the same process.
///
/// The pointer path is [`ExternalComm::from_ptr`]; [`ExternalComm::from_address`]
/// is a deliberately narrow compatibility shim for callers that only hold the
/// integer address of an `MPI_Comm`. Both constructors are `unsafe`: adoption
/// dereferences the address to probe the communicator, and the probe can
/// reject a dead or mistyped object with [`Error::InvalidHandle`] only after
/// that read — nothing can make the read itself safe for a dangling address.
#[derive(Debug, Clone, Copy)]
pub struct ExternalComm {
    addr: u64,
}

impl ExternalComm {
    /// Reference a live `MPI_Comm` object by pointer.
    ///
    /// # Safety
    ///
    /// `ptr` must point at an `MPI_Comm` object that stays alive for as
    /// long as any communicator adopted from it. Adoption reads through the
    /// pointer; a dangling (even non-null) pointer is undefined behavior.
    pub unsafe fn from_ptr(ptr: NonNull<c_void>) -> Self {
        ExternalComm {
            addr: ptr.as_ptr() as u64,
        }
    }

    /// Compatibility shim: reference an `MPI_Comm` by its integer address.
    ///
    /// # Safety
    ///
    /// `addr` must be the address of an `MPI_Comm` object that stays alive
    /// for as long as any communicator adopted from it.
    pub unsafe fn from_address(addr: usize) -> Self {
        ExternalComm { addr: addr as u64 }
    }

    pub(crate) fn address(&self) -> u64 {
        self.addr
    }
}

#[cfg(feature = "mpi")]
mod native {
    use std::marker::PhantomData;

    use tracing::{debug, warn};

    use super::{ExternalComm, HandleKind, PartitionMap};
    use crate::error::{Error, Result};
    use crate::ffi;

    /// Owned handle to a native process group.
    ///
    /// Immutable after construction. Derived groups release their shim id on
    /// drop; the world handle is permanent.
    #[derive(Debug)]
    pub(crate) struct CommHandle {
        raw: i32,
        kind: HandleKind,
        size: i32,
        rank: i32,
        /// MPI communicators are not thread-safe
        _marker: PhantomData<*mut ()>,
    }

    impl CommHandle {
        fn from_raw(raw: i32, kind: HandleKind) -> Result<Self> {
            let mut size: i32 = 0;
            let mut rank: i32 = 0;
            Error::check(unsafe { ffi::partcomm_comm_size(raw, &mut size) })?;
            Error::check(unsafe { ffi::partcomm_comm_rank(raw, &mut rank) })?;
            Ok(CommHandle {
                raw,
                kind,
                size,
                rank,
                _marker: PhantomData,
            })
        }

        pub(crate) fn size(&self) -> i32 {
            self.size
        }

        pub(crate) fn rank(&self) -> i32 {
            self.rank
        }

        pub(crate) fn barrier(&self) {
            let ret = unsafe { ffi::partcomm_barrier(self.raw) };
            if ret != 0 {
                warn!(handle = self.raw, code = ret, "barrier failed");
            }
        }

        pub(crate) fn abort(&self, errcode: i32) -> ! {
            unsafe { ffi::partcomm_abort(self.raw, errcode) };
            // MPI_Abort should never return; make sure we still die
            std::process::abort();
        }
    }

    impl Drop for CommHandle {
        fn drop(&mut self) {
            if self.kind != HandleKind::World {
                unsafe { ffi::partcomm_comm_free(self.raw) };
            }
        }
    }

    /// Native process-group topology: the world (or adopted) group, plus an
    /// optional partition derived from it by [`split`](Self::split).
    #[derive(Debug)]
    pub struct ProcessTopology {
        world: CommHandle,
        partition: Option<(PartitionMap, CommHandle)>,
    }

    impl ProcessTopology {
        /// Acquire the world group, initializing MPI on first use.
        pub fn create_world() -> Result<Self> {
            let raw = unsafe { ffi::partcomm_comm_world() };
            if raw < 0 {
                return Err(Error::Mpi(1));
            }
            let world = CommHandle::from_raw(raw, HandleKind::World)?;
            debug!(
                world_size = world.size(),
                world_rank = world.rank(),
                "created world topology"
            );
            Ok(ProcessTopology {
                world,
                partition: None,
            })
        }

        /// Adopt a caller-owned communicator as the world group.
        ///
        /// # Errors
        ///
        /// Returns [`Error::InvalidHandle`] when the reference does not
        /// denote a live, correctly typed communicator.
        pub fn adopt_external(ext: ExternalComm) -> Result<Self> {
            if ext.address() == 0 {
                return Err(Error::InvalidHandle);
            }
            let mut raw: i32 = -1;
            Error::check(unsafe { ffi::partcomm_comm_adopt(ext.address(), &mut raw) })?;
            let world = CommHandle::from_raw(raw, HandleKind::External)?;
            debug!(
                world_size = world.size(),
                world_rank = world.rank(),
                "adopted external communicator"
            );
            Ok(ProcessTopology {
                world,
                partition: None,
            })
        }

        /// Split the world group into partitions of `nrank` ranks each.
        ///
        /// The divisibility precondition is pure local arithmetic evaluated
        /// before the collective split, so every rank reaches the same
        /// accept/reject verdict. On error the world handle is untouched.
        pub fn split(&mut self, nrank: i32) -> Result<()> {
            if self.partition.is_some() {
                return Err(Error::Configuration("topology is already partitioned"));
            }
            let map = PartitionMap::new(self.world.size(), nrank)?;
            let color = map.partition_of(self.world.rank());
            let key = map.local_rank_of(self.world.rank());
            let mut raw: i32 = -1;
            Error::check(unsafe {
                ffi::partcomm_comm_split(self.world.raw, color, key, &mut raw)
            })?;
            let handle = CommHandle::from_raw(raw, HandleKind::Split)?;
            debug!(
                partition = color,
                local_rank = key,
                partitions = map.partition_count(),
                "split world into partitions"
            );
            self.partition = Some((map, handle));
            Ok(())
        }

        /// Number of ranks in the current partition (the whole world when
        /// unpartitioned).
        pub fn num_ranks(&self) -> i32 {
            match &self.partition {
                Some((map, _)) => map.nrank(),
                None => self.world.size(),
            }
        }

        /// Rank of this process within its partition.
        pub fn rank(&self) -> i32 {
            match &self.partition {
                Some((_, handle)) => handle.rank(),
                None => self.world.rank(),
            }
        }

        /// Partition id of this process.
        pub fn partition(&self) -> i32 {
            match &self.partition {
                Some((map, _)) => map.partition_of(self.world.rank()),
                None => 0,
            }
        }

        /// Number of partitions.
        pub fn num_partitions(&self) -> i32 {
            match &self.partition {
                Some((map, _)) => map.partition_count(),
                None => 1,
            }
        }

        /// Total number of ranks in the world group.
        pub fn world_size(&self) -> i32 {
            self.world.size()
        }

        /// Rank of this process within the world group.
        pub fn world_rank(&self) -> i32 {
            self.world.rank()
        }

        /// Block until every rank in the world group arrives.
        pub fn barrier_world(&self) {
            self.world.barrier();
        }

        /// Block until every rank in the current partition arrives.
        pub fn barrier_partition(&self) {
            match &self.partition {
                Some((_, handle)) => handle.barrier(),
                None => self.world.barrier(),
            }
        }

        /// Tear down the current partition's group (the whole world when
        /// unpartitioned). Does not return.
        pub(crate) fn abort_group(&self, errcode: i32) -> ! {
            match &self.partition {
                Some((_, handle)) => handle.abort(errcode),
                None => self.world.abort(errcode),
            }
        }

        /// Tear down the entire world group. Does not return.
        pub(crate) fn abort_world(&self, errcode: i32) -> ! {
            self.world.abort(errcode)
        }
    }
}

#[cfg(feature = "mpi")]
pub use native::ProcessTopology;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_eight_by_four() {
        let map = PartitionMap::new(8, 4).unwrap();
        assert_eq!(map.partition_count(), 2);
        // ranks 0-3 form partition 0, ranks 4-7 form partition 1
        assert_eq!(map.partition_of(3), 0);
        assert_eq!(map.partition_of(4), 1);
        assert_eq!(map.partition_of(5), 1);
        assert_eq!(map.local_rank_of(5), 1);
    }

    #[test]
    fn split_six_by_four_fails() {
        let err = PartitionMap::new(6, 4).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Partition {
                world_size: 6,
                nrank: 4
            }
        ));
    }

    #[test]
    fn degenerate_sizes_fail() {
        assert!(PartitionMap::new(8, 0).is_err());
        assert!(PartitionMap::new(8, -2).is_err());
        assert!(PartitionMap::new(0, 1).is_err());
    }

    #[test]
    fn every_rank_maps_to_exactly_one_partition() {
        for &(w, n) in &[(8, 4), (12, 3), (6, 6), (6, 1), (16, 2)] {
            let map = PartitionMap::new(w, n).unwrap();
            assert_eq!(map.partition_count(), w / n);

            let mut per_partition = vec![0; map.partition_count() as usize];
            for rank in 0..w {
                let p = map.partition_of(rank);
                let local = map.local_rank_of(rank);
                assert!((0..map.partition_count()).contains(&p));
                assert!((0..n).contains(&local), "local rank out of range");
                // block layout: world rank reconstructs from (partition, local)
                assert_eq!(p * n + local, rank);
                per_partition[p as usize] += 1;
            }
            assert!(per_partition.iter().all(|&count| count == n));
        }
    }

    #[test]
    fn partitions_are_numbered_in_rank_order() {
        let map = PartitionMap::new(12, 4).unwrap();
        let ids: Vec<i32> = (0..12).map(|r| map.partition_of(r)).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn whole_world_is_a_single_partition() {
        let map = PartitionMap::new(4, 4).unwrap();
        assert_eq!(map.partition_count(), 1);
        for rank in 0..4 {
            assert_eq!(map.partition_of(rank), 0);
            assert_eq!(map.local_rank_of(rank), rank);
        }
    }

    #[test]
    fn external_comm_from_ptr_records_address() {
        let mut dummy: u64 = 0;
        let ptr = std::ptr::NonNull::new((&mut dummy as *mut u64).cast()).unwrap();
        let ext = unsafe { ExternalComm::from_ptr(ptr) };
        assert_ne!(ext.address(), 0);
        assert_eq!(ext.address(), &dummy as *const u64 as u64);
    }

    #[test]
    fn external_comm_from_address_is_passthrough() {
        let ext = unsafe { ExternalComm::from_address(0xdead_beef) };
        assert_eq!(ext.address(), 0xdead_beef);
    }
}
