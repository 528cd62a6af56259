//! Scoped localization of fatal aborts to a communicator's partition.
//!
//! An unrecoverable error tears down a whole process group. By default that
//! group is the world — the safe choice for non-partitioned runs, where
//! every rank is doing the same work anyway. Jobs running independent
//! replicas in partitions instead wrap each replica's risky region in
//! [`scoped_activate`], so a fatal error aborts only that partition's ranks
//! and leaves the other replicas running.
//!
//! The active communicator forms a strict LIFO stack per flow of control.
//! The stack is thread-local and the guard is not `Send`, so exactly one
//! flow owns it. The bottom entry is implicitly the world group and is
//! never popped.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::warn;

use crate::comm::Communicator;
use crate::error::{Error, Result};

thread_local! {
    static ACTIVE: RefCell<Vec<Arc<Communicator>>> = const { RefCell::new(Vec::new()) };
}

/// The communicator responsible for fatal aborts at this instant.
#[derive(Clone)]
pub enum ActiveGroup {
    /// No scope is active; a fatal abort tears down the entire job.
    World,
    /// A scoped communicator; a fatal abort tears down its partition only.
    Scoped(Arc<Communicator>),
}

impl ActiveGroup {
    /// True when no scope is active.
    pub fn is_world(&self) -> bool {
        matches!(self, ActiveGroup::World)
    }
}

/// The currently active communicator for this flow of control.
pub fn current() -> ActiveGroup {
    ACTIVE.with(|stack| match stack.borrow().last() {
        Some(comm) => ActiveGroup::Scoped(Arc::clone(comm)),
        None => ActiveGroup::World,
    })
}

/// Install `comm` as the active communicator until the returned guard is
/// released.
///
/// The previously active communicator is restored when the guard drops —
/// through normal completion, early return, or a failure propagating out of
/// the protected region. Scopes may nest; each guard restores what was
/// active when it was created.
///
/// # Example
///
/// ```
/// use partcomm::{abort, Communicator};
///
/// let replica = Communicator::new_shared()?;
/// {
///     let _scope = abort::scoped_activate(&replica);
///     // a fatal error in here aborts only `replica`'s partition
/// }
/// assert!(abort::current().is_world());
/// # Ok::<(), partcomm::Error>(())
/// ```
pub fn scoped_activate(comm: &Arc<Communicator>) -> AbortScope {
    let depth = ACTIVE.with(|stack| {
        let mut stack = stack.borrow_mut();
        stack.push(Arc::clone(comm));
        stack.len()
    });
    AbortScope {
        depth,
        _not_send: PhantomData,
    }
}

/// Guard for one abort-localization scope.
///
/// Restores the previously active communicator when dropped, on every exit
/// path. [`exit`](Self::exit) additionally reports whether the scope was
/// still the innermost one.
#[must_use = "the scope ends as soon as the guard is dropped"]
pub struct AbortScope {
    /// Stack depth of this scope's entry (1-based).
    depth: usize,
    /// The stack is thread-local; the guard must not migrate.
    _not_send: PhantomData<*mut ()>,
}

impl AbortScope {
    /// Exit the scope, failing if it is not the innermost one.
    ///
    /// The restore still happens either way; the error only reports the
    /// discipline violation.
    pub fn exit(self) -> Result<()> {
        let in_order = ACTIVE.with(|stack| stack.borrow().len() == self.depth);
        drop(self);
        if in_order {
            Ok(())
        } else {
            Err(Error::StackDiscipline)
        }
    }
}

impl Drop for AbortScope {
    fn drop(&mut self) {
        ACTIVE.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.len() != self.depth {
                warn!(
                    expected = self.depth,
                    found = stack.len(),
                    "abort scope exited out of LIFO order"
                );
            }
            // Restore to the state before this scope was entered even if
            // inner scopes were leaked or exited out of order.
            stack.truncate(self.depth - 1);
        });
    }
}

/// Terminate the group owned by the currently active communicator.
///
/// With no active scope this aborts every process in the job. This is the
/// end of the road for unrecoverable errors, not a normal error return.
pub fn fatal_abort(errcode: i32) -> ! {
    match current() {
        ActiveGroup::Scoped(comm) => comm.abort(errcode),
        ActiveGroup::World => {
            tracing::error!(errcode, "aborting entire job (no active abort scope)");
            match Communicator::new() {
                Ok(world) => world.abort_world(errcode),
                Err(_) => std::process::exit(errcode),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_active_group_is_world() {
        assert!(current().is_world());
    }

    #[test]
    fn scope_restores_on_normal_exit() {
        let comm = Communicator::new_shared().unwrap();
        {
            let _scope = scoped_activate(&comm);
            match current() {
                ActiveGroup::Scoped(active) => assert!(Arc::ptr_eq(&active, &comm)),
                ActiveGroup::World => panic!("scope not active"),
            }
        }
        assert!(current().is_world());
    }

    #[test]
    fn scope_restores_when_error_propagates() {
        fn risky(comm: &Arc<Communicator>) -> Result<()> {
            let _scope = scoped_activate(comm);
            Err(Error::InvalidHandle)
        }

        let comm = Communicator::new_shared().unwrap();
        assert!(risky(&comm).is_err());
        assert!(current().is_world());
    }

    #[test]
    fn scope_restores_when_panic_unwinds() {
        let comm = Communicator::new_shared().unwrap();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scope = scoped_activate(&comm);
            panic!("boom");
        }));
        assert!(result.is_err());
        assert!(current().is_world());
    }

    #[test]
    fn nested_scopes_restore_in_order() {
        let a = Communicator::new_shared().unwrap();
        let b = Communicator::new_shared().unwrap();

        let scope_a = scoped_activate(&a);
        {
            let _scope_b = scoped_activate(&b);
            match current() {
                ActiveGroup::Scoped(active) => assert!(Arc::ptr_eq(&active, &b)),
                ActiveGroup::World => panic!("scope not active"),
            }
        }
        // B's exit restores A
        match current() {
            ActiveGroup::Scoped(active) => assert!(Arc::ptr_eq(&active, &a)),
            ActiveGroup::World => panic!("scope not active"),
        }
        drop(scope_a);
        assert!(current().is_world());
    }

    #[test]
    fn explicit_exit_in_order_succeeds() {
        let comm = Communicator::new_shared().unwrap();
        let scope = scoped_activate(&comm);
        assert!(scope.exit().is_ok());
        assert!(current().is_world());
    }

    #[test]
    fn out_of_order_exit_is_reported_and_still_restores() {
        let a = Communicator::new_shared().unwrap();
        let b = Communicator::new_shared().unwrap();

        let scope_a = scoped_activate(&a);
        let scope_b = scoped_activate(&b);

        // exit A while B is still active
        let err = scope_a.exit().unwrap_err();
        assert!(matches!(err, Error::StackDiscipline));
        // A's exit truncated the stack below B; B's drop is a no-op restore
        drop(scope_b);
        assert!(current().is_world());
    }

    #[test]
    fn reentering_after_exit_works() {
        let comm = Communicator::new_shared().unwrap();
        for _ in 0..3 {
            let _scope = scoped_activate(&comm);
            assert!(!current().is_world());
        }
        assert!(current().is_world());
    }
}
