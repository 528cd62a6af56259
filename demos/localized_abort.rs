//! Localize fatal aborts to one partition.
//!
//! Each partition runs an independent replica. With `PARTCOMM_DEMO_FAIL`
//! set, partition 0 hits a simulated unrecoverable error inside its abort
//! scope and only that partition's ranks are torn down; the other
//! partitions finish normally.
//!
//! ```sh
//! cargo build --features mpi --examples
//! mpiexec -n 4 ./target/debug/examples/localized_abort 2
//! PARTCOMM_DEMO_FAIL=1 mpiexec -n 4 ./target/debug/examples/localized_abort 2
//! ```

use std::sync::Arc;

use partcomm::{abort, Communicator};

fn run_replica(comm: &Arc<Communicator>) -> partcomm::Result<()> {
    let _scope = abort::scoped_activate(comm);

    if std::env::var("PARTCOMM_DEMO_FAIL").is_ok() && comm.partition() == 0 {
        // Tears down partition 0 only; the scope makes it the abort target.
        abort::fatal_abort(1);
    }

    // replica work would go here
    comm.barrier();
    Ok(())
}

fn main() -> partcomm::Result<()> {
    tracing_subscriber::fmt::init();

    let nrank: Option<i32> = std::env::args().nth(1).and_then(|s| s.parse().ok());
    let comm = Arc::new(match nrank {
        Some(n) => Communicator::with_nrank(n)?,
        None => Communicator::new()?,
    });

    println!("partition {}: starting replica", comm.partition());
    run_replica(&comm)?;
    println!(
        "partition {}: replica done, abort target is the world again: {}",
        comm.partition(),
        abort::current().is_world()
    );
    Ok(())
}
