//! Report rank/partition topology from every process.
//!
//! Single-process:
//! ```sh
//! cargo run --example hello_partition
//! ```
//!
//! Multi-rank with partitions of 2 ranks each:
//! ```sh
//! cargo build --features mpi --examples
//! mpiexec -n 4 ./target/debug/examples/hello_partition 2
//! ```

use partcomm::Communicator;

fn main() -> Result<(), partcomm::Error> {
    let nrank: Option<i32> = std::env::args().nth(1).and_then(|s| s.parse().ok());

    let comm = match nrank {
        Some(n) => Communicator::with_nrank(n)?,
        None => Communicator::new()?,
    };

    println!(
        "world rank {} of {} | partition {} of {} | local rank {} of {}",
        comm.world_rank(),
        comm.world_size(),
        comm.partition(),
        comm.num_partitions(),
        comm.rank(),
        comm.num_ranks()
    );

    if let Some(local) = comm.node_local_rank() {
        println!("node-local rank: {local}");
    }

    comm.barrier_all();
    Ok(())
}
