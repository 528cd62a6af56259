//! Job-launcher environment helpers.
//!
//! These functions read scheduler and MPI-launcher environment variables to
//! determine job topology before (or without) consulting MPI itself. They
//! return `None` when the variable is not set (e.g., when not running under
//! a launcher).
//!
//! # Environment Variables
//!
//! | Function | Variable | Description |
//! |----------|----------|-------------|
//! | `job_id()` | `SLURM_JOB_ID` | Unique job identifier |
//! | `num_nodes()` | `SLURM_NNODES` | Total number of nodes |
//! | `tasks_per_node()` | `SLURM_NTASKS_PER_NODE` | Number of tasks on this node |
//! | `node_local_rank()` | `SLURM_LOCALID`, `OMPI_COMM_WORLD_LOCAL_RANK`, `MV2_COMM_WORLD_LOCAL_RANK` | Rank relative to this node |

use std::env;

/// Check if running under the SLURM job scheduler.
pub fn is_slurm_job() -> bool {
    env::var("SLURM_JOB_ID").is_ok()
}

/// Get the SLURM job ID.
pub fn job_id() -> Option<String> {
    env::var("SLURM_JOB_ID").ok()
}

/// Get the total number of nodes allocated.
pub fn num_nodes() -> Option<i32> {
    env::var("SLURM_NNODES").ok().and_then(|s| s.parse().ok())
}

/// Get the number of tasks per node.
pub fn tasks_per_node() -> Option<i32> {
    env::var("SLURM_NTASKS_PER_NODE")
        .ok()
        .and_then(|s| s.parse().ok())
        .or_else(|| {
            // Fallback: parse first entry of SLURM_TASKS_PER_NODE (format: "4(x2)")
            env::var("SLURM_TASKS_PER_NODE")
                .ok()
                .and_then(|s| s.split('(').next().and_then(|n| n.parse().ok()))
        })
}

/// Get the node-local rank of this process.
///
/// Checks the variables exported by SLURM, Open MPI and MVAPICH2 launchers
/// in that order. Typically used to bind one GPU or NUMA domain per rank.
pub fn node_local_rank() -> Option<i32> {
    for var in [
        "SLURM_LOCALID",
        "OMPI_COMM_WORLD_LOCAL_RANK",
        "MV2_COMM_WORLD_LOCAL_RANK",
    ] {
        if let Some(rank) = env::var(var).ok().and_then(|s| s.parse().ok()) {
            return Some(rank);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests that mutate environment variables are combined into a single test
    /// to avoid data races when tests run in parallel. `env::set_var` and
    /// `env::remove_var` are not thread-safe — multiple tests touching the same
    /// env vars concurrently will produce flaky results.
    #[test]
    fn launcher_env_var_parsing() {
        // --- tasks_per_node: parses SLURM_TASKS_PER_NODE "4(x2)" format ---
        env::set_var("SLURM_TASKS_PER_NODE", "4(x2)");
        env::remove_var("SLURM_NTASKS_PER_NODE");
        assert_eq!(tasks_per_node(), Some(4));

        // --- tasks_per_node: SLURM_NTASKS_PER_NODE takes priority ---
        env::set_var("SLURM_NTASKS_PER_NODE", "8");
        assert_eq!(tasks_per_node(), Some(8));

        // --- tasks_per_node: returns None when neither var is set ---
        env::remove_var("SLURM_NTASKS_PER_NODE");
        env::remove_var("SLURM_TASKS_PER_NODE");
        assert_eq!(tasks_per_node(), None);

        // --- is_slurm_job: detects SLURM_JOB_ID ---
        env::set_var("SLURM_JOB_ID", "12345");
        assert!(is_slurm_job());
        assert_eq!(job_id(), Some("12345".to_string()));
        env::remove_var("SLURM_JOB_ID");

        // --- num_nodes: parses SLURM_NNODES ---
        env::set_var("SLURM_NNODES", "16");
        assert_eq!(num_nodes(), Some(16));
        env::remove_var("SLURM_NNODES");

        // --- node_local_rank: SLURM takes priority over Open MPI ---
        env::set_var("SLURM_LOCALID", "2");
        env::set_var("OMPI_COMM_WORLD_LOCAL_RANK", "3");
        assert_eq!(node_local_rank(), Some(2));

        // --- node_local_rank: falls back to launcher-specific vars ---
        env::remove_var("SLURM_LOCALID");
        assert_eq!(node_local_rank(), Some(3));
        env::remove_var("OMPI_COMM_WORLD_LOCAL_RANK");
        env::set_var("MV2_COMM_WORLD_LOCAL_RANK", "1");
        assert_eq!(node_local_rank(), Some(1));
        env::remove_var("MV2_COMM_WORLD_LOCAL_RANK");
        assert_eq!(node_local_rank(), None);
    }
}
