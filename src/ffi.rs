//! Raw FFI bindings to the C shim layer.
//!
//! These are low-level unsafe functions. Use the safe wrappers in [`crate::topology`].

#![allow(dead_code)]

use std::os::raw::c_int;

extern "C" {
    // ============================================================
    // Handle Acquisition
    // ============================================================

    pub fn partcomm_comm_world() -> i32;
    pub fn partcomm_comm_split(comm: i32, color: i32, key: i32, newcomm: *mut i32) -> c_int;
    pub fn partcomm_comm_adopt(addr: u64, newcomm: *mut i32) -> c_int;
    pub fn partcomm_comm_free(comm: i32) -> c_int;

    // ============================================================
    // Topology Queries
    // ============================================================

    pub fn partcomm_comm_rank(comm: i32, rank: *mut i32) -> c_int;
    pub fn partcomm_comm_size(comm: i32, size: *mut i32) -> c_int;

    // ============================================================
    // Synchronization and Teardown
    // ============================================================

    pub fn partcomm_barrier(comm: i32) -> c_int;
    pub fn partcomm_abort(comm: i32, errcode: i32) -> c_int;
}
