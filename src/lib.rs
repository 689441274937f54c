//! Apiary: a distributed dataflow job scheduler.
//!
//! This crate is the persistent job/analysis data model, the claim/execute/completion
//! protocol between workers and the shared store, the dataflow engine that spawns downstream
//! jobs (including fanned batches and semaphored funnels), the garbage collector that
//! recovers jobs from dead workers, and the job factory that expands a batch source into many
//! jobs. The `apiaryd` binary (`src/main.rs`) is a thin CLI wrapper around
//! [`server::worker`].

pub mod cli;
pub mod server;
