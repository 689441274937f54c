//! Core modules for the apiary dataflow scheduler.
//!
//! This module contains all of the scheduler's functionality: the persistent job/analysis
//! data model, the claim/execute/completion protocol workers use against the shared store,
//! the dataflow engine that routes completed jobs into new jobs via fan/funnel semaphores,
//! garbage collection of jobs orphaned by dead workers, and the job factory that expands
//! parameter sets into individual jobs.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod dataflow;
pub mod error;
pub mod gc;
pub mod job_factory;
pub mod model;
pub mod resource_url;
pub mod runnable;
pub mod startup;
pub mod stats;
pub mod store;
pub mod worker;
