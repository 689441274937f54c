//! Branch code conventions and job status helpers.
//!
//! Branch codes label a job's outgoing dataflow edges. Most are small integers chosen by
//! pipeline authors; a handful of string values carry special meaning to the garbage
//! collector (see [`crate::server::gc`]).

/// The conventional branch code for a job's ordinary ("autoflow") output.
pub const MAIN_BRANCH: &str = "1";

/// The conventional branch code marking a semaphored fan: jobs created on this branch are
/// fanned out under a funnel created on the same dataflow event (§4.3).
pub const FAN_BRANCH: &str = "2";

/// Symbolic branch name used by the garbage collector when routing jobs killed by memory
/// overusage (§4.5, §9 `branch_name`).
pub const MEMLIMIT_BRANCH: &str = "MEMLIMIT";

/// Symbolic branch name used by the garbage collector when routing jobs killed by runtime
/// overusage with no completions.
pub const RUNLIMIT_BRANCH: &str = "RUNLIMIT";

/// Symbolic branch name used by the garbage collector as a catch-all for any other job
/// failure.
pub const ANYFAILURE_BRANCH: &str = "ANYFAILURE";

/// Returns `true` if `branch_code` is the conventional semaphored-fan branch.
///
/// A pipeline author could in principle reuse branch `"2"` for ordinary autoflow, but this
/// crate follows the same convention its originating system used: branch 1 is plain
/// autoflow, branch 2 is the semaphored fan.
pub fn is_fan_branch(branch_code: &str) -> bool {
    branch_code == FAN_BRANCH
}
