//! String-backed enums shared by the `job`, `analysis_stats`, and `worker`
//! tables.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a [`super::job::Model`], per §3 of the engine
/// specification.
///
/// Transitions: READY -> CLAIMED -> {COMPILATION, GET_INPUT, RUN,
/// WRITE_OUTPUT} -> DONE | FAILED | PASSED_ON, with the two sanctioned
/// backward transitions documented in §5 (GC's CLAIMED -> READY, and
/// `ReleaseAndAge`'s working-state -> READY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum JobStatus {
    #[sea_orm(string_value = "READY")]
    Ready,
    #[sea_orm(string_value = "BLOCKED")]
    Blocked,
    #[sea_orm(string_value = "CLAIMED")]
    Claimed,
    #[sea_orm(string_value = "COMPILATION")]
    Compilation,
    #[sea_orm(string_value = "GET_INPUT")]
    GetInput,
    #[sea_orm(string_value = "RUN")]
    Run,
    #[sea_orm(string_value = "WRITE_OUTPUT")]
    WriteOutput,
    #[sea_orm(string_value = "DONE")]
    Done,
    #[sea_orm(string_value = "FAILED")]
    Failed,
    #[sea_orm(string_value = "PASSED_ON")]
    PassedOn,
}

impl JobStatus {
    /// True for the four "working" statuses that require a non-null
    /// `worker_id` (§3 invariants).
    pub fn is_working(self) -> bool {
        matches!(
            self,
            JobStatus::Compilation | JobStatus::GetInput | JobStatus::Run | JobStatus::WriteOutput
        )
    }

    /// True for statuses that mean the job will never be claimed again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed | JobStatus::PassedOn)
    }
}

/// Aggregate status of an [`super::analysis_stats::Model`], derived
/// periodically per §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum AnalysisStatus {
    #[sea_orm(string_value = "LOADING")]
    Loading,
    #[sea_orm(string_value = "BLOCKED")]
    Blocked,
    #[sea_orm(string_value = "READY")]
    Ready,
    #[sea_orm(string_value = "WORKING")]
    Working,
    #[sea_orm(string_value = "ALL_CLAIMED")]
    AllClaimed,
    #[sea_orm(string_value = "DONE")]
    Done,
    #[sea_orm(string_value = "FAILED")]
    Failed,
}

/// Reason a [`super::worker::Model`] stopped, written to `cause_of_death`
/// on termination (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum CauseOfDeath {
    #[sea_orm(string_value = "NO_WORK")]
    NoWork,
    #[sea_orm(string_value = "JOB_LIMIT")]
    JobLimit,
    #[sea_orm(string_value = "LIFESPAN")]
    Lifespan,
    #[sea_orm(string_value = "CONTAMINATED")]
    Contaminated,
    #[sea_orm(string_value = "MEMLIMIT")]
    MemLimit,
    #[sea_orm(string_value = "RUNLIMIT")]
    RunLimit,
    #[sea_orm(string_value = "FATALITY")]
    Fatality,
}

impl CauseOfDeath {
    /// True for causes that indicate the job was killed for overusing a
    /// resource rather than crashing outright — these route through
    /// `gc_dataflow` before `ReleaseAndAge` and are not retried in place
    /// (§4.5 step 2a, §7).
    pub fn is_resource_overusage(self) -> bool {
        matches!(self, CauseOfDeath::MemLimit | CauseOfDeath::RunLimit)
    }

    /// The symbolic branch name `gc_dataflow` looks up a rule for.
    pub fn branch_name(self) -> &'static str {
        match self {
            CauseOfDeath::MemLimit => "MEMLIMIT",
            CauseOfDeath::RunLimit => "RUNLIMIT",
            _ => "ANYFAILURE",
        }
    }
}
