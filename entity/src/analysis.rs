//! A node in the pipeline graph — template for jobs sharing a module and
//! parameter set. §3 of the job/analysis model.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "analysis")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub analysis_id: i32,
    /// Human-readable, unique identifier used in dataflow rules and the
    /// worker CLI's `--analyses_pattern`.
    #[sea_orm(unique)]
    pub logic_name: String,
    /// Name of the runnable module to instantiate, resolved against the
    /// runnable registry (§9 "dynamic dispatch over runnable modules").
    pub module_name: String,
    /// JSON-encoded parameter mapping merged under `param_defaults()` at
    /// `GET_INPUT` time.
    pub parameters: String,
    /// Jobs claimed per `ClaimJobsForWorker` poll.
    pub batch_size: i32,
    /// Maximum concurrent workers the supervisor may run for this analysis.
    pub hive_capacity: i32,
    pub max_retry_count: i32,
    /// Percentage (0-100) of failed jobs tolerated before the analysis's
    /// derived status becomes FAILED.
    pub failed_job_tolerance: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::analysis_stats::Entity")]
    AnalysisStats,
    #[sea_orm(has_many = "super::job::Entity")]
    Job,
    #[sea_orm(has_many = "super::worker::Entity")]
    Worker,
}

impl Related<super::analysis_stats::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AnalysisStats.def()
    }
}

impl Related<super::job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Job.def()
    }
}

impl Related<super::worker::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Worker.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
