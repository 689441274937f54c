//! The unit of work. See §3 for the full
//! column contract and invariants.

use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;

use crate::sea_orm_active_enums::JobStatus;

/// `UNIQUE(analysis_id, input_id)` is enforced by the migration that
/// creates this table, not by this derive — it is the dedup key that
/// makes `CreateJob`'s insert-or-ignore idempotent (§4.1).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "job")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub job_id: i32,
    pub analysis_id: i32,
    /// Canonicalized, string-encoded parameter mapping, or an
    /// `_ext_input_analysis_data_id N` indirection token when the
    /// canonical string exceeded the offload threshold.
    pub input_id: String,
    pub prev_job_id: Option<i32>,
    pub worker_id: Option<i32>,
    pub status: JobStatus,
    #[sea_orm(default_value = 0)]
    pub retry_count: i32,
    /// While > 0 this job is a funnel ineligible to claim (§3, §4.3).
    #[sea_orm(default_value = 0)]
    pub semaphore_count: i32,
    /// Funnel job this job's DONE transition decrements, or `None`.
    pub semaphored_job_id: Option<i32>,
    pub completed: Option<NaiveDateTime>,
    pub runtime_msec: Option<i32>,
    pub query_count: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::analysis::Entity",
        from = "Column::AnalysisId",
        to = "super::analysis::Column::AnalysisId"
    )]
    Analysis,
    #[sea_orm(
        belongs_to = "super::worker::Entity",
        from = "Column::WorkerId",
        to = "super::worker::Column::WorkerId"
    )]
    Worker,
    #[sea_orm(has_many = "super::job_file::Entity")]
    JobFile,
    #[sea_orm(has_many = "super::job_message::Entity")]
    JobMessage,
}

impl Related<super::analysis::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Analysis.def()
    }
}

impl Related<super::worker::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Worker.def()
    }
}

impl Related<super::job_file::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JobFile.def()
    }
}

impl Related<super::job_message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JobMessage.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
