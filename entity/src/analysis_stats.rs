//! Cached per-analysis counters consumed by the supervisor's worker-count
//! feedback loop. §3 and §4.4.

use sea_orm::entity::prelude::*;

use crate::sea_orm_active_enums::AnalysisStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "analysis_stats")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub analysis_id: i32,
    pub total_job_count: i64,
    /// `status = READY AND semaphore_count <= 0`.
    pub unclaimed_job_count: i64,
    pub done_job_count: i64,
    pub failed_job_count: i64,
    pub num_required_workers: i32,
    pub status: AnalysisStatus,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::analysis::Entity",
        from = "Column::AnalysisId",
        to = "super::analysis::Column::AnalysisId"
    )]
    Analysis,
}

impl Related<super::analysis::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Analysis.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
