//! A process-long entity bound to one analysis for its lifetime. See
//! worker lifecycle notes in §4.2.

use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;

use crate::sea_orm_active_enums::CauseOfDeath;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "worker")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub worker_id: i32,
    pub analysis_id: i32,
    pub meadow_type: String,
    pub host: String,
    pub process_id: String,
    pub born: NaiveDateTime,
    pub died: Option<NaiveDateTime>,
    pub cause_of_death: Option<CauseOfDeath>,
    /// Updated by the worker between jobs; the supervisor's dead-worker
    /// detector (out of scope, §1) compares this against a heartbeat
    /// threshold before invoking the garbage collector (§4.5).
    pub last_check_in: Option<NaiveDateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::analysis::Entity",
        from = "Column::AnalysisId",
        to = "super::analysis::Column::AnalysisId"
    )]
    Analysis,
    #[sea_orm(has_many = "super::job::Entity")]
    Job,
}

impl Related<super::analysis::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Analysis.def()
    }
}

impl Related<super::job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Job.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
