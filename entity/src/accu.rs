//! A per-funnel-keyed bag of values fed by fan jobs and harvested when
//! the funnel runs. See §4.3.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "accu")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub semaphored_job_id: i32,
    pub accu_name: String,
    /// Rendered accumulator address (e.g. `values[digit]`), opaque to the
    /// store — interpreted by the funnel job's runnable at harvest time.
    pub accu_address: String,
    pub value: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::job::Entity",
        from = "Column::SemaphoredJobId",
        to = "super::job::Column::JobId"
    )]
    Job,
}

impl Related<super::job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Job.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
