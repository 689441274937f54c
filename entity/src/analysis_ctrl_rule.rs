//! Control rule: while any `condition_analysis` is not DONE, the
//! `controlled_analysis`'s derived status is BLOCKED. See §3.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "analysis_ctrl_rule")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub condition_analysis_id: i32,
    pub controlled_analysis_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
