//! Content-addressed side table for `input_id` values that exceed the
//! inline length threshold (§3, §4.1). Store-if-needed: the same content
//! always maps to the same row, keyed by its hash.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "analysis_data")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub analysis_data_id: i32,
    #[sea_orm(unique)]
    pub content_hash: String,
    pub data: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
