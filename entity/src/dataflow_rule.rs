//! Declarative edge `(from_analysis, branch_code) -> target`, optionally
//! templated. See §3 and §4.3.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "dataflow_rule")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub from_analysis_id: i32,
    /// Either a small integer rendered as a string (`"1"`, `"2"`, ...) or a
    /// symbolic name (`"MEMLIMIT"`, `"ANYFAILURE"`).
    pub branch_code: String,
    /// A resource URL (§6): another analysis's `logic_name`, or a naked
    /// table / accumulator target encoded per the resource URL grammar.
    pub to_target: String,
    /// `#param#`-templated string transforming the emitting job's output
    /// parameters into the downstream job's input; `None` passes output
    /// parameters through unchanged.
    pub input_id_template: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::analysis::Entity",
        from = "Column::FromAnalysisId",
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
