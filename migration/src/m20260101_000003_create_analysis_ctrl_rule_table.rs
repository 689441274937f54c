use sea_orm_migration::{prelude::*, schema::*};

use crate::m20260101_000001_create_analysis_table::Analysis;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AnalysisCtrlRule::Table)
                    .if_not_exists()
                    .col(pk_auto(AnalysisCtrlRule::Id))
                    .col(integer(AnalysisCtrlRule::ConditionAnalysisId))
                    .col(integer(AnalysisCtrlRule::ControlledAnalysisId))
                    .foreign_key(
                        ForeignKey::create()
                            .from(AnalysisCtrlRule::Table, AnalysisCtrlRule::ConditionAnalysisId)
                            .to(Analysis::Table, Analysis::AnalysisId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(AnalysisCtrlRule::Table, AnalysisCtrlRule::ControlledAnalysisId)
                            .to(Analysis::Table, Analysis::AnalysisId),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AnalysisCtrlRule::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum AnalysisCtrlRule {
    Table,
    Id,
    ConditionAnalysisId,
    ControlledAnalysisId,
}
