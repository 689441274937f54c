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
                    .table(DataflowRule::Table)
                    .if_not_exists()
                    .col(pk_auto(DataflowRule::Id))
                    .col(integer(DataflowRule::FromAnalysisId))
                    .col(string(DataflowRule::BranchCode))
                    .col(string(DataflowRule::ToTarget))
                    .col(text_null(DataflowRule::InputIdTemplate))
                    .foreign_key(
                        ForeignKey::create()
                            .from(DataflowRule::Table, DataflowRule::FromAnalysisId)
                            .to(Analysis::Table, Analysis::AnalysisId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_dataflow_rule_from_branch")
                    .table(DataflowRule::Table)
                    .col(DataflowRule::FromAnalysisId)
                    .col(DataflowRule::BranchCode)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DataflowRule::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum DataflowRule {
    Table,
    Id,
    FromAnalysisId,
    BranchCode,
    ToTarget,
    InputIdTemplate,
}
