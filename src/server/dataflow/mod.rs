//! The dataflow engine: turning a completed job's emitted events into new jobs, naked-table
//! rows, and accumulator entries, per the pipeline's dataflow rules.

pub mod engine;
pub mod template;

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

use entity::{analysis_ctrl_rule, analysis_stats};

use crate::server::error::Error;

/// True if any control rule names `analysis_id` as its controlled analysis and the
/// corresponding condition analysis has not reached `DONE`.
///
/// Shared between the dataflow engine (to decide whether a freshly created job starts
/// `BLOCKED`) and the statistics pass (to decide whether an analysis's aggregate status is
/// `BLOCKED`), so the two never disagree about what "blocked" means.
pub async fn is_blocked<C: ConnectionTrait>(db: &C, analysis_id: i32) -> Result<bool, Error> {
    use entity::sea_orm_active_enums::AnalysisStatus;

    let rules = analysis_ctrl_rule::Entity::find()
        .filter(analysis_ctrl_rule::Column::ControlledAnalysisId.eq(analysis_id))
        .all(db)
        .await?;

    for rule in rules {
        let condition_stats = analysis_stats::Entity::find_by_id(rule.condition_analysis_id)
            .one(db)
            .await?;

        match condition_stats {
            Some(stats) if stats.status == AnalysisStatus::Done => continue,
            _ => return Ok(true),
        }
    }

    Ok(false)
}
