//! SeaORM entity definitions for the job-scheduling core.
//!
//! One module per persistent table in the schema (§6 of the engine
//! specification): `analysis`, `analysis_stats`, `analysis_ctrl_rule`,
//! `dataflow_rule`, `job`, `job_file`, `job_message`, `analysis_data`,
//! `worker`, `accu`. Hand-written in the shape `sea-orm-cli generate
//! entity` would produce, since these tables are created by the
//! `migration` crate rather than introspected from a live database.

pub mod accu;
pub mod analysis;
pub mod analysis_ctrl_rule;
pub mod analysis_data;
pub mod analysis_stats;
pub mod dataflow_rule;
pub mod job;
pub mod job_file;
pub mod job_message;
pub mod sea_orm_active_enums;
pub mod worker;

pub mod prelude {
    //! Re-exports of entity types for ergonomic `use entity::prelude::*`.
    pub use super::accu::Entity as Accu;
    pub use super::analysis::Entity as Analysis;
    pub use super::analysis_ctrl_rule::Entity as AnalysisCtrlRule;
    pub use super::analysis_data::Entity as AnalysisData;
    pub use super::analysis_stats::Entity as AnalysisStats;
    pub use super::dataflow_rule::Entity as DataflowRule;
    pub use super::job::Entity as Job;
    pub use super::job_file::Entity as JobFile;
    pub use super::job_message::Entity as JobMessage;
    pub use super::worker::Entity as Worker;
}
