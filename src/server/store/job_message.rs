//! Recording a human-readable note against a job or analysis.

use chrono::Utc;
use sea_orm::{ConnectionTrait, EntityTrait, Set};

use entity::job_message;

use crate::server::error::Error;
use crate::server::store::JobStore;

impl<'a, C: ConnectionTrait> JobStore<'a, C> {
    /// Records a `job_message` row. `job_id` is `None` for a message about the analysis as a
    /// whole rather than one specific job.
    pub async fn record_message(
        &self,
        job_id: Option<i32>,
        analysis_id: i32,
        message: &str,
        is_error: bool,
    ) -> Result<(), Error> {
        let active = job_message::ActiveModel {
            job_message_id: sea_orm::ActiveValue::NotSet,
            job_id: Set(job_id),
            analysis_id: Set(analysis_id),
            message: Set(message.to_string()),
            is_error: Set(is_error),
            time: Set(Utc::now().naive_utc()),
        };

        job_message::Entity::insert(active).exec(self.db).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // Exercised against an in-memory SQLite database alongside the rest of the store's
    // integration tests, where a job fixture is already available.
}
