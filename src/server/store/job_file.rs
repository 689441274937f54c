//! `StoreOutFiles`: recording a job attempt's stdout/stderr capture paths.

use sea_orm::{ConnectionTrait, DbBackend, Statement};

use crate::server::error::Error;
use crate::server::store::JobStore;

impl<'a, C: ConnectionTrait> JobStore<'a, C> {
    /// Replaces the `job_file` row keyed on `(job_id, retry)` with the given stdout/stderr
    /// paths, so each retry attempt of a job keeps its own capture without colliding with a
    /// prior attempt's files.
    pub async fn store_out_files(
        &self,
        job_id: i32,
        retry: i32,
        stdout_file: Option<&str>,
        stderr_file: Option<&str>,
    ) -> Result<(), Error> {
        let backend = self.db.get_database_backend();
        let sql = match backend {
            DbBackend::Sqlite => {
                "INSERT OR REPLACE INTO job_file (job_id, retry, stdout_file, stderr_file) \
                 VALUES ($1, $2, $3, $4)"
            }
            DbBackend::Postgres => {
                "INSERT INTO job_file (job_id, retry, stdout_file, stderr_file) \
                 VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (job_id, retry) DO UPDATE SET \
                 stdout_file = EXCLUDED.stdout_file, stderr_file = EXCLUDED.stderr_file"
            }
            DbBackend::MySql => {
                "REPLACE INTO job_file (job_id, retry, stdout_file, stderr_file) \
                 VALUES (?, ?, ?, ?)"
            }
        };

        self.db
            .execute(Statement::from_sql_and_values(
                backend,
                sql,
                [
                    job_id.into(),
                    retry.into(),
                    stdout_file.map(str::to_string).into(),
                    stderr_file.map(str::to_string).into(),
                ],
            ))
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // Exercised against an in-memory SQLite database alongside the rest of the store's
    // integration tests, where a job fixture is already available.
}
