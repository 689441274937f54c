//! Content-addressed offload for oversized job inputs.
//!
//! `job.input_id` strings longer than [`OFFLOAD_THRESHOLD`] are written once into
//! `analysis_data`, keyed by the SHA-256 of their content, and referenced from the job row by
//! an opaque token. Re-offloading identical content is a no-op (store-if-needed): the unique
//! `content_hash` index makes the insert idempotent, and a losing insert just means the
//! content is already present under the id a follow-up `SELECT` returns.

use sea_orm::{ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, QueryFilter, Statement};
use serde_json::Value;
use sha2::{Digest, Sha256};

use entity::analysis_data;

use crate::server::error::Error;
use crate::server::store::JobStore;

/// `input_id` strings at or above this length are offloaded to `analysis_data`.
pub const OFFLOAD_THRESHOLD: usize = 255;

/// Prefix used for the opaque token substituted into `job.input_id` in place of the original
/// content.
pub const OFFLOAD_TOKEN_PREFIX: &str = "_ext_input_analysis_data_id ";

/// Builds the opaque token for an offloaded `analysis_data` row.
pub fn offload_token(analysis_data_id: i32) -> String {
    format!("{OFFLOAD_TOKEN_PREFIX}{analysis_data_id}")
}

/// Parses an opaque offload token back into its `analysis_data_id`, if `input_id` is one.
pub fn parse_offload_token(input_id: &str) -> Option<i32> {
    input_id
        .strip_prefix(OFFLOAD_TOKEN_PREFIX)
        .and_then(|rest| rest.trim().parse().ok())
}

impl<'a, C: ConnectionTrait> JobStore<'a, C> {
    /// Writes `content` to `analysis_data` if no row with the same content already exists,
    /// returning the row's id either way.
    pub async fn store_analysis_data_if_needed(&self, content: &str) -> Result<i32, Error> {
        let hash = hex_sha256(content);

        if let Some(existing) = analysis_data::Entity::find()
            .filter(analysis_data::Column::ContentHash.eq(hash.clone()))
            .one(self.db)
            .await?
        {
            return Ok(existing.analysis_data_id);
        }

        let backend = self.db.get_database_backend();
        let sql = match backend {
            DbBackend::Sqlite => {
                "INSERT OR IGNORE INTO analysis_data (content_hash, data) VALUES ($1, $2)"
            }
            DbBackend::Postgres => {
                "INSERT INTO analysis_data (content_hash, data) VALUES ($1, $2) ON CONFLICT (content_hash) DO NOTHING"
            }
            DbBackend::MySql => {
                "INSERT IGNORE INTO analysis_data (content_hash, data) VALUES (?, ?)"
            }
        };

        self.db
            .execute(Statement::from_sql_and_values(
                backend,
                sql,
                [hash.clone().into(), content.to_string().into()],
            ))
            .await?;

        let row = analysis_data::Entity::find()
            .filter(analysis_data::Column::ContentHash.eq(hash))
            .one(self.db)
            .await?
            .ok_or_else(|| {
                Error::InternalError(
                    "analysis_data row vanished immediately after insert-or-ignore".to_string(),
                )
            })?;

        Ok(row.analysis_data_id)
    }

    /// Looks up an existing `analysis_data` row by content hash without writing anything.
    pub(crate) async fn lookup_analysis_data_id(&self, content: &str) -> Result<Option<i32>, Error> {
        let hash = hex_sha256(content);
        let existing = analysis_data::Entity::find()
            .filter(analysis_data::Column::ContentHash.eq(hash))
            .one(self.db)
            .await?;
        Ok(existing.map(|row| row.analysis_data_id))
    }

    /// Reads back the original content for an offload token produced by
    /// [`store_analysis_data_if_needed`].
    pub async fn resolve_analysis_data(&self, analysis_data_id: i32) -> Result<String, Error> {
        let row = analysis_data::Entity::find_by_id(analysis_data_id)
            .one(self.db)
            .await?
            .ok_or_else(|| {
                Error::InternalError(format!(
                    "analysis_data row {analysis_data_id} referenced but missing"
                ))
            })?;

        Ok(row.data)
    }

    /// Decodes a job's `input_id` back into structured parameters, transparently resolving an
    /// `_ext_input_analysis_data_id` offload token first if present.
    ///
    /// Shared by the garbage collector (replaying a dead job's own input through
    /// `gc_dataflow`) and the worker loop (`GET_INPUT`), so both agree on exactly one
    /// indirection-resolution path.
    pub async fn decode_input(&self, input_id: &str) -> Result<Value, Error> {
        let raw = match parse_offload_token(input_id) {
            Some(analysis_data_id) => self.resolve_analysis_data(analysis_data_id).await?,
            None => input_id.to_string(),
        };

        serde_json::from_str(&raw)
            .map_err(|e| Error::ParseError(format!("job input_id is not valid JSON: {e}")))
    }
}

fn hex_sha256(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offload_token_round_trips() {
        let token = offload_token(42);
        assert_eq!(token, "_ext_input_analysis_data_id 42");
        assert_eq!(parse_offload_token(&token), Some(42));
    }

    #[test]
    fn parse_rejects_non_tokens() {
        assert_eq!(parse_offload_token("{\"a\":1}"), None);
    }

    #[test]
    fn hex_sha256_is_deterministic() {
        assert_eq!(hex_sha256("hello"), hex_sha256("hello"));
        assert_ne!(hex_sha256("hello"), hex_sha256("world"));
    }
}
