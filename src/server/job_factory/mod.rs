//! Job factory: expanding a batch source into many downstream jobs' worth of parameters
//! (§4.6).
//!
//! Unlike an ordinary [`crate::server::runnable::Runnable`], the factory's `inputquery` source
//! needs an async round-trip to the shared store, so this module exposes a plain async
//! function rather than forcing the (synchronous) `Runnable` trait to grow an async variant
//! for one caller. The worker loop recognizes the conventional module name
//! [`JOB_FACTORY_MODULE_NAME`] and calls [`expand`] directly instead of building a registered
//! runnable (see [`crate::server::worker`]), then dataflows each returned parameter set on the
//! main branch exactly as an ordinary runnable's `write_output()` would.

mod minibatch;

use std::process::Command;

use sea_orm::{ConnectionTrait, Statement};
use serde_json::Value;

use crate::server::error::worker::WorkerError;
use crate::server::error::Error;

pub use minibatch::magic_increment;

/// Conventional module name the worker loop special-cases to run the job factory instead of
/// resolving a registered [`crate::server::runnable::Runnable`].
pub const JOB_FACTORY_MODULE_NAME: &str = "JobFactory";

/// How to determine column names for a row-oriented source (`inputfile`/`inputcmd`).
#[derive(Debug, Clone)]
pub enum ColumnNames {
    /// No names are known; rows fall back to the positional `{_: [...], _0: .., _1: ..}`
    /// shape.
    Unnamed,
    /// The first line of the source is itself a header row naming the columns.
    FromHeader,
    /// Column names given explicitly, in source order.
    Explicit(Vec<String>),
}

/// Where a batch of rows comes from.
#[derive(Debug, Clone)]
pub enum Source {
    /// A literal list: 1-D (each element its own single-column row) or 2-D (each inner list a
    /// row).
    InputList(Value),
    /// A file on disk, optionally split into columns by `delimiter`.
    InputFile {
        /// Path to the file.
        path: String,
        /// Column delimiter; `None` means each line is a single-column row.
        delimiter: Option<char>,
        /// How to name the resulting columns.
        column_names: ColumnNames,
    },
    /// A SQL query executed against the shared store; column names come from the query's own
    /// result metadata.
    InputQuery(String),
    /// A system command whose stdout is treated exactly like an `inputfile`.
    InputCmd {
        /// Command line, passed to `sh -c`.
        command: String,
        /// Column delimiter; `None` means each line is a single-column row.
        delimiter: Option<char>,
        /// How to name the resulting columns.
        column_names: ColumnNames,
    },
}

/// Full configuration for one job factory expansion.
#[derive(Debug, Clone)]
pub struct JobFactoryConfig {
    /// Exactly one of `inputlist`/`inputfile`/`inputquery`/`inputcmd`.
    pub source: Source,
    /// Fisher–Yates shuffle the row order before minibatching/emission.
    pub randomize: bool,
    /// Minibatch size; `None` (or `Some(1)`) emits one job per row.
    pub step: Option<usize>,
    /// Column undergoing ranging when minibatching. Required when `step` is set and greater
    /// than 1.
    pub key_column: Option<String>,
}

/// Expands `config` into the parameter set for each job the factory should create.
///
/// Applies `randomize` (if set) to the row order, then groups rows into minibatches of
/// `step` (if set and `key_column` matched a contiguous run), and finally renders each
/// resulting row or minibatch into a job's output parameters.
pub async fn expand<C: ConnectionTrait>(db: &C, config: &JobFactoryConfig) -> Result<Vec<Value>, Error> {
    let (columns, mut rows) = read_rows(db, &config.source).await?;

    if config.randomize {
        use rand::seq::SliceRandom;
        let mut rng = rand::rng();
        rows.shuffle(&mut rng);
    }

    let step = config.step.unwrap_or(1).max(1);

    if step <= 1 {
        return Ok(rows.into_iter().map(|row| row_to_params(&columns, &row)).collect());
    }

    let key_column = config
        .key_column
        .as_deref()
        .ok_or_else(|| WorkerError::ParamDecode("step minibatching requires key_column".to_string()))?;

    minibatch::minibatch(&columns, rows, step, key_column)
}

async fn read_rows<C: ConnectionTrait>(
    db: &C,
    source: &Source,
) -> Result<(Option<Vec<String>>, Vec<Vec<Value>>), Error> {
    match source {
        Source::InputList(value) => Ok(rows_from_list(value)),
        Source::InputFile { path, delimiter, column_names } => {
            let content = std::fs::read_to_string(path).map_err(|e| {
                WorkerError::ParamDecode(format!("failed to read inputfile `{path}`: {e}"))
            })?;
            Ok(rows_from_text(&content, *delimiter, column_names))
        }
        Source::InputCmd { command, delimiter, column_names } => {
            let output = Command::new("sh").arg("-c").arg(command).output().map_err(|e| {
                WorkerError::ParamDecode(format!("failed to run inputcmd `{command}`: {e}"))
            })?;
            if !output.status.success() {
                return Err(WorkerError::ParamDecode(format!(
                    "inputcmd `{command}` exited with {}",
                    output.status
                ))
                .into());
            }
            let content = String::from_utf8_lossy(&output.stdout).into_owned();
            Ok(rows_from_text(&content, *delimiter, column_names))
        }
        Source::InputQuery(sql) => rows_from_query(db, sql).await,
    }
}

/// A 1-D list (`["a", "b"]`) yields one single-column row per element; a 2-D list (`[["a",
/// 1], ["b", 2]]`) yields one row per inner list. Either way, column names are unknown, so
/// rows fall back to the positional shape at emission time.
fn rows_from_list(value: &Value) -> (Option<Vec<String>>, Vec<Vec<Value>>) {
    let rows = match value.as_array() {
        Some(items) => items
            .iter()
            .map(|item| match item.as_array() {
                Some(inner) => inner.clone(),
                None => vec![item.clone()],
            })
            .collect(),
        None => vec![vec![value.clone()]],
    };

    (None, rows)
}

fn rows_from_text(
    content: &str,
    delimiter: Option<char>,
    column_names: &ColumnNames,
) -> (Option<Vec<String>>, Vec<Vec<Value>>) {
    let mut lines = content.lines();

    let split = |line: &str| -> Vec<Value> {
        match delimiter {
            Some(d) => line.split(d).map(|cell| Value::String(cell.to_string())).collect(),
            None => vec![Value::String(line.to_string())],
        }
    };

    let columns = match column_names {
        ColumnNames::Unnamed => None,
        ColumnNames::Explicit(names) => Some(names.clone()),
        ColumnNames::FromHeader => lines.next().map(|header| match delimiter {
            Some(d) => header.split(d).map(str::to_string).collect(),
            None => vec![header.to_string()],
        }),
    };

    let rows = lines.filter(|l| !l.is_empty()).map(split).collect();
    (columns, rows)
}

/// Executes `sql` against the shared store and derives column names from the query's own
/// result metadata, as §4.6 requires.
async fn rows_from_query<C: ConnectionTrait>(
    db: &C,
    sql: &str,
) -> Result<(Option<Vec<String>>, Vec<Vec<Value>>), Error> {
    let backend = db.get_database_backend();
    let results = db.query_all(Statement::from_string(backend, sql.to_string())).await?;

    let mut columns: Option<Vec<String>> = None;
    let mut rows = Vec::with_capacity(results.len());

    for result in &results {
        let names = result.column_names();
        let row: Vec<Value> = names
            .iter()
            .map(|name| {
                result
                    .try_get_by::<String, _>(name.as_str())
                    .map(Value::String)
                    .or_else(|_| result.try_get_by::<i64, _>(name.as_str()).map(Value::from))
                    .or_else(|_| result.try_get_by::<f64, _>(name.as_str()).map(Value::from))
                    .unwrap_or(Value::Null)
            })
            .collect();

        if columns.is_none() {
            columns = Some(names);
        }
        rows.push(row);
    }

    Ok((columns, rows))
}

/// Renders one row into a job's output parameters: `{column_name: value}` when column names
/// are known, else the positional fallback `{_: [row], _0: v0, _1: v1, ...}`.
pub(crate) fn row_to_params(columns: &Option<Vec<String>>, row: &[Value]) -> Value {
    if let Some(columns) = columns {
        if columns.len() == row.len() {
            let mut map = serde_json::Map::with_capacity(row.len());
            for (name, value) in columns.iter().zip(row.iter()) {
                map.insert(name.clone(), value.clone());
            }
            return Value::Object(map);
        }
    }

    let mut map = serde_json::Map::with_capacity(row.len() + 1);
    map.insert("_".to_string(), Value::Array(row.to_vec()));
    for (i, value) in row.iter().enumerate() {
        map.insert(format!("_{i}"), value.clone());
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn named_row_uses_column_names() {
        let columns = Some(vec!["a".to_string(), "b".to_string()]);
        let row = vec![json!(1), json!("x")];
        assert_eq!(row_to_params(&columns, &row), json!({"a": 1, "b": "x"}));
    }

    #[test]
    fn unnamed_row_falls_back_to_positional_shape() {
        let row = vec![json!(1), json!("x")];
        let params = row_to_params(&None, &row);
        assert_eq!(params["_"], json!([1, "x"]));
        assert_eq!(params["_0"], json!(1));
        assert_eq!(params["_1"], json!("x"));
    }

    #[test]
    fn one_d_list_yields_single_column_rows() {
        let (columns, rows) = rows_from_list(&json!(["a", "b", "c"]));
        assert!(columns.is_none());
        assert_eq!(rows, vec![vec![json!("a")], vec![json!("b")], vec![json!("c")]]);
    }

    #[test]
    fn two_d_list_yields_one_row_per_inner_list() {
        let (columns, rows) = rows_from_list(&json!([["a", 1], ["b", 2]]));
        assert!(columns.is_none());
        assert_eq!(rows, vec![vec![json!("a"), json!(1)], vec![json!("b"), json!(2)]]);
    }

    #[test]
    fn file_rows_split_on_delimiter_with_header() {
        let (columns, rows) =
            rows_from_text("a,b\n1,x\n2,y\n", Some(','), &ColumnNames::FromHeader);
        assert_eq!(columns, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec![json!("1"), json!("x")]);
    }

    #[test]
    fn file_rows_without_delimiter_are_single_column() {
        let (columns, rows) = rows_from_text("one\ntwo\n", None, &ColumnNames::Unnamed);
        assert!(columns.is_none());
        assert_eq!(rows, vec![vec![json!("one")], vec![json!("two")]]);
    }
}
