//! Integration tests for the job factory's DB- and file-backed sources (§4.6).
//!
//! The positional/randomize/minibatch logic itself is already covered by pure unit tests
//! colocated with the implementation; these tests exercise the two sources that need a real
//! collaborator (a filesystem file, a queryable database) to mean anything.

use std::io::Write;

use sea_orm::{ConnectionTrait, DbBackend, Statement};
use serde_json::json;

use apiary::server::job_factory::{expand, ColumnNames, JobFactoryConfig, Source};

async fn memory_db() -> sea_orm::DatabaseConnection {
    sea_orm::Database::connect("sqlite::memory:").await.expect("failed to open in-memory sqlite connection")
}

fn unique_temp_path(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("apiary-job-factory-test-{label}-{}.csv", std::process::id()))
}

#[tokio::test]
async fn inputfile_with_header_names_columns_from_the_first_line() {
    let path = unique_temp_path("header");
    {
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "id,name").unwrap();
        writeln!(file, "1,alpha").unwrap();
        writeln!(file, "2,beta").unwrap();
    }

    let config = JobFactoryConfig {
        source: Source::InputFile {
            path: path.to_string_lossy().into_owned(),
            delimiter: Some(','),
            column_names: ColumnNames::FromHeader,
        },
        randomize: false,
        step: None,
        key_column: None,
    };

    let db = memory_db().await;
    let rows = expand(&db, &config).await.unwrap();

    std::fs::remove_file(&path).ok();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], json!({"id": "1", "name": "alpha"}));
    assert_eq!(rows[1], json!({"id": "2", "name": "beta"}));
}

#[tokio::test]
async fn inputfile_unnamed_columns_fall_back_to_positional_shape() {
    let path = unique_temp_path("unnamed");
    {
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "only-column-one").unwrap();
        writeln!(file, "only-column-two").unwrap();
    }

    let config = JobFactoryConfig {
        source: Source::InputFile {
            path: path.to_string_lossy().into_owned(),
            delimiter: None,
            column_names: ColumnNames::Unnamed,
        },
        randomize: false,
        step: None,
        key_column: None,
    };

    let db = memory_db().await;
    let rows = expand(&db, &config).await.unwrap();

    std::fs::remove_file(&path).ok();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["_0"], json!("only-column-one"));
    assert_eq!(rows[1]["_0"], json!("only-column-two"));
}

#[tokio::test]
async fn inputquery_derives_columns_from_result_metadata() {
    let db = memory_db().await;
    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        "CREATE TABLE widgets (id INTEGER, name TEXT)".to_string(),
    ))
    .await
    .unwrap();
    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        "INSERT INTO widgets (id, name) VALUES (1, 'alpha'), (2, 'beta'), (3, 'gamma')".to_string(),
    ))
    .await
    .unwrap();

    let config = JobFactoryConfig {
        source: Source::InputQuery("SELECT id, name FROM widgets ORDER BY id".to_string()),
        randomize: false,
        step: None,
        key_column: None,
    };

    let rows = expand(&db, &config).await.unwrap();

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["name"], json!("alpha"));
    assert_eq!(rows[2]["name"], json!("gamma"));
}

#[tokio::test]
async fn inputlist_with_step_and_key_column_ranges_contiguous_minibatches() {
    let db = memory_db().await;
    let config = JobFactoryConfig {
        source: Source::InputList(json!([
            {"id": "1", "name": "a"},
            {"id": "2", "name": "b"},
            {"id": "3", "name": "c"},
            {"id": "10", "name": "z"}
        ])),
        randomize: false,
        step: Some(2),
        key_column: Some("id".to_string()),
    };

    let rows = expand(&db, &config).await.unwrap();

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["id"], json!(["1", "2"]));
    assert_eq!(rows[1]["id"], json!(["3", "3"]));
    assert_eq!(rows[2]["id"], json!(["10", "10"]));
}

#[tokio::test]
async fn randomize_permutes_rows_without_losing_or_duplicating_any() {
    let db = memory_db().await;
    let config = JobFactoryConfig {
        source: Source::InputList(json!(["a", "b", "c", "d", "e", "f", "g", "h"])),
        randomize: true,
        step: None,
        key_column: None,
    };

    let rows = expand(&db, &config).await.unwrap();

    let mut values: Vec<String> = rows
        .iter()
        .map(|r| r["_0"].as_str().expect("1-D list rows carry their element under _0").to_string())
        .collect();
    values.sort();
    assert_eq!(values, vec!["a", "b", "c", "d", "e", "f", "g", "h"]);
}
