//! Applying a job's recorded dataflow events to the pipeline's dataflow rules.

use sea_orm::{ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, QueryFilter, Statement};
use serde_json::Value;

use entity::{analysis, dataflow_rule};

use crate::server::dataflow::template::{merge_params, render_accu_address, Template};
use crate::server::dataflow::is_blocked;
use crate::server::error::dataflow::DataflowError;
use crate::server::error::Error;
use crate::server::model::db::JobModel;
use crate::server::model::job_status::{is_fan_branch, MAIN_BRANCH};
use crate::server::resource_url::{ObjectType, ResourceUrl};
use crate::server::runnable::DataflowEvent;
use crate::server::store::create_job::{CreateJobRequest, FunnelJoin};
use crate::server::store::JobStore;

/// Applies every dataflow event a job emitted during `WRITE_OUTPUT`, returning the ids of any
/// new jobs created.
///
/// Main-branch (`"1"`) events are processed before every other branch, including the
/// conventional fan branch (`"2"`): a job created on the main branch in this same call becomes
/// the funnel for any fan children created afterward, mirroring how a single runnable's
/// `write_output()` typically dataflows the funnel's input on branch 1 before fanning children
/// out on branch 2.
pub async fn apply_dataflow<C: ConnectionTrait>(
    db: &C,
    stats_by_trigger: bool,
    job: &JobModel,
    own_params: &Value,
    mut events: Vec<DataflowEvent>,
) -> Result<Vec<i32>, Error> {
    events.sort_by_key(|event| if event.branch_code == MAIN_BRANCH { 0 } else { 1 });

    let store = JobStore::with_stats_mode(db, stats_by_trigger);
    let mut created = Vec::new();
    let mut funnel_job_id: Option<i32> = None;

    for event in events {
        let rules = dataflow_rule::Entity::find()
            .filter(dataflow_rule::Column::FromAnalysisId.eq(job.analysis_id))
            .filter(dataflow_rule::Column::BranchCode.eq(event.branch_code.clone()))
            .all(db)
            .await?;

        let fan = is_fan_branch(&event.branch_code);

        for rule in &rules {
            let target = ResourceUrl::parse(&rule.to_target)?;

            for params in &event.params {
                match target.object_type {
                    ObjectType::Analysis => {
                        let created_id = create_downstream_job(
                            db,
                            &store,
                            job,
                            own_params,
                            params,
                            rule,
                            &target,
                            fan,
                            funnel_job_id,
                        )
                        .await?;

                        if let Some(created_id) = created_id {
                            created.push(created_id);
                            if !fan {
                                funnel_job_id = Some(created_id);
                            }
                        } else if !fan {
                            // Lost the dedup race or already existed: the funnel this branch
                            // names already exists under this (analysis_id, input_id); find it
                            // so subsequent fan children in this call still join it.
                            funnel_job_id =
                                find_existing_job_id(db, &store, rule, params, own_params).await?;
                        }
                    }
                    ObjectType::NakedTable => {
                        let table_name = target
                            .table_name
                            .clone()
                            .ok_or_else(|| DataflowError::UnresolvedTarget(rule.to_target.clone()))?;
                        insert_naked_table_row(db, &table_name, params).await?;
                    }
                    ObjectType::Accumulator => {
                        let accu_name = target
                            .accu_name
                            .clone()
                            .ok_or_else(|| DataflowError::UnresolvedTarget(rule.to_target.clone()))?;
                        let address_template = target.accu_address.as_deref().unwrap_or("");
                        let funnel_for_accu = funnel_job_id.or(job.semaphored_job_id).ok_or_else(|| {
                            DataflowError::UnresolvedTarget(format!(
                                "accumulator `{accu_name}` has no funnel job to harvest into"
                            ))
                        })?;
                        insert_accu_row(db, funnel_for_accu, &accu_name, address_template, params)
                            .await?;
                    }
                }
            }
        }
    }

    Ok(created)
}

#[allow(clippy::too_many_arguments)]
async fn create_downstream_job<C: ConnectionTrait>(
    db: &C,
    store: &JobStore<'_, C>,
    job: &JobModel,
    own_params: &Value,
    event_params: &Value,
    rule: &dataflow_rule::Model,
    target: &ResourceUrl,
    fan: bool,
    funnel_job_id: Option<i32>,
) -> Result<Option<i32>, Error> {
    let logic_name = target
        .logic_name
        .clone()
        .ok_or_else(|| DataflowError::UnresolvedTarget(rule.to_target.clone()))?;

    let target_analysis = analysis::Entity::find()
        .filter(analysis::Column::LogicName.eq(logic_name.clone()))
        .one(db)
        .await?
        .ok_or_else(|| DataflowError::UnresolvedTarget(logic_name))?;

    let downstream_params = match &rule.input_id_template {
        Some(raw_template) => {
            let merged = merge_params(event_params, own_params);
            let rendered = Template::compile(raw_template).render(&merged)?;
            serde_json::from_str(&rendered).map_err(|e| {
                Error::ParseError(format!(
                    "input_id_template for rule {} rendered non-JSON input: {e}",
                    rule.id
                ))
            })?
        }
        None => event_params.clone(),
    };

    let blocked = is_blocked(db, target_analysis.analysis_id).await?;

    let request = CreateJobRequest {
        analysis_id: target_analysis.analysis_id,
        params: downstream_params,
        prev_job_id: Some(job.job_id),
        blocked,
        semaphore_count: Some(0),
        semaphored_job_id: if fan {
            match funnel_job_id {
                Some(id) => FunnelJoin::Explicit(id),
                None => FunnelJoin::None,
            }
        } else {
            FunnelJoin::InheritFromPrev
        },
    };

    store.create_job(request).await
}

/// Re-derives the job id an already-deduplicated `CreateJob` call would have returned, so a
/// main-branch funnel that already existed from an earlier run can still be found (needed for
/// `force_init=false` re-runs, per dedup invariant I6).
async fn find_existing_job_id<C: ConnectionTrait>(
    db: &C,
    store: &JobStore<'_, C>,
    rule: &dataflow_rule::Model,
    event_params: &Value,
    own_params: &Value,
) -> Result<Option<i32>, Error> {
    let target = ResourceUrl::parse(&rule.to_target)?;
    let logic_name = match target.logic_name {
        Some(name) => name,
        None => return Ok(None),
    };

    let target_analysis = analysis::Entity::find()
        .filter(analysis::Column::LogicName.eq(logic_name))
        .one(db)
        .await?;
    let target_analysis = match target_analysis {
        Some(a) => a,
        None => return Ok(None),
    };

    let canonical_params = match &rule.input_id_template {
        Some(raw_template) => {
            let merged = merge_params(event_params, own_params);
            let rendered = Template::compile(raw_template).render(&merged)?;
            serde_json::from_str(&rendered).unwrap_or_else(|_| Value::String(rendered))
        }
        None => event_params.clone(),
    };

    store.find_job_by_input(target_analysis.analysis_id, &canonical_params).await
}

async fn insert_naked_table_row<C: ConnectionTrait>(
    db: &C,
    table_name: &str,
    params: &Value,
) -> Result<(), Error> {
    let object = params
        .as_object()
        .ok_or_else(|| DataflowError::UnresolvedTarget(format!("naked table `{table_name}` requires object-shaped params")))?;

    if object.is_empty() {
        return Ok(());
    }

    let backend = db.get_database_backend();
    let columns: Vec<&String> = object.keys().collect();
    let values: Vec<sea_orm::Value> = object.values().map(json_to_sea_value).collect();
    let placeholders = crate::server::store::placeholders(backend, columns.len());

    // `table_name` comes from the pipeline's own dataflow rule configuration, not from
    // per-request user input, so interpolating it into the statement text is the only option
    // (SQL parameters can bind values, not identifiers) and carries no injection risk beyond
    // what a malformed pipeline config could already do to its own schema.
    let column_list = columns.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ");
    let sql = format!("INSERT INTO {table_name} ({column_list}) VALUES ({})", placeholders.join(", "));

    db.execute(Statement::from_sql_and_values(backend, &sql, values)).await?;
    Ok(())
}

async fn insert_accu_row<C: ConnectionTrait>(
    db: &C,
    funnel_job_id: i32,
    accu_name: &str,
    address_template: &str,
    params: &Value,
) -> Result<(), Error> {
    let accu_address = render_accu_address(address_template, params)?;
    let value = params
        .get("value")
        .map(|v| if let Value::String(s) = v { s.clone() } else { v.to_string() })
        .unwrap_or_else(|| params.to_string());

    let backend = db.get_database_backend();
    let sql = match backend {
        DbBackend::MySql => {
            "INSERT INTO accu (semaphored_job_id, accu_name, accu_address, value) VALUES (?, ?, ?, ?)"
        }
        _ => {
            "INSERT INTO accu (semaphored_job_id, accu_name, accu_address, value) VALUES ($1, $2, $3, $4)"
        }
    };

    db.execute(Statement::from_sql_and_values(
        backend,
        sql,
        [funnel_job_id.into(), accu_name.to_string().into(), accu_address.into(), value.into()],
    ))
    .await?;

    Ok(())
}

fn json_to_sea_value(value: &Value) -> sea_orm::Value {
    match value {
        Value::Null => sea_orm::Value::String(None),
        Value::Bool(b) => sea_orm::Value::Bool(Some(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                sea_orm::Value::BigInt(Some(i))
            } else if let Some(f) = n.as_f64() {
                sea_orm::Value::Double(Some(f))
            } else {
                sea_orm::Value::String(Some(Box::new(n.to_string())))
            }
        }
        Value::String(s) => sea_orm::Value::String(Some(Box::new(s.clone()))),
        other => sea_orm::Value::String(Some(Box::new(other.to_string()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_to_sea_value_preserves_integers() {
        assert_eq!(json_to_sea_value(&Value::from(42)), sea_orm::Value::BigInt(Some(42)));
    }

    #[test]
    fn json_to_sea_value_unwraps_plain_strings() {
        assert_eq!(
            json_to_sea_value(&Value::String("hello".to_string())),
            sea_orm::Value::String(Some(Box::new("hello".to_string())))
        );
    }
}
