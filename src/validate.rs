//! Structural validation of untrusted upstream payloads.
//!
//! Every payload is checked field by field before it enters the pipeline;
//! the first violation fails the whole payload. A run missing its `id` is a
//! hard failure, never a skipped record.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::{
    error::SchemaError,
    workflow::{RunConclusion, RunStatus, Workflow, WorkflowRun, WorkflowState},
};

/// Validates a decoded `…/actions/workflows` payload into the reported
/// total count and the page's workflows, in listing order.
///
/// # Errors
///
/// Returns a [`SchemaError`] describing the first violation encountered.
pub fn workflow_list(payload: &Value) -> Result<(u64, Vec<Workflow>), SchemaError> {
    let total_count = u64_field(payload, "", "total_count")?;
    let items = array_field(payload, "", "workflows")?;
    let mut workflows = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        workflows.push(workflow(item, &format!("workflows[{index}]"))?);
    }
    Ok((total_count, workflows))
}

/// Validates a decoded `…/actions/workflows/{id}/runs` payload into the
/// page's runs, in upstream order.
///
/// # Errors
///
/// Returns a [`SchemaError`] describing the first violation encountered.
pub fn run_list(payload: &Value) -> Result<Vec<WorkflowRun>, SchemaError> {
    let items = array_field(payload, "", "workflow_runs")?;
    let mut runs = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        runs.push(run(item, &format!("workflow_runs[{index}]"))?);
    }
    Ok(runs)
}

fn workflow(item: &Value, at: &str) -> Result<Workflow, SchemaError> {
    Ok(Workflow {
        id: u64_field(item, at, "id")?,
        name: str_field(item, at, "name")?.to_owned(),
        path: str_field(item, at, "path")?.to_owned(),
        state: WorkflowState::from_api(str_field(item, at, "state")?),
        created_at: timestamp_field(item, at, "created_at")?,
        updated_at: timestamp_field(item, at, "updated_at")?,
        html_url: str_field(item, at, "html_url")?.to_owned(),
        badge_url: str_field(item, at, "badge_url")?.to_owned(),
    })
}

fn run(item: &Value, at: &str) -> Result<WorkflowRun, SchemaError> {
    Ok(WorkflowRun {
        id: u64_field(item, at, "id")?,
        // the display name is null on some historical runs
        name: opt_str_field(item, at, "name")?.unwrap_or_default().to_owned(),
        status: RunStatus::from_api(str_field(item, at, "status")?),
        conclusion: opt_str_field(item, at, "conclusion")?.map(RunConclusion::from_api),
        workflow_id: u64_field(item, at, "workflow_id")?,
        created_at: timestamp_field(item, at, "created_at")?,
        updated_at: timestamp_field(item, at, "updated_at")?,
        run_started_at: opt_timestamp_field(item, at, "run_started_at")?,
        html_url: str_field(item, at, "html_url")?.to_owned(),
    })
}

fn join(at: &str, key: &str) -> String {
    if at.is_empty() {
        key.to_owned()
    } else {
        format!("{at}.{key}")
    }
}

fn describe(value: &Value) -> String {
    String::from(match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    })
}

fn violation(at: &str, key: &str, expected: &'static str, found: String) -> SchemaError {
    SchemaError {
        path: join(at, key),
        expected,
        found,
    }
}

fn required<'a>(item: &'a Value, at: &str, key: &str) -> Result<&'a Value, SchemaError> {
    item.get(key)
        .ok_or_else(|| violation(at, key, "a value", String::from("nothing")))
}

fn u64_field(item: &Value, at: &str, key: &str) -> Result<u64, SchemaError> {
    let value = required(item, at, key)?;
    value
        .as_u64()
        .ok_or_else(|| violation(at, key, "an unsigned integer", describe(value)))
}

fn str_field<'a>(item: &'a Value, at: &str, key: &str) -> Result<&'a str, SchemaError> {
    let value = required(item, at, key)?;
    value
        .as_str()
        .ok_or_else(|| violation(at, key, "a string", describe(value)))
}

fn opt_str_field<'a>(item: &'a Value, at: &str, key: &str) -> Result<Option<&'a str>, SchemaError> {
    match item.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(value) => Err(violation(at, key, "a string or null", describe(value))),
    }
}

fn array_field<'a>(item: &'a Value, at: &str, key: &str) -> Result<&'a Vec<Value>, SchemaError> {
    let value = required(item, at, key)?;
    value
        .as_array()
        .ok_or_else(|| violation(at, key, "an array", describe(value)))
}

fn parse_timestamp(at: &str, key: &str, raw: &str) -> Result<DateTime<Utc>, SchemaError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|_| violation(at, key, "an RFC 3339 timestamp", format!("`{raw}`")))
}

fn timestamp_field(item: &Value, at: &str, key: &str) -> Result<DateTime<Utc>, SchemaError> {
    parse_timestamp(at, key, str_field(item, at, key)?)
}

fn opt_timestamp_field(
    item: &Value,
    at: &str,
    key: &str,
) -> Result<Option<DateTime<Utc>>, SchemaError> {
    opt_str_field(item, at, key)?
        .map(|raw| parse_timestamp(at, key, raw))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn workflow_payload() -> Value {
        json!({
            "total_count": 1,
            "workflows": [{
                "id": 161335,
                "name": "CI",
                "path": ".github/workflows/ci.yml",
                "state": "active",
                "created_at": "2020-01-08T23:48:37Z",
                "updated_at": "2020-01-09T23:48:37Z",
                "html_url": "https://github.com/octo-org/octo-repo/blob/master/.github/workflows/ci.yml",
                "badge_url": "https://github.com/octo-org/octo-repo/workflows/CI/badge.svg",
            }]
        })
    }

    fn run_payload() -> Value {
        json!({
            "total_count": 1,
            "workflow_runs": [{
                "id": 30433642,
                "name": "CI",
                "status": "completed",
                "conclusion": "success",
                "workflow_id": 161335,
                "created_at": "2020-01-22T19:33:08Z",
                "updated_at": "2020-01-22T19:33:08Z",
                "run_started_at": "2020-01-22T19:33:08Z",
                "html_url": "https://github.com/octo-org/octo-repo/actions/runs/30433642",
            }]
        })
    }

    #[test]
    fn valid_workflow_payload_passes() {
        let (total_count, workflows) = workflow_list(&workflow_payload()).unwrap();
        assert_eq!(total_count, 1);
        assert_eq!(workflows.len(), 1);
        assert_eq!(workflows[0].id, 161335);
        assert_eq!(workflows[0].state, WorkflowState::Active);
    }

    #[test]
    fn valid_run_payload_passes() {
        let runs = run_list(&run_payload()).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].conclusion, Some(RunConclusion::Success));
        assert_eq!(runs[0].status, RunStatus::Completed);
    }

    #[test]
    fn missing_run_id_fails_the_whole_payload() {
        let mut payload = run_payload();
        payload["workflow_runs"][0]
            .as_object_mut()
            .unwrap()
            .remove("id");
        let err = run_list(&payload).unwrap_err();
        assert_eq!(err.path, "workflow_runs[0].id");
        assert_eq!(err.found, "nothing");
    }

    #[test]
    fn null_where_non_null_required_is_a_violation() {
        let mut payload = workflow_payload();
        payload["workflows"][0]["name"] = Value::Null;
        let err = workflow_list(&payload).unwrap_err();
        assert_eq!(err.path, "workflows[0].name");
        assert_eq!(err.found, "null");
    }

    #[test]
    fn wrong_primitive_type_is_a_violation() {
        let mut payload = run_payload();
        payload["workflow_runs"][0]["id"] = json!("30433642");
        let err = run_list(&payload).unwrap_err();
        assert_eq!(err.path, "workflow_runs[0].id");
        assert_eq!(err.expected, "an unsigned integer");
    }

    #[test]
    fn null_conclusion_normalizes_to_none() {
        let mut payload = run_payload();
        payload["workflow_runs"][0]["conclusion"] = Value::Null;
        payload["workflow_runs"][0]["status"] = json!("in_progress");
        let runs = run_list(&payload).unwrap();
        assert_eq!(runs[0].conclusion, None);
        assert_eq!(runs[0].status, RunStatus::InProgress);
    }

    #[test]
    fn unknown_conclusion_is_kept_not_rejected() {
        let mut payload = run_payload();
        payload["workflow_runs"][0]["conclusion"] = json!("timed_out");
        let runs = run_list(&payload).unwrap();
        assert_eq!(
            runs[0].conclusion,
            Some(RunConclusion::Other(String::from("timed_out")))
        );
    }

    #[test]
    fn malformed_timestamp_is_a_violation() {
        let mut payload = run_payload();
        payload["workflow_runs"][0]["created_at"] = json!("yesterday");
        let err = run_list(&payload).unwrap_err();
        assert_eq!(err.path, "workflow_runs[0].created_at");
        assert_eq!(err.expected, "an RFC 3339 timestamp");
    }

    #[test]
    fn missing_workflows_array_is_a_violation() {
        let err = workflow_list(&json!({ "total_count": 3 })).unwrap_err();
        assert_eq!(err.path, "workflows");
    }
}
