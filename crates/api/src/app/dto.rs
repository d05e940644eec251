use serde::Serialize;
use serde_json::Value;

use jobkeeper_core::{DomainError, DomainResult, Job, JobId, JobSchedule};

// -------------------------
// Request parsing
// -------------------------

/// Parse a create payload. The body must carry its own `id`.
pub fn parse_new_job(body: &[u8]) -> DomainResult<Job> {
    Job::from_json_slice(body)
}

/// Parse a full-replacement payload for `path_id`.
///
/// The body's `id` may be omitted; if present it must name the same job,
/// since ids never change.
pub fn parse_replacement_job(body: &[u8], path_id: &JobId) -> DomainResult<Job> {
    let mut value: Value = serde_json::from_slice(body)?;
    let obj = value
        .as_object_mut()
        .ok_or_else(|| DomainError::malformed("job payload must be a JSON object"))?;
    obj.entry("id")
        .or_insert_with(|| Value::String(path_id.to_string()));

    let job: Job = serde_json::from_value(value)?;
    if &job.id != path_id {
        return Err(DomainError::malformed(format!(
            "body id {} does not match path id {path_id}",
            job.id
        )));
    }
    Ok(job)
}

// -------------------------
// Responses
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResponse {
    pub id: JobId,
    #[serde(flatten)]
    pub schedule: JobSchedule,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub deleted: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(s: &str) -> JobId {
        JobId::new(s).unwrap()
    }

    #[test]
    fn replacement_without_id_takes_the_path_id() {
        let body = json!({"name": "renamed", "segments": [{"duration": 5}]}).to_string();
        let job = parse_replacement_job(body.as_bytes(), &id("j1")).unwrap();
        assert_eq!(job.id, id("j1"));
        assert_eq!(job.name, "renamed");
    }

    #[test]
    fn replacement_with_other_id_is_rejected() {
        let body = json!({"id": "j2"}).to_string();
        assert!(parse_replacement_job(body.as_bytes(), &id("j1")).is_err());
    }

    #[test]
    fn replacement_must_be_an_object() {
        assert!(parse_replacement_job(b"[1]", &id("j1")).is_err());
        assert!(parse_replacement_job(b"not json", &id("j1")).is_err());
    }

    #[test]
    fn schedule_response_is_flat() {
        let v = serde_json::to_value(ScheduleResponse {
            id: id("j1"),
            schedule: JobSchedule {
                estimated_end_time: None,
                deletion_time: None,
            },
        })
        .unwrap();
        assert_eq!(v, json!({"id": "j1", "estimatedEndTime": null, "deletionTime": null}));
    }
}
