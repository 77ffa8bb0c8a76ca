//! Event normalizer for the metrics path.
//!
//! Reads one JSON payload from the host, classifies it as a BEGIN
//! (`PreToolUse`) or END (`PostToolUse`) record, and appends it to the daily
//! file. Every failure is swallowed: the hook contract requires a clean exit
//! no matter what arrives on stdin, so problems are only visible as
//! `tracing::debug!` lines behind `DEBUG_HOOKS`.

use std::io::Read;
use std::path::Path;

use serde_json::Value;

use crate::ids;
use crate::paths;
use crate::timestamp;

use super::types::{HookEvent, HookPayload, MetricsRecord};
use super::writer;

/// Processes one hook payload from `input` against the resolved base
/// directory.
pub fn process_hook(input: impl Read) {
    process_hook_in(&paths::resolve_base(), input);
}

/// Processes one hook payload from `input`, writing under `base`.
pub fn process_hook_in(base: &Path, input: impl Read) {
    let mut raw = String::new();
    let mut input = input;
    if let Err(e) = input.read_to_string(&mut raw) {
        tracing::debug!(error = %e, "failed to read hook input");
        return;
    }

    let payload: HookPayload = match serde_json::from_str(&raw) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::debug!(error = %e, "failed to parse hook payload");
            return;
        }
    };

    let record = match normalize(&payload) {
        Some(record) => record,
        None => return,
    };

    writer::append_record_in(base, &record);
}

/// Builds a record from a payload, or `None` for unrecognized events.
pub fn normalize(payload: &HookPayload) -> Option<MetricsRecord> {
    let event = match payload.hook_event_name.as_str() {
        "PreToolUse" => HookEvent::PreToolUse,
        "PostToolUse" => HookEvent::PostToolUse,
        other => {
            tracing::debug!(event = %other, "ignoring unrecognized hook event");
            return None;
        }
    };

    let timestamp = timestamp::parse_or_now(payload.timestamp.as_deref());
    let tool_id = ids::correlation_id(
        &payload.tool_name,
        &payload.session_id,
        payload.request_id.as_deref(),
        payload.tool_input.as_deref().map(|raw| raw.get()),
        timestamp,
    );

    let mut record = MetricsRecord {
        tool_id,
        tool_name: payload.tool_name.clone(),
        hook_event: event,
        timestamp,
        session_id: payload.session_id.clone(),
        transcript_path: payload.transcript_path.clone(),
        cwd: payload.cwd.clone(),
        tool_input: parse_opaque(payload.tool_input.as_deref().map(|raw| raw.get())),
        tool_output: None,
        success: None,
        error: None,
        error_type: None,
        duration_ms: None,
    };

    if event == HookEvent::PostToolUse {
        let output_raw = payload.coalesced_output().map(|raw| raw.get());
        record.tool_output = parse_opaque(output_raw);
        record.success = extract_success(payload, output_raw);
        record.error = payload.error.clone().filter(|e| !e.is_empty());
        record.error_type = payload.error_type.clone().filter(|e| !e.is_empty());
    }

    Some(record)
}

fn parse_opaque(raw: Option<&str>) -> Option<Value> {
    let value: Value = serde_json::from_str(raw?).ok()?;
    if value.is_null() {
        None
    } else {
        Some(value)
    }
}

/// Derives the tri-state success flag for an END record.
///
/// Cascade: explicit error fields force `false`; otherwise an object output
/// is inspected for `error` / `success` / `status` fields; otherwise any
/// non-null, non-empty output counts as success. A `status` string that is
/// none of `success`/`ok`/`completed` falls through to the non-empty rule.
fn extract_success(payload: &HookPayload, output_raw: Option<&str>) -> Option<bool> {
    let has = |field: &Option<String>| field.as_deref().is_some_and(|v| !v.is_empty());
    if has(&payload.error) || has(&payload.error_type) {
        return Some(false);
    }

    let raw = output_raw?;
    if raw.is_empty() || raw == "null" {
        return None;
    }

    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(raw) {
        if let Some(error) = fields.get("error") {
            if is_truthy(error) {
                return Some(false);
            }
        }
        if let Some(Value::Bool(success)) = fields.get("success") {
            return Some(*success);
        }
        if let Some(Value::String(status)) = fields.get("status") {
            let status = status.to_lowercase();
            if matches!(status.as_str(), "success" | "ok" | "completed") {
                return Some(true);
            }
        }
    }

    Some(true)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn payload(json: &str) -> HookPayload {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_begin_record_has_no_outcome_fields() {
        let record = normalize(&payload(
            r#"{"hook_event_name":"PreToolUse","tool_name":"Edit","session_id":"s1",
                "tool_input":{"file_path":"/tmp/a"},"timestamp":"2025-09-03T12:00:00.000Z"}"#,
        ))
        .unwrap();

        assert_eq!(record.hook_event, HookEvent::PreToolUse);
        assert_eq!(record.tool_name, "Edit");
        assert!(record.tool_output.is_none());
        assert!(record.success.is_none());
        assert!(record.tool_input.is_some());
    }

    #[test]
    fn test_end_record_coalesces_tool_response_over_output() {
        let record = normalize(&payload(
            r#"{"hook_event_name":"PostToolUse","tool_name":"Edit",
                "tool_response":{"status":"ok"},"output":{"ignored":true}}"#,
        ))
        .unwrap();
        assert_eq!(
            record.tool_output.unwrap()["status"],
            Value::String("ok".into())
        );
        assert_eq!(record.success, Some(true));
    }

    #[test]
    fn test_unrecognized_event_is_dropped_without_writing() {
        let temp = tempdir().unwrap();
        process_hook_in(
            temp.path(),
            r#"{"hook_event_name":"UnknownEvent","tool_name":"Edit"}"#.as_bytes(),
        );
        assert!(!temp.path().join("logs").exists());
    }

    #[test]
    fn test_malformed_json_is_swallowed() {
        let temp = tempdir().unwrap();
        process_hook_in(temp.path(), "{not json".as_bytes());
        assert!(!temp.path().join("logs").exists());
    }

    #[test]
    fn test_explicit_error_forces_failure() {
        let record = normalize(&payload(
            r#"{"hook_event_name":"PostToolUse","tool_name":"Bash",
                "error":"exit 1","error_type":"exit_code_1","tool_response":{"status":"ok"}}"#,
        ))
        .unwrap();
        assert_eq!(record.success, Some(false));
        assert_eq!(record.error.as_deref(), Some("exit 1"));
        assert_eq!(record.error_type.as_deref(), Some("exit_code_1"));
    }

    #[test]
    fn test_error_field_in_output_forces_failure() {
        let record = normalize(&payload(
            r#"{"hook_event_name":"PostToolUse","tool_name":"Bash",
                "tool_response":{"error":"boom"}}"#,
        ))
        .unwrap();
        assert_eq!(record.success, Some(false));
    }

    #[test]
    fn test_false_error_field_is_not_a_failure() {
        let record = normalize(&payload(
            r#"{"hook_event_name":"PostToolUse","tool_name":"Bash",
                "tool_response":{"error":false,"data":1}}"#,
        ))
        .unwrap();
        assert_eq!(record.success, Some(true));
    }

    #[test]
    fn test_explicit_success_field_is_used_directly() {
        for (literal, expected) in [("true", Some(true)), ("false", Some(false))] {
            let record = normalize(&payload(&format!(
                r#"{{"hook_event_name":"PostToolUse","tool_name":"Bash",
                    "tool_response":{{"success":{literal}}}}}"#
            )))
            .unwrap();
            assert_eq!(record.success, expected);
        }
    }

    #[test]
    fn test_status_strings() {
        for status in ["success", "OK", "Completed"] {
            let record = normalize(&payload(&format!(
                r#"{{"hook_event_name":"PostToolUse","tool_name":"Bash",
                    "tool_response":{{"status":"{status}"}}}}"#
            )))
            .unwrap();
            assert_eq!(record.success, Some(true), "status {status}");
        }

        // An unrecognized status falls through to the non-empty-output rule.
        let record = normalize(&payload(
            r#"{"hook_event_name":"PostToolUse","tool_name":"Bash",
                "tool_response":{"status":"pending"}}"#,
        ))
        .unwrap();
        assert_eq!(record.success, Some(true));
    }

    #[test]
    fn test_nonempty_output_counts_as_success() {
        let record = normalize(&payload(
            r#"{"hook_event_name":"PostToolUse","tool_name":"Read","output":"file contents"}"#,
        ))
        .unwrap();
        assert_eq!(record.success, Some(true));
    }

    #[test]
    fn test_null_or_missing_output_leaves_success_unset() {
        let record = normalize(&payload(
            r#"{"hook_event_name":"PostToolUse","tool_name":"Read","output":null}"#,
        ))
        .unwrap();
        assert_eq!(record.success, None);
        assert!(record.tool_output.is_none());

        let record = normalize(&payload(
            r#"{"hook_event_name":"PostToolUse","tool_name":"Read"}"#,
        ))
        .unwrap();
        assert_eq!(record.success, None);
    }

    #[test]
    fn test_begin_and_end_share_a_correlation_id() {
        let begin = normalize(&payload(
            r#"{"hook_event_name":"PreToolUse","tool_name":"Edit","session_id":"s1",
                "tool_input":{"file_path":"/tmp/a"},"timestamp":"2025-09-03T12:00:00.100Z"}"#,
        ))
        .unwrap();
        let end = normalize(&payload(
            r#"{"hook_event_name":"PostToolUse","tool_name":"Edit","session_id":"s1",
                "tool_input":{"file_path":"/tmp/a"},"output":"done",
                "timestamp":"2025-09-03T12:00:00.900Z"}"#,
        ))
        .unwrap();
        assert_eq!(begin.tool_id, end.tool_id);
    }

    #[test]
    fn test_request_id_is_used_verbatim() {
        let record = normalize(&payload(
            r#"{"hook_event_name":"PreToolUse","tool_name":"Edit","request_id":"req-7"}"#,
        ))
        .unwrap();
        assert_eq!(record.tool_id, "req-7");
    }
}
