//! End-to-end pipeline tests: hook payloads in, aggregated summaries and
//! context files out, everything rooted in a temp directory.

use chrono::{TimeZone, Utc};
use tempfile::tempdir;

use startup_core::context::{
    capture_delegation_in, tail_in, write_context_in, ContextEntry, DelegationPhase,
};
use startup_core::metrics::{
    aggregate_records, process_hook_in, stream_records_in, RecordFilter,
};

fn september() -> RecordFilter {
    RecordFilter::for_range(
        Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 9, 30, 23, 59, 59).unwrap(),
    )
}

#[test]
fn metrics_path_collects_pairs_and_aggregates() {
    let temp = tempdir().unwrap();

    let begin = r#"{
        "hook_event_name": "PreToolUse",
        "tool_name": "Edit",
        "session_id": "dev-20250903-120000",
        "cwd": "/project",
        "tool_input": {"file_path": "/project/src/main.rs"},
        "timestamp": "2025-09-03T12:00:00.200Z"
    }"#;
    let end = r#"{
        "hook_event_name": "PostToolUse",
        "tool_name": "Edit",
        "session_id": "dev-20250903-120000",
        "cwd": "/project",
        "tool_input": {"file_path": "/project/src/main.rs"},
        "tool_response": {"success": true},
        "timestamp": "2025-09-03T12:00:00.700Z"
    }"#;

    process_hook_in(temp.path(), begin.as_bytes());
    process_hook_in(temp.path(), end.as_bytes());

    let records: Vec<_> = stream_records_in(temp.path(), september()).collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].tool_id, records[1].tool_id);

    let summary = aggregate_records(records);
    let stats = &summary.tool_stats["Edit"];
    assert_eq!(stats.total_calls, 1);
    assert_eq!(stats.success_count, 1);
    assert_eq!(stats.total_duration_ms, 500);
    assert_eq!(summary.unique_sessions, 1);
}

#[test]
fn metrics_path_ignores_unrecognized_events() {
    let temp = tempdir().unwrap();
    process_hook_in(
        temp.path(),
        r#"{"hook_event_name":"SessionStart","session_id":"s1"}"#.as_bytes(),
    );
    assert!(!temp.path().join("logs").exists());
}

#[test]
fn metrics_survive_a_corrupt_line_between_halves() {
    let temp = tempdir().unwrap();
    process_hook_in(
        temp.path(),
        r#"{"hook_event_name":"PreToolUse","tool_name":"Bash","session_id":"s1",
            "tool_input":{"command":"ls"},"timestamp":"2025-09-03T09:00:00.100Z"}"#
            .as_bytes(),
    );

    // Simulate a torn write from another process.
    let daily = temp.path().join("logs").join("20250903.jsonl");
    let mut content = fs_err::read_to_string(&daily).unwrap();
    content.push_str("{\"tool_id\": \"torn");
    content.push('\n');
    fs_err::write(&daily, content).unwrap();

    process_hook_in(
        temp.path(),
        r#"{"hook_event_name":"PostToolUse","tool_name":"Bash","session_id":"s1",
            "tool_input":{"command":"ls"},"output":"ok",
            "timestamp":"2025-09-03T09:00:00.900Z"}"#
            .as_bytes(),
    );

    let summary = aggregate_records(stream_records_in(temp.path(), september()));
    let stats = &summary.tool_stats["Bash"];
    assert_eq!(stats.total_calls, 1);
    assert_eq!(stats.success_count, 1);
    assert_eq!(stats.total_duration_ms, 800);
}

#[test]
fn context_path_routes_turns_to_agent_file() {
    let temp = tempdir().unwrap();

    let begin = r#"{
        "tool_name": "Task",
        "tool_input": {
            "subagent_type": "the-architect",
            "prompt": "SessionId: dev-20250903-120000\nAgentId: arch-001\nDesign the schema."
        }
    }"#;
    let capture =
        capture_delegation_in(temp.path(), begin.as_bytes(), DelegationPhase::Begin).unwrap();
    write_context_in(
        temp.path(),
        &capture.session_id,
        &capture.agent_id,
        &capture.entry,
    )
    .unwrap();

    let end = r#"{
        "tool_name": "Task",
        "tool_input": {
            "subagent_type": "the-architect",
            "prompt": "SessionId: dev-20250903-120000\nAgentId: arch-001\nDesign the schema."
        },
        "output": "Schema designed."
    }"#;
    let capture =
        capture_delegation_in(temp.path(), end.as_bytes(), DelegationPhase::End).unwrap();
    write_context_in(
        temp.path(),
        &capture.session_id,
        &capture.agent_id,
        &capture.entry,
    )
    .unwrap();

    let lines = tail_in(temp.path(), "dev-20250903-120000", "arch-001", 50);
    assert_eq!(lines.len(), 2);

    let first: ContextEntry = serde_json::from_str(&lines[0]).unwrap();
    assert!(first.content.contains("Design the schema."));
    let second: ContextEntry = serde_json::from_str(&lines[1]).unwrap();
    assert_eq!(second.content, "Schema designed.");
}

#[test]
fn context_path_drops_unmarked_agents_without_touching_disk() {
    let temp = tempdir().unwrap();
    let payload = r#"{
        "tool_name": "Task",
        "tool_input": {"subagent_type": "architect", "prompt": "SessionId: dev-1"}
    }"#;
    assert!(
        capture_delegation_in(temp.path(), payload.as_bytes(), DelegationPhase::Begin).is_none()
    );
    assert!(fs_err::read_dir(temp.path()).unwrap().next().is_none());
}

#[test]
fn second_agent_instance_gets_a_disambiguated_file() {
    let temp = tempdir().unwrap();

    // An agent file already exists for this generated name pattern; a new
    // delegation without an explicit AgentId must not collide with it.
    let payload = r#"{
        "tool_name": "Task",
        "tool_input": {
            "subagent_type": "the-tester",
            "prompt": "SessionId: dev-20250903-120000\nRun the tests."
        }
    }"#;
    let first =
        capture_delegation_in(temp.path(), payload.as_bytes(), DelegationPhase::Begin).unwrap();
    write_context_in(temp.path(), &first.session_id, &first.agent_id, &first.entry).unwrap();

    let second =
        capture_delegation_in(temp.path(), payload.as_bytes(), DelegationPhase::Begin).unwrap();
    assert_ne!(second.agent_id, first.agent_id);
    write_context_in(temp.path(), &second.session_id, &second.agent_id, &second.entry).unwrap();

    let session_dir = temp.path().join("dev-20250903-120000");
    assert!(session_dir.join(format!("{}.jsonl", first.agent_id)).exists());
    assert!(session_dir.join(format!("{}.jsonl", second.agent_id)).exists());
}
