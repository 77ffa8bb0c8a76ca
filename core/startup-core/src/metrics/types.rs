//! Serialized types for the metrics pipeline.
//!
//! [`HookPayload`] is the transient stdin shape; [`MetricsRecord`] is the
//! persisted line format. Absent optionals are omitted on serialization, and
//! unknown payload fields are ignored so host-side schema drift never breaks
//! ingestion.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;

use crate::timestamp::serde_millis;

/// One JSON document as delivered by the host on stdin.
///
/// `tool_input`/`tool_response`/`output` stay as raw JSON text: correlation
/// hashing must see the exact payload bytes, untouched by re-serialization.
#[derive(Debug, Deserialize)]
pub struct HookPayload {
    #[serde(default)]
    pub hook_event_name: String,
    #[serde(default)]
    pub tool_name: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub transcript_path: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub tool_input: Option<Box<RawValue>>,
    #[serde(default)]
    pub tool_response: Option<Box<RawValue>>,
    #[serde(default)]
    pub output: Option<Box<RawValue>>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
}

impl HookPayload {
    /// The END-side output: `tool_response` when present, else `output`.
    pub fn coalesced_output(&self) -> Option<&RawValue> {
        self.tool_response
            .as_deref()
            .or(self.output.as_deref())
    }
}

/// The two recognized invocation phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HookEvent {
    PreToolUse,
    PostToolUse,
}

/// One persisted tool-invocation phase (a line in a daily file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub tool_id: String,
    pub tool_name: String,
    pub hook_event: HookEvent,
    #[serde(with = "serde_millis")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

/// Record selection for streaming and aggregation.
///
/// Empty allow-lists match everything. Duration bounds only match records
/// that actually carry a `duration_ms`.
#[derive(Debug, Clone)]
pub struct RecordFilter {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub tool_names: Vec<String>,
    pub session_ids: Vec<String>,
    pub success_only: bool,
    pub failures_only: bool,
    pub min_duration_ms: Option<i64>,
    pub max_duration_ms: Option<i64>,
}

impl RecordFilter {
    pub fn for_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        RecordFilter {
            start,
            end,
            tool_names: Vec::new(),
            session_ids: Vec::new(),
            success_only: false,
            failures_only: false,
            min_duration_ms: None,
            max_duration_ms: None,
        }
    }

    /// Convenience filter covering the last `days` days up to now.
    pub fn last_days(days: i64) -> Self {
        let now = Utc::now();
        Self::for_range(now - chrono::Duration::days(days), now)
    }

    pub fn matches(&self, record: &MetricsRecord) -> bool {
        if record.timestamp < self.start || record.timestamp > self.end {
            return false;
        }
        if !self.tool_names.is_empty() && !self.tool_names.contains(&record.tool_name) {
            return false;
        }
        if !self.session_ids.is_empty() && !self.session_ids.contains(&record.session_id) {
            return false;
        }
        if self.success_only && record.success != Some(true) {
            return false;
        }
        if self.failures_only && record.success != Some(false) {
            return false;
        }
        if let Some(min) = self.min_duration_ms {
            if !record.duration_ms.is_some_and(|d| d >= min) {
                return false;
            }
        }
        if let Some(max) = self.max_duration_ms {
            if !record.duration_ms.is_some_and(|d| d <= max) {
                return false;
            }
        }
        true
    }
}

/// Per-tool aggregate statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolStats {
    pub name: String,
    pub total_calls: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub total_duration_ms: i64,
    pub min_duration_ms: i64,
    pub max_duration_ms: i64,
    pub avg_duration_ms: f64,
    pub error_types: BTreeMap<String, u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
}

/// Activity within one hour-truncated UTC bucket.
#[derive(Debug, Clone, Serialize)]
pub struct HourlyStats {
    pub hour: DateTime<Utc>,
    pub total_calls: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub unique_tools: usize,
}

/// A normalized error message cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPattern {
    pub error_type: String,
    pub error_message: String,
    pub count: u64,
    pub tools: Vec<String>,
}

/// Observed time bounds of the aggregated records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimePeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Output of [`crate::metrics::aggregate_records`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<TimePeriod>,
    pub total_calls: u64,
    pub unique_sessions: usize,
    pub success_rate: f64,
    pub tool_stats: BTreeMap<String, ToolStats>,
    pub top_errors: Vec<ErrorPattern>,
    pub hourly_activity: Vec<HourlyStats>,
}

impl MetricsSummary {
    /// Tools ordered by call volume descending, name ascending on ties.
    pub fn tools_by_usage(&self) -> Vec<&ToolStats> {
        let mut tools: Vec<&ToolStats> = self.tool_stats.values().collect();
        tools.sort_by(|a, b| b.total_calls.cmp(&a.total_calls).then(a.name.cmp(&b.name)));
        tools
    }
}

/// Internal correlation scratch state, keyed by `tool_id`.
#[derive(Debug)]
pub(crate) enum PairState {
    HasBegin {
        at: DateTime<Utc>,
    },
    HasEnd {
        at: DateTime<Utc>,
        tool_name: String,
        supplied_duration_ms: Option<i64>,
    },
    Complete,
}

pub(crate) type PairMap = HashMap<String, PairState>;
