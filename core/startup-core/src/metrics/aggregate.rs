//! Correlation and aggregation of record streams.
//!
//! BEGIN/END halves are paired by `tool_id` without relying on stream order:
//! a pair completes whichever half arrives second, and the duration is
//! computed at completion. ENDs that never pair still count as one
//! invocation at finalization, using their persisted `duration_ms` when
//! present. Per `tool_id` the states are `NONE -> HAS_BEGIN -> COMPLETE` and
//! `NONE -> HAS_END -> COMPLETE`; `COMPLETE` is terminal, though a surplus
//! BEGIN is still counted as an invocation.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, DurationRound, Utc};

use super::types::{
    ErrorPattern, HookEvent, HourlyStats, MetricsRecord, MetricsSummary, PairMap, PairState,
    TimePeriod, ToolStats,
};

const TOP_ERROR_LIMIT: usize = 10;
const NORMALIZED_ERROR_LIMIT: usize = 200;

#[derive(Default)]
struct HourBucket {
    total_calls: u64,
    success_count: u64,
    failure_count: u64,
    tools: HashSet<String>,
}

/// Aggregates a stream of records into a [`MetricsSummary`].
///
/// The stream is consumed exactly once; callers apply filtering upstream
/// (see [`crate::metrics::stream_records_in`]).
pub fn aggregate_records(records: impl IntoIterator<Item = MetricsRecord>) -> MetricsSummary {
    let mut tool_stats: BTreeMap<String, ToolStats> = BTreeMap::new();
    let mut sessions: HashSet<String> = HashSet::new();
    // error_type -> normalized message -> count, plus the tools hit per type.
    let mut error_counts: HashMap<String, HashMap<String, u64>> = HashMap::new();
    let mut error_tools: HashMap<String, HashSet<String>> = HashMap::new();
    let mut hourly: HashMap<DateTime<Utc>, HourBucket> = HashMap::new();
    let mut pairs: PairMap = HashMap::new();
    let mut bounds: Option<(DateTime<Utc>, DateTime<Utc>)> = None;

    for record in records {
        bounds = Some(match bounds {
            None => (record.timestamp, record.timestamp),
            Some((min, max)) => (min.min(record.timestamp), max.max(record.timestamp)),
        });

        if !record.session_id.is_empty() {
            sessions.insert(record.session_id.clone());
        }

        let stats = tool_stats
            .entry(record.tool_name.clone())
            .or_insert_with(|| ToolStats {
                name: record.tool_name.clone(),
                min_duration_ms: i64::MAX,
                ..ToolStats::default()
            });
        if stats.last_used.map_or(true, |last| record.timestamp > last) {
            stats.last_used = Some(record.timestamp);
        }

        let hour_key = record
            .timestamp
            .duration_trunc(chrono::Duration::hours(1))
            .unwrap_or(record.timestamp);
        let bucket = hourly.entry(hour_key).or_default();
        bucket.tools.insert(record.tool_name.clone());

        match record.hook_event {
            HookEvent::PreToolUse => {
                stats.total_calls += 1;
                bucket.total_calls += 1;

                match pairs.get(&record.tool_id) {
                    None => {
                        pairs.insert(
                            record.tool_id.clone(),
                            PairState::HasBegin {
                                at: record.timestamp,
                            },
                        );
                    }
                    Some(PairState::HasEnd { at, .. }) => {
                        let duration = at.signed_duration_since(record.timestamp).num_milliseconds();
                        if duration >= 0 {
                            apply_duration(stats, duration);
                        }
                        pairs.insert(record.tool_id.clone(), PairState::Complete);
                    }
                    // Duplicate BEGIN or already-complete pair: counted above,
                    // ignored for pairing.
                    Some(PairState::HasBegin { .. }) | Some(PairState::Complete) => {}
                }
            }
            HookEvent::PostToolUse => {
                match record.success {
                    Some(true) => {
                        stats.success_count += 1;
                        bucket.success_count += 1;
                    }
                    Some(false) => {
                        stats.failure_count += 1;
                        bucket.failure_count += 1;

                        if let Some(error_type) = record.error_type.as_deref() {
                            *stats.error_types.entry(error_type.to_string()).or_insert(0) += 1;

                            let message =
                                normalize_error_message(record.error.as_deref().unwrap_or(""));
                            *error_counts
                                .entry(error_type.to_string())
                                .or_default()
                                .entry(message)
                                .or_insert(0) += 1;
                            error_tools
                                .entry(error_type.to_string())
                                .or_default()
                                .insert(record.tool_name.clone());
                        }
                    }
                    None => {}
                }

                match pairs.get(&record.tool_id) {
                    None => {
                        pairs.insert(
                            record.tool_id.clone(),
                            PairState::HasEnd {
                                at: record.timestamp,
                                tool_name: record.tool_name.clone(),
                                supplied_duration_ms: record.duration_ms,
                            },
                        );
                    }
                    Some(PairState::HasBegin { at }) => {
                        let duration = record.timestamp.signed_duration_since(*at).num_milliseconds();
                        if duration >= 0 {
                            apply_duration(stats, duration);
                        }
                        pairs.insert(record.tool_id.clone(), PairState::Complete);
                    }
                    // A second END for the same ID is not a recognized
                    // transition; ignore it.
                    Some(PairState::HasEnd { .. }) | Some(PairState::Complete) => {}
                }
            }
        }
    }

    // Orphan ENDs still represent one invocation each; their persisted
    // duration is the only one available.
    for state in pairs.into_values() {
        if let PairState::HasEnd {
            at,
            tool_name,
            supplied_duration_ms,
        } = state
        {
            if let Some(stats) = tool_stats.get_mut(&tool_name) {
                stats.total_calls += 1;
                if let Some(duration) = supplied_duration_ms.filter(|d| *d >= 0) {
                    apply_duration(stats, duration);
                }
            }
            let hour_key = at
                .duration_trunc(chrono::Duration::hours(1))
                .unwrap_or(at);
            if let Some(bucket) = hourly.get_mut(&hour_key) {
                bucket.total_calls += 1;
            }
        }
    }

    let mut total_calls = 0u64;
    let mut total_successes = 0u64;
    let mut total_failures = 0u64;
    for stats in tool_stats.values_mut() {
        let outcomes = stats.success_count + stats.failure_count;
        stats.avg_duration_ms = if outcomes > 0 {
            stats.total_duration_ms as f64 / outcomes as f64
        } else {
            0.0
        };
        if stats.min_duration_ms == i64::MAX {
            stats.min_duration_ms = 0;
        }
        total_calls += stats.total_calls;
        total_successes += stats.success_count;
        total_failures += stats.failure_count;
    }

    let success_rate = if total_successes + total_failures > 0 {
        total_successes as f64 / (total_successes + total_failures) as f64 * 100.0
    } else {
        0.0
    };

    MetricsSummary {
        period: bounds.map(|(start, end)| TimePeriod { start, end }),
        total_calls,
        unique_sessions: sessions.len(),
        success_rate,
        tool_stats,
        top_errors: build_top_errors(error_counts, error_tools),
        hourly_activity: build_hourly_activity(hourly),
    }
}

fn apply_duration(stats: &mut ToolStats, duration_ms: i64) {
    stats.total_duration_ms += duration_ms;
    stats.min_duration_ms = stats.min_duration_ms.min(duration_ms);
    stats.max_duration_ms = stats.max_duration_ms.max(duration_ms);
}

/// Normalizes a raw error message for clustering.
///
/// Whitespace is collapsed; tokens containing `/` and longer than 10 chars
/// become `<path>`; tokens longer than 20 chars become `<id>`; the joined
/// result is truncated to 200 chars including a trailing `...`. The
/// operation is idempotent: normalizing a normalized message is a no-op.
pub fn normalize_error_message(message: &str) -> String {
    if message.is_empty() {
        return "unknown error".to_string();
    }

    let message = message.replace('\\', "/");
    let normalized: Vec<&str> = message
        .split_whitespace()
        .map(|token| {
            if token.contains('/') && token.len() > 10 {
                "<path>"
            } else if token.len() > 20 {
                "<id>"
            } else {
                token
            }
        })
        .collect();
    let mut result = normalized.join(" ");

    if result.is_empty() {
        return "unknown error".to_string();
    }

    if result.chars().count() > NORMALIZED_ERROR_LIMIT {
        result = result
            .chars()
            .take(NORMALIZED_ERROR_LIMIT - 3)
            .collect::<String>()
            + "...";
    }
    result
}

fn build_top_errors(
    error_counts: HashMap<String, HashMap<String, u64>>,
    error_tools: HashMap<String, HashSet<String>>,
) -> Vec<ErrorPattern> {
    let mut patterns: Vec<ErrorPattern> = Vec::new();
    for (error_type, messages) in error_counts {
        let mut tools: Vec<String> = error_tools
            .get(&error_type)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        tools.sort();

        for (message, count) in messages {
            patterns.push(ErrorPattern {
                error_type: error_type.clone(),
                error_message: message,
                count,
                tools: tools.clone(),
            });
        }
    }

    patterns.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.error_type.cmp(&b.error_type))
            .then_with(|| a.error_message.cmp(&b.error_message))
    });
    patterns.truncate(TOP_ERROR_LIMIT);
    patterns
}

fn build_hourly_activity(hourly: HashMap<DateTime<Utc>, HourBucket>) -> Vec<HourlyStats> {
    let mut activity: Vec<HourlyStats> = hourly
        .into_iter()
        .map(|(hour, bucket)| HourlyStats {
            hour,
            total_calls: bucket.total_calls,
            success_count: bucket.success_count,
            failure_count: bucket.failure_count,
            unique_tools: bucket.tools.len(),
        })
        .collect();
    activity.sort_by_key(|stats| stats.hour);
    activity
}
