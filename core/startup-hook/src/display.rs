//! Terminal and JSON rendering of aggregated metrics.
//!
//! This is a plain consumer of the aggregation output; the interactive
//! dashboard has its own renderer. Terminal output is fixed-width text so it
//! stays readable when piped to a file.

use std::io::Write;

use startup_core::metrics::MetricsSummary;

pub fn render_json(summary: &MetricsSummary, out: &mut dyn Write) -> std::io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, summary)?;
    writeln!(out)
}

pub fn render_summary(
    summary: &MetricsSummary,
    out: &mut dyn Write,
    top: usize,
) -> std::io::Result<()> {
    writeln!(out, "Metrics Summary{}", period_suffix(summary))?;
    writeln!(out)?;
    writeln!(out, "Overview")?;
    writeln!(out, "--------")?;
    writeln!(out, "  Total invocations:    {}", summary.total_calls)?;
    writeln!(out, "  Unique sessions:      {}", summary.unique_sessions)?;
    writeln!(out, "  Overall success rate: {:.1}%", summary.success_rate)?;
    writeln!(out)?;

    writeln!(out, "Top tools by usage")?;
    writeln!(out, "------------------")?;
    tool_table(summary, out, top)?;

    if !summary.top_errors.is_empty() {
        writeln!(out)?;
        writeln!(out, "Most common errors")?;
        writeln!(out, "------------------")?;
        error_table(summary, out, top)?;
    }
    Ok(())
}

pub fn render_tools(
    summary: &MetricsSummary,
    out: &mut dyn Write,
    top: usize,
) -> std::io::Result<()> {
    writeln!(out, "Tool usage{}", period_suffix(summary))?;
    writeln!(out)?;
    tool_table(summary, out, top)
}

pub fn render_errors(
    summary: &MetricsSummary,
    out: &mut dyn Write,
    top: usize,
) -> std::io::Result<()> {
    writeln!(out, "Error analysis{}", period_suffix(summary))?;
    writeln!(out)?;
    if summary.top_errors.is_empty() {
        writeln!(out, "No errors recorded.")?;
        return Ok(());
    }
    error_table(summary, out, top)
}

pub fn render_timeline(summary: &MetricsSummary, out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "Hourly activity{}", period_suffix(summary))?;
    writeln!(out)?;
    if summary.hourly_activity.is_empty() {
        writeln!(out, "No activity recorded.")?;
        return Ok(());
    }

    writeln!(
        out,
        "  {:<18} {:>7} {:>9} {:>9} {:>7}",
        "hour (UTC)", "calls", "success", "failure", "tools"
    )?;
    for bucket in &summary.hourly_activity {
        writeln!(
            out,
            "  {:<18} {:>7} {:>9} {:>9} {:>7}",
            bucket.hour.format("%Y-%m-%d %H:00"),
            bucket.total_calls,
            bucket.success_count,
            bucket.failure_count,
            bucket.unique_tools
        )?;
    }
    Ok(())
}

fn tool_table(summary: &MetricsSummary, out: &mut dyn Write, top: usize) -> std::io::Result<()> {
    let tools = summary.tools_by_usage();
    if tools.is_empty() {
        return writeln!(out, "No tool invocations recorded.");
    }

    writeln!(
        out,
        "  {:<20} {:>7} {:>9} {:>9} {:>10} {:>10} {:>10}",
        "tool", "calls", "success", "failure", "avg", "min", "max"
    )?;
    for stats in tools.iter().take(top.max(1)) {
        writeln!(
            out,
            "  {:<20} {:>7} {:>9} {:>9} {:>10} {:>10} {:>10}",
            stats.name,
            stats.total_calls,
            stats.success_count,
            stats.failure_count,
            format_duration(stats.avg_duration_ms as i64),
            format_duration(stats.min_duration_ms),
            format_duration(stats.max_duration_ms),
        )?;
    }
    Ok(())
}

fn error_table(summary: &MetricsSummary, out: &mut dyn Write, top: usize) -> std::io::Result<()> {
    for pattern in summary.top_errors.iter().take(top.max(1)) {
        writeln!(
            out,
            "  {:>4}x [{}] {}",
            pattern.count, pattern.error_type, pattern.error_message
        )?;
        if !pattern.tools.is_empty() {
            writeln!(out, "        tools: {}", pattern.tools.join(", "))?;
        }
    }
    Ok(())
}

fn period_suffix(summary: &MetricsSummary) -> String {
    match &summary.period {
        Some(period) => format!(
            " ({} to {})",
            period.start.format("%Y-%m-%d %H:%M"),
            period.end.format("%Y-%m-%d %H:%M")
        ),
        None => String::new(),
    }
}

fn format_duration(ms: i64) -> String {
    if ms >= 60_000 {
        format!("{:.1}m", ms as f64 / 60_000.0)
    } else if ms >= 1000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{ms}ms")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use startup_core::metrics::{aggregate_records, HookEvent, MetricsRecord};
    use startup_core::timestamp;

    fn sample_summary() -> MetricsSummary {
        let begin = MetricsRecord {
            tool_id: "e1".into(),
            tool_name: "Edit".into(),
            hook_event: HookEvent::PreToolUse,
            timestamp: timestamp::parse_flexible("2025-09-03T12:00:00.000Z").unwrap(),
            session_id: "s1".into(),
            transcript_path: None,
            cwd: None,
            tool_input: None,
            tool_output: None,
            success: None,
            error: None,
            error_type: None,
            duration_ms: None,
        };
        let mut end = begin.clone();
        end.hook_event = HookEvent::PostToolUse;
        end.timestamp = timestamp::parse_flexible("2025-09-03T12:00:01.000Z").unwrap();
        end.success = Some(false);
        end.error = Some("cp /tmp/aaaaaaaaaaaa /dst".into());
        end.error_type = Some("exit_code_1".into());
        aggregate_records(vec![begin, end])
    }

    #[test]
    fn test_summary_renders_overview_and_errors() {
        let mut buffer = Vec::new();
        render_summary(&sample_summary(), &mut buffer, 10).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.contains("Total invocations:    1"));
        assert!(text.contains("Edit"));
        assert!(text.contains("exit_code_1"));
        assert!(text.contains("cp <path> /dst"));
    }

    #[test]
    fn test_json_output_is_parseable() {
        let mut buffer = Vec::new();
        render_json(&sample_summary(), &mut buffer).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(value["total_calls"], 1);
        assert_eq!(value["tool_stats"]["Edit"]["failure_count"], 1);
    }

    #[test]
    fn test_empty_summary_renders_placeholders() {
        let summary = MetricsSummary::default();
        let mut buffer = Vec::new();
        render_summary(&summary, &mut buffer, 10).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("No tool invocations recorded."));
    }

    #[test]
    fn test_timeline_lists_buckets() {
        let mut buffer = Vec::new();
        render_timeline(&sample_summary(), &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("2025-09-03 12:00"));
    }

    #[test]
    fn test_format_duration_units() {
        assert_eq!(format_duration(250), "250ms");
        assert_eq!(format_duration(1500), "1.5s");
        assert_eq!(format_duration(90_000), "1.5m");
    }
}
