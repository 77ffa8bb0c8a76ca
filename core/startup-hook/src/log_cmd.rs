//! The `log` command: hook ingestion on stdin plus metrics analysis.
//!
//! With no subcommand and no flags, one payload is read from stdin and
//! written to the daily metrics files, auto-dispatching on
//! `hook_event_name`. With `--assistant` or `--user` the payload goes down
//! the agent-context path instead. Collection always exits 0; only the
//! analysis subcommands surface errors to the terminal.

use std::io::{self, Write};

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use clap::{Args, Subcommand};

use startup_core::context::{self, DelegationPhase};
use startup_core::metrics::{aggregate_records, process_hook, stream_records, RecordFilter};

use crate::display;

#[derive(Args)]
pub struct LogArgs {
    /// Capture the delegation prompt sent to an agent (context path)
    #[arg(long, conflicts_with = "user")]
    assistant: bool,

    /// Capture the output returned by an agent (context path)
    #[arg(long)]
    user: bool,

    #[command(subcommand)]
    command: Option<LogCommand>,
}

#[derive(Subcommand)]
enum LogCommand {
    /// Display the aggregated metrics dashboard
    Summary(ReportArgs),

    /// Display detailed per-tool statistics
    Tools {
        #[command(flatten)]
        report: ReportArgs,

        /// Filter by tool name (repeatable)
        #[arg(long = "tool")]
        tools: Vec<String>,

        /// Number of top tools to show
        #[arg(long, default_value_t = 10)]
        top: usize,
    },

    /// Display error analysis and patterns
    Errors {
        #[command(flatten)]
        report: ReportArgs,

        /// Filter by a specific tool
        #[arg(long)]
        tool: Option<String>,

        /// Number of top errors to show
        #[arg(long, default_value_t = 10)]
        top: usize,
    },

    /// Display the hourly activity timeline
    Timeline(ReportArgs),

    /// Print recent conversation context for an agent
    Context {
        /// Agent identifier
        #[arg(long)]
        agent: String,

        /// Session identifier (defaults to the latest session with the agent)
        #[arg(long)]
        session: Option<String>,

        /// Number of entries to return (max 1000)
        #[arg(long, default_value_t = 50)]
        lines: usize,
    },
}

#[derive(Args)]
struct ReportArgs {
    /// Time range: today, yesterday, 1h, 24h, 7d, 30d, Nh, Nd, or YYYY-MM-DD
    #[arg(long, default_value = "7d")]
    since: String,

    /// Output format: terminal or json
    #[arg(long, default_value = "terminal")]
    format: String,

    /// Output file (- for stdout)
    #[arg(long, default_value = "-")]
    output: String,

    /// Filter by session ID
    #[arg(long)]
    session: Option<String>,
}

pub fn run(args: LogArgs) -> Result<(), String> {
    if let Some(command) = args.command {
        return run_analysis(command);
    }

    if args.assistant || args.user {
        let phase = if args.assistant {
            DelegationPhase::Begin
        } else {
            DelegationPhase::End
        };
        // The context path never fails the hook; problems are debug-only.
        if let Some(capture) = context::capture_delegation(io::stdin().lock(), phase) {
            let base = startup_core::paths::resolve_base();
            if let Err(e) = context::write_context_in(
                &base,
                &capture.session_id,
                &capture.agent_id,
                &capture.entry,
            ) {
                tracing::debug!(error = %e, "failed to write agent context");
            }
        }
        return Ok(());
    }

    process_hook(io::stdin().lock());
    Ok(())
}

fn run_analysis(command: LogCommand) -> Result<(), String> {
    match command {
        LogCommand::Summary(report) => {
            let filter = build_filter(&report, None)?;
            let summary = aggregate_records(stream_records(filter));
            let mut out = open_output(&report.output)?;
            match report.format.as_str() {
                "json" => display::render_json(&summary, &mut out),
                _ => display::render_summary(&summary, &mut out, 10),
            }
            .map_err(|e| format!("failed to write output: {e}"))
        }
        LogCommand::Tools { report, tools, top } => {
            let filter = build_filter(&report, Some(tools))?;
            let summary = aggregate_records(stream_records(filter));
            let mut out = open_output(&report.output)?;
            match report.format.as_str() {
                "json" => display::render_json(&summary, &mut out),
                _ => display::render_tools(&summary, &mut out, top),
            }
            .map_err(|e| format!("failed to write output: {e}"))
        }
        LogCommand::Errors { report, tool, top } => {
            let mut filter = build_filter(&report, tool.map(|t| vec![t]))?;
            filter.failures_only = true;
            let summary = aggregate_records(stream_records(filter));
            let mut out = open_output(&report.output)?;
            match report.format.as_str() {
                "json" => display::render_json(&summary, &mut out),
                _ => display::render_errors(&summary, &mut out, top),
            }
            .map_err(|e| format!("failed to write output: {e}"))
        }
        LogCommand::Timeline(report) => {
            let filter = build_filter(&report, None)?;
            let summary = aggregate_records(stream_records(filter));
            let mut out = open_output(&report.output)?;
            match report.format.as_str() {
                "json" => display::render_json(&summary, &mut out),
                _ => display::render_timeline(&summary, &mut out),
            }
            .map_err(|e| format!("failed to write output: {e}"))
        }
        LogCommand::Context {
            agent,
            session,
            lines,
        } => {
            let base = startup_core::paths::resolve_base();
            let tail = context::tail_in(&base, session.as_deref().unwrap_or(""), &agent, lines);
            let mut out = io::stdout().lock();
            for line in tail {
                writeln!(out, "{line}").map_err(|e| format!("failed to write output: {e}"))?;
            }
            Ok(())
        }
    }
}

fn build_filter(report: &ReportArgs, tools: Option<Vec<String>>) -> Result<RecordFilter, String> {
    let mut filter = parse_time_filter(&report.since)?;
    if let Some(tools) = tools {
        filter.tool_names = tools;
    }
    if let Some(session) = &report.session {
        filter.session_ids = vec![session.clone()];
    }
    Ok(filter)
}

fn open_output(target: &str) -> Result<Box<dyn Write>, String> {
    if target.is_empty() || target == "-" {
        Ok(Box::new(io::stdout().lock()))
    } else {
        fs_err::File::create(target)
            .map(|f| Box::new(f) as Box<dyn Write>)
            .map_err(|e| format!("failed to create output file: {e}"))
    }
}

/// Parses a `--since` value into a record filter. All boundaries are UTC.
fn parse_time_filter(since: &str) -> Result<RecordFilter, String> {
    let now = Utc::now();
    let since = if since.is_empty() { "7d" } else { since };

    let day_range = |date: NaiveDate| {
        let start = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
        let end = start + chrono::Duration::days(1) - chrono::Duration::milliseconds(1);
        RecordFilter::for_range(start, end)
    };

    match since.to_lowercase().as_str() {
        "today" => {
            let start = Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::MIN));
            Ok(RecordFilter::for_range(start, now))
        }
        "yesterday" => {
            let date = now.date_naive() - chrono::Duration::days(1);
            Ok(day_range(date))
        }
        value => {
            if let Some(hours) = value.strip_suffix('h') {
                let hours: i64 = hours
                    .parse()
                    .map_err(|_| format!("invalid --since value: {since}"))?;
                return Ok(RecordFilter::for_range(
                    now - chrono::Duration::hours(hours),
                    now,
                ));
            }
            if let Some(days) = value.strip_suffix('d') {
                let days: i64 = days
                    .parse()
                    .map_err(|_| format!("invalid --since value: {since}"))?;
                return Ok(RecordFilter::last_days(days));
            }
            if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
                return Ok(day_range(date));
            }
            Err(format!("unrecognized time format: {since}"))
        }
    }
}
