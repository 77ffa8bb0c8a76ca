//! Core library for `the-startup` - shared telemetry logic for the hook
//! binary and the dashboard.
//!
//! The pipeline: Claude Code invokes the hook binary with one JSON payload on
//! stdin. [`metrics::collector`] normalizes the payload into a BEGIN or END
//! record, [`ids`] derives the correlation key, and [`metrics::writer`]
//! appends the record to a daily JSONL file under the base directory resolved
//! by [`paths`]. The dashboard later replays those files through
//! [`metrics::reader`] and [`metrics::aggregate`]. Task delegations to
//! `the-*` agents additionally flow through [`context`] into per-agent
//! conversation files.

pub mod context;
pub mod ids;
pub mod metrics;
pub mod paths;
pub mod timestamp;
