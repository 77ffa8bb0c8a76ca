//! Tool-invocation telemetry: normalization, daily record storage, streaming
//! readback, and aggregation.

pub mod aggregate;
pub mod collector;
pub mod reader;
pub mod types;
pub mod writer;

pub use aggregate::aggregate_records;
pub use collector::{process_hook, process_hook_in};
pub use reader::{list_available_dates_in, stream_records, stream_records_in, RecordStream};
pub use types::{
    ErrorPattern, HookEvent, HookPayload, HourlyStats, MetricsRecord, MetricsSummary,
    RecordFilter, TimePeriod, ToolStats,
};
pub use writer::{append_record, append_record_in};
