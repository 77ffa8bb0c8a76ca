//! Append-only daily record files.
//!
//! Records land in `<base>/logs/YYYYMMDD.jsonl`, one JSON line each. A
//! process-wide mutex serializes open+write+close so records from one
//! process land in program order on whole-line boundaries; cross-process
//! safety relies on OS append atomicity for small writes, so serialized
//! records should stay under ~4 KiB. The same mutex also guards the agent
//! context store, which shares [`append_line`].
//!
//! The writer never reports failure upward. The host calls the hook again on
//! the next invocation; a dropped record is preferable to a disturbed hook.

use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use fs_err::OpenOptions;
use once_cell::sync::Lazy;

use crate::paths;

use super::types::MetricsRecord;

static FILE_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Appends one record to the daily file under the resolved base directory.
pub fn append_record(record: &MetricsRecord) {
    append_record_in(&paths::resolve_base(), record);
}

/// Appends one record to the daily file under `base`.
pub fn append_record_in(base: &Path, record: &MetricsRecord) {
    let logs_dir = paths::logs_dir(base);
    if let Err(e) = fs_err::create_dir_all(&logs_dir) {
        tracing::debug!(error = %e, "failed to create logs directory");
        return;
    }

    let filename = format!("{}.jsonl", record.timestamp.format("%Y%m%d"));
    let line = match serde_json::to_string(record) {
        Ok(line) => line,
        Err(e) => {
            tracing::debug!(error = %e, "failed to serialize record");
            return;
        }
    };

    if let Err(e) = append_line(&logs_dir.join(filename), &line) {
        tracing::debug!(error = %e, "failed to append record");
    }
}

/// Appends `line` plus a newline to `path` as a single write, under the
/// process-wide file mutex, fsyncing before close.
pub(crate) fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let _guard = FILE_MUTEX.lock().unwrap_or_else(PoisonError::into_inner);

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut framed = String::with_capacity(line.len() + 1);
    framed.push_str(line);
    framed.push('\n');
    file.write_all(framed.as_bytes())?;
    file.sync_all()?;
    Ok(())
}
