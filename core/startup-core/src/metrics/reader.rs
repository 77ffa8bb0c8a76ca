//! Streaming readback of daily record files.
//!
//! [`RecordStream`] is a lazy, single-pass iterator: it walks the daily files
//! whose embedded date falls inside the filter's range (ascending), reads
//! them line by line through a `BufReader`, and yields only records matching
//! the filter. Blank and corrupt lines are skipped so one bad write never
//! poisons a day's data. Whole files are never held in memory.

use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use fs_err::File;

use crate::paths;

use super::types::{MetricsRecord, RecordFilter};

/// Streams records matching `filter` from the resolved base directory.
pub fn stream_records(filter: RecordFilter) -> RecordStream {
    stream_records_in(&paths::resolve_base(), filter)
}

/// Streams records matching `filter` from daily files under `base`.
pub fn stream_records_in(base: &Path, filter: RecordFilter) -> RecordStream {
    let logs_dir = paths::logs_dir(base);
    let mut files = Vec::new();

    let start = filter.start.date_naive();
    let end = filter.end.date_naive();
    let mut current = start;
    while current <= end {
        let path = logs_dir.join(format!("{}.jsonl", current.format("%Y%m%d")));
        if path.is_file() {
            files.push(path);
        }
        match current.succ_opt() {
            Some(next) => current = next,
            None => break,
        }
    }

    RecordStream {
        files: files.into_iter(),
        lines: None,
        filter,
    }
}

/// Lazy iterator over filtered records. See [`stream_records_in`].
pub struct RecordStream {
    files: std::vec::IntoIter<PathBuf>,
    lines: Option<Lines<BufReader<File>>>,
    filter: RecordFilter,
}

impl Iterator for RecordStream {
    type Item = MetricsRecord;

    fn next(&mut self) -> Option<MetricsRecord> {
        loop {
            if let Some(lines) = self.lines.as_mut() {
                for line in lines {
                    let line = match line {
                        Ok(line) => line,
                        // Read error mid-file: abandon this file, move on.
                        Err(_) => break,
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    let record: MetricsRecord = match serde_json::from_str(&line) {
                        Ok(record) => record,
                        Err(_) => continue,
                    };
                    if self.filter.matches(&record) {
                        return Some(record);
                    }
                }
                self.lines = None;
            }

            let path = self.files.next()?;
            match File::open(&path) {
                Ok(file) => self.lines = Some(BufReader::new(file).lines()),
                Err(e) => tracing::debug!(error = %e, "failed to open daily file"),
            }
        }
    }
}

/// Lists the dates for which daily files exist under `base`, ascending.
pub fn list_available_dates_in(base: &Path) -> Vec<NaiveDate> {
    let entries = match fs_err::read_dir(paths::logs_dir(base)) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut dates: Vec<NaiveDate> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            let stem = name.strip_suffix(".jsonl")?;
            if stem.len() != 8 {
                return None;
            }
            NaiveDate::parse_from_str(stem, "%Y%m%d").ok()
        })
        .collect();
    dates.sort();
    dates
}
