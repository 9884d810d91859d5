// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Status statistics and persistence of batch reports.

use std::{collections::HashMap, fmt::Write as _, fs, path::Path};

use serde::Serialize;

use crate::{
    batch::BatchReport,
    error::{self, Error},
};

/// Number of records whose final status carries `label`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize,)]
pub struct StatusCount
{
    /// Status label.
    pub label: &'static str,
    /// Number of entries ending with that status.
    pub count: usize,
}

/// Counts final statuses per label, most frequent first.
///
/// Ties keep the order in which labels first appear in the report.
pub fn status_counts(report: &BatchReport,) -> Vec<StatusCount,>
{
    let mut counts: Vec<StatusCount,> = Vec::new();
    let mut positions: HashMap<&'static str, usize,> = HashMap::new();

    for status in report.entries.iter().filter_map(|entry| entry.final_status(),) {
        let label = status.label();
        match positions.get(label,) {
            Some(&position,) => counts[position].count += 1,
            None => {
                positions.insert(label, counts.len(),);
                counts.push(StatusCount {
                    label,
                    count: 1,
                },);
            }
        }
    }

    counts.sort_by(|a, b| b.count.cmp(&a.count,),);
    counts
}

/// Renders one line per record followed by the status statistics.
pub fn render_summary(report: &BatchReport,) -> String
{
    let mut summary = String::new();
    for entry in &report.entries {
        let url = entry.record.url().unwrap_or("<no url>",);
        let status = entry.final_status().map(ToString::to_string,).unwrap_or_default();
        let _ = writeln!(summary, "{:>4}  {}  {}", entry.index, url, status);
        if let Some(readme,) = &entry.readme {
            for line in readme.lines() {
                let _ = writeln!(summary, "      | {line}");
            }
        }
    }

    let _ = writeln!(summary, "\nBadge statistics:");
    for StatusCount {
        label,
        count,
    } in status_counts(report,)
    {
        let _ = writeln!(summary, "  {label:<24}{count:>6}");
    }
    summary
}

/// Writes the report as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`Error::Serialize`] when the report cannot be encoded and
/// [`Error::Io`] when the file cannot be written.
pub fn write_report(path: &Path, report: &BatchReport,) -> Result<(), Error,>
{
    let json = serde_json::to_string_pretty(report,)?;
    fs::write(path, json,).map_err(|source| error::io_error(path, source,),)
}
