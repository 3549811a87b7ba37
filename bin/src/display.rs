//! Output formatting for the dds CLI.

use anyhow::Result;
use dds_lib::prelude::*;
use dds_lib::DownloadReport;
use serde::Serialize;
use std::collections::HashMap;

/// Final state of one polled item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Disposition {
    Downloaded,
    Failed,
    Queued,
    Unknown,
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Downloaded => "downloaded",
            Self::Failed => "failed",
            Self::Queued => "queued",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// One output line per item.
#[derive(Debug, Serialize)]
pub(crate) struct ItemLine {
    pub(crate) archive_id: String,
    pub(crate) disposition: Disposition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) detail: Option<String>,
}

/// Prints bucket counts, or the full buckets as JSON.
pub(crate) fn print_buckets(buckets: &ItemBuckets, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(buckets)?);
        return Ok(());
    }

    println!(
        "ready={} queued={} unknown={}",
        buckets.ready.len(),
        buckets.queued.len(),
        buckets.unknown.len()
    );
    Ok(())
}

/// Works out what happened to every polled item.
pub(crate) fn dispositions(buckets: &ItemBuckets, report: &DownloadReport) -> Vec<ItemLine> {
    let completed: HashMap<&str, &DownloadResult> = report
        .completed
        .iter()
        .map(|r| (r.archive_id.as_str(), r))
        .collect();
    let failed: HashMap<&str, String> = report
        .failed
        .iter()
        .map(|f| (f.task.archive_id.as_str(), f.error.to_string()))
        .collect();

    let mut lines = Vec::with_capacity(buckets.len());
    for record in &buckets.ready {
        let archive_id = record.archive_id_or_unknown();
        let line = if let Some(done) = completed.get(archive_id) {
            let path = done.extracted_dir.as_ref().unwrap_or(&done.final_path);
            ItemLine {
                archive_id: archive_id.to_string(),
                disposition: Disposition::Downloaded,
                detail: Some(path.display().to_string()),
            }
        } else {
            let detail = failed
                .get(archive_id)
                .cloned()
                .or_else(|| record.download_url().is_none().then(|| "no download URL".to_string()));
            ItemLine {
                archive_id: archive_id.to_string(),
                disposition: Disposition::Failed,
                detail,
            }
        };
        lines.push(line);
    }
    for record in &buckets.queued {
        lines.push(ItemLine {
            archive_id: record.archive_id_or_unknown().to_string(),
            disposition: Disposition::Queued,
            detail: None,
        });
    }
    for record in &buckets.unknown {
        lines.push(ItemLine {
            archive_id: record.archive_id_or_unknown().to_string(),
            disposition: Disposition::Unknown,
            detail: record.str_field("status").map(str::to_string),
        });
    }
    lines
}

/// Prints one line per item, or a JSON array.
pub(crate) fn print_dispositions(lines: &[ItemLine], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(lines)?);
        return Ok(());
    }
    for line in lines {
        match &line.detail {
            Some(detail) => println!("{}\t{}\t{}", line.archive_id, line.disposition, detail),
            None => println!("{}\t{}", line.archive_id, line.disposition),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dds_lib::{DownloadError, TaskFailure};
    use serde_json::json;
    use std::path::PathBuf;

    fn record(value: serde_json::Value) -> ItemRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_dispositions_cover_every_bucket() {
        let mut buckets = ItemBuckets::new();
        buckets.push(record(json!({"status": "Available", "archiveId": "A", "download_url": "https://h/a.zip"})));
        buckets.push(record(json!({"status": "Available", "archiveId": "B", "download_url": "https://h/b.zip"})));
        buckets.push(record(json!({"status": "Available", "archiveId": "C"})));
        buckets.push(record(json!({"status": "Queued", "archiveId": "D"})));
        buckets.push(record(json!({"status": "Failed", "archiveId": "E"})));

        let report = DownloadReport {
            completed: vec![DownloadResult {
                archive_id: "A".into(),
                final_path: PathBuf::from("/out/completed/a.zip"),
                extracted_dir: None,
            }],
            failed: vec![TaskFailure {
                task: DownloadTask::new("https://h/b.zip", "B", "b.zip"),
                error: DownloadError::Integrity {
                    expected: 2,
                    actual: 1,
                },
            }],
        };

        let lines = dispositions(&buckets, &report);
        let summary: Vec<(&str, Disposition)> = lines
            .iter()
            .map(|l| (l.archive_id.as_str(), l.disposition))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("A", Disposition::Downloaded),
                ("B", Disposition::Failed),
                ("C", Disposition::Failed),
                ("D", Disposition::Queued),
                ("E", Disposition::Unknown),
            ]
        );
        assert_eq!(lines[0].detail.as_deref(), Some("/out/completed/a.zip"));
        assert_eq!(lines[2].detail.as_deref(), Some("no download URL"));
        assert_eq!(lines[4].detail.as_deref(), Some("Failed"));
    }

    #[test]
    fn test_disposition_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Disposition::Downloaded).unwrap(),
            "\"downloaded\""
        );
    }
}
