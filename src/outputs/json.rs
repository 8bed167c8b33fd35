//! JSON run reports.
//!
//! Reports are pretty-printed and named after the component that produced
//! them plus a local timestamp, so repeated runs never overwrite each other
//! unless they start within the same second.

use crate::error::Result;
use crate::utils::timestamp_stamp;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Path of the report for `component` written at `stamp`.
pub fn report_path(reports_dir: &Path, component: &str, stamp: &str) -> PathBuf {
    reports_dir.join(format!("{component}_{stamp}.json"))
}

/// Serialize `report` to `<reports_dir>/<component>_<YYYYMMDD_HHMMSS>.json`.
///
/// # Returns
///
/// The written path, or an error if directory creation or file writing fails.
#[instrument(level = "info", skip_all, fields(reports_dir = %reports_dir.display(), component))]
pub async fn write_report<T: Serialize>(
    report: &T,
    reports_dir: &Path,
    component: &str,
) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(report)?;

    info!("Ensuring reports directory exists");
    if let Err(e) = fs::create_dir_all(reports_dir).await {
        error!(error = %e, "Failed to create reports dir");
        return Err(e.into());
    }

    let path = report_path(reports_dir, component, &timestamp_stamp());
    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote run report");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BatchEntry, BatchReport, CrawlReport, LinkOutcome, LinkReport};

    #[test]
    fn test_report_path() {
        let path = report_path(Path::new("/r"), "crawl", "20261018_093000");
        assert_eq!(path, PathBuf::from("/r/crawl_20261018_093000.json"));
    }

    #[tokio::test]
    async fn test_write_batch_report() {
        let tmp = tempfile::tempdir().unwrap();
        let report = BatchReport {
            input_dir: "output/html".into(),
            started_at: "2026-10-18T09:30:00Z".into(),
            entries: vec![BatchEntry {
                filename: "a.txt".into(),
                title: "A".into(),
                status: "fallback_used (article)".into(),
                output: Some(PathBuf::from("output/extracted_articles/A.txt")),
            }],
        };
        let path = write_report(&report, &tmp.path().join("reports"), "extract_articles")
            .await
            .unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("extract_articles_"));

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["entries"][0]["status"], "fallback_used (article)");
    }

    #[tokio::test]
    async fn test_write_crawl_report() {
        let tmp = tempfile::tempdir().unwrap();
        let report = CrawlReport {
            listing_url: "https://www.theatlantic.com/latest".into(),
            started_at: "2026-10-18T09:30:00Z".into(),
            links: vec![LinkReport {
                index: 0,
                title: "A".into(),
                target: "https://www.theatlantic.com/ideas/a".into(),
                outcome: LinkOutcome::Exhausted { attempts: 3 },
            }],
        };
        let path = write_report(&report, tmp.path(), "crawl").await.unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("\"listing_url\""));
        assert!(text.contains("theatlantic.com/ideas/a"));
    }
}
