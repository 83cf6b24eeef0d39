//! End-to-end export runs against the in-memory platform

use crate::support::fake_platform::FakePlatform;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tb_exporter::exporter::{ExportConfig, ExportError, ExportExecutor, FailurePolicy};
use tb_exporter::output::OutputLayout;
use tb_exporter::report::{ReportStyle, Reporter};
use tb_exporter::TimeWindow;
use tempfile::TempDir;

const T0: i64 = 1_704_067_200_000; // 2024-01-01 00:00:00 UTC
const T1: i64 = 1_704_067_260_000; // 2024-01-01 00:01:00 UTC

fn platform() -> FakePlatform {
    FakePlatform::new()
        .with_series("D1", "temp", &[(T0, "21.5"), (T1, "21.7")])
        .with_series("D1", "hum", &[(T0, "40")])
}

fn quiet() -> Reporter<Vec<u8>> {
    Reporter::new(Vec::new(), ReportStyle::Quiet, false)
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[tokio::test]
async fn test_export_tagged_layout_outer_join() {
    let dir = TempDir::new().unwrap();
    let config = ExportConfig::new(
        vec!["D1".to_string()],
        "soil",
        OutputLayout::tagged(dir.path(), "field-a"),
    )
    .with_keys(vec!["temp".to_string(), "hum".to_string()]);

    let executor = ExportExecutor::new(platform(), config);
    let summary = executor.run(&mut quiet()).await.unwrap();

    let expected_path = dir.path().join("field-a").join("soil-D1.csv");
    assert_eq!(summary.reports.len(), 1);
    assert_eq!(summary.reports[0].output_path, expected_path);
    assert_eq!(summary.reports[0].rows, 2);
    assert_eq!(summary.reports[0].newest_ts, Some(T1));
    assert!(summary.failed.is_empty());

    assert_eq!(
        read(&expected_path),
        "ts,utc,temp,hum\n\
         1704067260000,2024-01-01 00:01:00,21.7,\n\
         1704067200000,2024-01-01 00:00:00,21.5,40\n"
    );

    // explicit keys never hit key discovery
    assert!(executor.source().key_lookups().is_empty());
}

#[tokio::test]
async fn test_export_flat_layout_without_utc() {
    let dir = TempDir::new().unwrap();
    let config = ExportConfig::new(vec!["D1".to_string()], "soil", OutputLayout::flat(dir.path()))
        .with_keys(vec!["temp".to_string()])
        .with_utc_column(false);

    ExportExecutor::new(platform(), config)
        .run(&mut quiet())
        .await
        .unwrap();

    assert_eq!(
        read(&dir.path().join("soil-D1.csv")),
        "ts,temp\n1704067260000,21.7\n1704067200000,21.5\n"
    );
}

#[tokio::test]
async fn test_discovered_keys_keep_platform_order() {
    let dir = TempDir::new().unwrap();
    let config = ExportConfig::new(vec!["D1".to_string()], "soil", OutputLayout::flat(dir.path()));

    let executor = ExportExecutor::new(platform(), config);
    executor.run(&mut quiet()).await.unwrap();

    let content = read(&dir.path().join("soil-D1.csv"));
    assert!(content.starts_with("ts,utc,temp,hum\n"), "{content}");
    assert_eq!(executor.source().key_lookups(), vec!["D1"]);
}

#[tokio::test]
async fn test_explicit_keys_order_and_duplicates() {
    let dir = TempDir::new().unwrap();
    let config = ExportConfig::new(vec!["D1".to_string()], "soil", OutputLayout::flat(dir.path()))
        .with_keys(vec!["hum".into(), "temp".into(), "hum".into()]);

    let executor = ExportExecutor::new(platform(), config);
    executor.run(&mut quiet()).await.unwrap();

    let content = read(&dir.path().join("soil-D1.csv"));
    assert!(content.starts_with("ts,utc,hum,temp\n"), "{content}");
    assert_eq!(executor.source().requests_for("D1", "hum").len(), 1);
}

#[tokio::test]
async fn test_requested_key_without_data_still_gets_column() {
    let dir = TempDir::new().unwrap();
    let config = ExportConfig::new(vec!["D1".to_string()], "soil", OutputLayout::flat(dir.path()))
        .with_keys(vec!["temp".into(), "pressure".into()]);

    ExportExecutor::new(platform(), config)
        .run(&mut quiet())
        .await
        .unwrap();

    assert_eq!(
        read(&dir.path().join("soil-D1.csv")),
        "ts,utc,temp,pressure\n\
         1704067260000,2024-01-01 00:01:00,21.7,\n\
         1704067200000,2024-01-01 00:00:00,21.5,\n"
    );
}

#[tokio::test]
async fn test_window_limits_exported_rows() {
    let dir = TempDir::new().unwrap();
    let config = ExportConfig::new(vec!["D1".to_string()], "soil", OutputLayout::flat(dir.path()))
        .with_window(TimeWindow::new(T0, T1));

    let summary = ExportExecutor::new(platform(), config)
        .run(&mut quiet())
        .await
        .unwrap();

    assert_eq!(summary.reports[0].rows, 1);
    assert_eq!(
        read(&dir.path().join("soil-D1.csv")),
        "ts,utc,temp,hum\n1704067200000,2024-01-01 00:00:00,21.5,40\n"
    );
}

#[tokio::test]
async fn test_small_chunk_limit_gives_same_file() {
    let dir_small = TempDir::new().unwrap();
    let dir_large = TempDir::new().unwrap();

    for (dir, limit) in [(&dir_small, 1), (&dir_large, 10_000)] {
        let config = ExportConfig::new(vec!["D1".to_string()], "soil", OutputLayout::flat(dir.path()))
            .with_chunk_limit(limit);
        ExportExecutor::new(platform(), config)
            .run(&mut quiet())
            .await
            .unwrap();
    }

    assert_eq!(
        fs::read(dir_small.path().join("soil-D1.csv")).unwrap(),
        fs::read(dir_large.path().join("soil-D1.csv")).unwrap()
    );
}

#[tokio::test]
async fn test_device_without_keys_writes_header_only() {
    let dir = TempDir::new().unwrap();
    let config = ExportConfig::new(vec!["D2".to_string()], "soil", OutputLayout::flat(dir.path()));

    let executor = ExportExecutor::new(FakePlatform::new().with_device("D2"), config);
    let mut reporter = Reporter::new(Vec::new(), ReportStyle::Human, false);
    let summary = executor.run(&mut reporter).await.unwrap();

    assert_eq!(summary.reports[0].rows, 0);
    assert_eq!(summary.reports[0].newest_ts, None);
    assert_eq!(read(&dir.path().join("soil-D2.csv")), "ts,utc\n");
    assert!(executor.source().requests().is_empty());

    let out = String::from_utf8(reporter.into_inner()).unwrap();
    assert_eq!(out, "D2\n    No data available.\n    Done: pulled 0 rows.\n");
}

#[tokio::test]
async fn test_rerun_is_byte_identical() {
    let dir = TempDir::new().unwrap();
    let config = ExportConfig::new(vec!["D1".to_string()], "soil", OutputLayout::flat(dir.path()));
    let path = dir.path().join("soil-D1.csv");

    let executor = ExportExecutor::new(platform(), config);
    executor.run(&mut quiet()).await.unwrap();
    let first = fs::read(&path).unwrap();

    executor.run(&mut quiet()).await.unwrap();
    let second = fs::read(&path).unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_abort_policy_stops_at_first_failure() {
    let dir = TempDir::new().unwrap();
    let config = ExportConfig::new(
        vec!["missing".to_string(), "D1".to_string()],
        "soil",
        OutputLayout::flat(dir.path()),
    );

    let executor = ExportExecutor::new(platform(), config);
    let result = executor.run(&mut quiet()).await;

    assert!(matches!(result, Err(ExportError::FetcherError(_))));
    assert!(!dir.path().join("soil-missing.csv").exists());
    assert!(!dir.path().join("soil-D1.csv").exists());
    assert_eq!(executor.source().key_lookups(), vec!["missing"]);
}

#[tokio::test]
async fn test_skip_policy_continues_and_reports_failure() {
    let dir = TempDir::new().unwrap();
    let config = ExportConfig::new(
        vec!["missing".to_string(), "D1".to_string()],
        "soil",
        OutputLayout::flat(dir.path()),
    )
    .with_failure_policy(FailurePolicy::Skip);

    let result = ExportExecutor::new(platform(), config)
        .run(&mut quiet())
        .await;

    let summary = match result {
        Err(ExportError::DevicesFailed {
            failed: 1,
            total: 2,
            summary,
        }) => summary,
        other => panic!("expected DevicesFailed, got {other:?}"),
    };

    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, "missing");
    assert!(summary.failed[0].1.contains("404"), "{}", summary.failed[0].1);

    assert_eq!(summary.reports.len(), 1);
    assert_eq!(summary.reports[0].device, "D1");
    assert_eq!(summary.reports[0].rows, 2);
    assert_eq!(summary.reports[0].output_path, dir.path().join("soil-D1.csv"));

    assert!(!dir.path().join("soil-missing.csv").exists());
    assert!(dir.path().join("soil-D1.csv").exists());
}

#[tokio::test]
async fn test_failed_key_leaves_no_partial_file() {
    let dir = TempDir::new().unwrap();
    let config = ExportConfig::new(vec!["D1".to_string()], "soil", OutputLayout::flat(dir.path()))
        .with_failure_policy(FailurePolicy::Skip);

    let platform = platform().failing("D1", "hum");
    let mut reporter = Reporter::new(Vec::new(), ReportStyle::Human, false);
    let result = ExportExecutor::new(platform, config).run(&mut reporter).await;

    assert!(matches!(result, Err(ExportError::DevicesFailed { failed: 1, total: 1, .. })));
    assert!(!dir.path().join("soil-D1.csv").exists());

    let out = String::from_utf8(reporter.into_inner()).unwrap();
    assert!(out.contains("Failed: "), "{out}");
}

#[tokio::test]
async fn test_human_report_lists_keys() {
    let dir = TempDir::new().unwrap();
    let config = ExportConfig::new(vec!["D1".to_string()], "soil", OutputLayout::flat(dir.path()));

    let mut reporter = Reporter::new(Vec::new(), ReportStyle::Human, false);
    ExportExecutor::new(platform(), config)
        .run(&mut reporter)
        .await
        .unwrap();

    let out = String::from_utf8(reporter.into_inner()).unwrap();
    assert!(
        out.starts_with(
            "D1\n    temp, hum \n    Done: pulled 2 rows. Last seen: 2024-01-01 00:01:00 UTC, "
        ),
        "{out}"
    );
    assert!(out.ends_with("m ago.\n"), "{out}");
}

#[tokio::test]
async fn test_json_report_one_line_per_device() {
    let dir = TempDir::new().unwrap();
    let config = ExportConfig::new(
        vec!["D1".to_string(), "D2".to_string()],
        "soil",
        OutputLayout::flat(dir.path()),
    );

    let mut reporter = Reporter::new(Vec::new(), ReportStyle::Json, false);
    ExportExecutor::new(platform().with_device("D2"), config)
        .run(&mut reporter)
        .await
        .unwrap();

    let out = String::from_utf8(reporter.into_inner()).unwrap();
    let lines: Vec<serde_json::Value> = out
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["device"], "D1");
    assert_eq!(lines[0]["rows"], 2);
    assert_eq!(lines[0]["last_seen_ts"], T1);
    assert_eq!(lines[0]["last_seen_utc"], "2024-01-01 00:01:00");
    assert_eq!(lines[1]["device"], "D2");
    assert_eq!(lines[1]["rows"], 0);
    assert!(lines[1]["last_seen_ts"].is_null());
}

/// Sink that refuses to print failure lines
struct RejectsFailureLines;

impl Write for RejectsFailureLines {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if String::from_utf8_lossy(buf).contains("Failed") {
            return Err(io::Error::other("stdout closed"));
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_report_write_failure_keeps_fetch_error() {
    let dir = TempDir::new().unwrap();
    let config = ExportConfig::new(
        vec!["missing".to_string(), "D1".to_string()],
        "soil",
        OutputLayout::flat(dir.path()),
    );

    let mut reporter = Reporter::new(RejectsFailureLines, ReportStyle::Human, false);
    let result = ExportExecutor::new(platform(), config).run(&mut reporter).await;

    assert!(matches!(result, Err(ExportError::FetcherError(_))), "{result:?}");
}

#[tokio::test]
async fn test_report_write_failure_does_not_end_skip_run() {
    let dir = TempDir::new().unwrap();
    let config = ExportConfig::new(
        vec!["missing".to_string(), "D1".to_string()],
        "soil",
        OutputLayout::flat(dir.path()),
    )
    .with_failure_policy(FailurePolicy::Skip);

    let mut reporter = Reporter::new(RejectsFailureLines, ReportStyle::Human, false);
    let result = ExportExecutor::new(platform(), config).run(&mut reporter).await;

    assert!(
        matches!(result, Err(ExportError::DevicesFailed { failed: 1, total: 2, .. })),
        "{result:?}"
    );
    assert!(dir.path().join("soil-D1.csv").exists());
}
