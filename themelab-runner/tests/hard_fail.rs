//! Failure paths: every one of these must stop the run with a typed error and
//! leave nothing behind.

mod common;

use common::*;
use themelab_core::error::{ConfigError, DataIntegrityError};
use themelab_core::signal::{Signal, SignalSpec};
use themelab_runner::{
    fingerprint_for, run_screen, run_screen_cached, write_report, InMemoryProvider, RankingError,
    ReportCache, RunError, ShortHistoryPolicy, SnapshotProvider,
};

#[test]
fn hard_fail_insufficient_candidates() {
    let err = run_screen(&request(9), &provider()).unwrap_err();
    assert_eq!(err.issue_code(), "insufficient_candidates");
    assert!(matches!(
        err,
        RunError::Ranking(RankingError::InsufficientCandidates {
            requested: 9,
            eligible: 8
        })
    ));
}

#[test]
fn hard_fail_zero_top_n() {
    let err = run_screen(&request(0), &provider()).unwrap_err();
    assert!(matches!(err, RunError::Config(ConfigError::Invalid(_))));
}

fn short_history_provider() -> InMemoryProvider {
    let mut bars = bars();
    bars.retain(|b| b.ticker != "000003");
    bars.extend(series("000003", eval_date(), 30, 0.002));
    InMemoryProvider::new("fixture", securities(), bars)
}

#[test]
fn hard_fail_short_history_by_default() {
    let err = run_screen(&request(5), &short_history_provider()).unwrap_err();
    match err {
        RunError::Data(DataIntegrityError::InsufficientHistory {
            ticker,
            required,
            available,
            ..
        }) => {
            assert_eq!(ticker, "000003");
            assert_eq!(required, 61);
            assert_eq!(available, 30);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn short_history_exclude_policy_drops_and_counts() {
    let mut req = request(5);
    req.config.pipeline.short_history = ShortHistoryPolicy::Exclude;

    let report = run_screen(&req, &short_history_provider()).unwrap();
    assert_eq!(report.meta.excluded_insufficient_history, 1);
    assert_eq!(report.meta.scored_count, 7);
    assert!(report.results.iter().all(|r| r.ticker != "000003"));

    // Excluded securities still leave too few for a Top-8.
    let mut req = request(8);
    req.config.pipeline.short_history = ShortHistoryPolicy::Exclude;
    let err = run_screen(&req, &short_history_provider()).unwrap_err();
    assert_eq!(err.issue_code(), "insufficient_candidates");
}

#[test]
fn hard_fail_five_bar_history_writes_nothing() {
    // GIVEN one security with only five bars of history
    let mut bars = bars();
    bars.retain(|b| b.ticker != "000004");
    bars.extend(series("000004", eval_date(), 5, 0.001));
    let provider = InMemoryProvider::new("fixture", securities(), bars);

    let tmp = tempfile::tempdir().unwrap();
    let cache = ReportCache::new(tmp.path().join("cache"));
    let output_dir = tmp.path().join("reports");

    // WHEN the screen runs as the CLI runs it: artifacts only on success
    let outcome = run_screen_cached(&request(3), &provider, Some(&cache))
        .map(|report| write_report(&report, &output_dir));

    // THEN the run fails with a data integrity error naming the security
    let err = match outcome {
        Ok(_) => panic!("a five-bar history must fail the screen"),
        Err(e) => e,
    };
    assert_eq!(err.issue_code(), "data_integrity");
    match err {
        RunError::Data(DataIntegrityError::InsufficientHistory {
            ticker, available, ..
        }) => {
            assert_eq!(ticker, "000004");
            assert_eq!(available, 5);
        }
        other => panic!("unexpected error: {other}"),
    }

    // AND neither a report nor a cache entry exists
    assert!(!output_dir.exists());
    assert!(cache.is_empty().unwrap());
    assert!(!cache.root().exists());
}

#[test]
fn hard_fail_non_positive_close() {
    let mut bars = bars();
    if let Some(last) = bars.iter_mut().rev().find(|b| b.ticker == "000002") {
        last.close = 0.0;
    }
    let provider = InMemoryProvider::new("fixture", securities(), bars);
    let err = run_screen(&request(3), &provider).unwrap_err();
    assert!(matches!(
        err,
        RunError::Data(DataIntegrityError::NonPositiveClose { .. })
    ));
}

#[test]
fn hard_fail_non_finite_volume() {
    let mut bars = bars();
    if let Some(last) = bars.iter_mut().rev().find(|b| b.ticker == "000001") {
        last.volume = f64::NAN;
    }
    let provider = InMemoryProvider::new("fixture", securities(), bars);
    let err = run_screen(&request(3), &provider).unwrap_err();
    match err {
        RunError::Data(DataIntegrityError::NonFinite { ticker, field }) => {
            assert_eq!(ticker, "000001");
            assert_eq!(field, "volume");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn hard_fail_negative_volume() {
    let mut bars = bars();
    if let Some(bar) = bars.iter_mut().find(|b| b.ticker == "000006" && b.date == eval_date()) {
        bar.volume = -500.0;
    }
    let provider = InMemoryProvider::new("fixture", securities(), bars);
    let err = run_screen(&request(3), &provider).unwrap_err();
    assert!(matches!(
        err,
        RunError::Data(DataIntegrityError::NegativeVolume { ref ticker, .. }) if ticker == "000006"
    ));
}

#[test]
fn hard_fail_missing_snapshot_file() {
    let base = tempfile::tempdir().unwrap();
    let provider = SnapshotProvider::new(base.path(), None);
    let err = run_screen(&request(3), &provider).unwrap_err();
    match err {
        RunError::Data(DataIntegrityError::MissingFile { path, exists }) => {
            assert!(path.ends_with("concept_membership.csv"));
            assert!(!exists);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn hard_fail_snapshot_missing_price_column() {
    let base = tempfile::tempdir().unwrap();
    let (membership, _) = snapshot_csvs();
    write_snapshot(
        base.path(),
        eval_date(),
        &membership,
        "ticker,date,close\n000001,2026-01-09,10.0\n",
    );
    let err = run_screen(&request(3), &SnapshotProvider::new(base.path(), None)).unwrap_err();
    match err {
        RunError::Data(DataIntegrityError::Schema {
            columns, row_count, ..
        }) => {
            assert_eq!(columns, vec!["ticker", "date", "close"]);
            assert_eq!(row_count, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn snapshot_fixture_matches_in_memory_rows() {
    let base = tempfile::tempdir().unwrap();
    let (membership, prices) = snapshot_csvs();
    write_snapshot(base.path(), eval_date(), &membership, &prices);

    let from_files = run_screen(&request(5), &SnapshotProvider::new(base.path(), None)).unwrap();
    let in_memory = run_screen(&request(5), &provider()).unwrap();

    let tickers = |r: &themelab_runner::Report| -> Vec<String> {
        r.results.iter().map(|row| row.ticker.clone()).collect()
    };
    assert_eq!(tickers(&from_files), tickers(&in_memory));
    assert_eq!(from_files.snapshot.as_deref(), Some("2026-01-09"));
}

#[test]
fn hard_fail_duplicate_signal_ids() {
    let text = format!("{SIGNALS_TOML}\n[[signals]]\nid = \"signal_001\"\ntheme = \"Again\"\n");
    let err = themelab_runner::config::parse_signals(&text, std::path::Path::new("s.toml"))
        .unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateSignal(id) if id == "signal_001"));
}

#[test]
fn hard_fail_corrupt_cache_entry() {
    // GIVEN a warm cache
    let tmp = tempfile::tempdir().unwrap();
    let cache = ReportCache::new(tmp.path());
    let provider = provider();
    let req = request(5);
    run_screen_cached(&req, &provider, Some(&cache)).unwrap();

    // WHEN the stored entry is truncated
    let fp = fingerprint_for(&req, &provider).unwrap();
    let entry = tmp.path().join(fp.as_str()).join("entry.json");
    let bytes = std::fs::read(&entry).unwrap();
    std::fs::write(&entry, &bytes[..bytes.len() / 2]).unwrap();

    // THEN the next run fails instead of recomputing
    let err = run_screen_cached(&req, &provider, Some(&cache)).unwrap_err();
    assert!(matches!(err, RunError::Cache(_)));
    assert_eq!(err.issue_code(), "cache_error");
}

#[test]
fn hard_fail_cache_entry_with_a_missing_row() {
    // GIVEN a warm cache
    let tmp = tempfile::tempdir().unwrap();
    let cache = ReportCache::new(tmp.path());
    let provider = provider();
    let req = request(5);
    run_screen_cached(&req, &provider, Some(&cache)).unwrap();

    // WHEN one row is removed from the stored report, leaving valid JSON
    let fp = fingerprint_for(&req, &provider).unwrap();
    let entry = cache.entry_path(&fp);
    let mut json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&entry).unwrap()).unwrap();
    json["report"]["results"].as_array_mut().unwrap().pop();
    std::fs::write(&entry, serde_json::to_string_pretty(&json).unwrap()).unwrap();

    // THEN the replay is refused instead of returning four rows
    let err = run_screen_cached(&req, &provider, Some(&cache)).unwrap_err();
    assert_eq!(err.issue_code(), "cache_error");
    assert!(err.to_string().contains("4 rows"), "{err}");
}

#[test]
fn hard_fail_cache_entry_with_edited_top_n() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = ReportCache::new(tmp.path());
    let provider = provider();
    let req = request(5);
    run_screen_cached(&req, &provider, Some(&cache)).unwrap();

    // Rows and top_n shrunk together still fail: the request asked for five.
    let entry = cache.entry_path(&fingerprint_for(&req, &provider).unwrap());
    let mut json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&entry).unwrap()).unwrap();
    json["report"]["results"].as_array_mut().unwrap().pop();
    json["report"]["top_n"] = serde_json::json!(4);
    std::fs::write(&entry, serde_json::to_string_pretty(&json).unwrap()).unwrap();

    let err = run_screen_cached(&req, &provider, Some(&cache)).unwrap_err();
    assert!(matches!(err, RunError::Cache(_)));
}

#[test]
fn hard_fail_runs_leave_the_cache_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = ReportCache::new(tmp.path());

    let err = run_screen_cached(&request(9), &provider(), Some(&cache)).unwrap_err();
    assert_eq!(err.issue_code(), "insufficient_candidates");
    assert!(cache.is_empty().unwrap());
}

#[test]
fn hard_fail_invalid_signal_weight() {
    let err = Signal::from_spec(SignalSpec {
        id: "signal_100".into(),
        theme: "Broken".into(),
        weight: Some(f64::INFINITY),
        enabled: true,
        ..Default::default()
    })
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidSignal { .. }));
}
