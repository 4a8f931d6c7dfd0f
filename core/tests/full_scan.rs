//! Integration tests: orchestrated full scans.

mod common;

use redflag_core::{
    config::{DetectorConfig, TaxPolicy},
    scan::ScanOrchestrator,
};

const CLIENT: &str = "c-full";

const DETECTORS: [&str; 6] = [
    "duplicates",
    "gst_mismatches",
    "missing_invoices",
    "suspicious_vendors",
    "cash_checks",
    "pattern_analysis",
];

fn orchestrator() -> ScanOrchestrator {
    ScanOrchestrator::new(DetectorConfig::default(), TaxPolicy::builtin())
}

/// An empty ledger still yields a fully shaped report: all six detectors,
/// no issues, no errors.
#[test]
fn empty_ledger_report_is_well_formed() {
    let store = common::store();
    let report = orchestrator().run(&store, CLIENT, common::range("2024-04-01", "2024-04-30"));

    assert_eq!(report.detectors.len(), 6);
    for name in DETECTORS {
        let result = &report.detectors[name];
        assert!(result.errors.is_empty(), "{name} reported errors");
        assert!(!result.results.is_empty(), "{name} has no categories");
        assert!(report.durations_ms.contains_key(name));
    }
    assert_eq!(report.summary.total_issues, 0);
    assert_eq!(report.summary.total_potential_loss, 0.0);
}

/// Two scans of the same ledger report identical counts.
#[test]
fn repeated_scans_report_identical_counts() {
    let store = common::store();
    let mut a = common::debit(CLIENT, "x1", "2024-04-01", 5_000.0, "Acme Traders");
    a.invoice_number = Some("INV-1".into());
    let mut b = common::debit(CLIENT, "x2", "2024-04-03", 5_000.0, "Acme Traders");
    b.invoice_number = Some("INV-1".into());
    let mut c = common::cash_debit(CLIENT, "x3", "2024-04-10", 15_000.0, "Beta Supplies");
    c.invoice_number = None;
    for t in [&a, &b, &c] {
        store.insert_transaction(t).unwrap();
    }

    let orch = orchestrator();
    let range = common::range("2024-04-01", "2024-04-30");
    let first = orch.run(&store, CLIENT, range);
    let second = orch.run(&store, CLIENT, range);

    assert_eq!(first.summary.total_issues, second.summary.total_issues);
    assert_eq!(first.summary.critical, second.summary.critical);
    assert_eq!(first.summary.high, second.summary.high);
    assert!(first.summary.total_issues > 0);
}

/// The report summary is the sum of the per-detector summaries.
#[test]
fn summary_sums_detector_summaries() {
    let store = common::store();
    let mut t = common::cash_debit(CLIENT, "y1", "2024-04-05", 60_000.0, "Big Cash Mart");
    t.invoice_number = None;
    store.insert_transaction(&t).unwrap();

    let report = orchestrator().run(&store, CLIENT, common::range("2024-04-01", "2024-04-30"));
    let summed: usize = report
        .detectors
        .values()
        .map(|r| r.summary.total_issues)
        .sum();
    assert_eq!(report.summary.total_issues, summed);
}

/// Clients never see each other's findings.
#[test]
fn scans_are_client_scoped() {
    let store = common::store();
    let mut a = common::debit("other-client", "z1", "2024-04-01", 5_000.0, "Acme");
    a.invoice_number = Some("INV-1".into());
    let mut b = common::debit("other-client", "z2", "2024-04-02", 5_000.0, "Acme");
    b.invoice_number = Some("INV-1".into());
    store.insert_transaction(&a).unwrap();
    store.insert_transaction(&b).unwrap();

    let report = orchestrator().run(&store, CLIENT, common::range("2024-04-01", "2024-04-30"));
    assert_eq!(report.summary.total_issues, 0);
}

/// The default window is the configured number of days ending at `as_of`.
#[test]
fn default_range_spans_configured_window() {
    let orch = orchestrator();
    let range = orch.default_range(common::d("2024-06-30"));
    assert_eq!(range.to, common::d("2024-06-30"));
    assert_eq!(range.from, common::d("2024-04-02"));
}

/// Reference data flows through: a blocked GSTIN surfaces as a critical
/// finding in the orchestrated report.
#[test]
fn blocked_gstin_reaches_the_report() {
    let store = common::store();
    store
        .insert_transaction(&common::gst_debit(
            CLIENT,
            "w1",
            "2024-04-07",
            9_000.0,
            "Shady Traders",
            Some("27AAAAA0000A1Z5"),
        ))
        .unwrap();

    let report = orchestrator()
        .with_blocked_gstins(vec!["27AAAAA0000A1Z5".to_string()])
        .run(&store, CLIENT, common::range("2024-04-01", "2024-04-30"));
    assert!(report.summary.critical >= 1);
    let vendors = &report.detectors["suspicious_vendors"];
    assert_eq!(vendors.results["blocked_gstins"].count, 1);
}
