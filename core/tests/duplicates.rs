//! Integration tests: duplicate payment detection.

mod common;

use redflag_core::{
    config::DetectorConfig, detector::Detector, duplicate_detector::DuplicateDetector,
    issue::Severity,
};

const CLIENT: &str = "c-dup";

/// Two entries with the same invoice number and vendor form one group.
#[test]
fn duplicate_invoice_flagged_once() {
    let store = common::store();
    let mut a = common::debit(CLIENT, "t1", "2024-04-01", 5_000.0, "Acme Traders");
    a.invoice_number = Some("INV-100".into());
    let mut b = common::debit(CLIENT, "t2", "2024-04-10", 5_000.0, "Acme Traders");
    b.invoice_number = Some("inv-100 ".into()); // normalization must match
    store.insert_transaction(&a).unwrap();
    store.insert_transaction(&b).unwrap();

    let det = DuplicateDetector::new(&store, DetectorConfig::default());
    let issues = det
        .detect_duplicate_invoices(CLIENT, common::range("2024-04-01", "2024-04-30"))
        .unwrap();
    assert_eq!(issues.len(), 1, "expected one duplicate-invoice group");
    assert_eq!(issues[0].transaction_ids.len(), 2);
    assert_eq!(issues[0].severity, Severity::Medium);
}

/// Three occurrences push the group to high severity.
#[test]
fn duplicate_invoice_three_occurrences_is_high() {
    let store = common::store();
    for id in ["t1", "t2", "t3"] {
        let mut t = common::debit(CLIENT, id, "2024-04-05", 2_000.0, "Acme Traders");
        t.invoice_number = Some("INV-7".into());
        store.insert_transaction(&t).unwrap();
    }
    let det = DuplicateDetector::new(&store, DetectorConfig::default());
    let issues = det
        .detect_duplicate_invoices(CLIENT, common::range("2024-04-01", "2024-04-30"))
        .unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].severity, Severity::High);
}

/// Identical (amount, vendor, date) rows are caught even with different
/// invoice numbers.
#[test]
fn repeated_transaction_same_day() {
    let store = common::store();
    store
        .insert_transaction(&common::debit(CLIENT, "r1", "2024-04-03", 1_500.0, "Beta Supplies"))
        .unwrap();
    store
        .insert_transaction(&common::debit(CLIENT, "r2", "2024-04-03", 1_500.0, "Beta Supplies"))
        .unwrap();

    let det = DuplicateDetector::new(&store, DetectorConfig::default());
    let issues = det
        .detect_repeated_transactions(CLIENT, common::range("2024-04-01", "2024-04-30"))
        .unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].transaction_ids.len(), 2);
}

/// The amount tolerance is inclusive: a difference exactly at the
/// boundary still groups.
#[test]
fn vendor_bill_tolerance_boundary_inclusive() {
    let store = common::store();
    let mut a = common::debit(CLIENT, "v1", "2024-04-01", 10_000.0, "Gamma Co");
    a.invoice_number = Some("A-1".into());
    // 1% of 10,000 = ₹100, exactly the boundary.
    let mut b = common::debit(CLIENT, "v2", "2024-04-04", 10_100.0, "Gamma Co");
    b.invoice_number = Some("B-2".into());
    store.insert_transaction(&a).unwrap();
    store.insert_transaction(&b).unwrap();

    let det = DuplicateDetector::new(&store, DetectorConfig::default());
    let issues = det
        .detect_duplicate_vendor_bills(CLIENT, common::range("2024-04-01", "2024-04-30"))
        .unwrap();
    assert_eq!(issues.len(), 1, "boundary difference must still group");
    assert_eq!(issues[0].transaction_ids, vec!["v1", "v2"]);
}

/// Just past the tolerance, or outside the date window, nothing groups.
#[test]
fn vendor_bill_outside_tolerance_or_window_not_grouped() {
    let store = common::store();
    let mut a = common::debit(CLIENT, "v1", "2024-04-01", 10_000.0, "Gamma Co");
    a.invoice_number = Some("A-1".into());
    let mut b = common::debit(CLIENT, "v2", "2024-04-04", 10_101.0, "Gamma Co");
    b.invoice_number = Some("B-2".into());
    // Same amount but outside the seven-day window from either entry.
    let mut c = common::debit(CLIENT, "v3", "2024-04-12", 10_000.0, "Gamma Co");
    c.invoice_number = Some("C-3".into());
    for t in [&a, &b, &c] {
        store.insert_transaction(t).unwrap();
    }

    let det = DuplicateDetector::new(&store, DetectorConfig::default());
    let issues = det
        .detect_duplicate_vendor_bills(CLIENT, common::range("2024-04-01", "2024-04-30"))
        .unwrap();
    assert!(issues.is_empty(), "got {} unexpected groups", issues.len());
}

/// INV-1 and INV-1A from the same vendor look like variants; the finding
/// is always low severity.
#[test]
fn near_duplicate_invoice_numbers_low_severity() {
    let store = common::store();
    let mut a = common::debit(CLIENT, "n1", "2024-04-02", 8_000.0, "Delta Ltd");
    a.invoice_number = Some("INV-1".into());
    let mut b = common::debit(CLIENT, "n2", "2024-04-20", 8_000.0, "Delta Ltd");
    b.invoice_number = Some("INV-1A".into());
    store.insert_transaction(&a).unwrap();
    store.insert_transaction(&b).unwrap();

    let det = DuplicateDetector::new(&store, DetectorConfig::default());
    let issues = det
        .detect_near_duplicate_invoices(CLIENT, common::range("2024-04-01", "2024-04-30"))
        .unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].severity, Severity::Low);
}

/// Soft-deleted rows never participate in detection.
#[test]
fn soft_deleted_rows_are_invisible() {
    let store = common::store();
    let mut a = common::debit(CLIENT, "s1", "2024-04-01", 5_000.0, "Acme Traders");
    a.invoice_number = Some("INV-9".into());
    let mut b = common::debit(CLIENT, "s2", "2024-04-02", 5_000.0, "Acme Traders");
    b.invoice_number = Some("INV-9".into());
    store.insert_transaction(&a).unwrap();
    store.insert_transaction(&b).unwrap();
    store
        .soft_delete_transaction("s2", "2024-04-15T00:00:00Z")
        .unwrap();

    let det = DuplicateDetector::new(&store, DetectorConfig::default());
    let issues = det
        .detect_duplicate_invoices(CLIENT, common::range("2024-04-01", "2024-04-30"))
        .unwrap();
    assert!(issues.is_empty(), "deleted row must not form a duplicate");
}

/// Scanning the same ledger twice yields the same counts.
#[test]
fn full_scan_is_idempotent() {
    let store = common::store();
    let mut a = common::debit(CLIENT, "i1", "2024-04-01", 5_000.0, "Acme Traders");
    a.invoice_number = Some("INV-100".into());
    let mut b = common::debit(CLIENT, "i2", "2024-04-10", 5_000.0, "Acme Traders");
    b.invoice_number = Some("INV-100".into());
    store.insert_transaction(&a).unwrap();
    store.insert_transaction(&b).unwrap();

    let det = DuplicateDetector::new(&store, DetectorConfig::default());
    let range = common::range("2024-04-01", "2024-04-30");
    let first = det.run_full_scan(CLIENT, range);
    let second = det.run_full_scan(CLIENT, range);
    assert_eq!(first.summary.total_issues, second.summary.total_issues);
    assert!(first.errors.is_empty());
}
