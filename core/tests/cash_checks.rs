//! Integration tests: cash limits, structuring, Section 40A(3).

mod common;

use redflag_core::{
    cash_transaction_checker::CashTransactionChecker,
    config::DetectorConfig,
    issue::{IssueType, Severity},
};

const CLIENT: &str = "c-cash";

/// Three ₹4,000 cash payments to one vendor on one day: no single
/// violation, exactly one aggregate with the full total.
#[test]
fn same_day_aggregate_violation() {
    let store = common::store();
    for id in ["a1", "a2", "a3"] {
        store
            .insert_transaction(&common::cash_debit(
                CLIENT, id, "2024-04-15", 4_000.0, "Acme Traders",
            ))
            .unwrap();
    }

    let det = CashTransactionChecker::new(&store, DetectorConfig::default());
    let issues = det
        .detect_40a3_violations(CLIENT, common::range("2024-04-01", "2024-04-30"))
        .unwrap();

    assert_eq!(issues.len(), 1, "expected exactly one aggregate violation");
    assert_eq!(issues[0].issue_type, IssueType::CashViolationAggregate);
    assert_eq!(issues[0].total_amount, Some(12_000.0));
    assert_eq!(issues[0].transaction_ids.len(), 3);
}

/// One over-limit payment is a single violation; the same-day group then
/// produces no aggregate on top of it.
#[test]
fn single_violation_suppresses_aggregate() {
    let store = common::store();
    store
        .insert_transaction(&common::cash_debit(
            CLIENT, "s1", "2024-04-16", 15_000.0, "Beta Supplies",
        ))
        .unwrap();
    store
        .insert_transaction(&common::cash_debit(
            CLIENT, "s2", "2024-04-16", 2_000.0, "Beta Supplies",
        ))
        .unwrap();

    let det = CashTransactionChecker::new(&store, DetectorConfig::default());
    let issues = det
        .detect_40a3_violations(CLIENT, common::range("2024-04-01", "2024-04-30"))
        .unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].issue_type, IssueType::CashViolationSingle);
    assert_eq!(issues[0].amount, Some(15_000.0));
}

/// Payments to different vendors on the same day never aggregate.
#[test]
fn different_vendors_do_not_aggregate() {
    let store = common::store();
    store
        .insert_transaction(&common::cash_debit(CLIENT, "d1", "2024-04-17", 6_000.0, "Acme"))
        .unwrap();
    store
        .insert_transaction(&common::cash_debit(CLIENT, "d2", "2024-04-17", 6_000.0, "Beta"))
        .unwrap();

    let det = CashTransactionChecker::new(&store, DetectorConfig::default());
    let issues = det
        .detect_40a3_violations(CLIENT, common::range("2024-04-01", "2024-04-30"))
        .unwrap();
    assert!(issues.is_empty());
}

/// The large-cash severity split at ₹50,000.
#[test]
fn large_cash_severity_split() {
    let store = common::store();
    store
        .insert_transaction(&common::cash_debit(
            CLIENT, "l1", "2024-04-10", 20_000.0, "Acme Traders",
        ))
        .unwrap();
    store
        .insert_transaction(&common::cash_debit(
            CLIENT, "l2", "2024-04-11", 60_000.0, "Acme Traders",
        ))
        .unwrap();

    let det = CashTransactionChecker::new(&store, DetectorConfig::default());
    let issues = det
        .detect_large_cash_transactions(CLIENT, common::range("2024-04-01", "2024-04-30"))
        .unwrap();
    assert_eq!(issues.len(), 2);

    let sev_for = |amount: f64| {
        issues
            .iter()
            .find(|i| i.amount == Some(amount))
            .map(|i| i.severity)
            .unwrap()
    };
    assert_eq!(sev_for(20_000.0), Severity::Medium);
    assert_eq!(sev_for(60_000.0), Severity::High);
}

/// Same-day payments parked just under the limit look like structuring.
/// ₹9,000 sits on the band's lower edge and counts; ₹10,000 is at the
/// limit itself and does not.
#[test]
fn structuring_band_boundaries() {
    let store = common::store();
    store
        .insert_transaction(&common::cash_debit(CLIENT, "b1", "2024-04-20", 9_000.0, "Acme"))
        .unwrap();
    store
        .insert_transaction(&common::cash_debit(CLIENT, "b2", "2024-04-20", 9_500.0, "Acme"))
        .unwrap();
    // At the limit: outside the band, large-cash territory instead.
    store
        .insert_transaction(&common::cash_debit(CLIENT, "b3", "2024-04-21", 10_000.0, "Acme"))
        .unwrap();

    let det = CashTransactionChecker::new(&store, DetectorConfig::default());
    let issues = det
        .detect_withdrawal_patterns(CLIENT, common::range("2024-04-01", "2024-04-30"))
        .unwrap();
    let structuring: Vec<_> = issues
        .iter()
        .filter(|i| i.issue_type == IssueType::CashStructuring)
        .collect();
    assert_eq!(structuring.len(), 1);
    assert_eq!(structuring[0].transaction_ids.len(), 2);
    assert_eq!(structuring[0].total_amount, Some(18_500.0));
}

/// A single large withdrawal is a medium pattern finding; the over-limit
/// transaction itself is still reported high by the limit check.
#[test]
fn large_withdrawal_pattern_is_medium() {
    let store = common::store();
    store
        .insert_transaction(&common::cash_debit(
            CLIENT, "w1", "2024-04-12", 60_000.0, "Acme Traders",
        ))
        .unwrap();

    let det = CashTransactionChecker::new(&store, DetectorConfig::default());
    let range = common::range("2024-04-01", "2024-04-30");

    let patterns = det.detect_withdrawal_patterns(CLIENT, range).unwrap();
    let withdrawal = patterns
        .iter()
        .find(|i| i.issue_type == IssueType::LargeCashWithdrawal)
        .unwrap();
    assert_eq!(withdrawal.severity, Severity::Medium);

    let limits = det.detect_large_cash_transactions(CLIENT, range).unwrap();
    assert_eq!(limits[0].severity, Severity::High);
}

/// Five cash debits inside the trailing week trip the frequency check.
#[test]
fn frequent_cash_in_trailing_week() {
    let store = common::store();
    for i in 0..5 {
        store
            .insert_transaction(&common::cash_debit(
                CLIENT,
                &format!("f{i}"),
                &format!("2024-04-{:02}", 25 + i),
                1_000.0,
                "Petty Cash",
            ))
            .unwrap();
    }

    let det = CashTransactionChecker::new(&store, DetectorConfig::default());
    let issues = det
        .detect_withdrawal_patterns(CLIENT, common::range("2024-04-01", "2024-04-30"))
        .unwrap();
    let frequent: Vec<_> = issues
        .iter()
        .filter(|i| i.issue_type == IssueType::FrequentCashWithdrawals)
        .collect();
    assert_eq!(frequent.len(), 1);
    assert_eq!(frequent[0].transaction_ids.len(), 5);
}
