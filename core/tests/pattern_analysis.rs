//! Integration tests: pattern learning, deviations, outliers, trends.

mod common;

use redflag_core::{
    config::DetectorConfig,
    issue::{IssueType, Severity},
    pattern_analysis::PatternAnalysisEngine,
};

const CLIENT: &str = "c-pat";

/// Six rent payments roughly a month apart with identical amounts learn a
/// consistent monthly pattern at half confidence.
#[test]
fn monthly_consistent_pattern_learned() {
    let store = common::store();
    let dates = [
        "2024-01-05", "2024-02-04", "2024-03-05", "2024-04-04", "2024-05-04", "2024-06-03",
    ];
    for (i, date) in dates.iter().enumerate() {
        store
            .insert_transaction(&common::debit(
                CLIENT,
                &format!("p{i}"),
                date,
                25_000.0,
                "Landlord LLP",
            ))
            .unwrap();
    }

    let eng = PatternAnalysisEngine::new(&store, DetectorConfig::default());
    let patterns = eng
        .learn_vendor_patterns(CLIENT, common::range("2024-01-01", "2024-06-30"))
        .unwrap();
    assert_eq!(patterns.len(), 1);
    let p = &patterns[0];
    assert_eq!(p.vendor, "Landlord LLP");
    assert!(p.is_monthly, "mean gap {} should read as monthly", p.mean_gap_days);
    assert!(p.is_consistent);
    assert!((p.confidence - 0.5).abs() < 1e-9);
    assert_eq!(p.dominant_amount, Some(25_000.0));
}

/// Two occurrences are not enough for a pattern.
#[test]
fn too_few_occurrences_learn_nothing() {
    let store = common::store();
    store
        .insert_transaction(&common::debit(CLIENT, "q1", "2024-03-01", 5_000.0, "Occasional Co"))
        .unwrap();
    store
        .insert_transaction(&common::debit(CLIENT, "q2", "2024-04-01", 5_000.0, "Occasional Co"))
        .unwrap();

    let eng = PatternAnalysisEngine::new(&store, DetectorConfig::default());
    let patterns = eng
        .learn_vendor_patterns(CLIENT, common::range("2024-01-01", "2024-06-30"))
        .unwrap();
    assert!(patterns.is_empty());
}

/// A recent bill ten times the vendor's usual amount is an extreme
/// deviation.
#[test]
fn extreme_amount_deviation_is_high() {
    let store = common::store();
    // Eleven months of ₹5,000, then ₹50,000 inside the recent window.
    for i in 0..11 {
        store
            .insert_transaction(&common::debit(
                CLIENT,
                &format!("h{i}"),
                &format!("2024-{:02}-05", i + 1),
                5_000.0,
                "Utility Board",
            ))
            .unwrap();
    }
    store
        .insert_transaction(&common::debit(
            CLIENT, "spike", "2024-12-05", 50_000.0, "Utility Board",
        ))
        .unwrap();

    let eng = PatternAnalysisEngine::new(&store, DetectorConfig::default());
    let issues = eng
        .detect_amount_deviations(CLIENT, common::range("2024-01-01", "2024-12-31"))
        .unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].issue_type, IssueType::AmountDeviation);
    assert_eq!(issues[0].severity, Severity::High);
    assert_eq!(issues[0].transaction_ids, vec!["spike"]);
}

/// A recurring payment arriving well past its usual gap is late.
#[test]
fn late_payment_past_tolerance() {
    let store = common::store();
    let dates = ["2024-01-01", "2024-01-31", "2024-03-01", "2024-03-31", "2024-04-30"];
    for (i, date) in dates.iter().enumerate() {
        store
            .insert_transaction(&common::debit(
                CLIENT,
                &format!("t{i}"),
                date,
                10_000.0,
                "Internet ISP",
            ))
            .unwrap();
    }
    // 40 days after the previous payment, well past the ~32-day average.
    store
        .insert_transaction(&common::debit(
            CLIENT, "late", "2024-06-09", 10_000.0, "Internet ISP",
        ))
        .unwrap();

    let eng = PatternAnalysisEngine::new(&store, DetectorConfig::default());
    let issues = eng
        .detect_timing_deviations(CLIENT, common::range("2024-01-01", "2024-06-15"))
        .unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].issue_type, IssueType::LatePayment);
    assert_eq!(issues[0].severity, Severity::Medium);
}

/// A vendor first seen inside the recent window is flagged low.
#[test]
fn new_vendor_flagged_low() {
    let store = common::store();
    store
        .insert_transaction(&common::debit(
            CLIENT, "n1", "2024-06-10", 8_000.0, "Fresh Supplies",
        ))
        .unwrap();

    let eng = PatternAnalysisEngine::new(&store, DetectorConfig::default());
    let issues = eng
        .detect_new_vendors(CLIENT, common::range("2024-01-01", "2024-06-30"))
        .unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].issue_type, IssueType::NewVendor);
    assert_eq!(issues[0].severity, Severity::Low);
}

/// A monthly vendor that stops paying: the predicted date passes the
/// tolerance with nothing booked.
#[test]
fn missing_expected_transaction_detected() {
    let store = common::store();
    for (i, date) in ["2024-01-05", "2024-02-04", "2024-03-05"].iter().enumerate() {
        store
            .insert_transaction(&common::debit(
                CLIENT,
                &format!("e{i}"),
                date,
                12_000.0,
                "Landlord LLP",
            ))
            .unwrap();
    }

    let eng = PatternAnalysisEngine::new(&store, DetectorConfig::default());
    let range = common::range("2024-01-01", "2024-04-30");
    let issues = eng.detect_missing_expected(CLIENT, range).unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].issue_type, IssueType::MissingExpectedTransaction);

    // Booking the April rent clears the flag.
    store
        .insert_transaction(&common::debit(
            CLIENT, "e3", "2024-04-06", 12_000.0, "Landlord LLP",
        ))
        .unwrap();
    let cleared = eng.detect_missing_expected(CLIENT, range).unwrap();
    assert!(cleared.is_empty());
}

/// Below the minimum population the global outlier check stays silent.
#[test]
fn global_outliers_need_population() {
    let store = common::store();
    for (i, amount) in [100.0, 120.0, 110.0, 90.0, 9_000.0].iter().enumerate() {
        store
            .insert_transaction(&common::debit(
                CLIENT,
                &format!("g{i}"),
                "2024-04-10",
                *amount,
                "Misc",
            ))
            .unwrap();
    }

    let eng = PatternAnalysisEngine::new(&store, DetectorConfig::default());
    let issues = eng
        .detect_global_outliers(CLIENT, common::range("2024-04-01", "2024-04-30"))
        .unwrap();
    assert!(issues.is_empty(), "population of 5 must not produce outliers");
}

/// With enough rows, a far-out amount is flagged.
#[test]
fn global_outlier_flagged_with_population() {
    let store = common::store();
    for i in 0..11 {
        store
            .insert_transaction(&common::debit(
                CLIENT,
                &format!("g{i}"),
                "2024-04-10",
                1_000.0 + i as f64,
                "Misc",
            ))
            .unwrap();
    }
    store
        .insert_transaction(&common::debit(CLIENT, "big", "2024-04-11", 90_000.0, "Misc"))
        .unwrap();

    let eng = PatternAnalysisEngine::new(&store, DetectorConfig::default());
    let issues = eng
        .detect_global_outliers(CLIENT, common::range("2024-04-01", "2024-04-30"))
        .unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].issue_type, IssueType::StatisticalOutlier);
    assert_eq!(issues[0].transaction_ids, vec!["big"]);
}

/// Month-over-month spending that doubles reads as an increasing trend;
/// two months of data is insufficient.
#[test]
fn trend_direction_and_insufficient_data() {
    let store = common::store();
    let months = [("2024-01", 1_000.0), ("2024-02", 1_000.0), ("2024-03", 3_000.0), ("2024-04", 3_000.0)];
    for (i, (month, amount)) in months.iter().enumerate() {
        store
            .insert_transaction(&common::debit(
                CLIENT,
                &format!("m{i}"),
                &format!("{month}-15"),
                *amount,
                "Various",
            ))
            .unwrap();
    }

    let eng = PatternAnalysisEngine::new(&store, DetectorConfig::default());
    let trend = eng
        .analyze_trends(CLIENT, common::range("2024-01-01", "2024-04-30"))
        .unwrap();
    assert_eq!(trend.direction, "increasing");
    assert_eq!(trend.months_analyzed, 4);
    assert!((trend.change_pct - 200.0).abs() < 0.01);

    let short = eng
        .analyze_trends(CLIENT, common::range("2024-01-01", "2024-02-29"))
        .unwrap();
    assert_eq!(short.direction, "insufficient_data");
}
