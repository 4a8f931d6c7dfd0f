//! Full-scan orchestration.
//!
//! Runs all six detectors for one client over one window, sequentially and
//! in a fixed order, and folds their results into a single report. Order is
//! deterministic so two scans of the same ledger produce the same report
//! shape.

use std::{collections::BTreeMap, time::Instant};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::{
    cash_transaction_checker::CashTransactionChecker,
    config::{DetectorConfig, TaxPolicy},
    detector::Detector,
    duplicate_detector::DuplicateDetector,
    gst_mismatch_detector::GstMismatchDetector,
    issue::{ScanResult, ScanSummary},
    missing_invoice_detector::MissingInvoiceDetector,
    model::Gstr2bEntry,
    pattern_analysis::PatternAnalysisEngine,
    suspicious_vendor_detector::SuspiciousVendorDetector,
    types::DateRange,
};

/// The combined output of one full scan: every detector's result keyed by
/// detector name, plus a rolled-up summary and per-detector timings.
#[derive(Debug, Clone, Serialize)]
pub struct FullScanReport {
    pub client_id: String,
    pub scan_date: DateTime<Utc>,
    pub date_range: DateRange,
    pub detectors: BTreeMap<String, ScanResult>,
    pub summary: ScanSummary,
    /// Wall-clock milliseconds per detector.
    pub durations_ms: BTreeMap<String, u128>,
}

/// Owns the reference data a scan needs beyond the ledger itself:
/// detector thresholds, the tax rate policy, and the optional
/// caller-supplied GSTR-2B statement and blocked-GSTIN list.
pub struct ScanOrchestrator {
    cfg: DetectorConfig,
    policy: TaxPolicy,
    gstr2b: Option<(Vec<Gstr2bEntry>, u32, i32)>,
    blocked_gstins: Vec<String>,
}

impl ScanOrchestrator {
    pub fn new(cfg: DetectorConfig, policy: TaxPolicy) -> Self {
        Self {
            cfg,
            policy,
            gstr2b: None,
            blocked_gstins: Vec::new(),
        }
    }

    /// Attach a GSTR-2B statement for one return period (month, year).
    pub fn with_gstr2b(mut self, entries: Vec<Gstr2bEntry>, month: u32, year: i32) -> Self {
        self.gstr2b = Some((entries, month, year));
        self
    }

    pub fn with_blocked_gstins(mut self, gstins: Vec<String>) -> Self {
        self.blocked_gstins = gstins;
        self
    }

    /// The default window when the caller gives no explicit range: the
    /// configured number of days ending at `as_of`.
    pub fn default_range(&self, as_of: NaiveDate) -> DateRange {
        DateRange::last_days(as_of, self.cfg.default_scan_window_days)
    }

    fn step(
        &self,
        report: &mut FullScanReport,
        detector: &dyn Detector,
        client_id: &str,
        range: DateRange,
    ) {
        let started = Instant::now();
        let result = detector.run_full_scan(client_id, range);
        let elapsed = started.elapsed().as_millis();
        if elapsed > self.cfg.detector_time_budget_ms as u128 {
            log::warn!(
                "{} took {elapsed}ms, over the {}ms budget",
                detector.name(),
                self.cfg.detector_time_budget_ms
            );
        }
        report.summary.merge(&result.summary);
        report.durations_ms.insert(detector.name().to_string(), elapsed);
        report.detectors.insert(detector.name().to_string(), result);
    }

    /// Run every detector for one client over one window.
    pub fn run(
        &self,
        store: &crate::store::LedgerStore,
        client_id: &str,
        range: DateRange,
    ) -> FullScanReport {
        log::info!(
            "full scan for client {client_id} over {} to {}",
            range.from,
            range.to
        );
        let mut report = FullScanReport {
            client_id: client_id.to_string(),
            scan_date: Utc::now(),
            date_range: range,
            detectors: BTreeMap::new(),
            summary: ScanSummary::default(),
            durations_ms: BTreeMap::new(),
        };

        let duplicates = DuplicateDetector::new(store, self.cfg.clone());
        self.step(&mut report, &duplicates, client_id, range);

        let mut gst = GstMismatchDetector::new(store, self.cfg.clone(), self.policy.clone());
        if let Some((entries, month, year)) = &self.gstr2b {
            gst = gst.with_gstr2b(entries.clone(), *month, *year);
        }
        self.step(&mut report, &gst, client_id, range);

        let missing = MissingInvoiceDetector::new(store, self.cfg.clone());
        self.step(&mut report, &missing, client_id, range);

        let vendors = SuspiciousVendorDetector::new(store, self.cfg.clone())
            .with_blocked_gstins(self.blocked_gstins.iter().cloned());
        self.step(&mut report, &vendors, client_id, range);

        let cash = CashTransactionChecker::new(store, self.cfg.clone());
        self.step(&mut report, &cash, client_id, range);

        let patterns = PatternAnalysisEngine::new(store, self.cfg.clone());
        self.step(&mut report, &patterns, client_id, range);

        log::info!(
            "scan complete for client {client_id}: {} issue(s), {} critical",
            report.summary.total_issues,
            report.summary.critical
        );
        report
    }
}
