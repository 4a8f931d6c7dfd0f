//! Statistical pattern analysis.
//!
//! Learns per-vendor recurring-payment patterns over a long lookback, then
//! flags deviations in the recent window: amount outliers (z-score),
//! early/late recurring payments, brand-new vendors, recurring payments
//! that failed to arrive, global amount outliers, and a monthly spend
//! trend.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::{
    config::DetectorConfig,
    detector::{run_check, Detector},
    error::EngineResult,
    issue::{Issue, IssueType, ScanResult, Severity},
    model::Transaction,
    stats::{days_between, group_by_similar_amount, mean, median, sample_stdev, z_score},
    store::LedgerStore,
    types::DateRange,
};

/// A learned recurring-payment profile for one vendor.
#[derive(Debug, Clone, Serialize)]
pub struct VendorPattern {
    pub vendor: String,
    pub occurrence_count: usize,
    pub mean_amount: f64,
    pub median_amount: f64,
    pub stdev_amount: f64,
    /// stdev/mean; the consistency proxy.
    pub coefficient_of_variation: f64,
    pub mean_gap_days: f64,
    pub is_consistent: bool,
    pub is_monthly: bool,
    /// min(1, occurrences/12): a year of monthly bills is full confidence.
    pub confidence: f64,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    /// Mean of the largest same-amount cluster, when one dominates.
    pub dominant_amount: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendAnalysis {
    pub direction: String, // "increasing" | "decreasing" | "stable" | "insufficient_data"
    pub change_pct: f64,
    pub months_analyzed: usize,
    pub monthly_totals: Vec<(String, f64)>,
}

pub struct PatternAnalysisEngine<'a> {
    store: &'a LedgerStore,
    cfg: DetectorConfig,
}

impl<'a> PatternAnalysisEngine<'a> {
    pub fn new(store: &'a LedgerStore, cfg: DetectorConfig) -> Self {
        Self { store, cfg }
    }

    /// The long history window patterns are learned from: `lookback_days`
    /// ending at the scan window's end.
    fn lookback(&self, range: DateRange) -> DateRange {
        DateRange::last_days(range.to, self.cfg.pattern_lookback_days)
    }

    /// The trailing slice of the scan window that deviation checks cover.
    fn recent_window(&self, range: DateRange) -> DateRange {
        let recent = DateRange::last_days(range.to, self.cfg.recent_window_days);
        DateRange::new(recent.from.max(range.from), range.to)
    }

    fn vendor_history(
        &self,
        client_id: &str,
        lookback: DateRange,
    ) -> EngineResult<BTreeMap<String, Vec<Transaction>>> {
        let txns = self.store.debit_transactions_in_range(client_id, lookback)?;
        let mut by_vendor: BTreeMap<String, Vec<Transaction>> = BTreeMap::new();
        for t in txns {
            by_vendor
                .entry(t.vendor_or_unknown().to_string())
                .or_default()
                .push(t);
        }
        Ok(by_vendor)
    }

    fn pattern_for(&self, vendor: &str, history: &[Transaction]) -> Option<VendorPattern> {
        if history.len() < self.cfg.min_pattern_occurrences {
            return None;
        }
        // History is date-sorted from the store.
        let amounts: Vec<f64> = history.iter().map(|t| t.amount).collect();
        let m = mean(&amounts);
        let sd = sample_stdev(&amounts);
        let cv = if m == 0.0 { 0.0 } else { sd / m };
        let gaps: Vec<f64> = history
            .windows(2)
            .map(|w| days_between(w[0].date, w[1].date) as f64)
            .collect();
        let mean_gap = mean(&gaps);

        let clusters = group_by_similar_amount(&amounts, self.cfg.cluster_tolerance_pct);
        let dominant_amount = clusters
            .iter()
            .max_by_key(|c| c.len())
            .filter(|c| c.len() * 2 > amounts.len())
            .map(|c| c.iter().map(|&i| amounts[i]).sum::<f64>() / c.len() as f64);

        Some(VendorPattern {
            vendor: vendor.to_string(),
            occurrence_count: history.len(),
            mean_amount: m,
            median_amount: median(&amounts),
            stdev_amount: sd,
            coefficient_of_variation: cv,
            mean_gap_days: mean_gap,
            is_consistent: cv < self.cfg.consistency_cv_threshold,
            is_monthly: mean_gap >= self.cfg.monthly_gap_min_days
                && mean_gap <= self.cfg.monthly_gap_max_days,
            confidence: (history.len() as f64 / 12.0).min(1.0),
            first_date: history[0].date,
            last_date: history[history.len() - 1].date,
            dominant_amount,
        })
    }

    /// Learn patterns for every vendor with enough history.
    pub fn learn_vendor_patterns(
        &self,
        client_id: &str,
        range: DateRange,
    ) -> EngineResult<Vec<VendorPattern>> {
        let history = self.vendor_history(client_id, self.lookback(range))?;
        Ok(history
            .iter()
            .filter_map(|(vendor, txns)| self.pattern_for(vendor, txns))
            .collect())
    }

    /// Recent transactions whose amount is a statistical outlier against
    /// the vendor's own history.
    pub fn detect_amount_deviations(
        &self,
        client_id: &str,
        range: DateRange,
    ) -> EngineResult<Vec<Issue>> {
        let history = self.vendor_history(client_id, self.lookback(range))?;
        let recent = self.recent_window(range);
        let mut issues = Vec::new();

        for (vendor, txns) in &history {
            let pattern = match self.pattern_for(vendor, txns) {
                Some(p) => p,
                None => continue,
            };
            let amounts: Vec<f64> = txns.iter().map(|t| t.amount).collect();
            for t in txns.iter().filter(|t| recent.contains(t.date)) {
                let z = z_score(t.amount, &amounts);
                if z.abs() <= self.cfg.z_score_threshold {
                    continue;
                }
                let severity = if z.abs() > self.cfg.extreme_z_score_threshold {
                    Severity::High
                } else {
                    Severity::Medium
                };
                let mut issue = Issue::new(
                    IssueType::AmountDeviation,
                    severity,
                    format!(
                        "₹{:.2} to {vendor} on {} deviates from the usual ₹{:.2}",
                        t.amount, t.date, pattern.mean_amount
                    ),
                );
                issue.implication = Some("Amount far outside this vendor's history".into());
                issue.recommendation = Some("Confirm the bill before it is processed".into());
                issue.vendor = Some(vendor.clone());
                issue.amount = Some(t.amount);
                issue.transaction_ids = vec![t.id.clone()];
                issue.details = serde_json::json!({
                    "z_score": z,
                    "historical_mean": pattern.mean_amount,
                    "historical_stdev": pattern.stdev_amount,
                    "confidence": pattern.confidence,
                });
                issues.push(issue);
            }
        }
        Ok(issues)
    }

    /// Early/late recurring payments for monthly vendors. Each recent
    /// transaction is compared against its predecessor in the vendor's
    /// history; a vendor's first occurrence has nothing to compare to and
    /// is skipped.
    pub fn detect_timing_deviations(
        &self,
        client_id: &str,
        range: DateRange,
    ) -> EngineResult<Vec<Issue>> {
        let history = self.vendor_history(client_id, self.lookback(range))?;
        let recent = self.recent_window(range);
        let mut issues = Vec::new();

        for (vendor, txns) in &history {
            let pattern = match self.pattern_for(vendor, txns) {
                Some(p) if p.is_monthly => p,
                _ => continue,
            };
            for (i, t) in txns.iter().enumerate() {
                if i == 0 || !recent.contains(t.date) {
                    continue;
                }
                let gap = days_between(txns[i - 1].date, t.date) as f64;
                let deviation = gap - pattern.mean_gap_days;
                if deviation.abs() <= self.cfg.date_tolerance_days as f64 {
                    continue;
                }
                let (issue_type, severity, word) = if deviation < 0.0 {
                    (IssueType::EarlyPayment, Severity::Low, "early")
                } else {
                    (IssueType::LatePayment, Severity::Medium, "late")
                };
                let mut issue = Issue::new(
                    issue_type,
                    severity,
                    format!(
                        "Payment to {vendor} on {} is {:.0} day(s) {word} against its ~{:.0}-day cycle",
                        t.date,
                        deviation.abs(),
                        pattern.mean_gap_days
                    ),
                );
                issue.implication = Some(match issue_type {
                    IssueType::EarlyPayment => "Off-cycle payment; may be an extra bill".into(),
                    _ => "Delayed recurring payment; check for missed dues".into(),
                });
                issue.vendor = Some(vendor.clone());
                issue.amount = Some(t.amount);
                issue.transaction_ids = vec![t.id.clone()];
                issue.details = serde_json::json!({
                    "gap_days": gap,
                    "expected_gap_days": pattern.mean_gap_days,
                    "confidence": pattern.confidence,
                });
                issues.push(issue);
            }
        }
        Ok(issues)
    }

    /// Recent transactions from vendors with no established pattern.
    pub fn detect_new_vendors(
        &self,
        client_id: &str,
        range: DateRange,
    ) -> EngineResult<Vec<Issue>> {
        let history = self.vendor_history(client_id, self.lookback(range))?;
        let recent = self.recent_window(range);
        let mut issues = Vec::new();

        for (vendor, txns) in &history {
            if txns.len() >= self.cfg.min_pattern_occurrences {
                continue;
            }
            let recent_txns: Vec<&Transaction> =
                txns.iter().filter(|t| recent.contains(t.date)).collect();
            if recent_txns.is_empty() {
                continue;
            }
            let total: f64 = recent_txns.iter().map(|t| t.amount).sum();
            let mut issue = Issue::new(
                IssueType::NewVendor,
                Severity::Low,
                format!(
                    "{vendor} is new or infrequent: {} recent transaction(s), ₹{total:.2}",
                    recent_txns.len()
                ),
            );
            issue.implication = Some("No payment history to validate against".into());
            issue.recommendation = Some("Complete vendor onboarding checks".into());
            issue.vendor = Some(vendor.clone());
            issue.total_amount = Some(total);
            issue.transaction_ids = recent_txns.iter().map(|t| t.id.clone()).collect();
            issues.push(issue);
        }
        Ok(issues)
    }

    /// Monthly vendors whose next predicted payment is overdue inside the
    /// scan window, with no matching transaction anywhere near the
    /// predicted date.
    pub fn detect_missing_expected(
        &self,
        client_id: &str,
        range: DateRange,
    ) -> EngineResult<Vec<Issue>> {
        let history = self.vendor_history(client_id, self.lookback(range))?;
        let tolerance = self.cfg.date_tolerance_days;
        let mut issues = Vec::new();

        for (vendor, txns) in &history {
            let pattern = match self.pattern_for(vendor, txns) {
                Some(p) if p.is_monthly => p,
                _ => continue,
            };
            let expected = pattern.last_date + Duration::days(pattern.mean_gap_days.round() as i64);
            if !range.contains(expected) {
                continue;
            }
            if days_between(expected, range.to) <= tolerance {
                continue; // not overdue yet
            }
            // Existence guard: anything from this vendor near or after the
            // predicted date clears the flag.
            let check = DateRange::new(expected - Duration::days(tolerance), range.to);
            if self
                .store
                .vendor_has_transaction_in_range(client_id, vendor, check)?
            {
                continue;
            }
            let mut issue = Issue::new(
                IssueType::MissingExpectedTransaction,
                Severity::Medium,
                format!(
                    "Expected ~₹{:.2} payment to {vendor} around {expected} has not appeared",
                    pattern.dominant_amount.unwrap_or(pattern.mean_amount)
                ),
            );
            issue.implication = Some("A recurring obligation may be unpaid or unrecorded".into());
            issue.recommendation = Some("Check for a missed bill or an unposted entry".into());
            issue.vendor = Some(vendor.clone());
            issue.details = serde_json::json!({
                "expected_date": expected,
                "last_seen": pattern.last_date,
                "mean_gap_days": pattern.mean_gap_days,
                "confidence": pattern.confidence,
            });
            issues.push(issue);
        }
        Ok(issues)
    }

    /// Outliers against the whole window's population, independent of any
    /// vendor pattern. Needs a minimum population to mean anything.
    pub fn detect_global_outliers(
        &self,
        client_id: &str,
        range: DateRange,
    ) -> EngineResult<Vec<Issue>> {
        let txns = self.store.transactions_in_range(client_id, range)?;
        if txns.len() < self.cfg.min_population_for_outliers {
            log::info!(
                "population {} below minimum {}; skipping global outlier check",
                txns.len(),
                self.cfg.min_population_for_outliers
            );
            return Ok(Vec::new());
        }
        let amounts: Vec<f64> = txns.iter().map(|t| t.amount).collect();
        let mut issues = Vec::new();
        for t in &txns {
            let z = z_score(t.amount, &amounts);
            if z.abs() <= self.cfg.z_score_threshold {
                continue;
            }
            let severity = if z.abs() > self.cfg.extreme_z_score_threshold {
                Severity::High
            } else {
                Severity::Medium
            };
            let mut issue = Issue::new(
                IssueType::StatisticalOutlier,
                severity,
                format!(
                    "₹{:.2} on {} is an outlier for this ledger (z={z:.2})",
                    t.amount, t.date
                ),
            );
            issue.implication = Some("Amount far outside the period's normal range".into());
            issue.vendor = t.vendor.clone();
            issue.amount = Some(t.amount);
            issue.transaction_ids = vec![t.id.clone()];
            issue.details = serde_json::json!({ "z_score": z });
            issues.push(issue);
        }
        Ok(issues)
    }

    /// Spend trend: bucket debit amounts by calendar month and compare the
    /// first half of months against the second.
    pub fn analyze_trends(&self, client_id: &str, range: DateRange) -> EngineResult<TrendAnalysis> {
        let txns = self.store.debit_transactions_in_range(client_id, range)?;
        let mut buckets: BTreeMap<(i32, u32), f64> = BTreeMap::new();
        for t in &txns {
            *buckets.entry((t.date.year(), t.date.month())).or_default() += t.amount;
        }
        let monthly_totals: Vec<(String, f64)> = buckets
            .iter()
            .map(|((y, m), total)| (format!("{y}-{m:02}"), *total))
            .collect();

        if buckets.len() < 3 {
            return Ok(TrendAnalysis {
                direction: "insufficient_data".into(),
                change_pct: 0.0,
                months_analyzed: buckets.len(),
                monthly_totals,
            });
        }

        let totals: Vec<f64> = buckets.values().copied().collect();
        let mid = totals.len() / 2;
        let first = mean(&totals[..mid]);
        let second = mean(&totals[mid..]);
        let change_pct = if first == 0.0 {
            0.0
        } else {
            (second - first) / first * 100.0
        };
        let direction = if change_pct > 5.0 {
            "increasing"
        } else if change_pct < -5.0 {
            "decreasing"
        } else {
            "stable"
        };

        Ok(TrendAnalysis {
            direction: direction.into(),
            change_pct,
            months_analyzed: buckets.len(),
            monthly_totals,
        })
    }
}

impl Detector for PatternAnalysisEngine<'_> {
    fn name(&self) -> &'static str {
        "pattern_analysis"
    }

    fn run_full_scan(&self, client_id: &str, range: DateRange) -> ScanResult {
        let mut result = ScanResult::new(client_id, range);
        run_check(&mut result, self.name(), "amount_deviations", || {
            self.detect_amount_deviations(client_id, range)
        });
        run_check(&mut result, self.name(), "timing_deviations", || {
            self.detect_timing_deviations(client_id, range)
        });
        run_check(&mut result, self.name(), "new_vendors", || {
            self.detect_new_vendors(client_id, range)
        });
        run_check(&mut result, self.name(), "missing_expected", || {
            self.detect_missing_expected(client_id, range)
        });
        run_check(&mut result, self.name(), "global_outliers", || {
            self.detect_global_outliers(client_id, range)
        });

        // Learned patterns and the trend ride along as extras; failures
        // here degrade to a log line, same as a sub-check.
        let mut extra = serde_json::Map::new();
        match self.learn_vendor_patterns(client_id, range) {
            Ok(patterns) => {
                if let Ok(v) = serde_json::to_value(&patterns) {
                    extra.insert("vendor_patterns".into(), v);
                }
            }
            Err(e) => log::error!("pattern learning failed for client {client_id}: {e}"),
        }
        match self.analyze_trends(client_id, range) {
            Ok(trend) => {
                if let Ok(v) = serde_json::to_value(&trend) {
                    extra.insert("trend".into(), v);
                }
            }
            Err(e) => log::error!("trend analysis failed for client {client_id}: {e}"),
        }
        if !extra.is_empty() {
            result.extra = serde_json::Value::Object(extra);
        }
        result
    }
}
