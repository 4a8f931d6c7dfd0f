//! Suspicious vendor detection: accumulated risk scoring, GSTIN anomaly
//! maps, blocklist hits, and unregistered-vendor turnover checks.
//!
//! The blocked-GSTIN list is caller-supplied; nothing is fetched from any
//! government source.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::{
    config::DetectorConfig,
    detector::{run_check, Detector},
    error::EngineResult,
    gst_mismatch_detector::inclusive_tax,
    issue::{Issue, IssueType, ScanResult, Severity},
    model::Transaction,
    stats::gstin_format_valid,
    store::LedgerStore,
    types::DateRange,
};

pub struct SuspiciousVendorDetector<'a> {
    store: &'a LedgerStore,
    cfg: DetectorConfig,
    blocked_gstins: HashSet<String>,
}

impl<'a> SuspiciousVendorDetector<'a> {
    pub fn new(store: &'a LedgerStore, cfg: DetectorConfig) -> Self {
        Self {
            store,
            cfg,
            blocked_gstins: HashSet::new(),
        }
    }

    pub fn with_blocked_gstins<I: IntoIterator<Item = String>>(mut self, gstins: I) -> Self {
        // Blank entries in a caller-supplied list are skipped, not fatal.
        self.blocked_gstins = gstins
            .into_iter()
            .map(|g| g.trim().to_uppercase())
            .filter(|g| !g.is_empty())
            .collect();
        self
    }

    /// Accumulate a per-vendor risk score over the window:
    /// +1 missing invoice, +2 GST-applicable without GSTIN,
    /// +2 cash above the cash limit, +1 large amount without invoice.
    pub fn detect_high_risk_vendors(
        &self,
        client_id: &str,
        range: DateRange,
    ) -> EngineResult<Vec<Issue>> {
        let txns = self.store.transactions_in_range(client_id, range)?;
        let mut by_vendor: BTreeMap<String, Vec<&Transaction>> = BTreeMap::new();
        for t in &txns {
            by_vendor
                .entry(t.vendor_or_unknown().to_string())
                .or_default()
                .push(t);
        }

        let mut issues = Vec::new();
        for (vendor, group) in by_vendor {
            let mut score = 0u32;
            let mut reasons: BTreeMap<&str, u32> = BTreeMap::new();
            for t in &group {
                if !t.has_invoice() {
                    score += 1;
                    *reasons.entry("missing_invoice").or_default() += 1;
                }
                if t.gst_applicable && t.gstin.is_none() {
                    score += 2;
                    *reasons.entry("gst_without_gstin").or_default() += 1;
                }
                if t.is_cash() && t.amount > self.cfg.cash_limit {
                    score += 2;
                    *reasons.entry("large_cash").or_default() += 1;
                }
                if t.amount >= self.cfg.large_cash_threshold && !t.has_invoice() {
                    score += 1;
                    *reasons.entry("large_without_invoice").or_default() += 1;
                }
            }
            if score < 3 && group.len() < 5 {
                continue;
            }
            let risk_pct = score as f64 / group.len() as f64 * 100.0;
            let severity = if score >= 5 || risk_pct > 50.0 {
                Severity::High
            } else if score >= 3 || risk_pct > 30.0 {
                Severity::Medium
            } else {
                Severity::Low
            };
            let total: f64 = group.iter().map(|t| t.amount).sum();
            let mut issue = Issue::new(
                IssueType::HighRiskVendor,
                severity,
                format!(
                    "{vendor} scored {score} risk points over {} transaction(s)",
                    group.len()
                ),
            );
            issue.implication =
                Some("Repeated compliance gaps concentrated in one vendor".into());
            issue.recommendation = Some("Review this vendor's documentation end to end".into());
            issue.vendor = Some(vendor);
            issue.total_amount = Some(total);
            issue.transaction_ids = group.iter().map(|t| t.id.clone()).collect();
            issue.details = serde_json::json!({
                "risk_score": score,
                "risk_percentage": risk_pct,
                "transaction_count": group.len(),
                "reasons": reasons,
            });
            issues.push(issue);
        }
        Ok(issues)
    }

    /// GSTIN anomaly maps over the window: one GSTIN shared by several
    /// vendor names (critical), one vendor with several GSTINs (medium,
    /// plausibly branches), and syntactically invalid GSTINs (high).
    pub fn detect_gstin_anomalies(
        &self,
        client_id: &str,
        range: DateRange,
    ) -> EngineResult<Vec<Issue>> {
        let txns = self.store.transactions_in_range(client_id, range)?;
        let mut gstin_vendors: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut vendor_gstins: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut gstin_txns: BTreeMap<String, Vec<&Transaction>> = BTreeMap::new();

        for t in &txns {
            if let Some(g) = t.gstin.as_deref() {
                let g = g.trim().to_uppercase();
                if g.is_empty() {
                    continue;
                }
                gstin_vendors
                    .entry(g.clone())
                    .or_default()
                    .insert(t.vendor_or_unknown().to_string());
                vendor_gstins
                    .entry(t.vendor_or_unknown().to_string())
                    .or_default()
                    .insert(g.clone());
                gstin_txns.entry(g).or_default().push(t);
            }
        }

        let mut issues = Vec::new();

        for (gstin, vendors) in &gstin_vendors {
            if vendors.len() > 1 {
                let mut issue = Issue::new(
                    IssueType::SharedGstin,
                    Severity::Critical,
                    format!(
                        "GSTIN {gstin} used by {} different vendors: {}",
                        vendors.len(),
                        vendors.iter().cloned().collect::<Vec<_>>().join(", ")
                    ),
                );
                issue.implication =
                    Some("Possible GSTIN misuse or billing through a front entity".into());
                issue.recommendation = Some("Verify each vendor's registration certificate".into());
                issue.transaction_ids = gstin_txns[gstin].iter().map(|t| t.id.clone()).collect();
                issue.details = serde_json::json!({
                    "gstin": gstin,
                    "vendors": vendors,
                });
                issues.push(issue);
            }
        }

        for (vendor, gstins) in &vendor_gstins {
            if gstins.len() > 1 {
                let mut issue = Issue::new(
                    IssueType::MultipleGstins,
                    Severity::Medium,
                    format!("{vendor} billed under {} GSTINs", gstins.len()),
                );
                issue.implication =
                    Some("May be legitimate branches; confirm the registrations".into());
                issue.vendor = Some(vendor.clone());
                issue.details = serde_json::json!({ "gstins": gstins });
                issues.push(issue);
            }
        }

        for (gstin, group) in &gstin_txns {
            if !gstin_format_valid(gstin) {
                let mut issue = Issue::new(
                    IssueType::InvalidGstinFormat,
                    Severity::High,
                    format!("GSTIN {gstin} is not a valid format"),
                );
                issue.implication = Some("ITC claims against this GSTIN will fail".into());
                issue.recommendation = Some("Correct the GSTIN in the books".into());
                issue.vendor = Some(group[0].vendor_or_unknown().to_string());
                issue.transaction_ids = group.iter().map(|t| t.id.clone()).collect();
                issue.details = serde_json::json!({ "gstin": gstin });
                issues.push(issue);
            }
        }

        Ok(issues)
    }

    /// Transactions against a caller-supplied blocked-GSTIN list.
    pub fn detect_blocked_gstins(
        &self,
        client_id: &str,
        range: DateRange,
    ) -> EngineResult<Vec<Issue>> {
        if self.blocked_gstins.is_empty() {
            log::warn!("no blocked-GSTIN list supplied; skipping blocklist check");
            return Ok(Vec::new());
        }
        let txns = self.store.transactions_in_range(client_id, range)?;
        let mut issues = Vec::new();
        for t in &txns {
            let gstin = match t.gstin.as_deref() {
                Some(g) => g.trim().to_uppercase(),
                None => continue,
            };
            if !self.blocked_gstins.contains(&gstin) {
                continue;
            }
            let loss = inclusive_tax(t.amount, self.cfg.gst_default_rate_pct);
            let mut issue = Issue::new(
                IssueType::BlockedGstin,
                Severity::Critical,
                format!(
                    "₹{:.2} transacted with blocked GSTIN {gstin} ({})",
                    t.amount,
                    t.vendor_or_unknown()
                ),
            );
            issue.implication =
                Some("Registration cancelled or suspended; ITC will be denied".into());
            issue.recommendation = Some("Stop dealings and reverse claimed ITC".into());
            issue.vendor = t.vendor.clone();
            issue.amount = Some(t.amount);
            issue.potential_itc_loss = Some(loss);
            issue.transaction_ids = vec![t.id.clone()];
            issue.details = serde_json::json!({ "gstin": gstin });
            issues.push(issue);
        }
        Ok(issues)
    }

    /// Vendors trading GST-applicable volumes with no GSTIN at all. At or
    /// above the registration turnover proxy (or a heavy transaction
    /// count) this is high severity.
    pub fn detect_unregistered_vendors(
        &self,
        client_id: &str,
        range: DateRange,
    ) -> EngineResult<Vec<Issue>> {
        let txns = self.store.gst_applicable_in_range(client_id, range)?;
        let mut by_vendor: BTreeMap<String, Vec<&Transaction>> = BTreeMap::new();
        for t in txns.iter().filter(|t| t.gstin.is_none()) {
            by_vendor
                .entry(t.vendor_or_unknown().to_string())
                .or_default()
                .push(t);
        }

        let mut issues = Vec::new();
        for (vendor, group) in by_vendor {
            let total: f64 = group.iter().map(|t| t.amount).sum();
            let severity = if total >= self.cfg.gst_registration_threshold
                || group.len() >= self.cfg.unregistered_txn_count
            {
                Severity::High
            } else {
                Severity::Medium
            };
            let mut issue = Issue::new(
                IssueType::UnregisteredVendor,
                severity,
                format!(
                    "{vendor}: ₹{total:.2} of GST-applicable purchases with no GSTIN on record"
                ),
            );
            issue.implication =
                Some("Vendor may be trading above the registration threshold unregistered".into());
            issue.recommendation = Some("Confirm the vendor's registration status".into());
            issue.vendor = Some(vendor);
            issue.total_amount = Some(total);
            issue.transaction_ids = group.iter().map(|t| t.id.clone()).collect();
            issue.details = serde_json::json!({ "transaction_count": group.len() });
            issues.push(issue);
        }
        Ok(issues)
    }
}

impl Detector for SuspiciousVendorDetector<'_> {
    fn name(&self) -> &'static str {
        "suspicious_vendors"
    }

    fn run_full_scan(&self, client_id: &str, range: DateRange) -> ScanResult {
        let mut result = ScanResult::new(client_id, range);
        run_check(&mut result, self.name(), "high_risk_vendors", || {
            self.detect_high_risk_vendors(client_id, range)
        });
        run_check(&mut result, self.name(), "gstin_anomalies", || {
            self.detect_gstin_anomalies(client_id, range)
        });
        run_check(&mut result, self.name(), "blocked_gstins", || {
            self.detect_blocked_gstins(client_id, range)
        });
        run_check(&mut result, self.name(), "unregistered_vendors", || {
            self.detect_unregistered_vendors(client_id, range)
        });
        result
    }
}
