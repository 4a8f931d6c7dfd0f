//! Duplicate payment detection.
//!
//! Four independent sub-checks:
//! - exact invoice-number duplicates per vendor
//! - repeated (amount, vendor, date) entries with no invoice at all
//! - near-duplicate vendor bills inside a sliding date window
//! - fuzzy near-duplicate invoice numbers per vendor

use std::collections::BTreeMap;

use crate::{
    config::DetectorConfig,
    detector::{run_check, Detector},
    error::EngineResult,
    issue::{Issue, IssueType, ScanResult, Severity},
    model::Transaction,
    stats::{days_between, string_similarity},
    store::LedgerStore,
    types::DateRange,
};

pub struct DuplicateDetector<'a> {
    store: &'a LedgerStore,
    cfg: DetectorConfig,
}

impl<'a> DuplicateDetector<'a> {
    pub fn new(store: &'a LedgerStore, cfg: DetectorConfig) -> Self {
        Self { store, cfg }
    }

    fn group_severity(&self, count: usize, total: f64) -> Severity {
        if count > 2 || total > self.cfg.duplicate_high_total {
            Severity::High
        } else {
            Severity::Medium
        }
    }

    /// Same invoice number billed more than once by the same vendor.
    pub fn detect_duplicate_invoices(
        &self,
        client_id: &str,
        range: DateRange,
    ) -> EngineResult<Vec<Issue>> {
        let txns = self.store.transactions_in_range(client_id, range)?;
        let mut groups: BTreeMap<(String, String), Vec<&Transaction>> = BTreeMap::new();
        for t in &txns {
            if let Some(inv) = t.invoice_upper() {
                groups
                    .entry((inv, t.vendor_or_unknown().to_uppercase()))
                    .or_default()
                    .push(t);
            }
        }

        let mut issues = Vec::new();
        for ((invoice, _vendor), group) in groups {
            if group.len() < 2 {
                continue;
            }
            let total: f64 = group.iter().map(|t| t.amount).sum();
            let vendor = group[0].vendor_or_unknown().to_string();
            let mut issue = Issue::new(
                IssueType::DuplicateInvoice,
                self.group_severity(group.len(), total),
                format!(
                    "Invoice {invoice} from {vendor} appears {} times (total ₹{total:.2})",
                    group.len()
                ),
            );
            issue.implication =
                Some("Possible double payment; excess claim of expense and ITC".into());
            issue.recommendation = Some("Verify with the vendor and reverse one entry".into());
            issue.vendor = Some(vendor);
            issue.total_amount = Some(total);
            issue.transaction_ids = group.iter().map(|t| t.id.clone()).collect();
            issue.details = serde_json::json!({
                "invoice_number": invoice,
                "occurrences": group.len(),
            });
            issues.push(issue);
        }
        Ok(issues)
    }

    /// Identical (amount, vendor, date) entries — catches manual double
    /// entry that never got an invoice number.
    pub fn detect_repeated_transactions(
        &self,
        client_id: &str,
        range: DateRange,
    ) -> EngineResult<Vec<Issue>> {
        let txns = self.store.transactions_in_range(client_id, range)?;
        let mut groups: BTreeMap<(i64, String, String), Vec<&Transaction>> = BTreeMap::new();
        for t in &txns {
            let key = (
                (t.amount * 100.0).round() as i64,
                t.vendor_or_unknown().to_uppercase(),
                t.date.to_string(),
            );
            groups.entry(key).or_default().push(t);
        }

        let mut issues = Vec::new();
        for (_, group) in groups {
            if group.len() < 2 {
                continue;
            }
            let total: f64 = group.iter().map(|t| t.amount).sum();
            let vendor = group[0].vendor_or_unknown().to_string();
            let mut issue = Issue::new(
                IssueType::RepeatedTransaction,
                self.group_severity(group.len(), total),
                format!(
                    "{} identical entries of ₹{:.2} to {vendor} on {}",
                    group.len(),
                    group[0].amount,
                    group[0].date
                ),
            );
            issue.implication = Some("Likely data-entry duplication".into());
            issue.recommendation = Some("Confirm each entry against source records".into());
            issue.vendor = Some(vendor);
            issue.amount = Some(group[0].amount);
            issue.total_amount = Some(total);
            issue.transaction_ids = group.iter().map(|t| t.id.clone()).collect();
            issue.details = serde_json::json!({
                "date": group[0].date,
                "occurrences": group.len(),
            });
            issues.push(issue);
        }
        Ok(issues)
    }

    /// Near-identical amounts to the same vendor within a short window.
    ///
    /// Per vendor, date-sorted: each unconsumed transaction anchors a
    /// window of `date_window_days`; others inside it whose amount is
    /// within tolerance (1% relative or ₹100 absolute, inclusive) join the
    /// group. A transaction joins at most one group; unmatched rows remain
    /// eligible as later anchors.
    pub fn detect_duplicate_vendor_bills(
        &self,
        client_id: &str,
        range: DateRange,
    ) -> EngineResult<Vec<Issue>> {
        let txns = self.store.debit_transactions_in_range(client_id, range)?;
        let mut by_vendor: BTreeMap<String, Vec<&Transaction>> = BTreeMap::new();
        for t in &txns {
            by_vendor
                .entry(t.vendor_or_unknown().to_uppercase())
                .or_default()
                .push(t);
        }

        let mut issues = Vec::new();
        for (_, vendor_txns) in by_vendor {
            // Store order is date-ascending already.
            let mut used = vec![false; vendor_txns.len()];
            for i in 0..vendor_txns.len() {
                if used[i] {
                    continue;
                }
                let anchor = vendor_txns[i];
                let tolerance = (anchor.amount * self.cfg.amount_tolerance_pct / 100.0)
                    .max(self.cfg.amount_tolerance_abs);
                let mut group = vec![i];
                for (j, t) in vendor_txns.iter().enumerate().skip(i + 1) {
                    if used[j] {
                        continue;
                    }
                    if days_between(anchor.date, t.date) > self.cfg.date_window_days {
                        break;
                    }
                    if (t.amount - anchor.amount).abs() <= tolerance {
                        group.push(j);
                    }
                }
                if group.len() < 2 {
                    continue;
                }
                for &j in &group {
                    used[j] = true;
                }
                let members: Vec<&Transaction> = group.iter().map(|&j| vendor_txns[j]).collect();
                let total: f64 = members.iter().map(|t| t.amount).sum();
                let vendor = anchor.vendor_or_unknown().to_string();
                let severity = if total > self.cfg.duplicate_high_total {
                    Severity::High
                } else {
                    Severity::Medium
                };
                let mut issue = Issue::new(
                    IssueType::DuplicateVendorBill,
                    severity,
                    format!(
                        "{} bills of ~₹{:.2} from {vendor} within {} days",
                        members.len(),
                        anchor.amount,
                        self.cfg.date_window_days
                    ),
                );
                issue.implication = Some("Same bill may have been booked twice".into());
                issue.recommendation =
                    Some("Match the bills against delivery and payment records".into());
                issue.vendor = Some(vendor);
                issue.total_amount = Some(total);
                issue.transaction_ids = members.iter().map(|t| t.id.clone()).collect();
                issue.details = serde_json::json!({
                    "window_days": self.cfg.date_window_days,
                    "amounts": members.iter().map(|t| t.amount).collect::<Vec<_>>(),
                    "dates": members.iter().map(|t| t.date).collect::<Vec<_>>(),
                });
                issues.push(issue);
            }
        }
        Ok(issues)
    }

    /// Invoice numbers that look like variants of each other (INV-1 vs
    /// INV-1A). Heuristic, so always low severity.
    pub fn detect_near_duplicate_invoices(
        &self,
        client_id: &str,
        range: DateRange,
    ) -> EngineResult<Vec<Issue>> {
        let txns = self.store.transactions_in_range(client_id, range)?;
        let mut by_vendor: BTreeMap<String, BTreeMap<String, Vec<&Transaction>>> = BTreeMap::new();
        for t in &txns {
            if let Some(inv) = t.invoice_upper() {
                by_vendor
                    .entry(t.vendor_or_unknown().to_uppercase())
                    .or_default()
                    .entry(inv)
                    .or_default()
                    .push(t);
            }
        }

        let mut issues = Vec::new();
        for (_, invoices) in by_vendor {
            let numbers: Vec<&String> = invoices.keys().collect();
            if numbers.len() < 2 {
                continue;
            }
            // All-pairs compare, then merge matches transitively.
            let mut parent: Vec<usize> = (0..numbers.len()).collect();
            fn root(parent: &mut Vec<usize>, mut i: usize) -> usize {
                while parent[i] != i {
                    parent[i] = parent[parent[i]];
                    i = parent[i];
                }
                i
            }
            for i in 0..numbers.len() {
                for j in (i + 1)..numbers.len() {
                    if string_similarity(numbers[i], numbers[j]) >= self.cfg.fuzzy_threshold {
                        let (a, b) = (root(&mut parent, i), root(&mut parent, j));
                        if a != b {
                            parent[a] = b;
                        }
                    }
                }
            }
            let mut clusters: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
            for i in 0..numbers.len() {
                let r = root(&mut parent, i);
                clusters.entry(r).or_default().push(i);
            }

            for (_, members) in clusters {
                if members.len() < 2 {
                    continue;
                }
                let invs: Vec<&String> = members.iter().map(|&i| numbers[i]).collect();
                let group_txns: Vec<&Transaction> = members
                    .iter()
                    .flat_map(|&i| invoices[numbers[i]].iter().copied())
                    .collect();
                let total: f64 = group_txns.iter().map(|t| t.amount).sum();
                let vendor = group_txns[0].vendor_or_unknown().to_string();
                let mut issue = Issue::new(
                    IssueType::NearDuplicateInvoice,
                    Severity::Low,
                    format!(
                        "Similar invoice numbers from {vendor}: {}",
                        invs.iter()
                            .map(|s| s.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                );
                issue.implication =
                    Some("May be the same invoice entered with a typo or suffix".into());
                issue.recommendation = Some("Review the underlying invoices manually".into());
                issue.vendor = Some(vendor);
                issue.total_amount = Some(total);
                issue.transaction_ids = group_txns.iter().map(|t| t.id.clone()).collect();
                issue.details = serde_json::json!({ "invoice_numbers": invs });
                issues.push(issue);
            }
        }
        Ok(issues)
    }
}

impl Detector for DuplicateDetector<'_> {
    fn name(&self) -> &'static str {
        "duplicates"
    }

    fn run_full_scan(&self, client_id: &str, range: DateRange) -> ScanResult {
        let mut result = ScanResult::new(client_id, range);
        run_check(&mut result, self.name(), "duplicate_invoices", || {
            self.detect_duplicate_invoices(client_id, range)
        });
        run_check(&mut result, self.name(), "repeated_transactions", || {
            self.detect_repeated_transactions(client_id, range)
        });
        run_check(&mut result, self.name(), "duplicate_vendor_bills", || {
            self.detect_duplicate_vendor_bills(client_id, range)
        });
        run_check(&mut result, self.name(), "near_duplicate_invoices", || {
            self.detect_near_duplicate_invoices(client_id, range)
        });
        result
    }
}
