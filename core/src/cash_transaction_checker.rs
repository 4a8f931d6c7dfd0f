//! Cash transaction checks: Section 40A(3) cash payment limits, plus
//! structuring and withdrawal pattern heuristics.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::{
    config::DetectorConfig,
    detector::{run_check, Detector},
    error::EngineResult,
    issue::{Issue, IssueType, ScanResult, Severity},
    model::Transaction,
    store::LedgerStore,
    types::DateRange,
};

const LAW_40A3: &str = "Income Tax Act, 1961 — Section 40A(3) read with Rule 6DD";

pub struct CashTransactionChecker<'a> {
    store: &'a LedgerStore,
    cfg: DetectorConfig,
}

impl<'a> CashTransactionChecker<'a> {
    pub fn new(store: &'a LedgerStore, cfg: DetectorConfig) -> Self {
        Self { store, cfg }
    }

    /// Any cash-mode transaction over the cash limit.
    pub fn detect_large_cash_transactions(
        &self,
        client_id: &str,
        range: DateRange,
    ) -> EngineResult<Vec<Issue>> {
        let txns = self.store.cash_transactions_in_range(client_id, range)?;
        let mut issues = Vec::new();
        for t in txns.iter().filter(|t| t.amount > self.cfg.cash_limit) {
            let severity = if t.amount > self.cfg.large_cash_threshold {
                Severity::High
            } else {
                Severity::Medium
            };
            let mut issue = Issue::new(
                IssueType::LargeCashTransaction,
                severity,
                format!(
                    "Cash transaction of ₹{:.2} on {} exceeds the ₹{:.0} limit",
                    t.amount, t.date, self.cfg.cash_limit
                ),
            );
            issue.implication = Some("Cash expenditure above the limit risks disallowance".into());
            issue.recommendation = Some("Route payments above the limit through banking channels".into());
            issue.law_reference = Some(LAW_40A3.into());
            issue.vendor = t.vendor.clone();
            issue.amount = Some(t.amount);
            issue.transaction_ids = vec![t.id.clone()];
            issues.push(issue);
        }
        Ok(issues)
    }

    /// Withdrawal pattern heuristics over cash debits. Three distinct
    /// signals, deliberately not deduplicated against each other:
    /// structuring just under the limit, single large withdrawals, and
    /// high cash frequency in the trailing week of the window.
    pub fn detect_withdrawal_patterns(
        &self,
        client_id: &str,
        range: DateRange,
    ) -> EngineResult<Vec<Issue>> {
        let txns = self.store.cash_debits_in_range(client_id, range)?;
        let mut issues = Vec::new();

        // (a) structuring: same-day debits inside [limit*band, limit)
        // that individually stay under the limit but together cross it.
        let band_low = self.cfg.cash_limit * self.cfg.structuring_band_factor;
        let mut in_band_by_date: BTreeMap<NaiveDate, Vec<&Transaction>> = BTreeMap::new();
        for t in &txns {
            if t.amount >= band_low && t.amount < self.cfg.cash_limit {
                in_band_by_date.entry(t.date).or_default().push(t);
            }
        }
        for (date, group) in in_band_by_date {
            let total: f64 = group.iter().map(|t| t.amount).sum();
            if group.len() >= 2 && total > self.cfg.cash_limit {
                let mut issue = Issue::new(
                    IssueType::CashStructuring,
                    Severity::High,
                    format!(
                        "{} cash payments just under ₹{:.0} on {date} totaling ₹{total:.2}",
                        group.len(),
                        self.cfg.cash_limit
                    ),
                );
                issue.implication =
                    Some("Payments appear split to stay under the cash limit".into());
                issue.recommendation = Some("Examine whether these are one split payment".into());
                issue.total_amount = Some(total);
                issue.transaction_ids = group.iter().map(|t| t.id.clone()).collect();
                issue.details = serde_json::json!({
                    "date": date,
                    "band_low": band_low,
                    "amounts": group.iter().map(|t| t.amount).collect::<Vec<_>>(),
                });
                issues.push(issue);
            }
        }

        // (b) single large withdrawals.
        for t in txns
            .iter()
            .filter(|t| t.amount > self.cfg.large_cash_threshold)
        {
            let mut issue = Issue::new(
                IssueType::LargeCashWithdrawal,
                Severity::Medium,
                format!("Cash withdrawal of ₹{:.2} on {}", t.amount, t.date),
            );
            issue.implication = Some("Large cash movement; verify the business purpose".into());
            issue.vendor = t.vendor.clone();
            issue.amount = Some(t.amount);
            issue.transaction_ids = vec![t.id.clone()];
            issues.push(issue);
        }

        // (c) cash debit frequency in the trailing week of the window.
        let week = DateRange::last_days(range.to, self.cfg.frequent_cash_window_days);
        let recent: Vec<&Transaction> = txns.iter().filter(|t| week.contains(t.date)).collect();
        if recent.len() >= self.cfg.frequent_cash_count {
            let total: f64 = recent.iter().map(|t| t.amount).sum();
            let mut issue = Issue::new(
                IssueType::FrequentCashWithdrawals,
                Severity::Medium,
                format!(
                    "{} cash debits in the {} days ending {} (₹{total:.2})",
                    recent.len(),
                    self.cfg.frequent_cash_window_days,
                    week.to
                ),
            );
            issue.implication = Some("Heavy reliance on cash in a short period".into());
            issue.recommendation = Some("Check whether cash books support this volume".into());
            issue.total_amount = Some(total);
            issue.transaction_ids = recent.iter().map(|t| t.id.clone()).collect();
            issue.details = serde_json::json!({
                "window_days": self.cfg.frequent_cash_window_days,
                "count": recent.len(),
            });
            issues.push(issue);
        }

        Ok(issues)
    }

    /// Explicit Section 40A(3) violations, grouped by (date, vendor).
    /// One over-limit payment is a single-transaction violation; several
    /// payments to the same vendor on the same day that only cross the
    /// limit together are exactly one aggregate violation.
    pub fn detect_40a3_violations(
        &self,
        client_id: &str,
        range: DateRange,
    ) -> EngineResult<Vec<Issue>> {
        let txns = self.store.cash_debits_in_range(client_id, range)?;
        let mut by_day_vendor: BTreeMap<(NaiveDate, String), Vec<&Transaction>> = BTreeMap::new();
        for t in &txns {
            by_day_vendor
                .entry((t.date, t.vendor_or_unknown().to_uppercase()))
                .or_default()
                .push(t);
        }

        let mut issues = Vec::new();
        for ((date, _), group) in by_day_vendor {
            let vendor = group[0].vendor_or_unknown().to_string();
            let mut any_single = false;

            for t in &group {
                if t.amount > self.cfg.cash_limit {
                    any_single = true;
                    let mut issue = Issue::new(
                        IssueType::CashViolationSingle,
                        Severity::High,
                        format!(
                            "Cash payment of ₹{:.2} to {vendor} on {date} exceeds ₹{:.0}",
                            t.amount, self.cfg.cash_limit
                        ),
                    );
                    issue.implication =
                        Some("Entire expenditure is disallowable under Section 40A(3)".into());
                    issue.recommendation =
                        Some("Pay by account-payee cheque or bank transfer".into());
                    issue.law_reference = Some(LAW_40A3.into());
                    issue.vendor = Some(vendor.clone());
                    issue.amount = Some(t.amount);
                    issue.transaction_ids = vec![t.id.clone()];
                    issue.details = serde_json::json!({ "disallowance_applicable": true });
                    issues.push(issue);
                }
            }

            let total: f64 = group.iter().map(|t| t.amount).sum();
            if !any_single && group.len() > 1 && total > self.cfg.cash_limit {
                let mut issue = Issue::new(
                    IssueType::CashViolationAggregate,
                    Severity::High,
                    format!(
                        "{} cash payments to {vendor} on {date} aggregate to ₹{total:.2}, over ₹{:.0}",
                        group.len(),
                        self.cfg.cash_limit
                    ),
                );
                issue.implication =
                    Some("Same-day aggregate to one payee crosses the 40A(3) limit".into());
                issue.recommendation = Some("Pay by account-payee cheque or bank transfer".into());
                issue.law_reference = Some(LAW_40A3.into());
                issue.vendor = Some(vendor.clone());
                issue.total_amount = Some(total);
                issue.transaction_ids = group.iter().map(|t| t.id.clone()).collect();
                issue.details = serde_json::json!({
                    "disallowance_applicable": true,
                    "payment_count": group.len(),
                });
                issues.push(issue);
            }
        }
        Ok(issues)
    }
}

impl Detector for CashTransactionChecker<'_> {
    fn name(&self) -> &'static str {
        "cash_checks"
    }

    fn run_full_scan(&self, client_id: &str, range: DateRange) -> ScanResult {
        let mut result = ScanResult::new(client_id, range);
        run_check(&mut result, self.name(), "large_cash_transactions", || {
            self.detect_large_cash_transactions(client_id, range)
        });
        run_check(&mut result, self.name(), "withdrawal_patterns", || {
            self.detect_withdrawal_patterns(client_id, range)
        });
        run_check(&mut result, self.name(), "40a3_violations", || {
            self.detect_40a3_violations(client_id, range)
        });
        result
    }
}
