//! GST mismatch detection: books vs GSTR-2B reconciliation, expected-rate
//! checks, and ITC discrepancies.
//!
//! The GSTR-2B dataset is injected by the caller; the engine never fetches
//! it. Without a dataset the reconciliation degrades to book-side gap
//! reporting only.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::{
    config::{DetectorConfig, TaxPolicy},
    detector::{run_check, Detector},
    error::{EngineError, EngineResult},
    issue::{Issue, IssueType, ScanResult, Severity},
    model::{Gstr2bEntry, Transaction},
    store::LedgerStore,
    types::DateRange,
};

/// GST reverse calculation: tax portion of a GST-inclusive amount at a
/// flat rate. An explicit approximation, not a per-line rate lookup.
pub fn inclusive_tax(amount: f64, rate_pct: f64) -> f64 {
    amount * rate_pct / (100.0 + rate_pct)
}

pub struct GstMismatchDetector<'a> {
    store: &'a LedgerStore,
    cfg: DetectorConfig,
    policy: TaxPolicy,
    gstr2b: Option<Vec<Gstr2bEntry>>,
    /// (month, year) the supplied GSTR-2B statement covers.
    gstr2b_period: Option<(u32, i32)>,
}

impl<'a> GstMismatchDetector<'a> {
    pub fn new(store: &'a LedgerStore, cfg: DetectorConfig, policy: TaxPolicy) -> Self {
        Self {
            store,
            cfg,
            policy,
            gstr2b: None,
            gstr2b_period: None,
        }
    }

    pub fn with_gstr2b(mut self, entries: Vec<Gstr2bEntry>, month: u32, year: i32) -> Self {
        self.gstr2b = Some(entries);
        self.gstr2b_period = Some((month, year));
        self
    }

    fn month_range(month: u32, year: i32) -> EngineResult<DateRange> {
        let from = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
            EngineError::ReferenceData(format!("invalid GSTR-2B period {month}/{year}"))
        })?;
        let to = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(|| {
            EngineError::ReferenceData(format!("invalid GSTR-2B period {month}/{year}"))
        })? - chrono::Duration::days(1);
        Ok(DateRange::new(from, to))
    }

    /// Reconcile book purchases against the supplied GSTR-2B statement
    /// for one month. Matching key: (invoice number upper-cased, GSTIN).
    pub fn detect_gstr2b_mismatches(
        &self,
        client_id: &str,
        month: u32,
        year: i32,
    ) -> EngineResult<Vec<Issue>> {
        let range = Self::month_range(month, year)?;
        let purchases = self.store.gst_debits_in_range(client_id, range)?;

        let entries = match &self.gstr2b {
            Some(e) => e,
            None => {
                // Degraded mode: no statement to reconcile against, so only
                // book-side gaps (purchases that could never be matched).
                log::warn!(
                    "no GSTR-2B dataset supplied for {month}/{year}; reporting book-side gaps only"
                );
                let mut issues = Vec::new();
                for t in purchases.iter().filter(|t| t.gstin.is_none()) {
                    issues.push(self.missing_gstin_issue(t));
                }
                return Ok(issues);
            }
        };

        let mut books: BTreeMap<(String, String), &Transaction> = BTreeMap::new();
        for t in &purchases {
            if let (Some(inv), Some(gstin)) = (t.invoice_upper(), t.gstin.as_deref()) {
                books.insert((inv, gstin.trim().to_uppercase()), t);
            }
        }
        let mut statement: BTreeMap<(String, String), &Gstr2bEntry> = BTreeMap::new();
        for e in entries {
            if e.invoice_number.trim().is_empty() || e.gstin.trim().is_empty() {
                // Malformed row: skip rather than abort the reconciliation.
                log::warn!("skipping malformed GSTR-2B row (blank invoice or GSTIN)");
                continue;
            }
            statement.insert((e.invoice_upper(), e.gstin.trim().to_uppercase()), e);
        }

        let mut issues = Vec::new();

        for (key, t) in &books {
            match statement.get(key) {
                None => {
                    let tax = inclusive_tax(t.amount, self.cfg.gst_default_rate_pct);
                    let mut issue = Issue::new(
                        IssueType::InvoiceMissingInGstr2b,
                        Severity::High,
                        format!(
                            "Invoice {} (₹{:.2}) booked but not in GSTR-2B for {month}/{year}",
                            key.0, t.amount
                        ),
                    );
                    issue.implication =
                        Some("Supplier may not have filed; ITC claim is at risk".into());
                    issue.recommendation =
                        Some("Follow up with the supplier to file GSTR-1".into());
                    issue.vendor = t.vendor.clone();
                    issue.amount = Some(t.amount);
                    issue.potential_itc_loss = Some(tax);
                    issue.transaction_ids = vec![t.id.clone()];
                    issue.details = serde_json::json!({
                        "invoice_number": key.0,
                        "gstin": key.1,
                    });
                    issues.push(issue);
                }
                Some(e) => {
                    // The statement carries taxable value net of tax; the
                    // book amount is GST-inclusive, so compare against the
                    // statement's taxable value plus tax.
                    let statement_total = e.taxable_value + e.tax_amount;
                    let amount_tolerance = t.amount * self.cfg.amount_tolerance_pct / 100.0;
                    let expected_tax = inclusive_tax(t.amount, self.cfg.gst_default_rate_pct);
                    let amount_off = (t.amount - statement_total).abs() > amount_tolerance;
                    let tax_off =
                        (expected_tax - e.tax_amount).abs() > self.cfg.tax_tolerance_abs;
                    if amount_off || tax_off {
                        let mut issue = Issue::new(
                            IssueType::Gstr2bValueMismatch,
                            Severity::High,
                            format!(
                                "Invoice {}: books ₹{:.2} vs GSTR-2B ₹{:.2}",
                                key.0, t.amount, statement_total
                            ),
                        );
                        issue.implication =
                            Some("Value difference between books and the statement".into());
                        issue.recommendation = Some("Reconcile the invoice line items".into());
                        issue.vendor = t.vendor.clone();
                        issue.amount = Some(t.amount);
                        issue.transaction_ids = vec![t.id.clone()];
                        issue.details = serde_json::json!({
                            "invoice_number": key.0,
                            "book_amount": t.amount,
                            "gstr2b_taxable_value": e.taxable_value,
                            "gstr2b_total": statement_total,
                            "expected_tax": expected_tax,
                            "gstr2b_tax": e.tax_amount,
                            "amount_mismatch": amount_off,
                            "tax_mismatch": tax_off,
                        });
                        issues.push(issue);
                    }
                }
            }
        }

        for (key, e) in &statement {
            if !books.contains_key(key) {
                let mut issue = Issue::new(
                    IssueType::InvoiceMissingInBooks,
                    Severity::High,
                    format!(
                        "GSTR-2B invoice {} (₹{:.2}) has no matching book entry",
                        key.0, e.taxable_value
                    ),
                );
                issue.implication = Some("Purchase may be unrecorded in the books".into());
                issue.recommendation = Some("Book the purchase or flag the supplier entry".into());
                issue.vendor = e.vendor_name.clone();
                issue.amount = Some(e.taxable_value);
                issue.details = serde_json::json!({
                    "invoice_number": key.0,
                    "gstin": key.1,
                    "tax_amount": e.tax_amount,
                });
                issues.push(issue);
            }
        }

        Ok(issues)
    }

    /// Expected-rate check from the policy keyword tables, plus missing
    /// GSTIN on GST-applicable transactions.
    pub fn detect_incorrect_gst_rates(
        &self,
        client_id: &str,
        range: DateRange,
    ) -> EngineResult<Vec<Issue>> {
        let txns = self.store.gst_applicable_in_range(client_id, range)?;
        let mut issues = Vec::new();
        for t in &txns {
            if t.gstin.is_none() {
                issues.push(self.missing_gstin_issue(t));
                continue;
            }
            let text = match &t.ledger {
                Some(l) => format!("{} {}", t.description, l),
                None => t.description.clone(),
            };
            if let (Some(declared), Some(expected)) = (t.gst_rate, self.policy.expected_rate(&text))
            {
                if (declared - expected).abs() > self.cfg.gst_rate_tolerance_pct {
                    let mut issue = Issue::new(
                        IssueType::IncorrectGstRate,
                        Severity::Medium,
                        format!(
                            "GST charged at {declared}% but {expected}% expected for '{}'",
                            t.description
                        ),
                    );
                    issue.implication = Some("Wrong rate over/under-states tax liability".into());
                    issue.recommendation = Some("Verify the HSN/SAC classification".into());
                    issue.vendor = t.vendor.clone();
                    issue.amount = Some(t.amount);
                    issue.transaction_ids = vec![t.id.clone()];
                    issue.details = serde_json::json!({
                        "declared_rate": declared,
                        "expected_rate": expected,
                    });
                    issues.push(issue);
                }
            }
        }
        Ok(issues)
    }

    /// ITC discrepancy checks: missing GSTIN on purchases, blocked credits
    /// under Section 17(5), and probable reverse-charge supplies.
    pub fn detect_itc_discrepancies(
        &self,
        client_id: &str,
        range: DateRange,
    ) -> EngineResult<Vec<Issue>> {
        let purchases = self.store.gst_debits_in_range(client_id, range)?;
        let mut issues = Vec::new();

        for t in &purchases {
            if t.gstin.is_none() {
                issues.push(self.missing_gstin_issue(t));
            }

            if let Some(rule) = self.policy.blocked_credit(&t.description) {
                let blocked = inclusive_tax(t.amount, self.cfg.gst_default_rate_pct);
                let mut issue = Issue::new(
                    IssueType::BlockedCredit,
                    Severity::High,
                    format!(
                        "ITC of ₹{blocked:.2} on '{}' is blocked credit",
                        t.description
                    ),
                );
                issue.implication = Some(rule.reason.clone());
                issue.recommendation = Some("Reverse the credit in the next GSTR-3B".into());
                issue.law_reference = Some("CGST Act Section 17(5)".into());
                issue.vendor = t.vendor.clone();
                issue.amount = Some(t.amount);
                issue.potential_itc_loss = Some(blocked);
                issue.transaction_ids = vec![t.id.clone()];
                issue.details = serde_json::json!({ "matched_keyword": rule.keyword });
                issues.push(issue);
            }

            if t.gstin.is_none() && self.policy.is_rcm_candidate(&t.description) {
                let mut issue = Issue::new(
                    IssueType::RcmApplicable,
                    Severity::Medium,
                    format!(
                        "'{}' from an unregistered supplier may attract reverse charge",
                        t.description
                    ),
                );
                issue.implication =
                    Some("Recipient is liable to pay GST under reverse charge".into());
                issue.recommendation = Some("Self-invoice and discharge RCM liability".into());
                issue.law_reference = Some("CGST Act Section 9(3)/9(4)".into());
                issue.vendor = t.vendor.clone();
                issue.amount = Some(t.amount);
                issue.transaction_ids = vec![t.id.clone()];
                issues.push(issue);
            }
        }
        Ok(issues)
    }

    fn missing_gstin_issue(&self, t: &Transaction) -> Issue {
        let tax = inclusive_tax(t.amount, self.cfg.gst_default_rate_pct);
        let mut issue = Issue::new(
            IssueType::MissingGstin,
            Severity::High,
            format!(
                "GST-applicable transaction of ₹{:.2} has no GSTIN",
                t.amount
            ),
        );
        issue.implication = Some("ITC cannot be claimed without a supplier GSTIN".into());
        issue.recommendation = Some("Obtain the supplier's GSTIN and a tax invoice".into());
        issue.vendor = t.vendor.clone();
        issue.amount = Some(t.amount);
        issue.potential_itc_loss = Some(tax);
        issue.transaction_ids = vec![t.id.clone()];
        issue
    }
}

impl Detector for GstMismatchDetector<'_> {
    fn name(&self) -> &'static str {
        "gst_mismatches"
    }

    fn run_full_scan(&self, client_id: &str, range: DateRange) -> ScanResult {
        let mut result = ScanResult::new(client_id, range);
        // Reconcile the supplied statement period, else the month the
        // window ends in.
        let (month, year) = self
            .gstr2b_period
            .unwrap_or((range.to.month(), range.to.year()));
        run_check(&mut result, self.name(), "gstr2b_reconciliation", || {
            self.detect_gstr2b_mismatches(client_id, month, year)
        });
        run_check(&mut result, self.name(), "incorrect_gst_rates", || {
            self.detect_incorrect_gst_rates(client_id, range)
        });
        run_check(&mut result, self.name(), "itc_discrepancies", || {
            self.detect_itc_discrepancies(client_id, range)
        });
        result
    }
}
