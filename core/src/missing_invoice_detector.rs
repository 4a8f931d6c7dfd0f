//! Missing invoice detection.
//!
//! Expenses without an invoice number, invoice numbers without a matching
//! uploaded document, GST purchases with no invoice (ITC at risk), and a
//! per-vendor rollup.

use std::collections::{BTreeMap, HashSet};

use crate::{
    config::DetectorConfig,
    detector::{run_check, Detector},
    error::EngineResult,
    gst_mismatch_detector::inclusive_tax,
    issue::{Issue, IssueType, ScanResult, Severity},
    model::Transaction,
    store::LedgerStore,
    types::DateRange,
};

pub struct MissingInvoiceDetector<'a> {
    store: &'a LedgerStore,
    cfg: DetectorConfig,
}

impl<'a> MissingInvoiceDetector<'a> {
    pub fn new(store: &'a LedgerStore, cfg: DetectorConfig) -> Self {
        Self { store, cfg }
    }

    /// GST applicability outranks the amount ladder: a missing invoice on a
    /// GST transaction is high severity no matter how small.
    fn ladder(&self, t: &Transaction) -> Severity {
        if t.gst_applicable {
            Severity::High
        } else if t.amount >= self.cfg.high_value_threshold {
            Severity::High
        } else if t.amount >= self.cfg.medium_value_threshold {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Normalized invoice numbers found across all non-deleted documents.
    fn document_invoice_set(&self, client_id: &str) -> EngineResult<HashSet<String>> {
        let docs = self.store.documents_for_client(client_id)?;
        Ok(docs.iter().filter_map(|d| d.invoice_number()).collect())
    }

    /// Expense entries with no invoice number at all.
    pub fn detect_missing_invoice_numbers(
        &self,
        client_id: &str,
        range: DateRange,
    ) -> EngineResult<Vec<Issue>> {
        let txns = self.store.debit_transactions_in_range(client_id, range)?;
        let mut issues = Vec::new();
        for t in txns.iter().filter(|t| !t.has_invoice()) {
            let mut issue = Issue::new(
                IssueType::MissingInvoiceNumber,
                self.ladder(t),
                format!(
                    "₹{:.2} paid to {} on {} with no invoice number",
                    t.amount,
                    t.vendor_or_unknown(),
                    t.date
                ),
            );
            issue.implication = Some("Expense may be disallowed without supporting invoice".into());
            issue.recommendation = Some("Obtain and record the invoice".into());
            issue.vendor = t.vendor.clone();
            issue.amount = Some(t.amount);
            issue.transaction_ids = vec![t.id.clone()];
            issues.push(issue);
        }
        Ok(issues)
    }

    /// Invoice numbers in the books with no uploaded document carrying a
    /// matching number.
    pub fn detect_unmatched_documents(
        &self,
        client_id: &str,
        range: DateRange,
    ) -> EngineResult<Vec<Issue>> {
        let doc_invoices = self.document_invoice_set(client_id)?;
        let txns = self.store.debit_transactions_in_range(client_id, range)?;
        let mut issues = Vec::new();
        for t in &txns {
            let inv = match t.invoice_upper() {
                Some(inv) => inv,
                None => continue,
            };
            if doc_invoices.contains(&inv) {
                continue;
            }
            let mut issue = Issue::new(
                IssueType::MissingInvoiceDocument,
                self.ladder(t),
                format!(
                    "Invoice {inv} ({}, ₹{:.2}) has no uploaded document",
                    t.vendor_or_unknown(),
                    t.amount
                ),
            );
            issue.implication = Some("Invoice copy unavailable for audit support".into());
            issue.recommendation = Some("Upload the invoice against this entry".into());
            issue.vendor = t.vendor.clone();
            issue.amount = Some(t.amount);
            issue.transaction_ids = vec![t.id.clone()];
            issue.details = serde_json::json!({ "invoice_number": inv });
            issues.push(issue);
        }
        Ok(issues)
    }

    /// GST purchases missing an invoice: the ITC on them is not claimable.
    pub fn detect_gst_missing_invoices(
        &self,
        client_id: &str,
        range: DateRange,
    ) -> EngineResult<Vec<Issue>> {
        let txns = self.store.gst_debits_in_range(client_id, range)?;
        let mut issues = Vec::new();
        for t in txns.iter().filter(|t| !t.has_invoice()) {
            let loss = inclusive_tax(t.amount, self.cfg.gst_default_rate_pct);
            let mut issue = Issue::new(
                IssueType::GstTransactionMissingInvoice,
                Severity::High,
                format!(
                    "GST purchase of ₹{:.2} from {} has no tax invoice",
                    t.amount,
                    t.vendor_or_unknown()
                ),
            );
            issue.implication = Some("ITC is not claimable without a tax invoice".into());
            issue.recommendation = Some("Obtain the tax invoice before the GSTR-3B cutoff".into());
            issue.vendor = t.vendor.clone();
            issue.amount = Some(t.amount);
            issue.potential_itc_loss = Some(loss);
            issue.transaction_ids = vec![t.id.clone()];
            issues.push(issue);
        }
        Ok(issues)
    }

    /// Per-vendor rollup of entries lacking an invoice number or a matching
    /// document. Optionally restricted to one vendor.
    pub fn detect_vendor_aggregates(
        &self,
        client_id: &str,
        range: DateRange,
        vendor_filter: Option<&str>,
    ) -> EngineResult<Vec<Issue>> {
        let doc_invoices = self.document_invoice_set(client_id)?;
        let txns = self.store.debit_transactions_in_range(client_id, range)?;

        let mut by_vendor: BTreeMap<String, Vec<&Transaction>> = BTreeMap::new();
        for t in &txns {
            let vendor = t.vendor_or_unknown();
            if let Some(f) = vendor_filter {
                if !vendor.eq_ignore_ascii_case(f) {
                    continue;
                }
            }
            let missing = match t.invoice_upper() {
                None => true,
                Some(inv) => !doc_invoices.contains(&inv),
            };
            if missing {
                by_vendor.entry(vendor.to_string()).or_default().push(t);
            }
        }

        let mut issues = Vec::new();
        for (vendor, group) in by_vendor {
            let total: f64 = group.iter().map(|t| t.amount).sum();
            let severity = if group.len() >= self.cfg.vendor_missing_high_count
                || total > self.cfg.vendor_missing_high_total
            {
                Severity::High
            } else if group.len() >= self.cfg.vendor_missing_medium_count
                || total > self.cfg.vendor_missing_medium_total
            {
                Severity::Medium
            } else {
                Severity::Low
            };
            let mut issue = Issue::new(
                IssueType::VendorMissingInvoices,
                severity,
                format!(
                    "{vendor}: {} transaction(s) totaling ₹{total:.2} without invoice support",
                    group.len()
                ),
            );
            issue.implication = Some("Recurring documentation gap with this vendor".into());
            issue.recommendation = Some("Request pending invoices from the vendor".into());
            issue.vendor = Some(vendor);
            issue.total_amount = Some(total);
            issue.transaction_ids = group.iter().map(|t| t.id.clone()).collect();
            issue.details = serde_json::json!({ "missing_count": group.len() });
            issues.push(issue);
        }
        Ok(issues)
    }
}

impl Detector for MissingInvoiceDetector<'_> {
    fn name(&self) -> &'static str {
        "missing_invoices"
    }

    fn run_full_scan(&self, client_id: &str, range: DateRange) -> ScanResult {
        let mut result = ScanResult::new(client_id, range);
        run_check(&mut result, self.name(), "missing_invoice_numbers", || {
            self.detect_missing_invoice_numbers(client_id, range)
        });
        run_check(&mut result, self.name(), "unmatched_documents", || {
            self.detect_unmatched_documents(client_id, range)
        });
        run_check(&mut result, self.name(), "gst_missing_invoices", || {
            self.detect_gst_missing_invoices(client_id, range)
        });
        run_check(&mut result, self.name(), "vendor_aggregates", || {
            self.detect_vendor_aggregates(client_id, range, None)
        });
        result
    }
}
