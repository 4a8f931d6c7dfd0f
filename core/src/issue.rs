//! The common output contract every detector honors.
//!
//! Issues are ephemeral computation outputs. The engine never persists
//! them; the caller (API layer, report store, agent tool) decides that.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::types::{ClientId, DateRange, TxnId};

/// Finding severity, ordered from least to most serious.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// Stable tag for each finding class. Serialized as its snake_case tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueType {
    // duplicates
    DuplicateInvoice,
    RepeatedTransaction,
    DuplicateVendorBill,
    NearDuplicateInvoice,
    // GST reconciliation
    InvoiceMissingInGstr2b,
    InvoiceMissingInBooks,
    Gstr2bValueMismatch,
    MissingGstin,
    IncorrectGstRate,
    BlockedCredit,
    RcmApplicable,
    // missing invoices
    MissingInvoiceNumber,
    MissingInvoiceDocument,
    GstTransactionMissingInvoice,
    VendorMissingInvoices,
    // suspicious vendors
    HighRiskVendor,
    SharedGstin,
    MultipleGstins,
    InvalidGstinFormat,
    BlockedGstin,
    UnregisteredVendor,
    // cash checks
    LargeCashTransaction,
    CashStructuring,
    LargeCashWithdrawal,
    FrequentCashWithdrawals,
    CashViolationSingle,
    CashViolationAggregate,
    // pattern analysis
    AmountDeviation,
    EarlyPayment,
    LatePayment,
    NewVendor,
    MissingExpectedTransaction,
    StatisticalOutlier,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::DuplicateInvoice => "duplicate_invoice",
            IssueType::RepeatedTransaction => "repeated_transaction",
            IssueType::DuplicateVendorBill => "duplicate_vendor_bill",
            IssueType::NearDuplicateInvoice => "near_duplicate_invoice",
            IssueType::InvoiceMissingInGstr2b => "invoice_missing_in_gstr2b",
            IssueType::InvoiceMissingInBooks => "invoice_missing_in_books",
            IssueType::Gstr2bValueMismatch => "gstr2b_value_mismatch",
            IssueType::MissingGstin => "missing_gstin",
            IssueType::IncorrectGstRate => "incorrect_gst_rate",
            IssueType::BlockedCredit => "blocked_credit",
            IssueType::RcmApplicable => "rcm_applicable",
            IssueType::MissingInvoiceNumber => "missing_invoice_number",
            IssueType::MissingInvoiceDocument => "missing_invoice_document",
            IssueType::GstTransactionMissingInvoice => "gst_transaction_missing_invoice",
            IssueType::VendorMissingInvoices => "vendor_missing_invoices",
            IssueType::HighRiskVendor => "high_risk_vendor",
            IssueType::SharedGstin => "shared_gstin",
            IssueType::MultipleGstins => "multiple_gstins",
            IssueType::InvalidGstinFormat => "invalid_gstin_format",
            IssueType::BlockedGstin => "blocked_gstin",
            IssueType::UnregisteredVendor => "unregistered_vendor",
            IssueType::LargeCashTransaction => "large_cash_transaction",
            IssueType::CashStructuring => "cash_structuring",
            IssueType::LargeCashWithdrawal => "large_cash_withdrawal",
            IssueType::FrequentCashWithdrawals => "frequent_cash_withdrawals",
            IssueType::CashViolationSingle => "40a3_single_transaction",
            IssueType::CashViolationAggregate => "40a3_aggregate_same_day",
            IssueType::AmountDeviation => "amount_deviation",
            IssueType::EarlyPayment => "early_payment",
            IssueType::LatePayment => "late_payment",
            IssueType::NewVendor => "new_vendor",
            IssueType::MissingExpectedTransaction => "missing_expected_transaction",
            IssueType::StatisticalOutlier => "statistical_outlier",
        }
    }
}

impl Serialize for IssueType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A single finding.
#[derive(Debug, Clone, Serialize)]
pub struct Issue {
    pub issue_type: IssueType,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implication: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub law_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub potential_itc_loss: Option<f64>,
    /// Evidence set: ids of the transactions behind the finding.
    pub transaction_ids: Vec<TxnId>,
    /// Detector-specific evidence (duplicate counts, z-scores, invoice lists).
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl Issue {
    pub fn new(issue_type: IssueType, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            issue_type,
            severity,
            message: message.into(),
            implication: None,
            recommendation: None,
            law_reference: None,
            vendor: None,
            amount: None,
            total_amount: None,
            potential_itc_loss: None,
            transaction_ids: Vec::new(),
            details: serde_json::Value::Null,
        }
    }
}

/// One named bucket of findings inside a detector's result.
#[derive(Debug, Clone, Serialize, Default)]
pub struct Category {
    pub count: usize,
    pub items: Vec<Issue>,
}

impl Category {
    pub fn from_issues(items: Vec<Issue>) -> Self {
        Self {
            count: items.len(),
            items,
        }
    }
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ScanSummary {
    pub total_issues: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub total_potential_loss: f64,
    pub total_potential_itc_loss: f64,
}

impl ScanSummary {
    pub fn add(&mut self, issue: &Issue) {
        self.total_issues += 1;
        match issue.severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
        // Double counting across categories is accepted: the totals are a
        // worst-case exposure figure, not a deduplicated sum.
        if let Some(t) = issue.total_amount.or(issue.amount) {
            self.total_potential_loss += t;
        }
        if let Some(l) = issue.potential_itc_loss {
            self.total_potential_itc_loss += l;
        }
    }

    pub fn merge(&mut self, other: &ScanSummary) {
        self.total_issues += other.total_issues;
        self.critical += other.critical;
        self.high += other.high;
        self.medium += other.medium;
        self.low += other.low;
        self.total_potential_loss += other.total_potential_loss;
        self.total_potential_itc_loss += other.total_potential_itc_loss;
    }
}

/// One detector invocation's aggregate. Always well-formed: a failed
/// sub-check contributes an `errors` entry and an empty category instead
/// of aborting the scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub client_id: ClientId,
    pub scan_id: Uuid,
    pub scan_date: DateTime<Utc>,
    pub date_range: DateRange,
    pub results: BTreeMap<String, Category>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,
    pub summary: ScanSummary,
    /// Detector-specific extras (learned patterns, trend data).
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub extra: serde_json::Value,
}

impl ScanResult {
    pub fn new(client_id: &str, date_range: DateRange) -> Self {
        Self {
            client_id: client_id.to_string(),
            scan_id: Uuid::new_v4(),
            scan_date: Utc::now(),
            date_range,
            results: BTreeMap::new(),
            errors: BTreeMap::new(),
            summary: ScanSummary::default(),
            extra: serde_json::Value::Null,
        }
    }

    pub fn add_category(&mut self, name: &str, issues: Vec<Issue>) {
        for issue in &issues {
            self.summary.add(issue);
        }
        self.results
            .insert(name.to_string(), Category::from_issues(issues));
    }

    /// Record a failed sub-check: the category stays renderable (empty) and
    /// the failure is surfaced under `errors`.
    pub fn add_error(&mut self, name: &str, err: impl std::fmt::Display) {
        self.results.insert(name.to_string(), Category::default());
        self.errors.insert(name.to_string(), err.to_string());
    }

    /// All findings across categories, for callers that want a flat list.
    pub fn all_issues(&self) -> impl Iterator<Item = &Issue> {
        self.results.values().flat_map(|c| c.items.iter())
    }
}
