//! Ledger row types. Read-only to the engine: every detector treats a
//! fetched snapshot as immutable for the duration of the scan.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{ClientId, TxnId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxnType {
    Credit,
    Debit,
}

impl TxnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxnType::Credit => "credit",
            TxnType::Debit => "debit",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxnId,
    pub client_id: ClientId,
    pub date: NaiveDate,
    /// Always non-negative; direction is carried by `txn_type`.
    pub amount: f64,
    pub txn_type: TxnType,
    pub vendor: Option<String>,
    pub description: String,
    pub ledger: Option<String>,
    pub invoice_number: Option<String>,
    pub gstin: Option<String>,
    pub mode: Option<String>,
    pub gst_applicable: bool,
    /// Declared GST rate in percent, when the books carry one.
    pub gst_rate: Option<f64>,
}

impl Transaction {
    /// Vendor name for grouping; blank/absent vendors collapse to one bucket.
    pub fn vendor_or_unknown(&self) -> &str {
        match self.vendor.as_deref() {
            Some(v) if !v.trim().is_empty() => v,
            _ => "Unknown",
        }
    }

    pub fn is_cash(&self) -> bool {
        self.mode
            .as_deref()
            .map(|m| m.trim().eq_ignore_ascii_case("cash"))
            .unwrap_or(false)
    }

    /// Normalized invoice number for exact matching, if present.
    pub fn invoice_upper(&self) -> Option<String> {
        self.invoice_number
            .as_deref()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
    }

    pub fn has_invoice(&self) -> bool {
        self.invoice_upper().is_some()
    }
}

/// An uploaded document. Only the metadata blob matters to the engine:
/// it may carry `invoice_number` or `invoice_no`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub client_id: ClientId,
    pub file_type: String,
    pub folder_category: String,
    pub metadata: serde_json::Value,
}

impl Document {
    /// Normalized invoice number recorded in the metadata, if any.
    pub fn invoice_number(&self) -> Option<String> {
        for key in ["invoice_number", "invoice_no"] {
            if let Some(v) = self.metadata.get(key).and_then(|v| v.as_str()) {
                let v = v.trim().to_uppercase();
                if !v.is_empty() {
                    return Some(v);
                }
            }
        }
        None
    }
}

/// One purchase-side line from an externally supplied GSTR-2B statement.
/// The engine never fetches these itself; the caller injects the dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gstr2bEntry {
    pub gstin: String,
    pub invoice_number: String,
    pub taxable_value: f64,
    pub tax_amount: f64,
    #[serde(default)]
    pub vendor_name: Option<String>,
    #[serde(default)]
    pub invoice_date: Option<NaiveDate>,
}

impl Gstr2bEntry {
    pub fn invoice_upper(&self) -> String {
        self.invoice_number.trim().to_uppercase()
    }
}
