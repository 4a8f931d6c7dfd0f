//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use chrono::NaiveDate;
use redflag_core::{
    model::{Document, Transaction, TxnType},
    types::DateRange,
    LedgerStore,
};

pub fn store() -> LedgerStore {
    let store = LedgerStore::in_memory().unwrap();
    store.migrate().unwrap();
    store
}

pub fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn range(from: &str, to: &str) -> DateRange {
    DateRange::new(d(from), d(to))
}

/// A plain bank-mode debit with an invoice number derived from the id.
/// Tests mutate the fields they care about.
pub fn debit(client: &str, id: &str, date: &str, amount: f64, vendor: &str) -> Transaction {
    Transaction {
        id: id.to_string(),
        client_id: client.to_string(),
        date: d(date),
        amount,
        txn_type: TxnType::Debit,
        vendor: Some(vendor.to_string()),
        description: "Purchase".to_string(),
        ledger: None,
        invoice_number: Some(format!("INV-{id}")),
        gstin: None,
        mode: Some("bank".to_string()),
        gst_applicable: false,
        gst_rate: None,
    }
}

pub fn cash_debit(client: &str, id: &str, date: &str, amount: f64, vendor: &str) -> Transaction {
    let mut t = debit(client, id, date, amount, vendor);
    t.mode = Some("cash".to_string());
    t
}

pub fn gst_debit(
    client: &str,
    id: &str,
    date: &str,
    amount: f64,
    vendor: &str,
    gstin: Option<&str>,
) -> Transaction {
    let mut t = debit(client, id, date, amount, vendor);
    t.gst_applicable = true;
    t.gstin = gstin.map(str::to_string);
    t
}

pub fn invoice_doc(client: &str, id: &str, invoice_number: &str) -> Document {
    Document {
        id: id.to_string(),
        client_id: client.to_string(),
        file_type: "pdf".to_string(),
        folder_category: "invoices".to_string(),
        metadata: serde_json::json!({ "invoice_number": invoice_number }),
    }
}
