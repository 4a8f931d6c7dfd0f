//! Red-flag detection engine for a CA practice ledger.
//!
//! Six detectors scan a client's transactions in SQLite for compliance
//! risks: duplicate payments, GST mismatches, missing invoices, suspicious
//! vendors, cash limit breaches, and statistical anomalies. Each detector
//! returns a [`issue::ScanResult`]; [`scan::ScanOrchestrator`] runs all six
//! and folds them into one report.
//!
//! RULE: Only `store.rs` talks to the database.

pub mod cash_transaction_checker;
pub mod config;
pub mod detector;
pub mod duplicate_detector;
pub mod error;
pub mod gst_mismatch_detector;
pub mod issue;
pub mod missing_invoice_detector;
pub mod model;
pub mod pattern_analysis;
pub mod scan;
pub mod stats;
pub mod store;
pub mod suspicious_vendor_detector;
pub mod types;

pub use cash_transaction_checker::CashTransactionChecker;
pub use config::{DetectorConfig, TaxPolicy};
pub use detector::Detector;
pub use duplicate_detector::DuplicateDetector;
pub use error::{EngineError, EngineResult};
pub use gst_mismatch_detector::GstMismatchDetector;
pub use issue::{Issue, IssueType, ScanResult, ScanSummary, Severity};
pub use missing_invoice_detector::MissingInvoiceDetector;
pub use model::{Document, Gstr2bEntry, Transaction, TxnType};
pub use pattern_analysis::{PatternAnalysisEngine, TrendAnalysis, VendorPattern};
pub use scan::{FullScanReport, ScanOrchestrator};
pub use store::LedgerStore;
pub use suspicious_vendor_detector::SuspiciousVendorDetector;
pub use types::{ClientId, DateRange, TxnId};
