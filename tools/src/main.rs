//! scan-runner: headless red-flag scan over a ledger database.
//!
//! Usage:
//!   scan-runner --db ledger.db --client client-001 --from 2024-01-01 --to 2024-03-31
//!   scan-runner --demo --client demo --pretty
//!   scan-runner --db ledger.db --client client-001 --gstr2b 2b.json --month 3 --year 2024

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Utc};
use redflag_core::{
    model::{Gstr2bEntry, Transaction, TxnType},
    DetectorConfig, LedgerStore, ScanOrchestrator, TaxPolicy,
};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = str_arg(&args, "--db").unwrap_or(":memory:");
    let client = str_arg(&args, "--client").unwrap_or("demo");
    let demo = args.iter().any(|a| a == "--demo");
    let pretty = args.iter().any(|a| a == "--pretty");

    let cfg = match str_arg(&args, "--config") {
        Some(path) => DetectorConfig::load(path)?,
        None => DetectorConfig::default(),
    };
    let policy = match str_arg(&args, "--policy") {
        Some(path) => TaxPolicy::load(path)?,
        None => TaxPolicy::builtin(),
    };

    let store = LedgerStore::open(db)?;
    store.migrate()?;
    if demo {
        seed_demo(&store, client)?;
    }

    let mut orch = ScanOrchestrator::new(cfg, policy);

    if let Some(path) = str_arg(&args, "--blocked-gstins") {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let gstins: Vec<String> = content.lines().map(str::to_string).collect();
        orch = orch.with_blocked_gstins(gstins);
    }

    if let Some(path) = str_arg(&args, "--gstr2b") {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let entries: Vec<Gstr2bEntry> =
            serde_json::from_str(&content).context("parsing GSTR-2B JSON")?;
        let today = Utc::now().date_naive();
        let month = parse_arg(&args, "--month", today.month());
        let year = parse_arg(&args, "--year", today.year());
        orch = orch.with_gstr2b(entries, month, year);
    }

    let as_of = match str_arg(&args, "--as-of") {
        Some(s) => parse_date(s)?,
        None => Utc::now().date_naive(),
    };
    let default = orch.default_range(as_of);
    let from = match str_arg(&args, "--from") {
        Some(s) => parse_date(s)?,
        None => default.from,
    };
    let to = match str_arg(&args, "--to") {
        Some(s) => parse_date(s)?,
        None => default.to,
    };
    let range = redflag_core::DateRange::new(from, to);

    let report = orch.run(&store, client, range);

    let json = if pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");
    Ok(())
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| anyhow::anyhow!("bad date '{s}': {e}"))
}

fn str_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

/// A small ledger with one of everything a scan can flag.
fn seed_demo(store: &LedgerStore, client: &str) -> Result<()> {
    let txn = |id: &str, date: &str, amount: f64, vendor: &str| -> Result<Transaction> {
        Ok(Transaction {
            id: id.to_string(),
            client_id: client.to_string(),
            date: parse_date(date)?,
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
        })
    };

    // Duplicate invoice pair.
    let mut a = txn("demo-1", "2024-03-01", 5_000.0, "Acme Traders")?;
    a.invoice_number = Some("INV-100".into());
    let mut b = txn("demo-2", "2024-03-08", 5_000.0, "Acme Traders")?;
    b.invoice_number = Some("INV-100".into());

    // GST purchase with no GSTIN and no invoice.
    let mut c = txn("demo-3", "2024-03-10", 8_000.0, "Beta Supplies")?;
    c.gst_applicable = true;
    c.invoice_number = None;

    // Cash payment over the 40A(3) limit.
    let mut d = txn("demo-4", "2024-03-12", 15_000.0, "Gamma Co")?;
    d.mode = Some("cash".into());

    // Same-day cash split just under the limit.
    let mut e = txn("demo-5", "2024-03-15", 9_200.0, "Gamma Co")?;
    e.mode = Some("cash".into());
    let mut f = txn("demo-6", "2024-03-15", 9_400.0, "Gamma Co")?;
    f.mode = Some("cash".into());

    for t in [&a, &b, &c, &d, &e, &f] {
        store.insert_transaction(t)?;
    }
    log::info!("seeded demo ledger for client {client}");
    Ok(())
}
