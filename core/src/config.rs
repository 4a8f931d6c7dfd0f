//! Engine configuration.
//!
//! Every threshold the detectors use lives here with an explicit default,
//! so scans are deterministic and tunable per client or jurisdiction.
//! Keyword classification tables (expected GST rates, blocked credits, RCM)
//! are policy data, not code: `TaxPolicy` ships a built-in table and can be
//! reloaded from JSON without touching the detectors.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    // ── Cash limits (Section 40A(3)) ──────────────────────────
    /// Cash payment limit per vendor per day.
    pub cash_limit: f64,
    /// Threshold above which a cash transaction is high severity.
    pub large_cash_threshold: f64,
    /// Lower edge of the structuring band, as a fraction of `cash_limit`.
    pub structuring_band_factor: f64,
    /// Cash debit count in the trailing window that flags frequency.
    pub frequent_cash_count: usize,
    pub frequent_cash_window_days: i64,

    // ── Duplicate detection ───────────────────────────────────
    /// Relative amount tolerance for near-duplicate bills (percent).
    pub amount_tolerance_pct: f64,
    /// Absolute amount tolerance in rupees; either bound groups.
    pub amount_tolerance_abs: f64,
    /// Temporal window for vendor-bill grouping.
    pub date_window_days: i64,
    /// Similarity at or above this merges invoice numbers into one group.
    pub fuzzy_threshold: f64,
    /// Duplicate group total above this escalates to high severity.
    pub duplicate_high_total: f64,

    // ── GST reconciliation ────────────────────────────────────
    /// Flat rate assumed when reconstructing tax from a book amount (percent).
    pub gst_default_rate_pct: f64,
    /// Allowed deviation between declared and expected rate (percentage points).
    pub gst_rate_tolerance_pct: f64,
    /// Absolute tax tolerance for GSTR-2B comparison.
    pub tax_tolerance_abs: f64,
    /// Turnover proxy for mandatory GST registration.
    pub gst_registration_threshold: f64,
    /// Transaction count that alone flags an unregistered vendor.
    pub unregistered_txn_count: usize,

    // ── Missing invoices ──────────────────────────────────────
    /// Amount at or above which a missing invoice is high severity.
    pub high_value_threshold: f64,
    /// Amount at or above which a missing invoice is medium severity.
    pub medium_value_threshold: f64,
    pub vendor_missing_high_count: usize,
    pub vendor_missing_high_total: f64,
    pub vendor_missing_medium_count: usize,
    pub vendor_missing_medium_total: f64,

    // ── Pattern analysis ──────────────────────────────────────
    /// Amount clustering tolerance for pattern learning (percent).
    pub cluster_tolerance_pct: f64,
    pub z_score_threshold: f64,
    pub extreme_z_score_threshold: f64,
    /// Coefficient of variation below this marks a vendor "consistent".
    pub consistency_cv_threshold: f64,
    pub monthly_gap_min_days: f64,
    pub monthly_gap_max_days: f64,
    /// Day slack for early/late/missing payment checks.
    pub date_tolerance_days: i64,
    pub min_pattern_occurrences: usize,
    /// Minimum population for global outlier detection.
    pub min_population_for_outliers: usize,
    pub pattern_lookback_days: i64,
    pub recent_window_days: i64,

    // ── Orchestration ─────────────────────────────────────────
    pub default_scan_window_days: i64,
    /// Soft per-detector budget; overruns are logged and annotated, never killed.
    pub detector_time_budget_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            cash_limit: 10_000.0,
            large_cash_threshold: 50_000.0,
            structuring_band_factor: 0.9,
            frequent_cash_count: 5,
            frequent_cash_window_days: 7,
            amount_tolerance_pct: 1.0,
            amount_tolerance_abs: 100.0,
            date_window_days: 7,
            fuzzy_threshold: 0.85,
            duplicate_high_total: 100_000.0,
            gst_default_rate_pct: 18.0,
            gst_rate_tolerance_pct: 1.0,
            tax_tolerance_abs: 1.0,
            gst_registration_threshold: 200_000.0,
            unregistered_txn_count: 10,
            high_value_threshold: 10_000.0,
            medium_value_threshold: 5_000.0,
            vendor_missing_high_count: 5,
            vendor_missing_high_total: 100_000.0,
            vendor_missing_medium_count: 3,
            vendor_missing_medium_total: 50_000.0,
            cluster_tolerance_pct: 10.0,
            z_score_threshold: 2.5,
            extreme_z_score_threshold: 3.0,
            consistency_cv_threshold: 0.2,
            monthly_gap_min_days: 25.0,
            monthly_gap_max_days: 35.0,
            date_tolerance_days: 5,
            min_pattern_occurrences: 3,
            min_population_for_outliers: 10,
            pattern_lookback_days: 365,
            recent_window_days: 30,
            default_scan_window_days: 90,
            detector_time_budget_ms: 5_000,
        }
    }
}

impl DetectorConfig {
    /// Load overrides from a JSON file; absent keys keep their defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        Ok(serde_json::from_str(&content)?)
    }
}

// ── Tax policy tables ─────────────────────────────────────────

/// Expected GST rate for descriptions matching any of the keywords.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateRule {
    pub keywords: Vec<String>,
    pub rate_pct: f64,
}

/// ITC blocked under Section 17(5) when the description matches the keyword.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedCreditRule {
    pub keyword: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxPolicy {
    pub version: String,
    pub expected_rates: Vec<RateRule>,
    pub blocked_credits: Vec<BlockedCreditRule>,
    pub rcm_keywords: Vec<String>,
}

impl TaxPolicy {
    /// The built-in keyword tables. Inherently approximate heuristics;
    /// ship updated tables as JSON rather than editing detector code.
    pub fn builtin() -> Self {
        Self {
            version: "2024.1".into(),
            expected_rates: vec![
                RateRule {
                    keywords: vec![
                        "food".into(),
                        "grocery".into(),
                        "restaurant".into(),
                        "medicine".into(),
                        "pharmacy".into(),
                    ],
                    rate_pct: 5.0,
                },
                RateRule {
                    keywords: vec![
                        "service".into(),
                        "consulting".into(),
                        "professional".into(),
                        "software".into(),
                        "rent".into(),
                    ],
                    rate_pct: 18.0,
                },
                RateRule {
                    keywords: vec![
                        "luxury".into(),
                        "tobacco".into(),
                        "aerated".into(),
                        "automobile".into(),
                    ],
                    rate_pct: 28.0,
                },
            ],
            blocked_credits: vec![
                BlockedCreditRule {
                    keyword: "personal".into(),
                    reason: "Personal consumption — ITC blocked u/s 17(5)(g)".into(),
                },
                BlockedCreditRule {
                    keyword: "entertainment".into(),
                    reason: "Entertainment expenses — ITC blocked u/s 17(5)(b)".into(),
                },
                BlockedCreditRule {
                    keyword: "club".into(),
                    reason: "Club membership — ITC blocked u/s 17(5)(b)".into(),
                },
                BlockedCreditRule {
                    keyword: "health insurance".into(),
                    reason: "Health insurance — ITC blocked u/s 17(5)(b)".into(),
                },
                BlockedCreditRule {
                    keyword: "motor vehicle".into(),
                    reason: "Motor vehicle — ITC blocked u/s 17(5)(a)".into(),
                },
                BlockedCreditRule {
                    keyword: "exempt".into(),
                    reason: "Used for exempt supplies — ITC blocked u/s 17(2)".into(),
                },
            ],
            rcm_keywords: vec![
                "legal".into(),
                "advocate".into(),
                "goods transport".into(),
                "sponsorship".into(),
                "security service".into(),
                "import".into(),
            ],
        }
    }

    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Expected rate for a description, if any keyword table matches.
    pub fn expected_rate(&self, description: &str) -> Option<f64> {
        let desc = description.to_lowercase();
        self.expected_rates
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| desc.contains(k.as_str())))
            .map(|rule| rule.rate_pct)
    }

    /// Blocked-credit rule matching a description, if any.
    pub fn blocked_credit(&self, description: &str) -> Option<&BlockedCreditRule> {
        let desc = description.to_lowercase();
        self.blocked_credits
            .iter()
            .find(|rule| desc.contains(rule.keyword.as_str()))
    }

    pub fn is_rcm_candidate(&self, description: &str) -> bool {
        let desc = description.to_lowercase();
        self.rcm_keywords.iter().any(|k| desc.contains(k.as_str()))
    }
}
