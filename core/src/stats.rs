//! Detector primitives: small pure helpers shared by all detectors.

use std::collections::HashSet;

use chrono::NaiveDate;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Sample standard deviation (n-1 denominator). 0 for fewer than two values.
pub fn sample_stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Z-score of `value` against a population. 0 when the population has no spread.
pub fn z_score(value: f64, population: &[f64]) -> f64 {
    let sd = sample_stdev(population);
    if sd == 0.0 {
        return 0.0;
    }
    (value - mean(population)) / sd
}

/// Signed day delta `b - a`.
pub fn days_between(a: NaiveDate, b: NaiveDate) -> i64 {
    (b - a).num_days()
}

/// Normalized string similarity in [0, 1].
///
/// Exact match 1.0; substring containment 0.9; otherwise the count of
/// shared distinct characters over the longer length. A deliberate
/// approximation: cheap and order-insensitive, not an edit distance.
pub fn string_similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_uppercase();
    let b = b.trim().to_uppercase();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    if a.contains(&b) || b.contains(&a) {
        return 0.9;
    }
    let set_a: HashSet<char> = a.chars().collect();
    let set_b: HashSet<char> = b.chars().collect();
    let shared = set_a.intersection(&set_b).count();
    shared as f64 / a.chars().count().max(b.chars().count()) as f64
}

/// Syntactic GSTIN check: 15 alphanumeric characters with a state-code
/// prefix in 01..=37. No registry lookup.
pub fn gstin_format_valid(gstin: &str) -> bool {
    let gstin = gstin.trim();
    if gstin.chars().count() != 15 || !gstin.chars().all(|c| c.is_ascii_alphanumeric()) {
        return false;
    }
    match gstin[..2].parse::<u32>() {
        Ok(code) => (1..=37).contains(&code),
        Err(_) => false,
    }
}

/// Greedy single-pass amount clustering: each amount joins the first
/// existing cluster whose running mean it is within `tolerance_pct` of,
/// else starts a new cluster. Returns index clusters. Input order affects
/// the result; callers pre-sort, typically by date.
pub fn group_by_similar_amount(amounts: &[f64], tolerance_pct: f64) -> Vec<Vec<usize>> {
    let mut clusters: Vec<Vec<usize>> = Vec::new();
    let mut means: Vec<f64> = Vec::new();

    for (i, &amount) in amounts.iter().enumerate() {
        let mut placed = false;
        for (cluster, m) in clusters.iter_mut().zip(means.iter_mut()) {
            let tolerance = *m * tolerance_pct / 100.0;
            if (amount - *m).abs() <= tolerance {
                cluster.push(i);
                *m = cluster.iter().map(|&j| amounts[j]).sum::<f64>() / cluster.len() as f64;
                placed = true;
                break;
            }
        }
        if !placed {
            clusters.push(vec![i]);
            means.push(amount);
        }
    }
    clusters
}
