//! KPIs and group-by aggregations over the joined tables.
//!
//! Every function tolerates empty input and reports zeros rather than NaN.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::join::{EnrollmentRecord, PerformanceRecord};

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

pub fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, n) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    ratio(sum, n as f64)
}

// =============================================================================
// Month buckets
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl std::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

pub fn month_bucket(date: NaiveDate) -> YearMonth {
    YearMonth {
        year: date.year(),
        month: date.month(),
    }
}

// =============================================================================
// KPIs
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentKpis {
    pub total_enrollments: usize,
    pub unique_students: usize,
    /// Sum of prices with payment status `Paid`.
    pub total_revenue: f64,
    /// Sum of all prices regardless of payment status.
    pub gross_bookings: f64,
    /// Percent of enrollments with status `Completed`.
    pub completion_rate: f64,
    pub avg_progress: f64,
    pub avg_days_to_complete: f64,
}

impl EnrollmentKpis {
    pub fn compute(records: &[EnrollmentRecord]) -> Self {
        let students: HashSet<_> = records.iter().map(|r| r.student_key).collect();
        let completed = records.iter().filter(|r| r.is_completed()).count();
        Self {
            total_enrollments: records.len(),
            unique_students: students.len(),
            total_revenue: records.iter().filter(|r| r.is_paid()).map(|r| r.course_price).sum(),
            gross_bookings: records.iter().map(|r| r.course_price).sum(),
            completion_rate: ratio(completed as f64, records.len() as f64) * 100.0,
            avg_progress: mean(records.iter().map(|r| r.progress_percentage)),
            avg_days_to_complete: mean(
                records
                    .iter()
                    .filter(|r| r.is_completed())
                    .filter_map(|r| r.days_to_complete),
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceKpis {
    pub submissions: usize,
    pub avg_score_pct: f64,
    /// Percent of scored submissions at or above the pass threshold.
    pub pass_rate: f64,
    /// Percent of submissions flagged `IsCompleted`.
    pub completion_rate: f64,
    pub avg_time_minutes: f64,
    pub avg_attempts: f64,
}

impl PerformanceKpis {
    pub fn compute(records: &[PerformanceRecord], pass_threshold: f64) -> Self {
        let scored: Vec<f64> = records.iter().filter_map(|r| r.score_percentage()).collect();
        let passed = scored.iter().filter(|s| **s >= pass_threshold).count();
        let completed = records.iter().filter(|r| r.is_completed).count();
        Self {
            submissions: records.len(),
            avg_score_pct: mean(scored.iter().copied()),
            pass_rate: ratio(passed as f64, scored.len() as f64) * 100.0,
            completion_rate: ratio(completed as f64, records.len() as f64) * 100.0,
            avg_time_minutes: mean(records.iter().map(|r| r.time_spent_minutes)),
            avg_attempts: mean(records.iter().map(|r| r.attempts_count as f64)),
        }
    }
}

// =============================================================================
// Group-by
// =============================================================================

/// Count rows per key, ordered by key.
pub fn group_count<T, K: Ord>(rows: &[T], key: impl Fn(&T) -> K) -> Vec<(K, usize)> {
    let mut groups: BTreeMap<K, usize> = BTreeMap::new();
    for row in rows {
        *groups.entry(key(row)).or_insert(0) += 1;
    }
    groups.into_iter().collect()
}

pub fn group_sum<T, K: Ord>(rows: &[T], key: impl Fn(&T) -> K, value: impl Fn(&T) -> f64) -> Vec<(K, f64)> {
    let mut groups: BTreeMap<K, f64> = BTreeMap::new();
    for row in rows {
        *groups.entry(key(row)).or_insert(0.0) += value(row);
    }
    groups.into_iter().collect()
}

/// Mean of `value` per key; rows where `value` is `None` are skipped.
pub fn group_mean<T, K: Ord>(
    rows: &[T],
    key: impl Fn(&T) -> K,
    value: impl Fn(&T) -> Option<f64>,
) -> Vec<(K, f64)> {
    let mut groups: BTreeMap<K, (f64, usize)> = BTreeMap::new();
    for row in rows {
        if let Some(v) = value(row).filter(|v| v.is_finite()) {
            let slot = groups.entry(key(row)).or_insert((0.0, 0));
            slot.0 += v;
            slot.1 += 1;
        }
    }
    groups
        .into_iter()
        .map(|(k, (sum, n))| (k, ratio(sum, n as f64)))
        .collect()
}

/// Sort descending by value and keep the first `n`.
pub fn top_n<K, V: PartialOrd>(mut series: Vec<(K, V)>, n: usize) -> Vec<(K, V)> {
    series.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    series.truncate(n);
    series
}

pub fn monthly_enrollments(records: &[EnrollmentRecord]) -> Vec<(YearMonth, usize)> {
    group_count(records, |r| month_bucket(r.enrollment_date))
}

pub fn monthly_revenue(records: &[EnrollmentRecord]) -> Vec<(YearMonth, f64)> {
    group_sum(
        records,
        |r| month_bucket(r.enrollment_date),
        |r| if r.is_paid() { r.course_price } else { 0.0 },
    )
}

pub fn monthly_scores(records: &[PerformanceRecord]) -> Vec<(YearMonth, f64)> {
    group_mean(records, |r| month_bucket(r.submission_date), |r| r.score_percentage())
}

// =============================================================================
// Segment rates
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRate {
    pub segment: String,
    pub attempts: usize,
    pub passes: usize,
    /// Percent of attempts that passed.
    pub rate: f64,
}

/// Pass rate per segment. Submissions without a score are not counted.
pub fn success_rate_by_segment(
    records: &[PerformanceRecord],
    key: impl Fn(&PerformanceRecord) -> String,
    threshold: f64,
) -> Vec<SegmentRate> {
    let mut groups: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for r in records {
        let Some(pct) = r.score_percentage() else {
            continue;
        };
        let slot = groups.entry(key(r)).or_insert((0, 0));
        slot.0 += 1;
        if pct >= threshold {
            slot.1 += 1;
        }
    }
    groups
        .into_iter()
        .map(|(segment, (attempts, passes))| SegmentRate {
            segment,
            attempts,
            passes,
            rate: ratio(passes as f64, attempts as f64) * 100.0,
        })
        .collect()
}

/// Percent of enrollments completed per key.
pub fn completion_rate_by<K: Ord>(records: &[EnrollmentRecord], key: impl Fn(&EnrollmentRecord) -> K) -> Vec<(K, f64)> {
    group_mean(records, key, |r| Some(if r.is_completed() { 100.0 } else { 0.0 }))
}

// =============================================================================
// Correlation
// =============================================================================

/// Pearson correlation coefficient. `None` for fewer than two pairs, unequal
/// lengths, or zero variance on either side.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mx = xs.iter().sum::<f64>() / n;
    let my = ys.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mx;
        let dy = y - my;
        cov += dx * dy;
        vx += dx * dx;
        vy += dy * dy;
    }
    // Variance relative to magnitude; rounding noise around a constant is flat.
    let flat = |v: f64, vals: &[f64]| v <= f64::EPSILON * vals.iter().map(|x| x * x).sum::<f64>();
    if flat(vx, xs) || flat(vy, ys) {
        return None;
    }
    let r = cov / (vx.sqrt() * vy.sqrt());
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}
