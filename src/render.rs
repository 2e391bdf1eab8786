//! Plain-text rendering of dashboard views.

use std::fmt::{Display, Write};

use crate::dataset::{DataSource, Dataset};
use crate::filter::FilterOptions;
use crate::join::JoinReport;
use crate::metrics::SegmentRate;
use crate::views::{CorrelationView, Dashboard, EnrollmentView, PerformanceView};

const BAR_WIDTH: usize = 30;

fn bar(value: f64, max: f64) -> String {
    if max <= 0.0 || !value.is_finite() || value <= 0.0 {
        return String::new();
    }
    let n = ((value / max) * BAR_WIDTH as f64).round() as usize;
    "#".repeat(n.clamp(1, BAR_WIDTH))
}

fn heading(out: &mut String, title: &str) {
    let _ = writeln!(out);
    let _ = writeln!(out, "=== {} ===", title);
}

/// Label / value / bar rows, bars scaled to the largest value.
fn series<K: Display>(out: &mut String, title: &str, rows: &[(K, f64)], precision: usize) {
    heading(out, title);
    if rows.is_empty() {
        let _ = writeln!(out, "(no data)");
        return;
    }
    let labels: Vec<String> = rows.iter().map(|(k, _)| k.to_string()).collect();
    let width = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let max = rows.iter().map(|(_, v)| *v).fold(0.0, f64::max);
    for (label, (_, v)) in labels.iter().zip(rows) {
        let _ = writeln!(
            out,
            "{:<width$}  {:>12.prec$}  {}",
            label,
            v,
            bar(*v, max),
            width = width,
            prec = precision
        );
    }
}

fn counts<K: Display>(out: &mut String, title: &str, rows: &[(K, usize)]) {
    let as_f64: Vec<(&K, f64)> = rows.iter().map(|(k, v)| (k, *v as f64)).collect();
    series(out, title, &as_f64, 0);
}

fn segments(out: &mut String, title: &str, rows: &[SegmentRate]) {
    heading(out, title);
    if rows.is_empty() {
        let _ = writeln!(out, "(no data)");
        return;
    }
    let width = rows.iter().map(|r| r.segment.chars().count()).max().unwrap_or(0);
    for r in rows {
        let _ = writeln!(
            out,
            "{:<width$}  {:>6.1}%  ({}/{})  {}",
            r.segment,
            r.rate,
            r.passes,
            r.attempts,
            bar(r.rate, 100.0),
            width = width
        );
    }
}

fn corr(value: Option<f64>) -> String {
    value.map(|r| format!("{:+.3}", r)).unwrap_or_else(|| "n/a".to_string())
}

pub fn render_source(ds: &Dataset) -> String {
    let mut out = String::new();
    match &ds.source {
        DataSource::Files { dir } => {
            let _ = writeln!(out, "Source: {}", dir.display());
        }
        DataSource::Sample { seed, reason } => {
            let _ = writeln!(out, "Source: sample data (seed {})", seed);
            let _ = writeln!(out, "Reason: {}", reason);
        }
    }
    out.push_str(&render_join_report(&ds.report));
    out
}

pub fn render_join_report(report: &JoinReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Enrollments: {}/{} joined   Submissions: {}/{} joined",
        report.enrollment_out, report.enrollment_in, report.performance_out, report.performance_in
    );
    for (label, n) in &report.orphans {
        let _ = writeln!(out, "  orphan {}: {}", label, n);
    }
    out
}

pub fn render_enrollment(view: &EnrollmentView) -> String {
    let mut out = String::new();
    let k = &view.kpis;
    heading(&mut out, "Enrollment KPIs");
    let _ = writeln!(out, "Enrollments:        {}", k.total_enrollments);
    let _ = writeln!(out, "Unique students:    {}", k.unique_students);
    let _ = writeln!(out, "Revenue (paid):     {:.2}", k.total_revenue);
    let _ = writeln!(out, "Gross bookings:     {:.2}", k.gross_bookings);
    let _ = writeln!(out, "Completion rate:    {:.1}%", k.completion_rate);
    let _ = writeln!(out, "Avg progress:       {:.1}%", k.avg_progress);
    let _ = writeln!(out, "Avg days to finish: {:.1}", k.avg_days_to_complete);

    counts(&mut out, "Monthly Enrollments", &view.monthly_enrollments);
    series(&mut out, "Monthly Revenue", &view.monthly_revenue, 2);
    series(&mut out, "Revenue by Category", &view.revenue_by_category, 2);
    series(&mut out, "Completion % by Category", &view.completion_by_category, 1);
    counts(&mut out, "Enrollments by Membership", &view.by_membership);
    counts(&mut out, "Completion Status", &view.status_distribution);
    counts(&mut out, "Course Level", &view.level_distribution);
    counts(&mut out, "Top Courses", &view.top_courses);

    heading(&mut out, "Instructors");
    if view.instructors.is_empty() {
        let _ = writeln!(out, "(no data)");
    }
    for i in &view.instructors {
        let _ = writeln!(
            out,
            "{:<24}  enrollments={:<5} revenue={:<10.2} completion={:.1}%",
            i.instructor, i.enrollments, i.revenue, i.completion_rate
        );
    }
    out
}

pub fn render_performance(view: &PerformanceView) -> String {
    let mut out = String::new();
    let k = &view.kpis;
    heading(&mut out, "Performance KPIs");
    let _ = writeln!(out, "Submissions:      {}", k.submissions);
    let _ = writeln!(out, "Avg score:        {:.1}%", k.avg_score_pct);
    let _ = writeln!(out, "Pass rate:        {:.1}%", k.pass_rate);
    let _ = writeln!(out, "Completed:        {:.1}%", k.completion_rate);
    let _ = writeln!(out, "Avg time (min):   {:.1}", k.avg_time_minutes);
    let _ = writeln!(out, "Avg attempts:     {:.2}", k.avg_attempts);

    let bins: Vec<(String, usize)> = view
        .score_distribution
        .iter()
        .map(|b| (format!("{:>3}-{:<3}", b.lower, b.upper), b.count))
        .collect();
    counts(&mut out, "Score Distribution (%)", &bins);
    series(&mut out, "Avg Score by Assessment Type", &view.avg_score_by_type, 1);
    series(&mut out, "Avg Score by Difficulty", &view.avg_score_by_difficulty, 1);
    segments(&mut out, "Success Rate by Membership", &view.success_by_membership);
    segments(&mut out, "Success Rate by Course Level", &view.success_by_level);
    segments(&mut out, "Success Rate by Assessment Type", &view.success_by_type);
    series(&mut out, "Monthly Avg Score", &view.monthly_scores, 1);
    series(&mut out, "Avg Score by Attempts", &view.score_by_attempts, 1);
    out
}

pub fn render_correlation(view: &CorrelationView, top: usize) -> String {
    let mut out = String::new();
    heading(&mut out, "Correlations (Pearson r)");
    let _ = writeln!(out, "Student progress vs score:     {}", corr(view.progress_vs_score));
    let _ = writeln!(out, "Student completion vs score:   {}", corr(view.completion_vs_score));
    let _ = writeln!(out, "Time spent vs score:           {}", corr(view.time_vs_score));
    let _ = writeln!(out, "Course completion vs score:    {}", corr(view.course_completion_vs_score));
    let _ = writeln!(out, "Students linked: {}   Courses linked: {}", view.students.len(), view.courses.len());

    heading(&mut out, "Courses: Completion vs Score");
    if view.courses.is_empty() {
        let _ = writeln!(out, "(no data)");
    }
    for c in view.courses.iter().take(top) {
        let _ = writeln!(
            out,
            "{:<32}  completion={:>5.1}%  avg_score={:>5.1}%  ({} enr, {} sub)",
            c.course_title, c.completion_rate, c.avg_score, c.enrollments, c.submissions
        );
    }

    heading(&mut out, "Top Students by Avg Score");
    let mut students: Vec<_> = view.students.iter().collect();
    students.sort_by(|a, b| b.avg_score.partial_cmp(&a.avg_score).unwrap_or(std::cmp::Ordering::Equal));
    if students.is_empty() {
        let _ = writeln!(out, "(no data)");
    }
    for s in students.into_iter().take(top) {
        let _ = writeln!(
            out,
            "{:<24}  progress={:>5.1}%  completion={:>5.1}%  score={:>5.1}%  pass={:>5.1}%",
            s.student_name, s.avg_progress, s.completion_rate, s.avg_score, s.pass_rate
        );
    }
    out
}

pub fn render_options(opts: &FilterOptions) -> String {
    let mut out = String::new();
    heading(&mut out, "Filter Options");
    let span = match (opts.min_date, opts.max_date) {
        (Some(a), Some(b)) => format!("{} .. {}", a, b),
        _ => "n/a".to_string(),
    };
    let _ = writeln!(out, "Dates:        {}", span);
    let _ = writeln!(out, "Categories:   {}", opts.categories.join(", "));
    let _ = writeln!(out, "Memberships:  {}", opts.memberships.join(", "));
    let _ = writeln!(out, "Levels:       {}", opts.levels.join(", "));
    let _ = writeln!(out, "Statuses:     {}", opts.statuses.join(", "));
    out
}

pub fn render_dashboard(dash: &Dashboard, top: usize) -> String {
    let mut out = render_enrollment(&dash.enrollment);
    out.push_str(&render_performance(&dash.performance));
    out.push_str(&render_correlation(&dash.correlation, top));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_scaling() {
        assert_eq!(bar(10.0, 10.0).len(), BAR_WIDTH);
        assert_eq!(bar(5.0, 10.0).len(), BAR_WIDTH / 2);
        assert_eq!(bar(0.0, 10.0), "");
        assert_eq!(bar(0.001, 10.0).len(), 1);
        assert_eq!(bar(1.0, 0.0), "");
    }

    #[test]
    fn test_series_handles_empty() {
        let mut out = String::new();
        series::<String>(&mut out, "Empty", &[], 1);
        assert!(out.contains("=== Empty ==="));
        assert!(out.contains("(no data)"));
    }

    #[test]
    fn test_corr_format() {
        assert_eq!(corr(Some(0.5)), "+0.500");
        assert_eq!(corr(None), "n/a");
    }
}
