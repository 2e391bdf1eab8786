//! View models for the three dashboard pages. Each one is a plain bundle of
//! KPIs and chart series computed from already-filtered tables.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::DashboardConfig;
use crate::data::tables::Key;
use crate::filter::{self, FilterOptions, FilterSpec};
use crate::join::{EnrollmentRecord, JoinedTables, PerformanceRecord};
use crate::logging::{self, obj, v_num, v_str, Domain, ProfileScope};
use crate::metrics::{
    completion_rate_by, group_count, group_mean, group_sum, mean, monthly_enrollments,
    monthly_revenue, monthly_scores, pearson, success_rate_by_segment, top_n, EnrollmentKpis,
    PerformanceKpis, SegmentRate, YearMonth,
};

// =============================================================================
// Enrollment BI
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructorStat {
    pub instructor: String,
    pub enrollments: usize,
    pub revenue: f64,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentView {
    pub kpis: EnrollmentKpis,
    pub monthly_enrollments: Vec<(YearMonth, usize)>,
    pub monthly_revenue: Vec<(YearMonth, f64)>,
    pub revenue_by_category: Vec<(String, f64)>,
    pub by_membership: Vec<(String, usize)>,
    pub status_distribution: Vec<(String, usize)>,
    pub level_distribution: Vec<(String, usize)>,
    pub completion_by_category: Vec<(String, f64)>,
    pub top_courses: Vec<(String, usize)>,
    pub instructors: Vec<InstructorStat>,
}

impl EnrollmentView {
    pub fn build(records: &[EnrollmentRecord], top: usize) -> Self {
        let mut instructors: BTreeMap<&str, (usize, f64, usize)> = BTreeMap::new();
        for r in records {
            let slot = instructors.entry(r.instructor_name.as_str()).or_insert((0, 0.0, 0));
            slot.0 += 1;
            if r.is_paid() {
                slot.1 += r.course_price;
            }
            if r.is_completed() {
                slot.2 += 1;
            }
        }
        let mut instructors: Vec<InstructorStat> = instructors
            .into_iter()
            .map(|(name, (n, revenue, done))| InstructorStat {
                instructor: name.to_string(),
                enrollments: n,
                revenue,
                completion_rate: done as f64 / n as f64 * 100.0,
            })
            .collect();
        instructors.sort_by(|a, b| b.enrollments.cmp(&a.enrollments).then_with(|| a.instructor.cmp(&b.instructor)));
        instructors.truncate(top);

        Self {
            kpis: EnrollmentKpis::compute(records),
            monthly_enrollments: monthly_enrollments(records),
            monthly_revenue: monthly_revenue(records),
            revenue_by_category: top_n(
                group_sum(
                    records,
                    |r| r.category_name.clone(),
                    |r| if r.is_paid() { r.course_price } else { 0.0 },
                ),
                usize::MAX,
            ),
            by_membership: group_count(records, |r| r.membership_type.clone()),
            status_distribution: group_count(records, |r| r.completion_status.clone()),
            level_distribution: group_count(records, |r| r.level.clone()),
            completion_by_category: completion_rate_by(records, |r| r.category_name.clone()),
            top_courses: top_n(group_count(records, |r| r.course_title.clone()), top),
            instructors,
        }
    }
}

// =============================================================================
// Performance QA
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBin {
    pub lower: u32,
    pub upper: u32,
    pub count: usize,
}

/// Ten 10-point bins; 100% falls in the last bin, out-of-range scores are clamped.
pub fn score_distribution(records: &[PerformanceRecord]) -> Vec<ScoreBin> {
    let mut counts = [0usize; 10];
    for pct in records.iter().filter_map(|r| r.score_percentage()).filter(|p| p.is_finite()) {
        let idx = ((pct / 10.0).floor().max(0.0) as usize).min(9);
        counts[idx] += 1;
    }
    counts
        .iter()
        .enumerate()
        .map(|(i, c)| ScoreBin {
            lower: i as u32 * 10,
            upper: i as u32 * 10 + 10,
            count: *c,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceView {
    pub kpis: PerformanceKpis,
    pub score_distribution: Vec<ScoreBin>,
    pub avg_score_by_type: Vec<(String, f64)>,
    pub avg_score_by_difficulty: Vec<(String, f64)>,
    pub success_by_membership: Vec<SegmentRate>,
    pub success_by_level: Vec<SegmentRate>,
    pub success_by_type: Vec<SegmentRate>,
    pub monthly_scores: Vec<(YearMonth, f64)>,
    pub score_by_attempts: Vec<(u64, f64)>,
}

impl PerformanceView {
    pub fn build(records: &[PerformanceRecord], pass_threshold: f64) -> Self {
        Self {
            kpis: PerformanceKpis::compute(records, pass_threshold),
            score_distribution: score_distribution(records),
            avg_score_by_type: group_mean(records, |r| r.assessment_type.clone(), |r| r.score_percentage()),
            avg_score_by_difficulty: group_mean(records, |r| r.difficulty_level.clone(), |r| r.score_percentage()),
            success_by_membership: success_rate_by_segment(records, |r| r.membership_type.clone(), pass_threshold),
            success_by_level: success_rate_by_segment(records, |r| r.level.clone(), pass_threshold),
            success_by_type: success_rate_by_segment(records, |r| r.assessment_type.clone(), pass_threshold),
            monthly_scores: monthly_scores(records),
            score_by_attempts: group_mean(records, |r| r.attempts_count, |r| r.score_percentage()),
        }
    }
}

// =============================================================================
// Cross-fact correlation
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentLink {
    pub student_key: Key,
    pub student_name: String,
    pub enrollments: usize,
    pub avg_progress: f64,
    pub completion_rate: f64,
    pub submissions: usize,
    pub avg_score: f64,
    pub pass_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseLink {
    pub course_key: Key,
    pub course_title: String,
    pub enrollments: usize,
    pub completion_rate: f64,
    pub submissions: usize,
    pub avg_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationView {
    pub students: Vec<StudentLink>,
    pub courses: Vec<CourseLink>,
    pub progress_vs_score: Option<f64>,
    pub completion_vs_score: Option<f64>,
    pub time_vs_score: Option<f64>,
    pub course_completion_vs_score: Option<f64>,
}

#[derive(Default)]
struct Side {
    name: String,
    enrollments: usize,
    progress: Vec<f64>,
    completed: usize,
    scores: Vec<f64>,
    submissions: usize,
}

impl CorrelationView {
    pub fn build(tables: &JoinedTables, pass_threshold: f64) -> Self {
        let mut by_student: BTreeMap<Key, Side> = BTreeMap::new();
        let mut by_course: BTreeMap<Key, Side> = BTreeMap::new();

        for e in &tables.enrollments {
            for (map, key, name) in [
                (&mut by_student, e.student_key, &e.student_name),
                (&mut by_course, e.course_key, &e.course_title),
            ] {
                let side = map.entry(key).or_default();
                side.name.clone_from(name);
                side.enrollments += 1;
                side.progress.push(e.progress_percentage);
                if e.is_completed() {
                    side.completed += 1;
                }
            }
        }
        for p in &tables.performances {
            for (map, key) in [(&mut by_student, p.student_key), (&mut by_course, p.course_key)] {
                // Only entities present in both facts are correlated.
                if let Some(side) = map.get_mut(&key) {
                    side.submissions += 1;
                    if let Some(pct) = p.score_percentage() {
                        side.scores.push(pct);
                    }
                }
            }
        }

        let students: Vec<StudentLink> = by_student
            .into_iter()
            .filter(|(_, s)| !s.scores.is_empty())
            .map(|(key, s)| StudentLink {
                student_key: key,
                student_name: s.name,
                enrollments: s.enrollments,
                avg_progress: mean(s.progress.iter().copied()),
                completion_rate: s.completed as f64 / s.enrollments as f64 * 100.0,
                submissions: s.submissions,
                avg_score: mean(s.scores.iter().copied()),
                pass_rate: s.scores.iter().filter(|v| **v >= pass_threshold).count() as f64
                    / s.scores.len() as f64
                    * 100.0,
            })
            .collect();

        let courses: Vec<CourseLink> = by_course
            .into_iter()
            .filter(|(_, s)| !s.scores.is_empty())
            .map(|(key, s)| CourseLink {
                course_key: key,
                course_title: s.name,
                enrollments: s.enrollments,
                completion_rate: s.completed as f64 / s.enrollments as f64 * 100.0,
                submissions: s.submissions,
                avg_score: mean(s.scores.iter().copied()),
            })
            .collect();

        let student_scores: Vec<f64> = students.iter().map(|s| s.avg_score).collect();
        let progress: Vec<f64> = students.iter().map(|s| s.avg_progress).collect();
        let completion: Vec<f64> = students.iter().map(|s| s.completion_rate).collect();
        let (times, scores): (Vec<f64>, Vec<f64>) = tables
            .performances
            .iter()
            .filter_map(|p| p.score_percentage().map(|s| (p.time_spent_minutes, s)))
            .unzip();
        let course_completion: Vec<f64> = courses.iter().map(|c| c.completion_rate).collect();
        let course_scores: Vec<f64> = courses.iter().map(|c| c.avg_score).collect();

        Self {
            progress_vs_score: pearson(&progress, &student_scores),
            completion_vs_score: pearson(&completion, &student_scores),
            time_vs_score: pearson(&times, &scores),
            course_completion_vs_score: pearson(&course_completion, &course_scores),
            students,
            courses,
        }
    }
}

// =============================================================================
// Dashboard
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub filter: FilterSpec,
    pub options: FilterOptions,
    pub enrollment: EnrollmentView,
    pub performance: PerformanceView,
    pub correlation: CorrelationView,
}

impl Dashboard {
    /// Filter the joined tables and compute all three views.
    pub fn build(tables: &JoinedTables, spec: &FilterSpec, cfg: &DashboardConfig) -> Self {
        let _scope = ProfileScope::with_context("dashboard", &[("filter", v_str(&spec.fingerprint()))]);
        let options = FilterOptions::discover(tables);
        let filtered = filter::apply(tables, spec);

        let dashboard = Self {
            filter: spec.clone(),
            options,
            enrollment: EnrollmentView::build(&filtered.enrollments, cfg.top_n),
            performance: PerformanceView::build(&filtered.performances, cfg.pass_threshold),
            correlation: CorrelationView::build(&filtered, cfg.pass_threshold),
        };

        logging::info(
            Domain::Metrics,
            "dashboard_built",
            obj(&[
                ("enrollments", v_num(dashboard.enrollment.kpis.total_enrollments as f64)),
                ("submissions", v_num(dashboard.performance.kpis.submissions as f64)),
                ("completion_rate", v_num(dashboard.enrollment.kpis.completion_rate)),
                ("avg_score_pct", v_num(dashboard.performance.kpis.avg_score_pct)),
            ]),
        );
        dashboard
    }
}
