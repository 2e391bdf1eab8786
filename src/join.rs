//! Fact/dimension joins producing the two flat analysis tables.
//!
//! Enrollment: fact ⨝ student ⨝ course ⨝ instructor ⨝ category ⨝ date
//! (enrollment) ⟕ date (completion).
//! Performance: fact ⨝ student ⨝ course ⨝ assessment ⨝ date (submission).
//!
//! Unresolved foreign keys are always counted in the [`JoinReport`]; the
//! [`JoinPolicy`] decides whether they drop the row or fail the join.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::config::JoinPolicy;
use crate::data::tables::{
    DimAssessment, DimCategory, DimCourse, DimInstructor, DimStudent, Key, RawTables,
};
use crate::data::TableName;
use crate::logging::{self, obj, v_num, v_str, Domain, ProfileScope};

// =============================================================================
// Joined rows
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub enrollment_key: Key,
    pub student_key: Key,
    pub course_key: Key,
    pub instructor_key: Key,
    pub category_key: Key,
    pub student_name: String,
    pub membership_type: String,
    pub registration_date: NaiveDate,
    pub course_title: String,
    pub level: String,
    pub instructor_name: String,
    pub category_name: String,
    pub enrollment_date: NaiveDate,
    pub completion_date: Option<NaiveDate>,
    pub course_price: f64,
    pub progress_percentage: f64,
    pub days_to_complete: Option<f64>,
    pub completion_status: String,
    pub payment_status: String,
}

impl EnrollmentRecord {
    pub fn is_completed(&self) -> bool {
        self.completion_status.trim().eq_ignore_ascii_case("completed")
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status.trim().eq_ignore_ascii_case("paid")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub performance_key: Key,
    pub student_key: Key,
    pub course_key: Key,
    pub assessment_key: Key,
    pub student_name: String,
    pub membership_type: String,
    pub course_title: String,
    pub level: String,
    pub assessment_title: String,
    pub assessment_type: String,
    pub difficulty_level: String,
    pub submission_date: NaiveDate,
    pub score_earned: f64,
    pub max_possible_score: f64,
    pub time_spent_minutes: f64,
    pub attempts_count: u64,
    pub is_completed: bool,
}

impl PerformanceRecord {
    /// ScoreEarned / MaxPossibleScore × 100, derived from the stored factors
    /// on every call. `None` when the maximum is not positive.
    pub fn score_percentage(&self) -> Option<f64> {
        if self.max_possible_score > 0.0 && self.max_possible_score.is_finite() {
            Some(self.score_earned / self.max_possible_score * 100.0)
        } else {
            None
        }
    }

    pub fn passed(&self, threshold: f64) -> bool {
        self.score_percentage().map(|p| p >= threshold).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JoinedTables {
    pub enrollments: Vec<EnrollmentRecord>,
    pub performances: Vec<PerformanceRecord>,
}

// =============================================================================
// Report and errors
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JoinReport {
    pub enrollment_in: usize,
    pub enrollment_out: usize,
    pub performance_in: usize,
    pub performance_out: usize,
    /// Unresolved key counts, keyed `Fact->Dimension`.
    pub orphans: BTreeMap<String, usize>,
}

impl JoinReport {
    pub fn total_orphans(&self) -> usize {
        self.orphans.values().sum()
    }

    pub fn is_complete(&self) -> bool {
        self.enrollment_in == self.enrollment_out && self.performance_in == self.performance_out
    }

    fn record(&mut self, fact: TableName, dim: TableName) {
        *self.orphans.entry(orphan_label(fact, dim)).or_insert(0) += 1;
    }
}

fn orphan_label(fact: TableName, dim: TableName) -> String {
    format!("{:?}->{:?}", fact, dim)
}

#[derive(Debug, Error)]
pub enum JoinError {
    #[error("{count} unresolved foreign keys ({detail})")]
    Orphans { count: usize, detail: String },
}

// =============================================================================
// Join
// =============================================================================

fn index<T>(rows: &[T], key: impl Fn(&T) -> Key) -> HashMap<Key, &T> {
    rows.iter().map(|r| (key(r), r)).collect()
}

pub fn join(raw: &RawTables, policy: JoinPolicy) -> Result<(JoinedTables, JoinReport), JoinError> {
    let _scope = ProfileScope::with_context(
        "join",
        &[
            ("enrollments", v_num(raw.enrollments.len() as f64)),
            ("performances", v_num(raw.performances.len() as f64)),
        ],
    );

    let students: HashMap<Key, &DimStudent> = index(&raw.students, |r| r.student_key);
    let courses: HashMap<Key, &DimCourse> = index(&raw.courses, |r| r.course_key);
    let instructors: HashMap<Key, &DimInstructor> = index(&raw.instructors, |r| r.instructor_key);
    let categories: HashMap<Key, &DimCategory> = index(&raw.categories, |r| r.category_key);
    let assessments: HashMap<Key, &DimAssessment> = index(&raw.assessments, |r| r.assessment_key);
    let dates: HashMap<Key, NaiveDate> = raw.dates.iter().map(|d| (d.date_key, d.full_date)).collect();

    let mut report = JoinReport {
        enrollment_in: raw.enrollments.len(),
        performance_in: raw.performances.len(),
        ..Default::default()
    };
    let mut out = JoinedTables::default();

    let fact = TableName::FactEnrollment;
    for f in &raw.enrollments {
        let student = students.get(&f.student_key);
        let course = courses.get(&f.course_key);
        let instructor = instructors.get(&f.instructor_key);
        let category = categories.get(&f.category_key);
        let enrolled = dates.get(&f.enrollment_date_key);
        // Completion is a left join: no key means not completed, but a key
        // that fails to resolve is still an orphan.
        let completion = match f.completion_date_key {
            None => Ok(None),
            Some(k) => dates.get(&k).map(|d| Some(*d)).ok_or(()),
        };

        if student.is_none() {
            report.record(fact, TableName::DimStudent);
        }
        if course.is_none() {
            report.record(fact, TableName::DimCourse);
        }
        if instructor.is_none() {
            report.record(fact, TableName::DimInstructor);
        }
        if category.is_none() {
            report.record(fact, TableName::DimCategory);
        }
        if enrolled.is_none() || completion.is_err() {
            report.record(fact, TableName::DimDate);
        }

        let (Some(student), Some(course), Some(instructor), Some(category), Some(enrolled), Ok(completion)) =
            (student, course, instructor, category, enrolled, completion)
        else {
            continue;
        };

        out.enrollments.push(EnrollmentRecord {
            enrollment_key: f.enrollment_key,
            student_key: f.student_key,
            course_key: f.course_key,
            instructor_key: f.instructor_key,
            category_key: f.category_key,
            student_name: student.student_name.clone(),
            membership_type: student.membership_type.clone(),
            registration_date: student.registration_date,
            course_title: course.course_title.clone(),
            level: course.level.clone(),
            instructor_name: instructor.instructor_name.clone(),
            category_name: category.category_name.clone(),
            enrollment_date: *enrolled,
            completion_date: completion,
            course_price: f.course_price,
            progress_percentage: f.progress_percentage,
            days_to_complete: f.days_to_complete,
            completion_status: f.completion_status.clone(),
            payment_status: f.payment_status.clone(),
        });
    }

    let fact = TableName::FactAssessmentPerformance;
    for f in &raw.performances {
        let student = students.get(&f.student_key);
        let course = courses.get(&f.course_key);
        let assessment = assessments.get(&f.assessment_key);
        let submitted = dates.get(&f.submission_date_key);

        if student.is_none() {
            report.record(fact, TableName::DimStudent);
        }
        if course.is_none() {
            report.record(fact, TableName::DimCourse);
        }
        if assessment.is_none() {
            report.record(fact, TableName::DimAssessment);
        }
        if submitted.is_none() {
            report.record(fact, TableName::DimDate);
        }

        let (Some(student), Some(course), Some(assessment), Some(submitted)) =
            (student, course, assessment, submitted)
        else {
            continue;
        };

        out.performances.push(PerformanceRecord {
            performance_key: f.performance_key,
            student_key: f.student_key,
            course_key: f.course_key,
            assessment_key: f.assessment_key,
            student_name: student.student_name.clone(),
            membership_type: student.membership_type.clone(),
            course_title: course.course_title.clone(),
            level: course.level.clone(),
            assessment_title: assessment.assessment_title.clone(),
            assessment_type: assessment.assessment_type.clone(),
            difficulty_level: assessment.difficulty_level.clone(),
            submission_date: *submitted,
            score_earned: f.score_earned,
            max_possible_score: f.max_possible_score,
            time_spent_minutes: f.time_spent_minutes,
            attempts_count: f.attempts_count,
            is_completed: f.is_completed,
        });
    }

    report.enrollment_out = out.enrollments.len();
    report.performance_out = out.performances.len();

    if !report.orphans.is_empty() {
        let detail = report
            .orphans
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ");
        if policy == JoinPolicy::Strict {
            return Err(JoinError::Orphans {
                count: report.total_orphans(),
                detail,
            });
        }
        logging::warn(
            Domain::Join,
            "orphans_dropped",
            obj(&[
                (
                    "msg",
                    v_str(&format!(
                        "dropped {} enrollment and {} performance rows with unresolved keys ({})",
                        report.enrollment_in - report.enrollment_out,
                        report.performance_in - report.performance_out,
                        detail
                    )),
                ),
                ("orphans", v_num(report.total_orphans() as f64)),
            ]),
        );
    }

    logging::info(
        Domain::Join,
        "joined",
        obj(&[
            ("enrollments", v_num(report.enrollment_out as f64)),
            ("performances", v_num(report.performance_out as f64)),
        ]),
    );

    Ok((out, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tables::{DimDate, FactAssessmentPerformance, FactEnrollment};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn tiny() -> RawTables {
        RawTables {
            students: vec![DimStudent {
                student_key: 1,
                student_name: "Ana".into(),
                membership_type: "Premium".into(),
                registration_date: d(2024, 1, 1),
            }],
            courses: vec![DimCourse {
                course_key: 10,
                course_title: "Rust 101".into(),
                level: "Beginner".into(),
                created_date: d(2023, 6, 1),
            }],
            instructors: vec![DimInstructor {
                instructor_key: 100,
                instructor_name: "Lee".into(),
            }],
            categories: vec![DimCategory {
                category_key: 5,
                category_name: "Programming".into(),
            }],
            dates: vec![
                DimDate { date_key: 20240110, full_date: d(2024, 1, 10) },
                DimDate { date_key: 20240301, full_date: d(2024, 3, 1) },
            ],
            assessments: vec![DimAssessment {
                assessment_key: 7,
                assessment_title: "Quiz 1".into(),
                assessment_type: "Quiz".into(),
                difficulty_level: "Easy".into(),
                max_score: 20.0,
            }],
            enrollments: vec![FactEnrollment {
                enrollment_key: 1,
                student_key: 1,
                course_key: 10,
                instructor_key: 100,
                category_key: 5,
                enrollment_date_key: 20240110,
                completion_date_key: Some(20240301),
                course_price: 99.0,
                progress_percentage: 100.0,
                days_to_complete: Some(51.0),
                completion_status: "Completed".into(),
                payment_status: "Paid".into(),
            }],
            performances: vec![FactAssessmentPerformance {
                performance_key: 1,
                student_key: 1,
                course_key: 10,
                assessment_key: 7,
                submission_date_key: 20240301,
                score_earned: 20.0,
                max_possible_score: 20.0,
                time_spent_minutes: 30.0,
                attempts_count: 1,
                is_completed: true,
            }],
        }
    }

    #[test]
    fn test_join_resolves_all_dimensions() {
        let (tables, report) = join(&tiny(), JoinPolicy::Drop).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.total_orphans(), 0);
        let e = &tables.enrollments[0];
        assert_eq!(e.student_name, "Ana");
        assert_eq!(e.category_name, "Programming");
        assert_eq!(e.enrollment_date, d(2024, 1, 10));
        assert_eq!(e.completion_date, Some(d(2024, 3, 1)));
        assert_eq!(tables.performances[0].assessment_type, "Quiz");
    }

    #[test]
    fn test_full_score_is_one_hundred_percent() {
        let (tables, _) = join(&tiny(), JoinPolicy::Drop).unwrap();
        assert_eq!(tables.performances[0].score_percentage(), Some(100.0));
    }

    #[test]
    fn test_score_percentage_tracks_factor_changes() {
        let (mut tables, _) = join(&tiny(), JoinPolicy::Drop).unwrap();
        let p = &mut tables.performances[0];
        p.score_earned = 5.0;
        assert_eq!(p.score_percentage(), Some(25.0));
        p.max_possible_score = 10.0;
        assert_eq!(p.score_percentage(), Some(50.0));
        p.max_possible_score = 0.0;
        assert_eq!(p.score_percentage(), None);
        assert!(!p.passed(0.0));
    }

    #[test]
    fn test_missing_completion_key_is_left_join() {
        let mut raw = tiny();
        raw.enrollments[0].completion_date_key = None;
        let (tables, report) = join(&raw, JoinPolicy::Strict).unwrap();
        assert_eq!(tables.enrollments[0].completion_date, None);
        assert!(report.orphans.is_empty());
    }

    #[test]
    fn test_unresolved_completion_key_is_orphan() {
        let mut raw = tiny();
        raw.enrollments[0].completion_date_key = Some(19990101);
        let (tables, report) = join(&raw, JoinPolicy::Drop).unwrap();
        assert!(tables.enrollments.is_empty());
        assert_eq!(report.orphans.get("FactEnrollment->DimDate"), Some(&1));
    }

    #[test]
    fn test_orphans_dropped_and_counted() {
        let mut raw = tiny();
        raw.performances[0].assessment_key = 99;
        raw.enrollments[0].student_key = 42;
        let (tables, report) = join(&raw, JoinPolicy::Drop).unwrap();
        assert!(tables.enrollments.is_empty());
        assert!(tables.performances.is_empty());
        assert_eq!(report.orphans.get("FactEnrollment->DimStudent"), Some(&1));
        assert_eq!(report.orphans.get("FactAssessmentPerformance->DimAssessment"), Some(&1));
        assert!(!report.is_complete());
    }

    #[test]
    fn test_strict_policy_rejects_orphans() {
        let mut raw = tiny();
        raw.enrollments[0].category_key = 6;
        let err = join(&raw, JoinPolicy::Strict).unwrap_err();
        assert!(err.to_string().contains("FactEnrollment->DimCategory=1"));
    }
}
