//! Compound filters applied consistently to both analysis tables.
//!
//! The two tables share student and course dimensions but not category or
//! enrollment status, so those two filters reach performance rows through
//! the enrollment table:
//! - category: a submission is kept when its course is taught under a
//!   selected category;
//! - status: a submission is kept when the student's enrollment in that
//!   course has a selected status.
//!
//! Both bridges are derived from the unfiltered enrollment table, so the
//! date window on enrollments never hides a course's category.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::data::tables::Key;
use crate::join::{EnrollmentRecord, JoinedTables, PerformanceRecord};
use crate::logging::{self, fingerprint, obj, v_num, v_str, Domain};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Inclusive bounds on enrollment date / submission date.
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub categories: BTreeSet<String>,
    pub memberships: BTreeSet<String>,
    pub levels: BTreeSet<String>,
    pub statuses: BTreeSet<String>,
}

impl FilterSpec {
    pub fn is_empty(&self) -> bool {
        self.date_range.is_none()
            && self.categories.is_empty()
            && self.memberships.is_empty()
            && self.levels.is_empty()
            && self.statuses.is_empty()
    }

    /// Bounds in ascending order, whichever way round they were given.
    pub fn normalized_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.date_range
            .map(|(a, b)| if a <= b { (a, b) } else { (b, a) })
    }

    pub fn with_range(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.date_range = Some((from, to));
        self
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&serde_json::to_string(self).unwrap_or_default())
    }
}

fn allows(set: &BTreeSet<String>, value: &str) -> bool {
    set.is_empty() || set.iter().any(|s| s.eq_ignore_ascii_case(value.trim()))
}

fn in_range(range: Option<(NaiveDate, NaiveDate)>, d: NaiveDate) -> bool {
    match range {
        Some((from, to)) => d >= from && d <= to,
        None => true,
    }
}

// =============================================================================
// Options
// =============================================================================

/// Distinct values available for each filter, plus the overall date span.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterOptions {
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
    pub categories: Vec<String>,
    pub memberships: Vec<String>,
    pub levels: Vec<String>,
    pub statuses: Vec<String>,
}

impl FilterOptions {
    pub fn discover(tables: &JoinedTables) -> Self {
        let mut categories = BTreeSet::new();
        let mut memberships = BTreeSet::new();
        let mut levels = BTreeSet::new();
        let mut statuses = BTreeSet::new();
        let mut dates: Vec<NaiveDate> = Vec::new();

        for e in &tables.enrollments {
            categories.insert(e.category_name.clone());
            memberships.insert(e.membership_type.clone());
            levels.insert(e.level.clone());
            statuses.insert(e.completion_status.clone());
            dates.push(e.enrollment_date);
        }
        for p in &tables.performances {
            memberships.insert(p.membership_type.clone());
            levels.insert(p.level.clone());
            dates.push(p.submission_date);
        }

        Self {
            min_date: dates.iter().min().copied(),
            max_date: dates.iter().max().copied(),
            categories: categories.into_iter().collect(),
            memberships: memberships.into_iter().collect(),
            levels: levels.into_iter().collect(),
            statuses: statuses.into_iter().collect(),
        }
    }
}

// =============================================================================
// Apply
// =============================================================================

fn enrollment_matches(e: &EnrollmentRecord, spec: &FilterSpec, range: Option<(NaiveDate, NaiveDate)>) -> bool {
    in_range(range, e.enrollment_date)
        && allows(&spec.categories, &e.category_name)
        && allows(&spec.memberships, &e.membership_type)
        && allows(&spec.levels, &e.level)
        && allows(&spec.statuses, &e.completion_status)
}

struct Bridges {
    courses_in_category: Option<HashSet<Key>>,
    pairs_with_status: Option<HashSet<(Key, Key)>>,
}

impl Bridges {
    fn build(enrollments: &[EnrollmentRecord], spec: &FilterSpec) -> Self {
        let courses_in_category = (!spec.categories.is_empty()).then(|| {
            enrollments
                .iter()
                .filter(|e| allows(&spec.categories, &e.category_name))
                .map(|e| e.course_key)
                .collect()
        });
        let pairs_with_status = (!spec.statuses.is_empty()).then(|| {
            enrollments
                .iter()
                .filter(|e| allows(&spec.statuses, &e.completion_status))
                .map(|e| (e.student_key, e.course_key))
                .collect()
        });
        Self {
            courses_in_category,
            pairs_with_status,
        }
    }

    fn admits(&self, p: &PerformanceRecord) -> bool {
        let category_ok = self
            .courses_in_category
            .as_ref()
            .map(|s| s.contains(&p.course_key))
            .unwrap_or(true);
        let status_ok = self
            .pairs_with_status
            .as_ref()
            .map(|s| s.contains(&(p.student_key, p.course_key)))
            .unwrap_or(true);
        category_ok && status_ok
    }
}

fn performance_matches(
    p: &PerformanceRecord,
    spec: &FilterSpec,
    range: Option<(NaiveDate, NaiveDate)>,
    bridges: &Bridges,
) -> bool {
    in_range(range, p.submission_date)
        && allows(&spec.memberships, &p.membership_type)
        && allows(&spec.levels, &p.level)
        && bridges.admits(p)
}

pub fn apply(tables: &JoinedTables, spec: &FilterSpec) -> JoinedTables {
    if spec.is_empty() {
        return tables.clone();
    }
    let range = spec.normalized_range();
    let bridges = Bridges::build(&tables.enrollments, spec);

    let out = JoinedTables {
        enrollments: tables
            .enrollments
            .iter()
            .filter(|e| enrollment_matches(e, spec, range))
            .cloned()
            .collect(),
        performances: tables
            .performances
            .iter()
            .filter(|p| performance_matches(p, spec, range, &bridges))
            .cloned()
            .collect(),
    };

    logging::debug(
        Domain::Filter,
        "applied",
        obj(&[
            ("filter", v_str(&spec.fingerprint())),
            ("enrollments", v_num(out.enrollments.len() as f64)),
            ("performances", v_num(out.performances.len() as f64)),
        ]),
    );
    out
}
