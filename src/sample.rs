//! Seeded synthetic constellation, substituted when the CSV files cannot be
//! used. Every foreign key it emits resolves, so it joins without orphans.

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

use crate::config::SampleParams;
use crate::data::tables::{
    DimAssessment, DimCategory, DimCourse, DimDate, DimInstructor, DimStudent,
    FactAssessmentPerformance, FactEnrollment, Key, RawTables,
};
use crate::logging::{self, obj, v_num, Domain};

const FIRST_NAMES: [&str; 16] = [
    "Ana", "Ben", "Chloe", "Dev", "Elif", "Farah", "Goran", "Hana", "Ivan", "Jun", "Kofi", "Lena",
    "Mateo", "Nadia", "Omar", "Priya",
];
const LAST_NAMES: [&str; 12] = [
    "Silva", "Okafor", "Kim", "Novak", "Haddad", "Larsen", "Mensah", "Ito", "Rossi", "Petrov",
    "Garcia", "Singh",
];
const CATEGORIES: [&str; 6] = ["Programming", "Data Science", "Design", "Business", "Marketing", "Languages"];
const TOPICS: [&str; 8] = [
    "Foundations", "Workshop", "Bootcamp", "Masterclass", "Essentials", "Deep Dive", "Lab", "Studio",
];
const MEMBERSHIPS: [(&str, u32); 3] = [("Free", 45), ("Basic", 35), ("Premium", 20)];
const LEVELS: [&str; 3] = ["Beginner", "Intermediate", "Advanced"];
const ASSESSMENT_TYPES: [(&str, f64); 4] = [("Quiz", 20.0), ("Assignment", 50.0), ("Exam", 100.0), ("Project", 100.0)];
const DIFFICULTIES: [(&str, f64); 3] = [("Easy", 0.08), ("Medium", 0.0), ("Hard", -0.12)];

/// Last day covered by generated dates. Fixed so output only depends on the seed.
pub fn anchor_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 12, 31).unwrap_or_default()
}

pub fn date_key(d: NaiveDate) -> Key {
    use chrono::Datelike;
    (d.year() as Key) * 10_000 + (d.month() as Key) * 100 + d.day() as Key
}

fn weighted<'a, R: Rng>(rng: &mut R, choices: &[(&'a str, u32)]) -> &'a str {
    let total: u32 = choices.iter().map(|(_, w)| w).sum();
    let mut pick = rng.gen_range(0..total.max(1));
    for (name, w) in choices {
        if pick < *w {
            return *name;
        }
        pick -= w;
    }
    choices[0].0
}

fn round_price(x: f64) -> f64 {
    x.floor() + 0.99
}

pub fn generate(params: &SampleParams, seed: u64) -> RawTables {
    let mut rng = StdRng::seed_from_u64(seed);
    let anchor = anchor_date();
    let first_day = anchor - Duration::days(729);

    let dates: Vec<DimDate> = (0..730)
        .map(|i| {
            let d = first_day + Duration::days(i);
            DimDate {
                date_key: date_key(d),
                full_date: d,
            }
        })
        .collect();
    // Facts only reference the final year; registrations may be older.
    let fact_start = anchor - Duration::days(364);

    let categories: Vec<DimCategory> = CATEGORIES
        .iter()
        .enumerate()
        .map(|(i, name)| DimCategory {
            category_key: i as Key + 1,
            category_name: name.to_string(),
        })
        .collect();

    let instructors: Vec<DimInstructor> = (0..params.instructors.max(1))
        .map(|i| DimInstructor {
            instructor_key: i as Key + 1,
            instructor_name: format!(
                "{} {}",
                FIRST_NAMES[(i * 7 + 3) % FIRST_NAMES.len()],
                LAST_NAMES[(i * 5 + 1) % LAST_NAMES.len()]
            ),
        })
        .collect();

    let students: Vec<DimStudent> = (0..params.students.max(1))
        .map(|i| DimStudent {
            student_key: i as Key + 1,
            student_name: format!(
                "{} {}",
                FIRST_NAMES[rng.gen_range(0..FIRST_NAMES.len())],
                LAST_NAMES[rng.gen_range(0..LAST_NAMES.len())]
            ),
            membership_type: weighted(&mut rng, &MEMBERSHIPS).to_string(),
            registration_date: first_day + Duration::days(rng.gen_range(0..600)),
        })
        .collect();

    // course -> (category, instructor) so enrollments stay consistent
    let mut course_links: HashMap<Key, (Key, Key)> = HashMap::new();
    let courses: Vec<DimCourse> = (0..params.courses.max(1))
        .map(|i| {
            let category = &categories[i % categories.len()];
            let instructor = &instructors[rng.gen_range(0..instructors.len())];
            let key = i as Key + 1;
            course_links.insert(key, (category.category_key, instructor.instructor_key));
            DimCourse {
                course_key: key,
                course_title: format!(
                    "{} {}",
                    category.category_name,
                    TOPICS[(i / categories.len()) % TOPICS.len()]
                ),
                level: LEVELS[rng.gen_range(0..LEVELS.len())].to_string(),
                created_date: first_day + Duration::days(rng.gen_range(0..300)),
            }
        })
        .collect();

    let assessments: Vec<DimAssessment> = (0..params.assessments.max(1))
        .map(|i| {
            let (kind, max) = ASSESSMENT_TYPES[i % ASSESSMENT_TYPES.len()];
            let (difficulty, _) = DIFFICULTIES[rng.gen_range(0..DIFFICULTIES.len())];
            DimAssessment {
                assessment_key: i as Key + 1,
                assessment_title: format!("{} {}", kind, i / ASSESSMENT_TYPES.len() + 1),
                assessment_type: kind.to_string(),
                difficulty_level: difficulty.to_string(),
                max_score: max,
            }
        })
        .collect();

    let mut enrollments = Vec::with_capacity(params.enrollments);
    let mut enrolled_on = Vec::with_capacity(params.enrollments);
    for i in 0..params.enrollments {
        let student = &students[rng.gen_range(0..students.len())];
        let course = &courses[rng.gen_range(0..courses.len())];
        let (category_key, instructor_key) = course_links[&course.course_key];
        let enrolled = fact_start + Duration::days(rng.gen_range(0..365));

        let base_price = match course.level.as_str() {
            "Beginner" => rng.gen_range(29.0..79.0),
            "Intermediate" => rng.gen_range(59.0..129.0),
            _ => rng.gen_range(99.0..199.0),
        };

        let roll: f64 = rng.gen();
        let mut status = if roll < 0.55 {
            "Completed"
        } else if roll < 0.85 {
            "In Progress"
        } else {
            "Dropped"
        };
        let mut completion_date_key = None;
        let mut days_to_complete = None;
        let mut progress = match status {
            "In Progress" => rng.gen_range(5.0..95.0_f64).round(),
            "Dropped" => rng.gen_range(0.0..60.0_f64).round(),
            _ => 100.0,
        };
        if status == "Completed" {
            let days = rng.gen_range(5..120);
            let done = enrolled + Duration::days(days);
            if done <= anchor {
                completion_date_key = Some(date_key(done));
                days_to_complete = Some(days as f64);
            } else {
                status = "In Progress";
                progress = rng.gen_range(50.0..95.0_f64).round();
            }
        }

        let pay_roll: f64 = rng.gen();
        let refund_cut = if status == "Dropped" { 0.30 } else { 0.03 };
        let payment = if pay_roll < refund_cut {
            "Refunded"
        } else if pay_roll < refund_cut + 0.10 {
            "Pending"
        } else {
            "Paid"
        };

        enrolled_on.push(enrolled);
        enrollments.push(FactEnrollment {
            enrollment_key: i as Key + 1,
            student_key: student.student_key,
            course_key: course.course_key,
            instructor_key,
            category_key,
            enrollment_date_key: date_key(enrolled),
            completion_date_key,
            course_price: round_price(base_price),
            progress_percentage: progress,
            days_to_complete,
            completion_status: status.to_string(),
            payment_status: payment.to_string(),
        });
    }

    // Per-student ability drives scores so the correlation view has signal.
    let ability: HashMap<Key, f64> = students
        .iter()
        .map(|s| {
            let a: f64 = (rng.gen::<f64>() + rng.gen::<f64>() + rng.gen::<f64>()) / 3.0;
            (s.student_key, 0.45 + a * 0.5)
        })
        .collect();
    let difficulty_shift: HashMap<&str, f64> = DIFFICULTIES.iter().copied().collect();

    let mut performances = Vec::with_capacity(params.submissions);
    if !enrollments.is_empty() {
        for i in 0..params.submissions {
            let idx = rng.gen_range(0..enrollments.len());
            let enrollment = &enrollments[idx];
            let enrolled = enrolled_on[idx];
            let assessment = &assessments[rng.gen_range(0..assessments.len())];
            let window = (anchor - enrolled).num_days().clamp(0, 90);
            let submitted = enrolled + Duration::days(rng.gen_range(0..=window));

            let progress_boost = enrollment.progress_percentage / 100.0 * 0.1;
            let shift = difficulty_shift
                .get(assessment.difficulty_level.as_str())
                .copied()
                .unwrap_or(0.0);
            let noise = rng.gen_range(-0.15..0.15);
            let frac = (ability[&enrollment.student_key] + shift + progress_boost + noise).clamp(0.0, 1.0);
            let max = assessment.max_score;
            let score = (frac * max * 2.0).round() / 2.0;

            let base_minutes = match assessment.assessment_type.as_str() {
                "Quiz" => 15.0,
                "Assignment" => 60.0,
                "Exam" => 90.0,
                _ => 150.0,
            };
            performances.push(FactAssessmentPerformance {
                performance_key: i as Key + 1,
                student_key: enrollment.student_key,
                course_key: enrollment.course_key,
                assessment_key: assessment.assessment_key,
                submission_date_key: date_key(submitted),
                score_earned: score.min(max),
                max_possible_score: max,
                time_spent_minutes: (base_minutes * rng.gen_range(0.5..1.8_f64)).round(),
                attempts_count: rng.gen_range(1..=3),
                is_completed: rng.gen::<f64>() < 0.92,
            });
        }
    }

    logging::info(
        Domain::Sample,
        "generated",
        obj(&[
            ("seed", v_num(seed as f64)),
            ("students", v_num(students.len() as f64)),
            ("enrollments", v_num(enrollments.len() as f64)),
            ("performances", v_num(performances.len() as f64)),
        ]),
    );

    RawTables {
        students,
        courses,
        instructors,
        categories,
        dates,
        assessments,
        enrollments,
        performances,
    }
}
