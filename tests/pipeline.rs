//! End-to-end: CSV files on disk -> joined tables -> filters -> views.

use chrono::NaiveDate;
use edudash::config::{DashboardConfig, JoinPolicy};
use edudash::data::TableName;
use edudash::dataset::{load_dir, load_or_sample, DataSource};
use edudash::filter::FilterSpec;
use edudash::views::Dashboard;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_csv(path: &Path, header: &[&str], rows: &[&str]) {
    let mut out = String::new();
    out.push_str(&header.join(","));
    out.push('\n');
    for row in rows {
        out.push_str(row);
        out.push('\n');
    }
    fs::write(path, out).unwrap();
}

fn write_dataset(dir: &Path, enrollments: &[&str], performances: &[&str]) {
    let t = |name: TableName| name.path_in(dir);
    write_csv(
        &t(TableName::DimStudent),
        TableName::DimStudent.expected_columns(),
        &["1,Ana Silva,Premium,15/01/2024", "2,Ben Kim,Free,01/02/2024", "3,Chloe Ito,Basic,01/02/2024"],
    );
    write_csv(
        &t(TableName::DimDate),
        TableName::DimDate.expected_columns(),
        &[
            "20240110,10/01/2024",
            "20240215,15/02/2024",
            "20240301,01/03/2024",
            "20240320,20/03/2024",
            "20240402,02/04/2024",
        ],
    );
    write_csv(
        &t(TableName::DimAssessment),
        TableName::DimAssessment.expected_columns(),
        &["1,Quiz 1,Quiz,Easy,20", "2,Final,Exam,Hard,100"],
    );
    write_csv(
        &t(TableName::DimCategory),
        TableName::DimCategory.expected_columns(),
        &["1,Programming", "2,Design"],
    );
    write_csv(
        &t(TableName::DimCourse),
        TableName::DimCourse.expected_columns(),
        &["10,Rust Foundations,Beginner,01/01/2024", "20,Color Theory,Advanced,01/01/2024"],
    );
    write_csv(
        &t(TableName::DimInstructor),
        TableName::DimInstructor.expected_columns(),
        &["100,Lee Novak", "200,Mia Rossi"],
    );
    write_csv(&t(TableName::FactEnrollment), TableName::FactEnrollment.expected_columns(), enrollments);
    write_csv(
        &t(TableName::FactAssessmentPerformance),
        TableName::FactAssessmentPerformance.expected_columns(),
        performances,
    );
}

const ENROLLMENTS: &[&str] = &[
    "1,1,10,100,1,20240110,20240301,100,100,51,Completed,Paid",
    "2,2,10,100,1,20240215,,100,40,,In Progress,Pending",
    "3,2,20,200,2,20240301,,200,10,,Dropped,Refunded",
    "4,3,20,200,2,20240320,20240402,200,100,13,Completed,Paid",
];

const PERFORMANCES: &[&str] = &[
    "1,1,10,1,20240215,20,20,10,1,true",
    "2,2,10,1,20240301,10,20,15,2,true",
    "3,2,20,2,20240320,30,100,60,3,false",
    "4,3,20,2,20240402,90,100,70,1,true",
];

fn config(dir: &Path) -> DashboardConfig {
    let mut cfg = DashboardConfig::from_env();
    cfg.data_dir = dir.to_path_buf();
    cfg.pass_threshold = 60.0;
    cfg.join_policy = JoinPolicy::Drop;
    cfg
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[test]
fn files_load_and_join_completely() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path(), ENROLLMENTS, PERFORMANCES);
    let ds = load_or_sample(&config(dir.path())).unwrap();
    assert!(matches!(ds.source, DataSource::Files { .. }));
    assert!(ds.report.is_complete());
    assert_eq!(ds.tables.enrollments.len(), 4);
    assert_eq!(ds.tables.performances.len(), 4);
    let first = &ds.tables.performances[0];
    assert_eq!(first.score_percentage(), Some(100.0));
}

#[test]
fn enrollment_kpis_from_files() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path(), ENROLLMENTS, PERFORMANCES);
    let cfg = config(dir.path());
    let ds = load_dir(dir.path(), &cfg).unwrap();
    let dash = Dashboard::build(&ds.tables, &FilterSpec::default(), &cfg);
    let k = &dash.enrollment.kpis;
    assert_eq!(k.total_enrollments, 4);
    assert_eq!(k.unique_students, 3);
    assert_eq!(k.total_revenue, 300.0);
    assert_eq!(k.gross_bookings, 600.0);
    assert_eq!(k.completion_rate, 50.0);
    assert_eq!(k.avg_days_to_complete, 32.0);
    assert_eq!(dash.enrollment.monthly_enrollments.len(), 3);
}

#[test]
fn performance_kpis_from_files() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path(), ENROLLMENTS, PERFORMANCES);
    let cfg = config(dir.path());
    let ds = load_dir(dir.path(), &cfg).unwrap();
    let dash = Dashboard::build(&ds.tables, &FilterSpec::default(), &cfg);
    let k = &dash.performance.kpis;
    assert_eq!(k.submissions, 4);
    // 100, 50, 30, 90
    assert_eq!(k.avg_score_pct, 67.5);
    assert_eq!(k.pass_rate, 50.0);
    assert_eq!(k.completion_rate, 75.0);
    let premium = dash
        .performance
        .success_by_membership
        .iter()
        .find(|s| s.segment == "Premium")
        .unwrap();
    assert_eq!((premium.attempts, premium.passes), (1, 1));
}

#[test]
fn filters_apply_consistently_to_both_tables() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path(), ENROLLMENTS, PERFORMANCES);
    let cfg = config(dir.path());
    let ds = load_dir(dir.path(), &cfg).unwrap();

    let mut spec = FilterSpec::default();
    spec.categories.insert("Design".into());
    spec.statuses.insert("Completed".into());
    let dash = Dashboard::build(&ds.tables, &spec, &cfg);
    assert_eq!(dash.enrollment.kpis.total_enrollments, 1);
    // Only student 3's submission in course 20 has a completed Design enrollment.
    assert_eq!(dash.performance.kpis.submissions, 1);
    assert_eq!(dash.performance.kpis.avg_score_pct, 90.0);

    let window = FilterSpec::default().with_range(d(2024, 3, 1), d(2024, 3, 31));
    let dash = Dashboard::build(&ds.tables, &window, &cfg);
    assert_eq!(dash.enrollment.kpis.total_enrollments, 2);
    assert_eq!(dash.performance.kpis.submissions, 2);
}

#[test]
fn orphans_are_dropped_and_reported() {
    let dir = TempDir::new().unwrap();
    let mut enrollments = ENROLLMENTS.to_vec();
    enrollments.push("5,99,10,100,1,20240110,,100,0,,Dropped,Refunded");
    write_dataset(dir.path(), &enrollments, PERFORMANCES);
    let ds = load_or_sample(&config(dir.path())).unwrap();
    assert!(matches!(ds.source, DataSource::Files { .. }));
    assert_eq!(ds.tables.enrollments.len(), 4);
    assert_eq!(ds.report.orphans.get("FactEnrollment->DimStudent"), Some(&1));
}

#[test]
fn strict_orphans_fall_back_to_sample() {
    let dir = TempDir::new().unwrap();
    let mut performances = PERFORMANCES.to_vec();
    performances.push("5,1,10,7,20240110,5,20,5,1,true");
    write_dataset(dir.path(), ENROLLMENTS, &performances);
    let mut cfg = config(dir.path());
    cfg.join_policy = JoinPolicy::Strict;
    cfg.sample.enrollments = 50;
    cfg.sample.submissions = 80;
    let ds = load_or_sample(&cfg).unwrap();
    match &ds.source {
        DataSource::Sample { reason, .. } => assert!(reason.contains("DimAssessment"), "{}", reason),
        other => panic!("expected sample fallback, got {:?}", other),
    }
}

#[test]
fn missing_directory_falls_back_to_sample() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(&dir.path().join("nope"));
    cfg.sample.enrollments = 40;
    cfg.sample.submissions = 60;
    let ds = load_or_sample(&cfg).unwrap();
    assert!(ds.source.is_sample());
    assert!(ds.report.is_complete());
    assert_eq!(ds.tables.enrollments.len(), 40);
    assert_eq!(ds.tables.performances.len(), 60);
}
