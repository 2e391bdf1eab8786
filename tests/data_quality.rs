use edudash::data::{analyze_dataset, load_tables, validate_schema, LoadError, TableName};
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

fn write_all(dir: &Path) {
    let t = |name: TableName| name.path_in(dir);
    write_csv(
        &t(TableName::DimStudent),
        TableName::DimStudent.expected_columns(),
        &["1,Ana Silva,Premium,15/01/2024", "2,Ben Kim,Free,2024-02-01"],
    );
    write_csv(
        &t(TableName::DimDate),
        TableName::DimDate.expected_columns(),
        &["20240301,01/03/2024", "20240315,15/03/2024", "20240402,02/04/2024"],
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
        &["100,Lee Novak"],
    );
    write_csv(
        &t(TableName::FactEnrollment),
        TableName::FactEnrollment.expected_columns(),
        &[
            "1,1,10,100,1,20240301,20240402,99.99,100,32,Completed,Paid",
            "2,2,20,100,2,20240315,,149.99,40,,In Progress,Pending",
        ],
    );
    write_csv(
        &t(TableName::FactAssessmentPerformance),
        TableName::FactAssessmentPerformance.expected_columns(),
        &[
            "1,1,10,1,20240315,20,20,12,1,True",
            "2,2,20,2,20240402,45,100,80,2,False",
        ],
    );
}

#[test]
fn schema_accepts_good_header() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("DimCategory.csv");
    write_csv(&path, &["CategoryKey", "CategoryName", "Color"], &["1,Programming,blue"]);
    let report = validate_schema(&path, TableName::DimCategory).unwrap();
    assert!(report.ok);
    assert_eq!(report.extra, vec!["Color".to_string()]);
}

#[test]
fn schema_rejects_missing_column() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("DimCourse.csv");
    write_csv(&path, &["CourseKey", "CourseTitle"], &["1,Rust"]);
    let report = validate_schema(&path, TableName::DimCourse).unwrap();
    assert!(!report.ok);
    assert_eq!(report.missing, vec!["Level".to_string(), "CreatedDate".to_string()]);
}

#[test]
fn loads_complete_dataset() {
    let dir = TempDir::new().unwrap();
    write_all(dir.path());
    let raw = load_tables(dir.path()).unwrap();
    assert_eq!(raw.students.len(), 2);
    assert_eq!(raw.enrollments.len(), 2);
    assert_eq!(raw.enrollments[1].completion_date_key, None);
    assert!(raw.performances[0].is_completed);
    assert!(!raw.performances[1].is_completed);
}

#[test]
fn missing_file_is_typed_error() {
    let dir = TempDir::new().unwrap();
    write_all(dir.path());
    fs::remove_file(TableName::DimInstructor.path_in(dir.path())).unwrap();
    let err = load_tables(dir.path()).unwrap_err();
    assert!(matches!(err, LoadError::MissingFile { table: TableName::DimInstructor, .. }));
}

#[test]
fn bad_cell_reports_file() {
    let dir = TempDir::new().unwrap();
    write_all(dir.path());
    write_csv(
        &TableName::DimDate.path_in(dir.path()),
        TableName::DimDate.expected_columns(),
        &["20240301,not-a-date"],
    );
    let err = load_tables(dir.path()).unwrap_err();
    assert!(matches!(err, LoadError::Csv { .. }));
    assert!(err.to_string().contains("DimDate.csv"));
}

#[test]
fn two_digit_year_is_rejected() {
    let dir = TempDir::new().unwrap();
    write_all(dir.path());
    write_csv(
        &TableName::DimDate.path_in(dir.path()),
        TableName::DimDate.expected_columns(),
        &["20240301,01/03/24"],
    );
    let err = load_tables(dir.path()).unwrap_err();
    assert!(matches!(err, LoadError::Csv { .. }));
    assert!(err.to_string().contains("01/03/24"));
}

#[test]
fn non_finite_numbers_are_rejected() {
    let dir = TempDir::new().unwrap();
    write_all(dir.path());
    write_csv(
        &TableName::FactEnrollment.path_in(dir.path()),
        TableName::FactEnrollment.expected_columns(),
        &["1,1,10,100,1,20240301,20240402,nan,100,32,Completed,Paid"],
    );
    let err = load_tables(dir.path()).unwrap_err();
    assert!(matches!(err, LoadError::Csv { .. }));
    assert!(err.to_string().contains("FactEnrollment.csv"));

    write_all(dir.path());
    write_csv(
        &TableName::FactAssessmentPerformance.path_in(dir.path()),
        TableName::FactAssessmentPerformance.expected_columns(),
        &["1,1,10,1,20240315,inf,20,12,1,True"],
    );
    let err = load_tables(dir.path()).unwrap_err();
    assert!(matches!(err, LoadError::Csv { .. }));
}

#[test]
fn duplicate_dimension_key_rejected() {
    let dir = TempDir::new().unwrap();
    write_all(dir.path());
    write_csv(
        &TableName::DimCategory.path_in(dir.path()),
        TableName::DimCategory.expected_columns(),
        &["1,Programming", "1,Design"],
    );
    let err = load_tables(dir.path()).unwrap_err();
    assert!(matches!(err, LoadError::DuplicateKey { table: TableName::DimCategory, key: 1 }));
}

#[test]
fn manifest_lists_every_file() {
    let dir = TempDir::new().unwrap();
    write_all(dir.path());
    fs::remove_file(TableName::DimDate.path_in(dir.path())).unwrap();
    let manifest = analyze_dataset(dir.path());
    assert_eq!(manifest.files.len(), 8);
    assert!(!manifest.complete);
    let date = manifest.files.iter().find(|f| f.table == TableName::DimDate).unwrap();
    assert!(!date.present);
    let student = manifest.files.iter().find(|f| f.table == TableName::DimStudent).unwrap();
    assert_eq!(student.row_count, 2);
    assert_eq!(student.hash_sha256.as_ref().map(|h| h.len()), Some(64));
}
