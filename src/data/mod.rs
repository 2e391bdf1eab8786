pub mod loader;
pub mod tables;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

pub use loader::{load_tables, LoadError};
pub use tables::RawTables;

/// The eight files of the constellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TableName {
    DimStudent,
    DimDate,
    DimAssessment,
    DimCategory,
    DimCourse,
    DimInstructor,
    FactEnrollment,
    FactAssessmentPerformance,
}

impl TableName {
    pub const ALL: [TableName; 8] = [
        TableName::DimStudent,
        TableName::DimDate,
        TableName::DimAssessment,
        TableName::DimCategory,
        TableName::DimCourse,
        TableName::DimInstructor,
        TableName::FactEnrollment,
        TableName::FactAssessmentPerformance,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            TableName::DimStudent => "DimStudent.csv",
            TableName::DimDate => "DimDate.csv",
            TableName::DimAssessment => "DimAssessment.csv",
            TableName::DimCategory => "DimCategory.csv",
            TableName::DimCourse => "DimCourse.csv",
            TableName::DimInstructor => "DimInstructor.csv",
            TableName::FactEnrollment => "FactEnrollment.csv",
            TableName::FactAssessmentPerformance => "FactAssessmentPerformance.csv",
        }
    }

    pub fn expected_columns(&self) -> &'static [&'static str] {
        match self {
            TableName::DimStudent => &["StudentKey", "StudentName", "MembershipType", "RegistrationDate"],
            TableName::DimDate => &["DateKey", "FullDate"],
            TableName::DimAssessment => &[
                "AssessmentKey",
                "AssessmentTitle",
                "AssessmentType",
                "DifficultyLevel",
                "MaxScore",
            ],
            TableName::DimCategory => &["CategoryKey", "CategoryName"],
            TableName::DimCourse => &["CourseKey", "CourseTitle", "Level", "CreatedDate"],
            TableName::DimInstructor => &["InstructorKey", "InstructorName"],
            TableName::FactEnrollment => &[
                "EnrollmentKey",
                "StudentKey",
                "CourseKey",
                "InstructorKey",
                "CategoryKey",
                "EnrollmentDateKey",
                "CompletionDateKey",
                "CoursePrice",
                "ProgressPercentage",
                "DaysToComplete",
                "CompletionStatus",
                "PaymentStatus",
            ],
            TableName::FactAssessmentPerformance => &[
                "PerformanceKey",
                "StudentKey",
                "CourseKey",
                "AssessmentKey",
                "SubmissionDateKey",
                "ScoreEarned",
                "MaxPossibleScore",
                "TimeSpentMinutes",
                "AttemptsCount",
                "IsCompleted",
            ],
        }
    }

    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.file_name())
    }
}

// =============================================================================
// Cell parsing
// =============================================================================

const DATE_FORMATS: [&str; 5] = ["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y-%m-%d", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 4] = [
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// `%Y` takes any number of digits, so `05/03/24` would otherwise land in year 24.
fn four_digit_year(d: NaiveDate) -> Option<NaiveDate> {
    (d.year() >= 1000).then_some(d)
}

/// Day-first date parsing with ISO fallback. Years must have four digits.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let t = raw.trim();
    if t.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Some(d) = NaiveDate::parse_from_str(t, fmt).ok().and_then(four_digit_year) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Some(d) = NaiveDateTime::parse_from_str(t, fmt).ok().and_then(|dt| four_digit_year(dt.date())) {
            return Some(d);
        }
    }
    // Compact yyyymmdd, the same shape as a DateKey.
    if t.len() == 8 && t.bytes().all(|b| b.is_ascii_digit()) {
        let y = t[0..4].parse().ok()?;
        let m = t[4..6].parse().ok()?;
        let d = t[6..8].parse().ok()?;
        return NaiveDate::from_ymd_opt(y, m, d).and_then(four_digit_year);
    }
    None
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "t" | "1.0" => Some(true),
        "false" | "0" | "no" | "n" | "f" | "0.0" => Some(false),
        _ => None,
    }
}

// =============================================================================
// Schema checks and manifest
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaReport {
    pub table: TableName,
    pub columns: Vec<String>,
    pub missing: Vec<String>,
    pub extra: Vec<String>,
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileManifest {
    pub table: TableName,
    pub path: String,
    pub present: bool,
    pub hash_sha256: Option<String>,
    pub row_count: u64,
    pub schema: Option<SchemaReport>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetManifest {
    pub dir: String,
    pub files: Vec<FileManifest>,
    pub complete: bool,
    pub generated_at: String,
}

pub fn read_header(path: &Path) -> Result<Vec<String>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| LoadError::from_csv(path, e))?;
    let header = rdr.headers().map_err(|e| LoadError::from_csv(path, e))?;
    Ok(header
        .iter()
        .map(|s| s.trim_start_matches('\u{feff}').to_string())
        .collect())
}

pub fn check_columns(table: TableName, columns: Vec<String>) -> SchemaReport {
    let expected = table.expected_columns();
    let missing: Vec<String> = expected
        .iter()
        .filter(|c| !columns.iter().any(|h| h == *c))
        .map(|c| c.to_string())
        .collect();
    let extra: Vec<String> = columns
        .iter()
        .filter(|h| !expected.contains(&h.as_str()))
        .cloned()
        .collect();
    let ok = missing.is_empty();
    let message = if ok {
        "schema ok".to_string()
    } else {
        format!("{}: missing columns {:?}", table, missing)
    };
    SchemaReport {
        table,
        columns,
        missing,
        extra,
        ok,
        message,
    }
}

pub fn validate_schema(path: &Path, table: TableName) -> Result<SchemaReport, LoadError> {
    let header = read_header(path)?;
    Ok(check_columns(table, header))
}

pub fn file_sha256(path: &Path) -> Result<String, LoadError> {
    let mut file = File::open(path).map_err(|e| LoadError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf).map_err(|e| LoadError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn count_records(path: &Path) -> Result<u64, LoadError> {
    let mut rdr = csv::Reader::from_path(path).map_err(|e| LoadError::from_csv(path, e))?;
    let mut n = 0u64;
    for rec in rdr.records() {
        rec.map_err(|e| LoadError::from_csv(path, e))?;
        n += 1;
    }
    Ok(n)
}

/// Inspect every expected file in `dir` without loading rows into tables.
pub fn analyze_dataset(dir: &Path) -> DatasetManifest {
    let mut files = Vec::with_capacity(TableName::ALL.len());
    for table in TableName::ALL {
        let path = table.path_in(dir);
        let mut entry = FileManifest {
            table,
            path: path.display().to_string(),
            present: path.is_file(),
            hash_sha256: None,
            row_count: 0,
            schema: None,
            warnings: Vec::new(),
        };
        if !entry.present {
            entry.warnings.push("missing_file".to_string());
            files.push(entry);
            continue;
        }
        match file_sha256(&path) {
            Ok(h) => entry.hash_sha256 = Some(h),
            Err(e) => entry.warnings.push(format!("hash_failed: {}", e)),
        }
        match validate_schema(&path, table) {
            Ok(report) => {
                if !report.ok {
                    entry.warnings.push(report.message.clone());
                }
                if !report.extra.is_empty() {
                    entry.warnings.push(format!("extra_columns: {:?}", report.extra));
                }
                entry.schema = Some(report);
            }
            Err(e) => entry.warnings.push(format!("schema_failed: {}", e)),
        }
        match count_records(&path) {
            Ok(n) => entry.row_count = n,
            Err(e) => entry.warnings.push(format!("bad_rows: {}", e)),
        }
        files.push(entry);
    }
    let complete = files
        .iter()
        .all(|f| f.present && f.schema.as_ref().map(|s| s.ok).unwrap_or(false));
    DatasetManifest {
        dir: dir.display().to_string(),
        files,
        complete,
        generated_at: crate::logging::ts_now(),
    }
}

pub fn default_manifest_path(dir: &Path) -> PathBuf {
    dir.join("manifest.json")
}
