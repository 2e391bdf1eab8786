use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::tables::{Key, RawTables};
use super::{check_columns, read_header, TableName};
use crate::logging::{self, obj, v_num, v_str, Domain, ProfileScope};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{table} not found at {}", path.display())]
    MissingFile { table: TableName, path: PathBuf },
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: {source}", path.display())]
    Csv {
        path: PathBuf,
        line: Option<u64>,
        #[source]
        source: csv::Error,
    },
    #[error("{table}: missing columns {missing:?}")]
    Schema { table: TableName, missing: Vec<String> },
    #[error("{table}: duplicate primary key {key}")]
    DuplicateKey { table: TableName, key: Key },
}

impl LoadError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        LoadError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn from_csv(path: &Path, source: csv::Error) -> Self {
        LoadError::Csv {
            path: path.to_path_buf(),
            line: source.position().map(|p| p.line()),
            source,
        }
    }
}

fn read_table<T: DeserializeOwned>(dir: &Path, table: TableName) -> Result<Vec<T>, LoadError> {
    let path = table.path_in(dir);
    if !path.is_file() {
        return Err(LoadError::MissingFile { table, path });
    }

    let schema = check_columns(table, read_header(&path)?);
    if !schema.ok {
        return Err(LoadError::Schema {
            table,
            missing: schema.missing,
        });
    }
    if !schema.extra.is_empty() {
        logging::debug(
            Domain::Load,
            "extra_columns",
            obj(&[
                ("table", v_str(table.file_name())),
                ("columns", v_str(&schema.extra.join(","))),
            ]),
        );
    }

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(&path)
        .map_err(|e| LoadError::from_csv(&path, e))?;
    let mut rows = Vec::new();
    for rec in rdr.deserialize::<T>() {
        rows.push(rec.map_err(|e| LoadError::from_csv(&path, e))?);
    }

    logging::info(
        Domain::Load,
        "table_loaded",
        obj(&[
            ("table", v_str(table.file_name())),
            ("rows", v_num(rows.len() as f64)),
        ]),
    );
    Ok(rows)
}

fn ensure_unique<T>(table: TableName, rows: &[T], key: impl Fn(&T) -> Key) -> Result<(), LoadError> {
    let mut seen = HashSet::with_capacity(rows.len());
    for row in rows {
        let k = key(row);
        if !seen.insert(k) {
            return Err(LoadError::DuplicateKey { table, key: k });
        }
    }
    Ok(())
}

/// Read all eight tables from `dir`. Every file must exist, carry the
/// expected columns, and parse completely.
pub fn load_tables(dir: &Path) -> Result<RawTables, LoadError> {
    let _scope = ProfileScope::with_context("load_tables", &[("dir", v_str(&dir.display().to_string()))]);

    let raw = RawTables {
        students: read_table(dir, TableName::DimStudent)?,
        dates: read_table(dir, TableName::DimDate)?,
        assessments: read_table(dir, TableName::DimAssessment)?,
        categories: read_table(dir, TableName::DimCategory)?,
        courses: read_table(dir, TableName::DimCourse)?,
        instructors: read_table(dir, TableName::DimInstructor)?,
        enrollments: read_table(dir, TableName::FactEnrollment)?,
        performances: read_table(dir, TableName::FactAssessmentPerformance)?,
    };

    ensure_unique(TableName::DimStudent, &raw.students, |r| r.student_key)?;
    ensure_unique(TableName::DimDate, &raw.dates, |r| r.date_key)?;
    ensure_unique(TableName::DimAssessment, &raw.assessments, |r| r.assessment_key)?;
    ensure_unique(TableName::DimCategory, &raw.categories, |r| r.category_key)?;
    ensure_unique(TableName::DimCourse, &raw.courses, |r| r.course_key)?;
    ensure_unique(TableName::DimInstructor, &raw.instructors, |r| r.instructor_key)?;

    Ok(raw)
}
