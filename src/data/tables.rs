//! Row types for the eight constellation tables.
//!
//! Column names follow the CSV headers exactly; extra columns in a file are
//! ignored by the reader.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use super::{parse_bool, parse_date};

pub type Key = u64;

// =============================================================================
// Dimensions
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DimStudent {
    #[serde(deserialize_with = "de_key")]
    pub student_key: Key,
    pub student_name: String,
    pub membership_type: String,
    #[serde(deserialize_with = "de_date")]
    pub registration_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DimCourse {
    #[serde(deserialize_with = "de_key")]
    pub course_key: Key,
    pub course_title: String,
    pub level: String,
    #[serde(deserialize_with = "de_date")]
    pub created_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DimInstructor {
    #[serde(deserialize_with = "de_key")]
    pub instructor_key: Key,
    pub instructor_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DimCategory {
    #[serde(deserialize_with = "de_key")]
    pub category_key: Key,
    pub category_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DimDate {
    #[serde(deserialize_with = "de_key")]
    pub date_key: Key,
    #[serde(deserialize_with = "de_date")]
    pub full_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DimAssessment {
    #[serde(deserialize_with = "de_key")]
    pub assessment_key: Key,
    pub assessment_title: String,
    pub assessment_type: String,
    pub difficulty_level: String,
    #[serde(deserialize_with = "de_finite_f64")]
    pub max_score: f64,
}

// =============================================================================
// Facts
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FactEnrollment {
    #[serde(deserialize_with = "de_key")]
    pub enrollment_key: Key,
    #[serde(deserialize_with = "de_key")]
    pub student_key: Key,
    #[serde(deserialize_with = "de_key")]
    pub course_key: Key,
    #[serde(deserialize_with = "de_key")]
    pub instructor_key: Key,
    #[serde(deserialize_with = "de_key")]
    pub category_key: Key,
    #[serde(deserialize_with = "de_key")]
    pub enrollment_date_key: Key,
    #[serde(default, deserialize_with = "de_opt_key")]
    pub completion_date_key: Option<Key>,
    #[serde(deserialize_with = "de_finite_f64")]
    pub course_price: f64,
    #[serde(deserialize_with = "de_finite_f64")]
    pub progress_percentage: f64,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub days_to_complete: Option<f64>,
    pub completion_status: String,
    pub payment_status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FactAssessmentPerformance {
    #[serde(deserialize_with = "de_key")]
    pub performance_key: Key,
    #[serde(deserialize_with = "de_key")]
    pub student_key: Key,
    #[serde(deserialize_with = "de_key")]
    pub course_key: Key,
    #[serde(deserialize_with = "de_key")]
    pub assessment_key: Key,
    #[serde(deserialize_with = "de_key")]
    pub submission_date_key: Key,
    #[serde(deserialize_with = "de_finite_f64")]
    pub score_earned: f64,
    #[serde(deserialize_with = "de_finite_f64")]
    pub max_possible_score: f64,
    #[serde(deserialize_with = "de_finite_f64")]
    pub time_spent_minutes: f64,
    #[serde(deserialize_with = "de_key")]
    pub attempts_count: u64,
    #[serde(deserialize_with = "de_bool")]
    pub is_completed: bool,
}

/// All eight tables as read from disk (or generated).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTables {
    pub students: Vec<DimStudent>,
    pub courses: Vec<DimCourse>,
    pub instructors: Vec<DimInstructor>,
    pub categories: Vec<DimCategory>,
    pub dates: Vec<DimDate>,
    pub assessments: Vec<DimAssessment>,
    pub enrollments: Vec<FactEnrollment>,
    pub performances: Vec<FactAssessmentPerformance>,
}

// =============================================================================
// Cell deserializers
// =============================================================================

/// Integer keys, tolerating the `12.0` form spreadsheet exports produce.
fn parse_key(raw: &str) -> Result<Key, String> {
    let t = raw.trim();
    if let Ok(k) = t.parse::<Key>() {
        return Ok(k);
    }
    match t.parse::<f64>() {
        Ok(f) if f >= 0.0 && f.fract() == 0.0 => Ok(f as Key),
        _ => Err(format!("invalid key '{}'", raw)),
    }
}

fn is_null_cell(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "" | "nan" | "null" | "none" | "na"
    )
}

fn de_key<'de, D: Deserializer<'de>>(d: D) -> Result<Key, D::Error> {
    let raw = String::deserialize(d)?;
    parse_key(&raw).map_err(serde::de::Error::custom)
}

fn de_opt_key<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Key>, D::Error> {
    let raw = Option::<String>::deserialize(d)?.unwrap_or_default();
    if is_null_cell(&raw) {
        return Ok(None);
    }
    // A zero key marks "no completion" in some exports.
    match parse_key(&raw).map_err(serde::de::Error::custom)? {
        0 => Ok(None),
        k => Ok(Some(k)),
    }
}

fn parse_finite(raw: &str) -> Result<f64, String> {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(format!("invalid number '{}'", raw)),
    }
}

fn de_finite_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let raw = String::deserialize(d)?;
    parse_finite(&raw).map_err(serde::de::Error::custom)
}

fn de_opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let raw = Option::<String>::deserialize(d)?.unwrap_or_default();
    if is_null_cell(&raw) {
        return Ok(None);
    }
    parse_finite(&raw).map(Some).map_err(serde::de::Error::custom)
}

fn de_date<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
    let raw = String::deserialize(d)?;
    parse_date(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid date '{}'", raw)))
}

fn de_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    let raw = String::deserialize(d)?;
    parse_bool(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid boolean '{}'", raw)))
}
