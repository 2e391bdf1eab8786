use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What to do with fact rows whose foreign keys do not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinPolicy {
    /// Exclude the row and count it in the join report.
    Drop,
    /// Fail the join.
    Strict,
}

impl JoinPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Some(JoinPolicy::Drop),
            "strict" => Some(JoinPolicy::Strict),
            _ => None,
        }
    }
}

/// Sizes for the synthetic constellation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SampleParams {
    pub students: usize,
    pub courses: usize,
    pub instructors: usize,
    pub assessments: usize,
    pub enrollments: usize,
    pub submissions: usize,
}

impl Default for SampleParams {
    fn default() -> Self {
        Self {
            students: 200,
            courses: 24,
            instructors: 8,
            assessments: 40,
            enrollments: 1500,
            submissions: 4000,
        }
    }
}

/// Where the eight CSV files are looked for when nothing else is configured.
pub const DEFAULT_DATA_DIR: &str = "./data";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub data_dir: PathBuf,
    pub sample_seed: u64,
    pub sample: SampleParams,
    /// Score percentage at or above which a submission counts as passed.
    pub pass_threshold: f64,
    pub join_policy: JoinPolicy,
    pub top_n: usize,
}

impl DashboardConfig {
    pub fn from_env() -> Self {
        let defaults = SampleParams::default();
        Self {
            data_dir: std::env::var("EDUDASH_DATA_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR)),
            sample_seed: std::env::var("EDUDASH_SAMPLE_SEED").ok().and_then(|v| v.parse().ok()).unwrap_or(42),
            sample: SampleParams {
                students: std::env::var("EDUDASH_SAMPLE_STUDENTS").ok().and_then(|v| v.parse().ok()).unwrap_or(defaults.students),
                courses: std::env::var("EDUDASH_SAMPLE_COURSES").ok().and_then(|v| v.parse().ok()).unwrap_or(defaults.courses),
                instructors: std::env::var("EDUDASH_SAMPLE_INSTRUCTORS").ok().and_then(|v| v.parse().ok()).unwrap_or(defaults.instructors),
                assessments: std::env::var("EDUDASH_SAMPLE_ASSESSMENTS").ok().and_then(|v| v.parse().ok()).unwrap_or(defaults.assessments),
                enrollments: std::env::var("EDUDASH_SAMPLE_ENROLLMENTS").ok().and_then(|v| v.parse().ok()).unwrap_or(defaults.enrollments),
                submissions: std::env::var("EDUDASH_SAMPLE_SUBMISSIONS").ok().and_then(|v| v.parse().ok()).unwrap_or(defaults.submissions),
            },
            pass_threshold: std::env::var("EDUDASH_PASS_THRESHOLD").ok().and_then(|v| v.parse().ok()).unwrap_or(60.0),
            join_policy: std::env::var("EDUDASH_JOIN_POLICY").ok().and_then(|v| JoinPolicy::parse(&v)).unwrap_or(JoinPolicy::Drop),
            top_n: std::env::var("EDUDASH_TOP_N").ok().and_then(|v| v.parse().ok()).unwrap_or(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_policy_parse() {
        assert_eq!(JoinPolicy::parse("drop"), Some(JoinPolicy::Drop));
        assert_eq!(JoinPolicy::parse(" STRICT "), Some(JoinPolicy::Strict));
        assert_eq!(JoinPolicy::parse("lenient"), None);
    }

    #[test]
    fn test_from_env_has_sane_defaults() {
        let cfg = DashboardConfig::from_env();
        assert!(cfg.pass_threshold > 0.0 && cfg.pass_threshold <= 100.0);
        assert!(cfg.top_n > 0);
        assert!(cfg.sample.students > 0);
        if std::env::var("EDUDASH_DATA_DIR").is_err() {
            assert_eq!(cfg.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
        }
    }
}
