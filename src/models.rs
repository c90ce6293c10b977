use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::grading::Grade;

#[derive(Debug, Clone)]
pub struct Student {
    pub id: Uuid,
    pub nim: String,
    pub full_name: String,
}

/// An academic term such as `"5"` or `"3 (Fast Track)"`.
///
/// Parsed once from the free-text label; the leading integer orders and
/// groups periods, the qualifier only distinguishes labels sharing an ordinal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    pub ordinal: u32,
    pub qualifier: Option<String>,
}

impl Period {
    pub fn new(ordinal: u32) -> Self {
        Self {
            ordinal,
            qualifier: None,
        }
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let text = raw.trim();
        let digits_end = text
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(text.len());
        if digits_end == 0 {
            return Err(format!("period label '{raw}' has no leading number"));
        }
        let ordinal: u32 = text[..digits_end]
            .parse()
            .map_err(|_| format!("period label '{raw}' is out of range"))?;

        let rest = text[digits_end..].trim();
        let rest = rest
            .strip_prefix('(')
            .and_then(|inner| inner.strip_suffix(')'))
            .unwrap_or(rest)
            .trim();
        let qualifier = (!rest.is_empty()).then(|| rest.to_string());

        Ok(Self { ordinal, qualifier })
    }
}

impl TryFrom<String> for Period {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.to_string()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{} ({})", self.ordinal, qualifier),
            None => write!(f, "{}", self.ordinal),
        }
    }
}

/// Normalized course identity: trimmed, inner whitespace collapsed, case-folded.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CourseKey(String);

impl CourseKey {
    pub fn new(course_name: &str) -> Self {
        let folded = course_name
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        Self(folded)
    }
}

/// Study pathway selecting which default course plan applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Track {
    #[default]
    #[serde(alias = "Reguler", alias = "Regular")]
    Regular,
    #[serde(alias = "Fast Track")]
    FastTrack,
}

impl Track {
    pub fn as_str(&self) -> &'static str {
        match self {
            Track::Regular => "regular",
            Track::FastTrack => "fast-track",
        }
    }
}

impl FromStr for Track {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let folded = raw.trim().to_lowercase().replace(['_', ' '], "-");
        match folded.as_str() {
            "regular" | "reguler" => Ok(Track::Regular),
            "fast-track" | "fasttrack" => Ok(Track::FastTrack),
            _ => Err(format!("unknown study track '{raw}'")),
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finalized result from the grade ledger. The engine never writes these.
#[derive(Debug, Clone)]
pub struct GradeRecord {
    pub student_id: Uuid,
    pub course_id: Option<Uuid>,
    pub course_name: String,
    pub credit_weight: u32,
    pub grade: Grade,
    pub period: Period,
}

/// Hypothetical result as the caller supplied it; this is the persisted form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedCourseEntry {
    pub course_name: String,
    pub credit_weight: u32,
    pub grade: String,
}

/// A simulated entry whose grade has been resolved against the scale.
#[derive(Debug, Clone)]
pub struct SimulatedCourse {
    pub key: CourseKey,
    pub course_name: String,
    pub credit_weight: u32,
    pub grade: Grade,
}

impl SimulatedCourse {
    pub fn to_entry(&self) -> SimulatedCourseEntry {
        SimulatedCourseEntry {
            course_name: self.course_name.clone(),
            credit_weight: self.credit_weight,
            grade: self.grade.label.clone(),
        }
    }
}

/// A calculation request that passed every validation check.
#[derive(Debug, Clone)]
pub struct CalculateRequest {
    pub target_period: u32,
    pub track: Track,
    pub courses: Vec<SimulatedCourse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedSummary {
    pub period_average: f64,
    pub cumulative_average: f64,
    pub credit_weight_taken: u32,
    pub credit_weight_passed: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSession {
    pub student_id: Uuid,
    pub target_period: u32,
    pub track: Track,
    pub entries: Vec<SimulatedCourseEntry>,
    pub last_calculated: CachedSummary,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodStats {
    pub credit_weight_taken: u32,
    pub credit_weight_passed: u32,
    pub period_average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CumulativeStats {
    pub total_credit_weight_taken: u32,
    pub total_credit_weight_passed: u32,
    pub cumulative_average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub period: String,
    pub period_average: f64,
    pub cumulative_average_as_of: f64,
    pub is_hypothetical: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub period_stats: PeriodStats,
    pub cumulative_stats: CumulativeStats,
    pub trend: Vec<TrendPoint>,
}

/// Catalog metadata used to prefill the simulation form.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseMeta {
    pub id: Uuid,
    pub name: String,
    pub name_en: Option<String>,
    pub credit_weight: u32,
    pub level: String,
    pub status: Option<String>,
    pub semester_regular: Option<u32>,
    pub semester_fast_track: Option<u32>,
    pub semester_legacy: Option<u32>,
    pub is_elective: bool,
}

impl CourseMeta {
    /// Track-specific semester wins; the legacy semester only applies when the
    /// track-specific one is unset.
    pub fn planned_for(&self, semester: u32, track: Track) -> bool {
        let track_semester = match track {
            Track::Regular => self.semester_regular,
            Track::FastTrack => self.semester_fast_track,
        };
        match track_semester {
            Some(value) => value == semester,
            None => self.semester_legacy == Some(semester),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(regular: Option<u32>, fast: Option<u32>, legacy: Option<u32>) -> CourseMeta {
        CourseMeta {
            id: Uuid::new_v4(),
            name: "Networks".to_string(),
            name_en: None,
            credit_weight: 3,
            level: "TINGKAT III".to_string(),
            status: Some("DITAWARKAN".to_string()),
            semester_regular: regular,
            semester_fast_track: fast,
            semester_legacy: legacy,
            is_elective: false,
        }
    }

    #[test]
    fn period_parses_leading_integer_and_qualifier() {
        let period: Period = "3 (Fast Track)".parse().unwrap();
        assert_eq!(period.ordinal, 3);
        assert_eq!(period.qualifier.as_deref(), Some("Fast Track"));
        assert_eq!(period.label(), "3 (Fast Track)");

        let plain: Period = " 10 ".parse().unwrap();
        assert_eq!(plain, Period::new(10));
        assert_eq!(plain.label(), "10");
    }

    #[test]
    fn period_without_number_is_rejected() {
        assert!("Fast Track".parse::<Period>().is_err());
        assert!("".parse::<Period>().is_err());
    }

    #[test]
    fn periods_order_numerically() {
        let mut periods: Vec<Period> = ["10", "2", "3 (Fast Track)", "3"]
            .iter()
            .map(|label| label.parse().unwrap())
            .collect();
        periods.sort();
        let labels: Vec<String> = periods.iter().map(Period::label).collect();
        assert_eq!(labels, vec!["2", "3", "3 (Fast Track)", "10"]);
    }

    #[test]
    fn course_key_folds_case_and_whitespace() {
        assert_eq!(CourseKey::new("  Data  Bases "), CourseKey::new("data bases"));
        assert_ne!(CourseKey::new("Databases"), CourseKey::new("Data Bases"));
    }

    #[test]
    fn track_accepts_legacy_spellings() {
        assert_eq!("Reguler".parse::<Track>().unwrap(), Track::Regular);
        assert_eq!("Fast Track".parse::<Track>().unwrap(), Track::FastTrack);
        assert_eq!("fast-track".parse::<Track>().unwrap(), Track::FastTrack);
        assert!("Express".parse::<Track>().is_err());
    }

    #[test]
    fn plan_prefers_track_semester_over_legacy() {
        assert!(course(Some(5), None, Some(4)).planned_for(5, Track::Regular));
        assert!(!course(Some(5), None, Some(4)).planned_for(4, Track::Regular));
        assert!(course(Some(5), None, Some(4)).planned_for(4, Track::FastTrack));
        assert!(course(None, Some(3), None).planned_for(3, Track::FastTrack));
        assert!(!course(None, Some(3), None).planned_for(3, Track::Regular));
    }
}
