//! Ordered checks run before any ledger read: shape first, then emptiness,
//! then grade completeness, then grade recognition.

use serde_json::{Map, Value};

use crate::error::{BusinessRule, SimulationError};
use crate::grading::{GradeScale, MAX_CREDIT_WEIGHT};
use crate::models::{CalculateRequest, CourseKey, SimulatedCourse, Track};

struct RawEntry<'a> {
    course_name: &'a str,
    credit_weight: u32,
    grade: Option<&'a str>,
}

pub fn validate_request(
    payload: &Value,
    scale: &GradeScale,
) -> Result<CalculateRequest, SimulationError> {
    let object = payload
        .as_object()
        .ok_or_else(|| SimulationError::malformed("request body must be an object"))?;

    let entries = match object.get("entries") {
        Some(Value::Array(entries)) => entries,
        Some(_) => return Err(SimulationError::malformed("entries must be a list")),
        None => return Err(SimulationError::malformed("entries are missing")),
    };
    let target_period = positive_integer(object.get("targetPeriod"), "targetPeriod")?;
    let track = match object.get("track") {
        None | Some(Value::Null) => Track::default(),
        Some(Value::String(raw)) => raw.parse::<Track>().map_err(SimulationError::malformed)?,
        Some(_) => return Err(SimulationError::malformed("track must be a string")),
    };

    let raw_entries = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| raw_entry(index, entry))
        .collect::<Result<Vec<_>, _>>()?;

    if raw_entries.is_empty() {
        return Err(BusinessRule::NoCourses.into());
    }

    if let Some(ungraded) = raw_entries.iter().find(|entry| entry.grade.is_none()) {
        return Err(BusinessRule::UngradedEntry {
            course_name: ungraded.course_name.to_string(),
        }
        .into());
    }

    let mut courses = Vec::with_capacity(raw_entries.len());
    for entry in raw_entries {
        let label = entry.grade.unwrap_or_default();
        let grade = scale
            .resolve(label)
            .ok_or_else(|| BusinessRule::UnrecognizedGrade {
                course_name: entry.course_name.to_string(),
                grade: label.to_string(),
                expected: scale.labels().join(", "),
            })?;
        courses.push(SimulatedCourse {
            key: CourseKey::new(entry.course_name),
            course_name: entry.course_name.trim().to_string(),
            credit_weight: entry.credit_weight,
            grade,
        });
    }

    Ok(CalculateRequest {
        target_period,
        track,
        courses,
    })
}

fn raw_entry(index: usize, entry: &Value) -> Result<RawEntry<'_>, SimulationError> {
    let fields: &Map<String, Value> = entry
        .as_object()
        .ok_or_else(|| SimulationError::malformed(format!("entry #{index} must be an object")))?;

    let course_name = match fields.get("courseName") {
        Some(Value::String(name)) if !name.trim().is_empty() => name.as_str(),
        _ => {
            return Err(SimulationError::malformed(format!(
                "entry #{index} needs a course name"
            )))
        }
    };
    let credit_weight = positive_integer(
        fields.get("creditWeight"),
        &format!("creditWeight of entry #{index}"),
    )?;
    if credit_weight > MAX_CREDIT_WEIGHT {
        return Err(SimulationError::malformed(format!(
            "creditWeight of entry #{index} must not exceed {MAX_CREDIT_WEIGHT}"
        )));
    }
    let grade = match fields.get("grade") {
        None | Some(Value::Null) => None,
        Some(Value::String(label)) if label.trim().is_empty() => None,
        Some(Value::String(label)) => Some(label.as_str()),
        Some(_) => {
            return Err(SimulationError::malformed(format!(
                "grade of entry #{index} must be a letter"
            )))
        }
    };

    Ok(RawEntry {
        course_name,
        credit_weight,
        grade,
    })
}

fn positive_integer(value: Option<&Value>, field: &str) -> Result<u32, SimulationError> {
    value
        .and_then(Value::as_u64)
        .filter(|&number| number > 0)
        .and_then(|number| u32::try_from(number).ok())
        .ok_or_else(|| SimulationError::malformed(format!("{field} must be a positive integer")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn validate(payload: Value) -> Result<CalculateRequest, SimulationError> {
        validate_request(&payload, &GradeScale::default())
    }

    #[test]
    fn accepts_complete_request() {
        let request = validate(json!({
            "targetPeriod": 5,
            "track": "Fast Track",
            "entries": [
                {"courseName": " Networks ", "creditWeight": 3, "grade": "a"},
                {"courseName": "Cloud Systems", "creditWeight": 3, "grade": "AB"}
            ]
        }))
        .unwrap();
        assert_eq!(request.target_period, 5);
        assert_eq!(request.track, Track::FastTrack);
        assert_eq!(request.courses.len(), 2);
        assert_eq!(request.courses[0].course_name, "Networks");
        assert_eq!(request.courses[0].grade.label, "A");
        assert_eq!(request.courses[1].grade.points, 3.5);
    }

    #[test]
    fn track_defaults_to_regular() {
        let request = validate(json!({
            "targetPeriod": 2,
            "entries": [{"courseName": "Physics", "creditWeight": 4, "grade": "B"}]
        }))
        .unwrap();
        assert_eq!(request.track, Track::Regular);
    }

    #[test]
    fn non_list_entries_are_malformed() {
        let err = validate(json!({"targetPeriod": 5, "entries": "Networks"})).unwrap_err();
        assert_eq!(err.status(), 422);
        let err = validate(json!({"targetPeriod": 5})).unwrap_err();
        assert_eq!(err.status(), 422);
    }

    #[test]
    fn malformed_shape_is_checked_before_emptiness() {
        let err = validate(json!({"targetPeriod": 0, "entries": []})).unwrap_err();
        assert!(matches!(err, SimulationError::Malformed { .. }));
    }

    #[test]
    fn empty_list_is_business_rule() {
        let err = validate(json!({"targetPeriod": 5, "entries": []})).unwrap_err();
        assert!(matches!(err, SimulationError::BusinessRule(BusinessRule::NoCourses)));
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn missing_grade_is_distinct_business_rule() {
        let err = validate(json!({
            "targetPeriod": 5,
            "entries": [{"courseName": "Test", "creditWeight": 3}]
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            SimulationError::BusinessRule(BusinessRule::UngradedEntry { ref course_name })
                if course_name == "Test"
        ));

        let blank = validate(json!({
            "targetPeriod": 5,
            "entries": [{"courseName": "Test", "creditWeight": 3, "grade": "  "}]
        }))
        .unwrap_err();
        assert!(matches!(
            blank,
            SimulationError::BusinessRule(BusinessRule::UngradedEntry { .. })
        ));
    }

    #[test]
    fn non_positive_credit_weight_is_rejected() {
        for credit in [json!(0), json!(-3), json!(2.5), json!("3")] {
            let err = validate(json!({
                "targetPeriod": 5,
                "entries": [{"courseName": "Test", "creditWeight": credit, "grade": "A"}]
            }))
            .unwrap_err();
            assert_eq!(err.status(), 422);
        }
    }

    #[test]
    fn credit_weight_above_bound_is_malformed() {
        let err = validate(json!({
            "targetPeriod": 5,
            "entries": [
                {"courseName": "X", "creditWeight": 4294967295u64, "grade": "A"},
                {"courseName": "Y", "creditWeight": 2, "grade": "A"}
            ]
        }))
        .unwrap_err();
        assert!(matches!(err, SimulationError::Malformed { .. }));

        let err = validate(json!({
            "targetPeriod": 5,
            "entries": [{"courseName": "X", "creditWeight": MAX_CREDIT_WEIGHT + 1, "grade": "A"}]
        }))
        .unwrap_err();
        assert_eq!(err.status(), 422);

        let request = validate(json!({
            "targetPeriod": 5,
            "entries": [{"courseName": "X", "creditWeight": MAX_CREDIT_WEIGHT, "grade": "A"}]
        }))
        .unwrap();
        assert_eq!(request.courses[0].credit_weight, MAX_CREDIT_WEIGHT);
    }

    #[test]
    fn unknown_grade_is_rejected_not_zero_scored() {
        let err = validate(json!({
            "targetPeriod": 5,
            "entries": [{"courseName": "Test", "creditWeight": 3, "grade": "F+"}]
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            SimulationError::BusinessRule(BusinessRule::UnrecognizedGrade { .. })
        ));
    }

    #[test]
    fn unknown_track_is_malformed() {
        let err = validate(json!({
            "targetPeriod": 5,
            "track": "Express",
            "entries": [{"courseName": "Test", "creditWeight": 3, "grade": "A"}]
        }))
        .unwrap_err();
        assert_eq!(err.status(), 422);
    }
}
