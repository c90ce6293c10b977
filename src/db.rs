use anyhow::Context;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::StoreError;
use crate::grading::{Grade, GradeScale, MAX_CREDIT_WEIGHT};
use crate::models::{
    CachedSummary, CourseMeta, GradeRecord, Period, SimulatedCourseEntry, SimulationSession,
    Student, Track,
};
use crate::store::{CourseCatalog, GradeLedger, SessionStore};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres implementation of the ledger, catalog and session store.
#[derive(Clone)]
pub struct PgBackend {
    pool: PgPool,
    scale: GradeScale,
}

impl PgBackend {
    pub fn new(pool: PgPool, scale: GradeScale) -> Self {
        Self { pool, scale }
    }

    pub async fn find_student(&self, nim: &str) -> anyhow::Result<Student> {
        let row = sqlx::query(
            "SELECT id, nim, full_name FROM academic_simulation.students WHERE nim = $1",
        )
        .bind(nim)
        .fetch_optional(&self.pool)
        .await?
        .with_context(|| format!("no student with NIM {nim}"))?;

        Ok(Student {
            id: row.get("id"),
            nim: row.get("nim"),
            full_name: row.get("full_name"),
        })
    }

    fn grade_from_row(&self, student_id: Uuid, row: &PgRow) -> Result<GradeRecord, StoreError> {
        let corrupt = |reason: String| StoreError::CorruptRecord {
            table: "grades",
            student_id,
            reason,
        };

        let course_name: String = row.get("course_name");
        let label: String = row.get("grade");
        let passing = self
            .scale
            .resolve(&label)
            .map(|grade| grade.passing)
            .ok_or_else(|| corrupt(format!("unrecognized grade '{label}' for {course_name}")))?;
        let period: Period = row
            .get::<String, _>("period_label")
            .parse()
            .map_err(corrupt)?;
        let credit_weight = credit_weight_from(row.get("credit_weight"))
            .map_err(|reason| corrupt(format!("{reason} for {course_name}")))?;

        Ok(GradeRecord {
            student_id,
            course_id: row.get("course_id"),
            course_name,
            credit_weight,
            grade: Grade {
                label,
                points: row.get("grade_points"),
                passing,
            },
            period,
        })
    }
}

fn optional_semester(row: &PgRow, column: &str) -> Option<u32> {
    row.get::<Option<i32>, _>(column)
        .and_then(|value| u32::try_from(value).ok())
}

fn credit_weight_from(raw: i32) -> Result<u32, String> {
    u32::try_from(raw)
        .ok()
        .filter(|credit| (1..=MAX_CREDIT_WEIGHT).contains(credit))
        .ok_or_else(|| format!("credit weight {raw} is out of range"))
}

fn entries_from_json(raw: serde_json::Value) -> Result<Vec<SimulatedCourseEntry>, String> {
    serde_json::from_value(raw).map_err(|err| format!("unreadable entries: {err}"))
}

fn course_from_row(row: &PgRow) -> Result<CourseMeta, StoreError> {
    let id: Uuid = row.get("id");
    let name: String = row.get("name");
    let credit_weight = credit_weight_from(row.get("credit_weight")).map_err(|reason| {
        StoreError::CorruptCourse {
            course_id: id,
            reason: format!("{reason} for {name}"),
        }
    })?;

    Ok(CourseMeta {
        id,
        name,
        name_en: row.get("name_en"),
        credit_weight,
        level: row.get("level"),
        status: row.get("status"),
        semester_regular: optional_semester(row, "semester_regular"),
        semester_fast_track: optional_semester(row, "semester_fast_track"),
        semester_legacy: optional_semester(row, "semester_legacy"),
        is_elective: row.get("is_elective"),
    })
}

fn session_from_row(row: &PgRow) -> Result<SimulationSession, StoreError> {
    let student_id: Uuid = row.get("student_id");
    let corrupt = |reason: String| StoreError::CorruptRecord {
        table: "simulation_sessions",
        student_id,
        reason,
    };

    let track: Track = row.get::<String, _>("track").parse().map_err(corrupt)?;
    let Json(raw_entries): Json<serde_json::Value> = row
        .try_get("entries")
        .map_err(|err| corrupt(format!("unreadable entries: {err}")))?;
    let entries = entries_from_json(raw_entries).map_err(corrupt)?;
    let as_u32 = |column: &str| {
        u32::try_from(row.get::<i32, _>(column))
            .map_err(|_| corrupt(format!("{column} is negative")))
    };

    Ok(SimulationSession {
        student_id,
        target_period: as_u32("target_period")?,
        track,
        entries,
        last_calculated: CachedSummary {
            period_average: row.get("period_average"),
            cumulative_average: row.get("cumulative_average"),
            credit_weight_taken: as_u32("credit_weight_taken")?,
            credit_weight_passed: as_u32("credit_weight_passed")?,
        },
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

impl GradeLedger for PgBackend {
    async fn grades_for(&self, student_id: Uuid) -> Result<Vec<GradeRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT course_id, course_name, credit_weight, grade, grade_points, period_label
            FROM academic_simulation.grades
            WHERE student_id = $1
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(self.grade_from_row(student_id, &row)?);
        }
        log::debug!(
            "loaded {} ledger records for {student_id} ({} linked to the catalog)",
            records.len(),
            records.iter().filter(|record| record.course_id.is_some()).count()
        );
        Ok(records)
    }
}

impl CourseCatalog for PgBackend {
    async fn default_plan(
        &self,
        semester: u32,
        track: Track,
    ) -> Result<Vec<CourseMeta>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, name_en, credit_weight, level, status,
                   semester_regular, semester_fast_track, semester_legacy, is_elective
            FROM academic_simulation.courses
            WHERE semester_regular = $1 OR semester_fast_track = $1 OR semester_legacy = $1
            ORDER BY name
            "#,
        )
        .bind(i32::try_from(semester).unwrap_or(i32::MAX))
        .fetch_all(&self.pool)
        .await?;

        let mut plan = Vec::with_capacity(rows.len());
        for row in &rows {
            let course = course_from_row(row)?;
            if course.planned_for(semester, track) {
                plan.push(course);
            }
        }
        Ok(plan)
    }
}

impl SessionStore for PgBackend {
    async fn save_or_replace(
        &self,
        student_id: Uuid,
        target_period: u32,
        track: Track,
        entries: &[SimulatedCourseEntry],
        summary: &CachedSummary,
    ) -> Result<SimulationSession, StoreError> {
        let as_i32 = |value: u32| i32::try_from(value).unwrap_or(i32::MAX);
        let row = sqlx::query(
            r#"
            INSERT INTO academic_simulation.simulation_sessions
            (student_id, target_period, track, entries, period_average, cumulative_average,
             credit_weight_taken, credit_weight_passed)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (student_id) DO UPDATE
            SET target_period = EXCLUDED.target_period,
                track = EXCLUDED.track,
                entries = EXCLUDED.entries,
                period_average = EXCLUDED.period_average,
                cumulative_average = EXCLUDED.cumulative_average,
                credit_weight_taken = EXCLUDED.credit_weight_taken,
                credit_weight_passed = EXCLUDED.credit_weight_passed,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(student_id)
        .bind(as_i32(target_period))
        .bind(track.as_str())
        .bind(Json(entries))
        .bind(summary.period_average)
        .bind(summary.cumulative_average)
        .bind(as_i32(summary.credit_weight_taken))
        .bind(as_i32(summary.credit_weight_passed))
        .fetch_one(&self.pool)
        .await?;

        session_from_row(&row)
    }

    async fn end_session(&self, student_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "DELETE FROM academic_simulation.simulation_sessions WHERE student_id = $1",
        )
        .bind(student_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, student_id: Uuid) -> Result<Option<SimulationSession>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM academic_simulation.simulation_sessions WHERE student_id = $1",
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(session_from_row).transpose()
    }
}

async fn upsert_student(
    pool: &PgPool,
    nim: &str,
    full_name: &str,
    email: &str,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO academic_simulation.students (id, nim, full_name, email)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (nim) DO UPDATE
        SET full_name = EXCLUDED.full_name, email = EXCLUDED.email
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(nim)
    .bind(full_name)
    .bind(email)
    .fetch_one(pool)
    .await?
    .get("id");
    Ok(id)
}

/// Inserts a finalized grade. Existing `(student, course, period)` rows are
/// left untouched; returns whether a row was written.
async fn insert_grade(
    pool: &PgPool,
    student_id: Uuid,
    course_name: &str,
    credit_weight: u32,
    grade: &Grade,
    period: &Period,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO academic_simulation.grades
        (id, student_id, course_id, course_name, credit_weight, grade, grade_points, period_label)
        VALUES ($1, $2,
                (SELECT id FROM academic_simulation.courses WHERE lower(name) = lower($3)),
                $3, $4, $5, $6, $7)
        ON CONFLICT (student_id, course_name, period_label) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(student_id)
    .bind(course_name)
    .bind(i32::try_from(credit_weight)?)
    .bind(&grade.label)
    .bind(grade.points)
    .bind(period.label())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn seed(pool: &PgPool, scale: &GradeScale) -> anyhow::Result<()> {
    let courses = vec![
        ("Kalkulus II", Some("Calculus II"), 4, "TINGKAT II", Some(4), Some(3), None),
        ("Jaringan Komputer", Some("Networks"), 3, "TINGKAT III", Some(5), Some(4), None),
        ("Dasar Kecerdasan Artifisial", Some("AI Foundations"), 3, "TINGKAT III", Some(5), Some(4), None),
        ("Komputasi Awan", Some("Cloud Systems"), 3, "TINGKAT III", Some(5), None, Some(5)),
        ("Basis Data", Some("Databases"), 3, "TINGKAT II", Some(3), Some(3), None),
        ("Etika Profesi", None, 2, "TINGKAT IV", None, None, Some(7)),
    ];

    for (name, name_en, credit_weight, level, regular, fast_track, legacy) in courses {
        sqlx::query(
            r#"
            INSERT INTO academic_simulation.courses
            (id, name, name_en, credit_weight, level, status,
             semester_regular, semester_fast_track, semester_legacy, is_elective)
            VALUES ($1, $2, $3, $4, $5, 'DITAWARKAN', $6, $7, $8, FALSE)
            ON CONFLICT (name) DO UPDATE
            SET name_en = EXCLUDED.name_en,
                credit_weight = EXCLUDED.credit_weight,
                level = EXCLUDED.level,
                semester_regular = EXCLUDED.semester_regular,
                semester_fast_track = EXCLUDED.semester_fast_track,
                semester_legacy = EXCLUDED.semester_legacy
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(name_en)
        .bind(credit_weight)
        .bind(level)
        .bind(regular)
        .bind(fast_track)
        .bind(legacy)
        .execute(pool)
        .await?;
    }

    let students = vec![
        ("1301210001", "Avery Lee", "avery.lee@student.example.ac.id"),
        ("1301210002", "Jules Moreno", "jules.moreno@student.example.ac.id"),
    ];
    for (nim, name, email) in &students {
        upsert_student(pool, nim, name, email).await?;
    }

    let grades = vec![
        ("1301210001", "Basis Data", 3, "B", "3"),
        ("1301210001", "Kalkulus II", 4, "B", "4"),
        ("1301210002", "Basis Data", 3, "AB", "2 (Fast Track)"),
        ("1301210002", "Kalkulus II", 4, "C", "3 (Fast Track)"),
    ];
    for (nim, course_name, credit_weight, label, period) in grades {
        let student_id: Uuid =
            sqlx::query("SELECT id FROM academic_simulation.students WHERE nim = $1")
                .bind(nim)
                .fetch_one(pool)
                .await?
                .get("id");
        let grade = scale
            .resolve(label)
            .with_context(|| format!("seed grade '{label}' is not in the grade scale"))?;
        let period: Period = period.parse().map_err(anyhow::Error::msg)?;
        insert_grade(pool, student_id, course_name, credit_weight, &grade, &period).await?;
    }

    Ok(())
}

pub async fn import_csv(
    pool: &PgPool,
    scale: &GradeScale,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        nim: String,
        full_name: String,
        email: String,
        course_name: String,
        credit_weight: u32,
        grade: String,
        period: String,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        let context = || format!("row {} ({})", line + 1, row.course_name);

        anyhow::ensure!(
            (1..=MAX_CREDIT_WEIGHT).contains(&row.credit_weight),
            "{}: credit weight must be between 1 and {MAX_CREDIT_WEIGHT}",
            context()
        );
        let grade = scale
            .resolve(&row.grade)
            .with_context(|| format!("{}: unrecognized grade '{}'", context(), row.grade))?;
        let period: Period = row
            .period
            .parse()
            .map_err(anyhow::Error::msg)
            .with_context(context)?;

        let student_id = upsert_student(pool, &row.nim, &row.full_name, &row.email).await?;
        if insert_grade(
            pool,
            student_id,
            row.course_name.trim(),
            row.credit_weight,
            &grade,
            &period,
        )
        .await?
        {
            inserted += 1;
        } else {
            log::warn!("{}: grade already recorded, left unchanged", context());
        }
    }

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn credit_weight_outside_range_is_rejected() {
        assert_eq!(credit_weight_from(3), Ok(3));
        assert_eq!(credit_weight_from(MAX_CREDIT_WEIGHT as i32), Ok(MAX_CREDIT_WEIGHT));
        assert!(credit_weight_from(0).is_err());
        assert!(credit_weight_from(-2).is_err());
        assert!(credit_weight_from(MAX_CREDIT_WEIGHT as i32 + 1).is_err());
    }

    #[test]
    fn stored_entries_are_decoded_or_reported() {
        let entries = entries_from_json(json!([
            {"courseName": "Networks", "creditWeight": 3, "grade": "A"}
        ]))
        .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].course_name, "Networks");

        let err = entries_from_json(json!({"courseName": "Networks"})).unwrap_err();
        assert!(err.starts_with("unreadable entries"));
        assert!(entries_from_json(json!([{"courseName": "Networks", "grade": 4}])).is_err());
    }
}
