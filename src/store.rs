use crate::calc::{ExamSlot, SanitizedExams, WeightedDetails, WeightedSummary};
use crate::present;
use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("query failed: {0}")]
    Query(#[source] rusqlite::Error),

    #[error("write failed: {0}")]
    Write(#[source] rusqlite::Error),

    #[error("transaction failed: {0}")]
    Transaction(#[source] rusqlite::Error),

    #[error("encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("corrupt marks record for student {student_id}: {reason}")]
    Corrupt { student_id: String, reason: String },
}

impl StoreError {
    /// Wire error code for the failure.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Query(_) | StoreError::Corrupt { .. } => "db_query_failed",
            StoreError::Write(_) | StoreError::Encode(_) => "db_insert_failed",
            StoreError::Transaction(_) => "db_tx_failed",
        }
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub class: String,
    pub section: Option<String>,
    pub roll_no: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub name: String,
    pub class: String,
    pub section: Option<String>,
    pub roll_no: Option<String>,
}

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        name: r.get(1)?,
        class: r.get(2)?,
        section: r.get(3)?,
        roll_no: r.get(4)?,
        created_at: r.get(5)?,
    })
}

pub fn create_student(conn: &Connection, student: &NewStudent) -> Result<String, StoreError> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(id, name, class, section, roll_no, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &id,
            &student.name,
            &student.class,
            &student.section,
            &student.roll_no,
            now_rfc3339(),
        ),
    )
    .map_err(StoreError::Write)?;
    Ok(id)
}

pub fn get_student(conn: &Connection, student_id: &str) -> Result<Option<Student>, StoreError> {
    conn.query_row(
        "SELECT id, name, class, section, roll_no, created_at FROM students WHERE id = ?",
        [student_id],
        student_from_row,
    )
    .optional()
    .map_err(StoreError::Query)
}

pub fn list_students(
    conn: &Connection,
    class_filter: Option<&str>,
) -> Result<Vec<Student>, StoreError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, name, class, section, roll_no, created_at
             FROM students
             WHERE ?1 IS NULL OR class = ?1
             ORDER BY class, roll_no, name",
        )
        .map_err(StoreError::Query)?;
    stmt.query_map([class_filter], student_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(StoreError::Query)
}

/// Removes the student and their marks record together. Returns false when
/// the student did not exist.
pub fn delete_student(conn: &Connection, student_id: &str) -> Result<bool, StoreError> {
    let tx = conn
        .unchecked_transaction()
        .map_err(StoreError::Transaction)?;
    tx.execute("DELETE FROM marks WHERE student_id = ?", [student_id])
        .map_err(StoreError::Write)?;
    let removed = tx
        .execute("DELETE FROM students WHERE id = ?", [student_id])
        .map_err(StoreError::Write)?;
    tx.commit().map_err(StoreError::Transaction)?;
    Ok(removed > 0)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarksRecord {
    pub id: String,
    pub student_id: String,
    pub class: String,
    pub exams: SanitizedExams,
    pub weighted_total: f64,
    pub weighted_details: WeightedDetails,
    pub total: f64,
    pub percentage: f64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Merged,
}

type MarksRow = (
    String,
    String,
    String,
    String,
    f64,
    String,
    f64,
    f64,
    String,
    String,
);

const MARKS_COLUMNS: &str = "m.id, m.student_id, m.class, m.exams_json, m.weighted_total,
    m.weighted_details_json, m.total, m.percentage, m.created_at, m.updated_at";

fn marks_row(r: &Row<'_>) -> rusqlite::Result<MarksRow> {
    Ok((
        r.get(0)?,
        r.get(1)?,
        r.get(2)?,
        r.get(3)?,
        r.get(4)?,
        r.get(5)?,
        r.get(6)?,
        r.get(7)?,
        r.get(8)?,
        r.get(9)?,
    ))
}

fn decode_marks_row(row: MarksRow) -> Result<MarksRecord, StoreError> {
    let (
        id,
        student_id,
        class,
        exams_json,
        weighted_total,
        details_json,
        total,
        percentage,
        created_at,
        updated_at,
    ) = row;
    let corrupt = |reason: String| StoreError::Corrupt {
        student_id: student_id.clone(),
        reason,
    };

    let exams_value: serde_json::Value =
        serde_json::from_str(&exams_json).map_err(|e| corrupt(e.to_string()))?;
    let exams = present::exams_from_value(&exams_value).map_err(&corrupt)?;
    let details_value: serde_json::Value =
        serde_json::from_str(&details_json).map_err(|e| corrupt(e.to_string()))?;
    let weighted_details = present::weighted_details_from_value(&details_value).map_err(&corrupt)?;

    Ok(MarksRecord {
        id,
        student_id,
        class,
        exams,
        weighted_total,
        weighted_details,
        total,
        percentage,
        created_at,
        updated_at,
    })
}

pub fn get_marks(conn: &Connection, student_id: &str) -> Result<Option<MarksRecord>, StoreError> {
    let sql = format!("SELECT {} FROM marks m WHERE m.student_id = ?", MARKS_COLUMNS);
    let row = conn
        .query_row(&sql, [student_id], marks_row)
        .optional()
        .map_err(StoreError::Query)?;
    row.map(decode_marks_row).transpose()
}

/// All records ordered by class, then by the owning student's roll number.
pub fn list_marks(conn: &Connection) -> Result<Vec<MarksRecord>, StoreError> {
    let sql = format!(
        "SELECT {}
         FROM marks m
         LEFT JOIN students s ON s.id = m.student_id
         ORDER BY m.class, s.roll_no, m.created_at",
        MARKS_COLUMNS
    );
    let mut stmt = conn.prepare(&sql).map_err(StoreError::Query)?;
    let rows = stmt
        .query_map([], marks_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(StoreError::Query)?;
    rows.into_iter().map(decode_marks_row).collect()
}

/// Creates the student's record or merges into the existing one.
///
/// Merge replaces each exam slot wholesale with the newly sanitized slot and
/// overwrites the weighted figures. The record keeps the class it was created
/// with. Lookup and save share one transaction.
pub fn upsert_marks(
    conn: &Connection,
    student_id: &str,
    class: &str,
    sanitized: &SanitizedExams,
    summary: &WeightedSummary,
) -> Result<(MarksRecord, UpsertOutcome), StoreError> {
    let tx = conn
        .unchecked_transaction()
        .map_err(StoreError::Transaction)?;
    let now = now_rfc3339();

    let (record, outcome) = match get_marks(&tx, student_id)? {
        None => (
            MarksRecord {
                id: Uuid::new_v4().to_string(),
                student_id: student_id.to_string(),
                class: class.to_string(),
                exams: sanitized.clone(),
                weighted_total: summary.total,
                weighted_details: summary.details.clone(),
                total: 0.0,
                percentage: 0.0,
                created_at: now.clone(),
                updated_at: now,
            },
            UpsertOutcome::Created,
        ),
        Some(mut existing) => {
            for slot in ExamSlot::ALL {
                existing
                    .exams
                    .replace_slot(slot, sanitized.slot(slot).clone());
            }
            existing.weighted_total = summary.total;
            existing.weighted_details = summary.details.clone();
            existing.updated_at = now;
            (existing, UpsertOutcome::Merged)
        }
    };

    let exams_json = serde_json::to_string(&present::exams_to_keyed(&record.exams)?)?;
    let details_json = serde_json::to_string(&present::to_keyed(&record.weighted_details)?)?;

    tx.execute(
        "INSERT INTO marks(id, student_id, class, exams_json, weighted_total,
                           weighted_details_json, total, percentage, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id) DO UPDATE SET
           exams_json = excluded.exams_json,
           weighted_total = excluded.weighted_total,
           weighted_details_json = excluded.weighted_details_json,
           updated_at = excluded.updated_at",
        (
            &record.id,
            &record.student_id,
            &record.class,
            &exams_json,
            record.weighted_total,
            &details_json,
            record.total,
            record.percentage,
            &record.created_at,
            &record.updated_at,
        ),
    )
    .map_err(StoreError::Write)?;
    tx.commit().map_err(StoreError::Transaction)?;

    Ok((record, outcome))
}
