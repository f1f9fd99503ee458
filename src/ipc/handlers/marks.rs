use crate::access::{can_submit_marks_for, Actor};
use crate::calc;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::params::{get_required_str, require_db};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, MarksRecord, Student, UpsertOutcome};
use crate::subjects::resolve_subjects;
use serde_json::json;
use std::collections::HashMap;

fn parse_actor(params: &serde_json::Value) -> Result<Actor, HandlerErr> {
    match params.get("actor") {
        None | Some(serde_json::Value::Null) => Ok(Actor::admin()),
        Some(raw) => serde_json::from_value(raw.clone()).map_err(|e| {
            HandlerErr::new("bad_params", format!("invalid actor: {}", e))
        }),
    }
}

fn student_summary(student: Option<&Student>) -> serde_json::Value {
    match student {
        Some(s) => json!({
            "id": s.id,
            "name": s.name,
            "class": s.class,
            "section": s.section,
            "rollNo": s.roll_no,
        }),
        None => serde_json::Value::Null,
    }
}

fn record_with_student(
    record: &MarksRecord,
    student: Option<&Student>,
) -> Result<serde_json::Value, HandlerErr> {
    let mut value = serde_json::to_value(record)?;
    value["student"] = student_summary(student);
    Ok(value)
}

fn marks_submit(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let actor = parse_actor(&req.params)?;

    let Some(student) = store::get_student(conn, &student_id)? else {
        return Err(HandlerErr::new("not_found", "student not found")
            .with_details(json!({ "studentId": student_id })));
    };

    if !can_submit_marks_for(actor.role, &actor.assigned_classes, &student.class) {
        tracing::warn!(student_id = %student.id, class = %student.class, "marks submission denied");
        return Err(HandlerErr::new("forbidden", "access denied for this class")
            .with_details(json!({ "class": student.class })));
    }

    let subjects = resolve_subjects(&student.class);
    let clean = calc::sanitize(req.params.get("exams"), &subjects);
    let summary = calc::aggregate(&clean, &subjects);
    let (record, outcome) = store::upsert_marks(conn, &student.id, &student.class, &clean, &summary)?;

    tracing::info!(
        student_id = %record.student_id,
        created = (outcome == UpsertOutcome::Created),
        weighted_total = record.weighted_total,
        "marks saved"
    );

    Ok(json!({
        "message": "Marks saved successfully",
        "marks": serde_json::to_value(&record)?,
    }))
}

fn marks_get(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let Some(record) = store::get_marks(conn, &student_id)? else {
        return Err(HandlerErr::new("not_found", "marks record not found")
            .with_details(json!({ "studentId": student_id })));
    };
    let student = store::get_student(conn, &student_id)?;
    record_with_student(&record, student.as_ref())
}

fn marks_list(state: &AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let students: HashMap<String, Student> = store::list_students(conn, None)?
        .into_iter()
        .map(|s| (s.id.clone(), s))
        .collect();
    let marks = store::list_marks(conn)?
        .iter()
        .map(|m| record_with_student(m, students.get(&m.student_id)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "marks": marks }))
}

/// Sanitize + aggregate without touching storage.
fn marks_preview(req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let class_name = get_required_str(&req.params, "class")?;
    let subjects = resolve_subjects(&class_name);
    let clean = calc::sanitize(req.params.get("exams"), &subjects);
    let summary = calc::aggregate(&clean, &subjects);
    Ok(json!({
        "class": class_name,
        "subjects": subjects,
        "exams": serde_json::to_value(&clean)?,
        "weightedTotal": summary.total,
        "weightedDetails": serde_json::to_value(&summary.details)?,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "marks.submit" => marks_submit(state, req),
        "marks.get" => marks_get(state, req),
        "marks.list" => marks_list(state, req),
        "marks.preview" => marks_preview(req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
