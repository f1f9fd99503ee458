use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::params::{get_optional_str, get_required_str, require_db};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, NewStudent};
use serde_json::json;

fn students_create(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let student = NewStudent {
        name: get_required_str(&req.params, "name")?,
        class: get_required_str(&req.params, "class")?,
        section: get_optional_str(&req.params, "section")?,
        roll_no: get_optional_str(&req.params, "rollNo")?,
    };
    let student_id = store::create_student(conn, &student)?;
    tracing::info!(student_id = %student_id, class = %student.class, "student created");
    Ok(json!({ "studentId": student_id }))
}

fn students_get(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let Some(student) = store::get_student(conn, &student_id)? else {
        return Err(HandlerErr::new("not_found", "student not found")
            .with_details(json!({ "studentId": student_id })));
    };
    Ok(serde_json::to_value(student)?)
}

fn students_list(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let class_filter = get_optional_str(&req.params, "class")?;
    let students = store::list_students(conn, class_filter.as_deref())?;
    Ok(json!({ "students": students }))
}

fn students_delete(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let student_id = get_required_str(&req.params, "studentId")?;
    if !store::delete_student(conn, &student_id)? {
        return Err(HandlerErr::new("not_found", "student not found")
            .with_details(json!({ "studentId": student_id })));
    }
    tracing::info!(student_id = %student_id, "student deleted with marks");
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.create" => students_create(state, req),
        "students.get" => students_get(state, req),
        "students.list" => students_list(state, req),
        "students.delete" => students_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
