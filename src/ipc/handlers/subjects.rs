use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::params::get_required_str;
use crate::ipc::types::{AppState, Request};
use crate::subjects::{is_early_years, resolve_subjects};
use serde_json::json;

fn subjects_for_class(req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let class_name = get_required_str(&req.params, "class")?;
    Ok(json!({
        "class": class_name,
        "earlyYears": is_early_years(&class_name),
        "subjects": resolve_subjects(&class_name),
    }))
}

pub fn try_handle(_state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.forClass" => Some(respond(&req.id, subjects_for_class(req))),
        _ => None,
    }
}
