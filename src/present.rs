//! Conversion between the keyed-pair form used in storage
//! (`[["Math", 12.0], ...]`) and the plain field-keyed objects used on the
//! wire (`{"Math": 12.0}`).

use crate::calc::{ExamSlot, SanitizedExams, ScoreTable, SubjectWeightedDetail, WeightedDetails};
use serde::Serialize;
use serde_json::{json, Map, Value};

fn as_pair(item: &Value) -> Option<(&str, &Value)> {
    let pair = item.as_array()?;
    if pair.len() != 2 {
        return None;
    }
    Some((pair[0].as_str()?, &pair[1]))
}

/// Looks a subject up in either representation.
pub fn keyed_get<'a>(table: &'a Value, key: &str) -> Option<&'a Value> {
    match table {
        Value::Object(obj) => obj.get(key),
        Value::Array(items) => items
            .iter()
            .filter_map(as_pair)
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v),
        _ => None,
    }
}

/// Keyed pairs become a plain object (later duplicates win, first position
/// kept). Anything else is returned unchanged, except null which reads as `{}`.
pub fn to_plain(value: &Value) -> Value {
    match value {
        Value::Null => json!({}),
        Value::Array(items) => {
            let pairs: Option<Vec<(&str, &Value)>> = items.iter().map(as_pair).collect();
            let Some(pairs) = pairs else {
                return value.clone();
            };
            let mut obj = Map::new();
            for (k, v) in pairs {
                obj.insert(k.to_string(), v.clone());
            }
            Value::Object(obj)
        }
        _ => value.clone(),
    }
}

/// Serializes a subject-keyed table into keyed pairs for storage.
pub fn to_keyed<T: Serialize>(table: &T) -> serde_json::Result<Value> {
    let value = serde_json::to_value(table)?;
    Ok(match value {
        Value::Object(obj) => Value::Array(obj.into_iter().map(|(k, v)| json!([k, v])).collect()),
        other => other,
    })
}

/// Storage form of a full exam set: slot key -> keyed pairs.
pub fn exams_to_keyed(exams: &SanitizedExams) -> serde_json::Result<Value> {
    let mut obj = Map::new();
    for slot in ExamSlot::ALL {
        obj.insert(slot.key().to_string(), to_keyed(exams.slot(slot))?);
    }
    Ok(Value::Object(obj))
}

pub fn score_table_from_value(value: &Value) -> Result<ScoreTable, String> {
    let Value::Object(obj) = to_plain(value) else {
        return Err("score table must be an object or keyed pairs".to_string());
    };
    let mut table = ScoreTable::new();
    for (subject, score) in obj {
        let Some(score) = score.as_f64() else {
            return Err(format!("score for {} is not numeric", subject));
        };
        table.insert(subject, score);
    }
    Ok(table)
}

/// Missing slots decode as empty tables.
pub fn exams_from_value(value: &Value) -> Result<SanitizedExams, String> {
    let plain = to_plain(value);
    if !plain.is_object() {
        return Err("exams must be an object".to_string());
    }
    let mut exams = SanitizedExams::default();
    for slot in ExamSlot::ALL {
        if let Some(raw) = plain.get(slot.key()) {
            let table = score_table_from_value(raw).map_err(|e| format!("{}: {}", slot.key(), e))?;
            exams.replace_slot(slot, table);
        }
    }
    Ok(exams)
}

pub fn weighted_details_from_value(value: &Value) -> Result<WeightedDetails, String> {
    let Value::Object(obj) = to_plain(value) else {
        return Err("weighted details must be an object or keyed pairs".to_string());
    };
    let mut details = WeightedDetails::default();
    for (subject, raw) in obj {
        let detail: SubjectWeightedDetail = serde_json::from_value(raw)
            .map_err(|e| format!("weighted detail for {}: {}", subject, e))?;
        details.push(subject, detail);
    }
    Ok(details)
}
