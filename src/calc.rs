use crate::present;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// Periodic assessments are marked out of 20.
pub const PA_MAX: f64 = 20.0;
/// Half-year and final summative exams are marked out of 80.
pub const SA_MAX: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExamSlot {
    Pa1,
    Pa2,
    HalfYear,
    Pa3,
    Pa4,
    Final,
}

impl ExamSlot {
    pub const ALL: [ExamSlot; 6] = [
        ExamSlot::Pa1,
        ExamSlot::Pa2,
        ExamSlot::HalfYear,
        ExamSlot::Pa3,
        ExamSlot::Pa4,
        ExamSlot::Final,
    ];

    /// Wire/storage key for the slot.
    pub fn key(self) -> &'static str {
        match self {
            ExamSlot::Pa1 => "pa1",
            ExamSlot::Pa2 => "pa2",
            ExamSlot::HalfYear => "halfYear",
            ExamSlot::Pa3 => "pa3",
            ExamSlot::Pa4 => "pa4",
            ExamSlot::Final => "final",
        }
    }

    pub fn max_score(self) -> f64 {
        match self {
            ExamSlot::Pa1 | ExamSlot::Pa2 | ExamSlot::Pa3 | ExamSlot::Pa4 => PA_MAX,
            ExamSlot::HalfYear | ExamSlot::Final => SA_MAX,
        }
    }

    fn index(self) -> usize {
        match self {
            ExamSlot::Pa1 => 0,
            ExamSlot::Pa2 => 1,
            ExamSlot::HalfYear => 2,
            ExamSlot::Pa3 => 3,
            ExamSlot::Pa4 => 4,
            ExamSlot::Final => 5,
        }
    }
}

/// Half-away-from-zero rounding to 2 decimals: `round(100 * x) / 100`.
pub fn round_off_2_decimals(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Subject -> score for one exam slot, kept in insertion (subject) order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreTable {
    entries: Vec<(String, f64)>,
}

impl ScoreTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, subject: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(s, _)| s == subject)
            .map(|(_, v)| *v)
    }

    #[allow(dead_code)]
    pub fn entries(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.entries.iter().map(|(s, v)| (s.as_str(), *v))
    }

    /// Replaces the score if the subject is already present.
    pub fn insert(&mut self, subject: impl Into<String>, score: f64) {
        let subject = subject.into();
        if let Some(entry) = self.entries.iter_mut().find(|(s, _)| *s == subject) {
            entry.1 = score;
        } else {
            self.entries.push((subject, score));
        }
    }
}

impl Serialize for ScoreTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (subject, score) in &self.entries {
            map.serialize_entry(subject, score)?;
        }
        map.end()
    }
}

/// Every exam slot's scores after clamping. Produced by [`sanitize`] or
/// decoded from a stored record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SanitizedExams {
    slots: [ScoreTable; 6],
}

impl SanitizedExams {
    pub fn slot(&self, slot: ExamSlot) -> &ScoreTable {
        &self.slots[slot.index()]
    }

    /// Whole-slot replacement; subjects are never merged across tables.
    pub fn replace_slot(&mut self, slot: ExamSlot, table: ScoreTable) {
        self.slots[slot.index()] = table;
    }

    pub fn score(&self, slot: ExamSlot, subject: &str) -> f64 {
        self.slot(slot).get(subject).unwrap_or(0.0)
    }
}

impl Serialize for SanitizedExams {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(ExamSlot::ALL.len()))?;
        for slot in ExamSlot::ALL {
            map.serialize_entry(slot.key(), self.slot(slot))?;
        }
        map.end()
    }
}

/// Coerces an untrusted score to a number. Absent, null, non-numeric and NaN
/// all become 0. Strings are read like a lenient float parse: leading
/// whitespace is skipped and the longest numeric prefix wins ("12.5abc" -> 12.5).
pub fn parse_score_or_default(value: Option<&serde_json::Value>) -> f64 {
    let parsed = match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => parse_leading_float(s),
        _ => None,
    };
    match parsed {
        Some(v) if !v.is_nan() => v,
        _ => 0.0,
    }
}

fn parse_leading_float(raw: &str) -> Option<f64> {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    if s[end..].starts_with("Infinity") {
        return s[..end + "Infinity".len()].replace("Infinity", "inf").parse().ok();
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if frac_end > frac_start || digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }

    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok()
}

/// Cleans raw exam input against a subject list. `raw_exams` is the request's
/// `exams` value; missing slots, missing subjects and junk values all become 0,
/// and every score is clamped to `[0, slot max]`.
pub fn sanitize(raw_exams: Option<&serde_json::Value>, subjects: &[String]) -> SanitizedExams {
    let mut out = SanitizedExams::default();
    for slot in ExamSlot::ALL {
        let raw_slot = raw_exams.and_then(|e| e.get(slot.key()));
        let mut table = ScoreTable::new();
        for subject in subjects {
            let raw = raw_slot.and_then(|v| present::keyed_get(v, subject));
            let value = parse_score_or_default(raw);
            table.insert(subject.as_str(), value.clamp(0.0, slot.max_score()));
        }
        out.replace_slot(slot, table);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubjectWeightedDetail {
    pub term1: f64,
    pub term2: f64,
    pub total: f64,
}

/// Per-subject weighted figures in subject order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightedDetails {
    entries: Vec<(String, SubjectWeightedDetail)>,
}

impl WeightedDetails {
    #[allow(dead_code)]
    pub fn get(&self, subject: &str) -> Option<&SubjectWeightedDetail> {
        self.entries
            .iter()
            .find(|(s, _)| s == subject)
            .map(|(_, d)| d)
    }

    #[allow(dead_code)]
    pub fn entries(&self) -> impl Iterator<Item = (&str, &SubjectWeightedDetail)> + '_ {
        self.entries.iter().map(|(s, d)| (s.as_str(), d))
    }

    pub fn push(&mut self, subject: impl Into<String>, detail: SubjectWeightedDetail) {
        self.entries.push((subject.into(), detail));
    }
}

impl Serialize for WeightedDetails {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (subject, detail) in &self.entries {
            map.serialize_entry(subject, detail)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightedSummary {
    pub total: f64,
    pub details: WeightedDetails,
}

/// Term 1 = PA1/2 + PA2/2 + half-year (out of 100).
/// Term 2 = Term 1/2 + (PA3 + PA4 + final)/2, reported as the subject total.
/// The overall total is the mean of the unrounded term 2 figures.
///
/// Only inputs are bounded; a fully maxed subject reports 110.
pub fn aggregate(exams: &SanitizedExams, subjects: &[String]) -> WeightedSummary {
    if subjects.is_empty() {
        return WeightedSummary::default();
    }

    let mut details = WeightedDetails::default();
    let mut term2_sum = 0.0_f64;

    for subject in subjects {
        let pa1 = exams.score(ExamSlot::Pa1, subject);
        let pa2 = exams.score(ExamSlot::Pa2, subject);
        let sa1 = exams.score(ExamSlot::HalfYear, subject);
        let pa3 = exams.score(ExamSlot::Pa3, subject);
        let pa4 = exams.score(ExamSlot::Pa4, subject);
        let sa2 = exams.score(ExamSlot::Final, subject);

        let term1 = pa1 / 2.0 + pa2 / 2.0 + sa1;
        let term2_component = pa3 + pa4 + sa2;
        let term2 = term1 / 2.0 + term2_component / 2.0;

        details.push(
            subject.as_str(),
            SubjectWeightedDetail {
                term1: round_off_2_decimals(term1),
                term2: round_off_2_decimals(term2),
                total: round_off_2_decimals(term2),
            },
        );
        term2_sum += term2;
    }

    WeightedSummary {
        total: round_off_2_decimals(term2_sum / subjects.len() as f64),
        details,
    }
}
