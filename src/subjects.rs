/// Classes graded on the early-years track. Compared after trim + lowercase.
pub const EARLY_YEARS_CLASSES: [&str; 4] = ["nursery", "lkg", "ukg", "play"];

pub const EARLY_YEARS_SUBJECTS: [&str; 4] = ["English", "Hindi", "Math", "EVS"];

pub const STANDARD_SUBJECTS: [&str; 5] = ["Math", "English", "Science", "Hindi", "Social Science"];

pub fn is_early_years(class_name: &str) -> bool {
    let normalized = class_name.trim().to_lowercase();
    EARLY_YEARS_CLASSES.contains(&normalized.as_str())
}

/// Ordered subject list graded for a class. Every input maps to one of the
/// two fixed tracks; there is no error case.
pub fn resolve_subjects(class_name: &str) -> Vec<String> {
    let track: &[&str] = if is_early_years(class_name) {
        &EARLY_YEARS_SUBJECTS
    } else {
        &STANDARD_SUBJECTS
    };
    track.iter().map(|s| s.to_string()).collect()
}
