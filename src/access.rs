use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
}

/// Who is submitting marks, as asserted by the calling dashboard.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub role: Role,
    #[serde(default)]
    pub assigned_classes: Vec<String>,
}

impl Actor {
    pub fn admin() -> Self {
        Self {
            role: Role::Admin,
            assigned_classes: Vec::new(),
        }
    }
}

/// Teachers may only submit for classes they are assigned to (exact match);
/// admins may submit for any class.
pub fn can_submit_marks_for(role: Role, assigned_classes: &[String], target_class: &str) -> bool {
    match role {
        Role::Admin => true,
        Role::Teacher => assigned_classes.iter().any(|c| c == target_class),
    }
}
