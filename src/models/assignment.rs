use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A standing doctor→patient questionnaire assignment. `repeat_interval`
/// is in minutes; None or 0 means it never repeats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: i64,
    pub questionnaire_id: i64,
    pub assignee_id: i64,
    pub assigner_id: i64,
    pub created: NaiveDateTime,
    pub repeat_interval: Option<i64>,
}

impl Assignment {
    pub fn repeats(&self) -> bool {
        self.repeat_interval.is_some_and(|m| m > 0)
    }
}

/// One concrete occurrence of an assignment being filled out. Immutable once
/// created; responses are keyed against an instance, never the assignment.
/// Questionnaire/assignee/assigner ids are denormalized copies so an instance
/// stays fully usable after its assignment row is deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentInstance {
    pub id: i64,
    pub created: NaiveDateTime,
    pub assignment_id: i64,
    pub questionnaire_id: i64,
    pub assignee_id: i64,
    pub assigner_id: i64,
}
