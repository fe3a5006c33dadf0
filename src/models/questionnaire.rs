use serde::{Deserialize, Serialize};

use super::enums::QuestionType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Questionnaire {
    pub id: i64,
    pub title: Option<String>,
    pub creating_user_id: i64,
}

/// A question as stored — one row of the Question table. The assembled,
/// type-shaped form lives in `crate::assembly`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRow {
    pub id: i64,
    pub questionnaire_id: i64,
    pub text: Option<String>,
    pub question_type: QuestionType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: i64,
    pub question_id: i64,
    pub text: Option<String>,
}

/// A branching edge: "if the response equals/includes X, go to question Y".
/// Informational only — nothing in the core enforces the branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRelation {
    pub id: i64,
    pub question_id: i64,
    pub includes: Option<String>,
    pub equals: Option<String>,
    pub next_question_id: i64,
}
