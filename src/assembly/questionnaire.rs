use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use super::question::{assemble_questions, AssembledQuestion};
use crate::db::repository::questionnaire::{get_questionnaire, questions_for_questionnaire};
use crate::db::DatabaseError;

/// A questionnaire with its questions in API shape. When assembled for an
/// assignment instance, `assignment_instance_id` tells the client which
/// instance to scope submissions to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledQuestionnaire {
    pub id: i64,
    pub title: Option<String>,
    pub creating_user_id: i64,
    pub assignment_instance_id: Option<i64>,
    pub questions: Vec<AssembledQuestion>,
}

/// Load and assemble one questionnaire. A missing id is `Ok(None)` — callers
/// treat that as "not found", not a fault.
pub fn assemble_questionnaire(
    conn: &Connection,
    questionnaire_id: i64,
    for_user: Option<i64>,
    for_instance: Option<i64>,
) -> Result<Option<AssembledQuestionnaire>, DatabaseError> {
    let Some(questionnaire) = get_questionnaire(conn, questionnaire_id)? else {
        return Ok(None);
    };

    let rows = questions_for_questionnaire(conn, questionnaire_id)?;
    let questions = assemble_questions(conn, &rows, for_user, for_instance)?;

    Ok(Some(AssembledQuestionnaire {
        id: questionnaire.id,
        title: questionnaire.title,
        creating_user_id: questionnaire.creating_user_id,
        assignment_instance_id: for_instance,
        questions,
    }))
}
