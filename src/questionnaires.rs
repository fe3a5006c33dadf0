//! Questionnaire management — creation with an initial question set, later
//! question additions and edits, and branching relations.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assembly::{assemble_questionnaire, assemble_questions, AssembledQuestion, AssembledQuestionnaire};
use crate::db::repository::questionnaire::{
    self, delete_options_for_question, insert_option, insert_question, insert_questionnaire,
    insert_relation,
};
use crate::db::DatabaseError;
use crate::models::enums::QuestionType;
use crate::models::QuestionRow;

#[derive(Error, Debug)]
pub enum QuestionnaireError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Question input must name a questionnaire id")]
    MissingQuestionnaireId,

    #[error("Question input must carry the question id")]
    MissingQuestionId,

    #[error("Question {0} does not exist")]
    QuestionNotFound(i64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOptionInput {
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionInput {
    /// Only set when updating an existing question.
    pub id: Option<i64>,
    pub text: Option<String>,
    pub question_type: QuestionType,
    /// Honored only for choice question types.
    pub options: Option<Vec<QuestionOptionInput>>,
    /// Only needed when adding questions to an existing questionnaire.
    pub questionnaire_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRelationInput {
    pub question_id: i64,
    pub next_question_id: i64,
    pub includes: Option<String>,
    pub equals: Option<String>,
}

/// Create a questionnaire with its initial questions, atomically. Returns
/// the assembled result (no responses — nothing is answered yet).
pub fn create_questionnaire(
    conn: &Connection,
    title: Option<&str>,
    questions: &[QuestionInput],
    creating_user_id: i64,
) -> Result<AssembledQuestionnaire, QuestionnaireError> {
    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    let questionnaire_id = insert_questionnaire(&tx, title, creating_user_id)?;
    for question in questions {
        create_one_question(&tx, questionnaire_id, question)?;
    }
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(questionnaire_id, question_count = questions.len(), "questionnaire created");
    assemble_questionnaire(conn, questionnaire_id, None, None)?
        .ok_or(QuestionnaireError::Database(DatabaseError::NotFound {
            entity_type: "Questionnaire",
            id: questionnaire_id,
        }))
}

pub fn get_questionnaire(
    conn: &Connection,
    id: i64,
) -> Result<Option<AssembledQuestionnaire>, DatabaseError> {
    assemble_questionnaire(conn, id, None, None)
}

pub fn list_questionnaires(conn: &Connection) -> Result<Vec<AssembledQuestionnaire>, DatabaseError> {
    let rows = questionnaire::list_questionnaires(conn)?;
    let mut assembled = Vec::with_capacity(rows.len());
    for row in rows {
        if let Some(questionnaire) = assemble_questionnaire(conn, row.id, None, None)? {
            assembled.push(questionnaire);
        }
    }
    Ok(assembled)
}

/// Delete by id; questions, options, relations, and responses cascade.
pub fn delete_questionnaire(conn: &Connection, id: i64) -> Result<bool, DatabaseError> {
    questionnaire::delete_questionnaire(conn, id)
}

/// Fetch one question in assembled shape (no responses).
pub fn get_question(conn: &Connection, id: i64) -> Result<Option<AssembledQuestion>, DatabaseError> {
    let Some(row) = questionnaire::get_question(conn, id)? else {
        return Ok(None);
    };
    let mut assembled = assemble_questions(conn, std::slice::from_ref(&row), None, None)?;
    Ok(assembled.pop())
}

/// Add questions to already existing questionnaires. Every input must name
/// its questionnaire.
pub fn add_questions(
    conn: &Connection,
    questions: &[QuestionInput],
) -> Result<Vec<AssembledQuestion>, QuestionnaireError> {
    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    let mut rows: Vec<QuestionRow> = Vec::with_capacity(questions.len());
    for question in questions {
        let questionnaire_id = question
            .questionnaire_id
            .ok_or(QuestionnaireError::MissingQuestionnaireId)?;
        let id = create_one_question(&tx, questionnaire_id, question)?;
        rows.push(QuestionRow {
            id,
            questionnaire_id,
            text: question.text.clone(),
            question_type: question.question_type,
        });
    }
    tx.commit().map_err(DatabaseError::from)?;

    Ok(assemble_questions(conn, &rows, None, None)?)
}

/// Update a question's text and type. When `options` is supplied the
/// existing options are replaced wholesale (choice types only).
pub fn update_question(
    conn: &Connection,
    input: &QuestionInput,
) -> Result<AssembledQuestion, QuestionnaireError> {
    let id = input.id.ok_or(QuestionnaireError::MissingQuestionId)?;

    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    if !questionnaire::update_question(&tx, id, input.text.as_deref(), input.question_type)? {
        return Err(QuestionnaireError::QuestionNotFound(id));
    }
    if let Some(options) = &input.options {
        delete_options_for_question(&tx, id)?;
        if input.question_type.supports_options() {
            for option in options {
                insert_option(&tx, id, option.text.as_deref())?;
            }
        }
    }
    tx.commit().map_err(DatabaseError::from)?;

    let row = questionnaire::get_question(conn, id)?.ok_or(QuestionnaireError::QuestionNotFound(id))?;
    let mut assembled = assemble_questions(conn, std::slice::from_ref(&row), None, None)?;
    Ok(assembled.remove(0))
}

pub fn delete_question(conn: &Connection, id: i64) -> Result<bool, DatabaseError> {
    questionnaire::delete_question(conn, id)
}

/// Record branching edges between questions. Informational only; nothing
/// here enforces the branch at answer time.
pub fn create_question_relations(
    conn: &Connection,
    relations: &[QuestionRelationInput],
) -> Result<(), QuestionnaireError> {
    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    for relation in relations {
        insert_relation(
            &tx,
            relation.question_id,
            relation.next_question_id,
            relation.includes.as_deref(),
            relation.equals.as_deref(),
        )?;
    }
    tx.commit().map_err(DatabaseError::from)?;
    Ok(())
}

fn create_one_question(
    conn: &Connection,
    questionnaire_id: i64,
    input: &QuestionInput,
) -> Result<i64, QuestionnaireError> {
    let id = insert_question(conn, questionnaire_id, input.text.as_deref(), input.question_type)?;
    if input.question_type.supports_options() {
        if let Some(options) = &input.options {
            for option in options {
                insert_option(conn, id, option.text.as_deref())?;
            }
        }
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::db::open_memory_database;
    use crate::db::repository::user::insert_user;
    use crate::models::enums::Role;

    fn creator(conn: &Connection) -> i64 {
        insert_user(conn, Role::Doctor, Some("d@x.com"), None, None, None, None).unwrap()
    }

    fn question(question_type: QuestionType, text: &str) -> QuestionInput {
        QuestionInput {
            id: None,
            text: Some(text.to_string()),
            question_type,
            options: None,
            questionnaire_id: None,
        }
    }

    fn choice_question(question_type: QuestionType, text: &str, options: &[&str]) -> QuestionInput {
        QuestionInput {
            options: Some(
                options
                    .iter()
                    .map(|o| QuestionOptionInput { text: Some(o.to_string()) })
                    .collect(),
            ),
            ..question(question_type, text)
        }
    }

    #[test]
    fn create_with_initial_questions() {
        let conn = open_memory_database().unwrap();
        let doctor = creator(&conn);

        let questionnaire = create_questionnaire(
            &conn,
            Some("Intake"),
            &[
                question(QuestionType::Boolean, "Any allergies?"),
                choice_question(QuestionType::MultipleChoice, "Symptoms?", &["Cough", "Fever"]),
            ],
            doctor,
        )
        .unwrap();

        assert_eq!(questionnaire.title.as_deref(), Some("Intake"));
        assert_eq!(questionnaire.questions.len(), 2);
        match &questionnaire.questions[1] {
            AssembledQuestion::MultipleChoice { options, .. } => assert_eq!(options.len(), 2),
            other => panic!("expected multiple choice, got {other:?}"),
        }
    }

    #[test]
    fn options_ignored_for_non_choice_types() {
        let conn = open_memory_database().unwrap();
        let doctor = creator(&conn);

        let questionnaire = create_questionnaire(
            &conn,
            None,
            &[choice_question(QuestionType::Boolean, "Ok?", &["stray option"])],
            doctor,
        )
        .unwrap();

        match &questionnaire.questions[0] {
            AssembledQuestion::Boolean { .. } => {}
            other => panic!("expected boolean, got {other:?}"),
        }
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM QuestionOption", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn add_questions_requires_questionnaire_id() {
        let conn = open_memory_database().unwrap();
        let doctor = creator(&conn);
        let questionnaire = create_questionnaire(&conn, None, &[], doctor).unwrap();

        let err = add_questions(&conn, &[question(QuestionType::Text, "orphan")]).unwrap_err();
        assert!(matches!(err, QuestionnaireError::MissingQuestionnaireId));

        let mut input = question(QuestionType::Text, "attached");
        input.questionnaire_id = Some(questionnaire.id);
        let added = add_questions(&conn, &[input]).unwrap();
        assert_eq!(added.len(), 1);

        let reloaded = get_questionnaire(&conn, questionnaire.id).unwrap().unwrap();
        assert_eq!(reloaded.questions.len(), 1);
    }

    #[test]
    fn single_question_fetch() {
        let conn = open_memory_database().unwrap();
        let doctor = creator(&conn);
        let questionnaire = create_questionnaire(
            &conn,
            None,
            &[question(QuestionType::Text, "Notes")],
            doctor,
        )
        .unwrap();
        let id = questionnaire.questions[0].id();

        let fetched = get_question(&conn, id).unwrap().unwrap();
        assert_eq!(fetched.id(), id);
        assert!(get_question(&conn, id + 1).unwrap().is_none());
    }

    #[test]
    fn update_question_replaces_options_wholesale() {
        let conn = open_memory_database().unwrap();
        let doctor = creator(&conn);
        let questionnaire = create_questionnaire(
            &conn,
            None,
            &[choice_question(QuestionType::SingleChoice, "Pick", &["Old A", "Old B"])],
            doctor,
        )
        .unwrap();
        let question_id = questionnaire.questions[0].id();

        let updated = update_question(
            &conn,
            &QuestionInput {
                id: Some(question_id),
                text: Some("Pick again".to_string()),
                question_type: QuestionType::SingleChoice,
                options: Some(vec![QuestionOptionInput { text: Some("New".to_string()) }]),
                questionnaire_id: None,
            },
        )
        .unwrap();

        match updated {
            AssembledQuestion::SingleChoice { text, options, .. } => {
                assert_eq!(text.as_deref(), Some("Pick again"));
                assert_eq!(options.len(), 1);
                assert_eq!(options[0].text.as_deref(), Some("New"));
            }
            other => panic!("expected single choice, got {other:?}"),
        }
    }

    #[test]
    fn relations_attach_to_later_fetches() {
        let conn = open_memory_database().unwrap();
        let doctor = creator(&conn);
        let questionnaire = create_questionnaire(
            &conn,
            None,
            &[
                question(QuestionType::Boolean, "Fever?"),
                question(QuestionType::Text, "Details"),
            ],
            doctor,
        )
        .unwrap();
        let q1 = questionnaire.questions[0].id();
        let q2 = questionnaire.questions[1].id();

        create_question_relations(
            &conn,
            &[QuestionRelationInput {
                question_id: q1,
                next_question_id: q2,
                includes: None,
                equals: Some("true".to_string()),
            }],
        )
        .unwrap();

        let reloaded = get_questionnaire(&conn, questionnaire.id).unwrap().unwrap();
        match &reloaded.questions[0] {
            AssembledQuestion::Boolean { next, .. } => {
                assert_eq!(next.len(), 1);
                assert_eq!(next[0].next_question_id, q2);
            }
            other => panic!("expected boolean, got {other:?}"),
        }
    }
}
