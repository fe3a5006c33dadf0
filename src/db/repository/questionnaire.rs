use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::enums::QuestionType;
use crate::models::{Questionnaire, QuestionOption, QuestionRelation, QuestionRow};

// ── Questionnaire ──────────────────────────────────────────────────────────

pub fn insert_questionnaire(
    conn: &Connection,
    title: Option<&str>,
    creating_user_id: i64,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO Questionnaire (title, creatingUserId) VALUES (?1, ?2)",
        params![title, creating_user_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_questionnaire(conn: &Connection, id: i64) -> Result<Option<Questionnaire>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, title, creatingUserId FROM Questionnaire WHERE id = ?1",
            params![id],
            |row| {
                Ok(Questionnaire {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    creating_user_id: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

pub fn list_questionnaires(conn: &Connection) -> Result<Vec<Questionnaire>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT id, title, creatingUserId FROM Questionnaire ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok(Questionnaire {
            id: row.get(0)?,
            title: row.get(1)?,
            creating_user_id: row.get(2)?,
        })
    })?;

    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

/// Delete a questionnaire. Questions, options, relations, and response rows
/// go with it via FK cascades.
pub fn delete_questionnaire(conn: &Connection, id: i64) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM Questionnaire WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

// ── Question ───────────────────────────────────────────────────────────────

pub fn insert_question(
    conn: &Connection,
    questionnaire_id: i64,
    text: Option<&str>,
    question_type: QuestionType,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO Question (questionnaireId, text, type) VALUES (?1, ?2, ?3)",
        params![questionnaire_id, text, question_type.as_str()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_question(conn: &Connection, id: i64) -> Result<Option<QuestionRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, questionnaireId, text, type FROM Question WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;

    let Some((id, questionnaire_id, text, question_type)) = row else {
        return Ok(None);
    };

    Ok(Some(QuestionRow {
        id,
        questionnaire_id,
        text,
        question_type: QuestionType::from_str(&question_type)?,
    }))
}

pub fn questions_for_questionnaire(
    conn: &Connection,
    questionnaire_id: i64,
) -> Result<Vec<QuestionRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, questionnaireId, text, type FROM Question
         WHERE questionnaireId = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![questionnaire_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut questions = Vec::new();
    for row in rows {
        let (id, questionnaire_id, text, question_type) = row?;
        questions.push(QuestionRow {
            id,
            questionnaire_id,
            text,
            question_type: QuestionType::from_str(&question_type)?,
        });
    }
    Ok(questions)
}

pub fn update_question(
    conn: &Connection,
    id: i64,
    text: Option<&str>,
    question_type: QuestionType,
) -> Result<bool, DatabaseError> {
    let updated = conn.execute(
        "UPDATE Question SET text = ?1, type = ?2 WHERE id = ?3",
        params![text, question_type.as_str(), id],
    )?;
    Ok(updated > 0)
}

pub fn delete_question(conn: &Connection, id: i64) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM Question WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

// ── QuestionOption ─────────────────────────────────────────────────────────

pub fn insert_option(
    conn: &Connection,
    question_id: i64,
    text: Option<&str>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO QuestionOption (questionId, text) VALUES (?1, ?2)",
        params![question_id, text],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_option(conn: &Connection, id: i64) -> Result<Option<QuestionOption>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, questionId, text FROM QuestionOption WHERE id = ?1",
            params![id],
            |row| {
                Ok(QuestionOption {
                    id: row.get(0)?,
                    question_id: row.get(1)?,
                    text: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

pub fn options_for_question(
    conn: &Connection,
    question_id: i64,
) -> Result<Vec<QuestionOption>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, questionId, text FROM QuestionOption WHERE questionId = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![question_id], |row| {
        Ok(QuestionOption {
            id: row.get(0)?,
            question_id: row.get(1)?,
            text: row.get(2)?,
        })
    })?;

    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn delete_options_for_question(conn: &Connection, question_id: i64) -> Result<(), DatabaseError> {
    conn.execute(
        "DELETE FROM QuestionOption WHERE questionId = ?1",
        params![question_id],
    )?;
    Ok(())
}

// ── QuestionRelation ───────────────────────────────────────────────────────

pub fn insert_relation(
    conn: &Connection,
    question_id: i64,
    next_question_id: i64,
    includes: Option<&str>,
    equals: Option<&str>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO QuestionRelation (questionId, includes, equals, nextQuestionId)
         VALUES (?1, ?2, ?3, ?4)",
        params![question_id, includes, equals, next_question_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn relations_for_question(
    conn: &Connection,
    question_id: i64,
) -> Result<Vec<QuestionRelation>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, questionId, includes, equals, nextQuestionId
         FROM QuestionRelation WHERE questionId = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![question_id], |row| {
        Ok(QuestionRelation {
            id: row.get(0)?,
            question_id: row.get(1)?,
            includes: row.get(2)?,
            equals: row.get(3)?,
            next_question_id: row.get(4)?,
        })
    })?;

    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}
