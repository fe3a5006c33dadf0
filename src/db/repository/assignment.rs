use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use super::{fmt_datetime, parse_datetime};
use crate::db::DatabaseError;
use crate::models::{Assignment, AssignmentInstance};

// ── QuestionnaireAssignment ────────────────────────────────────────────────

pub fn insert_assignment(
    conn: &Connection,
    questionnaire_id: i64,
    assignee_id: i64,
    assigner_id: i64,
    repeat_interval: Option<i64>,
    created: NaiveDateTime,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO QuestionnaireAssignment
         (questionnaireId, assigneeId, assignerId, created, repeatInterval)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            questionnaire_id,
            assignee_id,
            assigner_id,
            fmt_datetime(created),
            repeat_interval,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_assignment(conn: &Connection, id: i64) -> Result<Option<Assignment>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, questionnaireId, assigneeId, assignerId, created, repeatInterval
             FROM QuestionnaireAssignment WHERE id = ?1",
            params![id],
            assignment_from_rusqlite,
        )
        .optional()?;
    Ok(row)
}

pub fn assignments_by_assigner(
    conn: &Connection,
    assigner_id: i64,
) -> Result<Vec<Assignment>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, questionnaireId, assigneeId, assignerId, created, repeatInterval
         FROM QuestionnaireAssignment WHERE assignerId = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![assigner_id], assignment_from_rusqlite)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

/// Assignments the recurrence sweep has to consider: repeatInterval set
/// and greater than zero.
pub fn repeating_assignments(conn: &Connection) -> Result<Vec<Assignment>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, questionnaireId, assigneeId, assignerId, created, repeatInterval
         FROM QuestionnaireAssignment
         WHERE repeatInterval IS NOT NULL AND repeatInterval > 0 ORDER BY id",
    )?;
    let rows = stmt.query_map([], assignment_from_rusqlite)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

/// Partial update. `repeat_interval` uses a nested Option: the outer level
/// is "change it or not", the inner is the new stored value.
pub struct AssignmentPatch {
    pub assignee_id: Option<i64>,
    pub assigner_id: Option<i64>,
    pub repeat_interval: Option<Option<i64>>,
}

pub fn update_assignment(
    conn: &Connection,
    id: i64,
    patch: &AssignmentPatch,
) -> Result<bool, DatabaseError> {
    let mut sets: Vec<&str> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(assignee) = patch.assignee_id {
        values.push(Box::new(assignee));
        sets.push("assigneeId");
    }
    if let Some(assigner) = patch.assigner_id {
        values.push(Box::new(assigner));
        sets.push("assignerId");
    }
    if let Some(interval) = patch.repeat_interval {
        values.push(Box::new(interval));
        sets.push("repeatInterval");
    }

    if sets.is_empty() {
        return Ok(get_assignment(conn, id)?.is_some());
    }

    let assignments: Vec<String> = sets
        .iter()
        .enumerate()
        .map(|(i, col)| format!("{} = ?{}", col, i + 1))
        .collect();
    values.push(Box::new(id));
    let sql = format!(
        "UPDATE QuestionnaireAssignment SET {} WHERE id = ?{}",
        assignments.join(", "),
        values.len()
    );

    let refs: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let updated = conn.execute(&sql, refs.as_slice())?;
    Ok(updated > 0)
}

/// Deletes the assignment row only. Instances deliberately have no FK to
/// this table, so history is untouched.
pub fn delete_assignment(conn: &Connection, id: i64) -> Result<bool, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM QuestionnaireAssignment WHERE id = ?1",
        params![id],
    )?;
    Ok(deleted > 0)
}

// ── QuestionnaireAssignmentInstance ────────────────────────────────────────

pub fn insert_instance(
    conn: &Connection,
    assignment: &Assignment,
    created: NaiveDateTime,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO QuestionnaireAssignmentInstance
         (created, assignmentId, questionnaireId, assigneeId, assignerId)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            fmt_datetime(created),
            assignment.id,
            assignment.questionnaire_id,
            assignment.assignee_id,
            assignment.assigner_id,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_instance(conn: &Connection, id: i64) -> Result<Option<AssignmentInstance>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, created, assignmentId, questionnaireId, assigneeId, assignerId
             FROM QuestionnaireAssignmentInstance WHERE id = ?1",
            params![id],
            instance_from_rusqlite,
        )
        .optional()?;
    Ok(row)
}

pub fn instances_for_assignment(
    conn: &Connection,
    assignment_id: i64,
) -> Result<Vec<AssignmentInstance>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, created, assignmentId, questionnaireId, assigneeId, assignerId
         FROM QuestionnaireAssignmentInstance WHERE assignmentId = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![assignment_id], instance_from_rusqlite)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn instances_for_assignee(
    conn: &Connection,
    assignee_id: i64,
) -> Result<Vec<AssignmentInstance>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, created, assignmentId, questionnaireId, assigneeId, assignerId
         FROM QuestionnaireAssignmentInstance WHERE assigneeId = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![assignee_id], instance_from_rusqlite)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

fn assignment_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<Assignment, rusqlite::Error> {
    Ok(Assignment {
        id: row.get(0)?,
        questionnaire_id: row.get(1)?,
        assignee_id: row.get(2)?,
        assigner_id: row.get(3)?,
        created: parse_datetime(&row.get::<_, String>(4)?),
        repeat_interval: row.get(5)?,
    })
}

fn instance_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<AssignmentInstance, rusqlite::Error> {
    Ok(AssignmentInstance {
        id: row.get(0)?,
        created: parse_datetime(&row.get::<_, String>(1)?),
        assignment_id: row.get(2)?,
        questionnaire_id: row.get(3)?,
        assignee_id: row.get(4)?,
        assigner_id: row.get(5)?,
    })
}
