use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;

/// The (question, user, instance) key every response row hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseKey {
    pub question_id: i64,
    pub user_id: i64,
    pub assignment_instance_id: i64,
}

// ── Boolean ────────────────────────────────────────────────────────────────

/// Insert-or-update: repeated submissions for the same key keep exactly one
/// row holding the latest value.
pub fn upsert_boolean_response(
    conn: &Connection,
    key: ResponseKey,
    value: bool,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO QuestionResponseBoolean (questionId, userId, assignmentInstanceId, value)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(questionId, userId, assignmentInstanceId) DO UPDATE SET value = excluded.value",
        params![
            key.question_id,
            key.user_id,
            key.assignment_instance_id,
            value as i64,
        ],
    )?;
    Ok(())
}

/// Row existence decides "answered"; a stored `false` is a real answer.
pub fn get_boolean_response(conn: &Connection, key: ResponseKey) -> Result<Option<bool>, DatabaseError> {
    let value = conn
        .query_row(
            "SELECT value FROM QuestionResponseBoolean
             WHERE questionId = ?1 AND userId = ?2 AND assignmentInstanceId = ?3",
            params![key.question_id, key.user_id, key.assignment_instance_id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(value.map(|v| v != 0))
}

// ── Text ───────────────────────────────────────────────────────────────────

pub fn upsert_text_response(
    conn: &Connection,
    key: ResponseKey,
    value: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO QuestionResponseText (questionId, userId, assignmentInstanceId, value)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(questionId, userId, assignmentInstanceId) DO UPDATE SET value = excluded.value",
        params![
            key.question_id,
            key.user_id,
            key.assignment_instance_id,
            value,
        ],
    )?;
    Ok(())
}

pub fn get_text_response(conn: &Connection, key: ResponseKey) -> Result<Option<String>, DatabaseError> {
    let value = conn
        .query_row(
            "SELECT value FROM QuestionResponseText
             WHERE questionId = ?1 AND userId = ?2 AND assignmentInstanceId = ?3",
            params![key.question_id, key.user_id, key.assignment_instance_id],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()?;
    Ok(value.flatten())
}

// ── Choice ─────────────────────────────────────────────────────────────────

pub fn delete_choice_responses(conn: &Connection, key: ResponseKey) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM QuestionResponseChoice
         WHERE questionId = ?1 AND userId = ?2 AND assignmentInstanceId = ?3",
        params![key.question_id, key.user_id, key.assignment_instance_id],
    )?;
    Ok(deleted)
}

pub fn insert_choice_response(
    conn: &Connection,
    key: ResponseKey,
    option_id: i64,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO QuestionResponseChoice (questionId, userId, optionId, assignmentInstanceId)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            key.question_id,
            key.user_id,
            option_id,
            key.assignment_instance_id,
        ],
    )?;
    Ok(())
}

/// Stored option ids in submission order (rowid order = insertion order).
pub fn choice_option_ids(conn: &Connection, key: ResponseKey) -> Result<Vec<i64>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT optionId FROM QuestionResponseChoice
         WHERE questionId = ?1 AND userId = ?2 AND assignmentInstanceId = ?3
         ORDER BY rowid",
    )?;
    let rows = stmt.query_map(
        params![key.question_id, key.user_id, key.assignment_instance_id],
        |row| row.get::<_, i64>(0),
    )?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

// ── Event ──────────────────────────────────────────────────────────────────

pub fn insert_event_response(
    conn: &Connection,
    key: ResponseKey,
    timeline_item_id: i64,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO QuestionResponseEvent (questionId, userId, assignmentInstanceId, timelineItemId)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            key.question_id,
            key.user_id,
            key.assignment_instance_id,
            timeline_item_id,
        ],
    )?;
    Ok(())
}

/// The linked TimelineItem id, if this key was ever answered.
pub fn event_timeline_item_id(conn: &Connection, key: ResponseKey) -> Result<Option<i64>, DatabaseError> {
    let id = conn
        .query_row(
            "SELECT timelineItemId FROM QuestionResponseEvent
             WHERE questionId = ?1 AND userId = ?2 AND assignmentInstanceId = ?3",
            params![key.question_id, key.user_id, key.assignment_instance_id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(id)
}

pub fn delete_event_response(conn: &Connection, key: ResponseKey) -> Result<bool, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM QuestionResponseEvent
         WHERE questionId = ?1 AND userId = ?2 AND assignmentInstanceId = ?3",
        params![key.question_id, key.user_id, key.assignment_instance_id],
    )?;
    Ok(deleted > 0)
}
