use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};

use super::parse_datetime;
use crate::db::DatabaseError;
use crate::models::enums::Role;
use crate::models::AuthCode;

// ── Persisted auth tokens ──────────────────────────────────────────────────

pub fn insert_token(conn: &Connection, user_id: i64, token: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO UserToken (userId, token) VALUES (?1, ?2)",
        params![user_id, token],
    )?;
    Ok(())
}

pub fn delete_token(conn: &Connection, token: &str) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM UserToken WHERE token = ?1", params![token])?;
    Ok(deleted > 0)
}

/// Revoke every session a user holds (password change, account lockout).
pub fn delete_tokens_for_user(conn: &Connection, user_id: i64) -> Result<usize, DatabaseError> {
    let deleted = conn.execute("DELETE FROM UserToken WHERE userId = ?1", params![user_id])?;
    Ok(deleted)
}

pub fn user_id_for_token(conn: &Connection, token: &str) -> Result<Option<i64>, DatabaseError> {
    let id = conn
        .query_row(
            "SELECT userId FROM UserToken WHERE token = ?1",
            params![token],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(id)
}

// ── Invite codes ───────────────────────────────────────────────────────────

pub fn insert_auth_code(
    conn: &Connection,
    email: Option<&str>,
    phone: Option<&str>,
    role: Role,
    name: Option<&str>,
    code: &str,
    inviter_id: Option<i64>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO UserAuthCode (email, phone, role, name, code, inviterId)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![email, phone, role.as_str(), name, code, inviter_id],
    )?;
    Ok(())
}

pub fn get_auth_code(conn: &Connection, code: &str) -> Result<Option<AuthCode>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT email, phone, role, name, code, inviterId, created
         FROM UserAuthCode WHERE code = ?1",
    )?;

    let row = stmt
        .query_row(params![code], |row| {
            Ok((
                row.get::<_, Option<String>>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<i64>>(5)?,
                row.get::<_, String>(6)?,
            ))
        })
        .optional()?;

    let Some((email, phone, role, name, code, inviter_id, created)) = row else {
        return Ok(None);
    };

    Ok(Some(AuthCode {
        email,
        phone,
        role: Role::from_str(&role)?,
        name,
        code,
        inviter_id,
        created: parse_datetime(&created),
    }))
}

pub fn delete_auth_code(conn: &Connection, code: &str) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM UserAuthCode WHERE code = ?1", params![code])?;
    Ok(deleted > 0)
}
