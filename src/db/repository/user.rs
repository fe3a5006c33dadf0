use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use super::parse_datetime;
use crate::db::DatabaseError;
use crate::models::enums::Role;
use crate::models::User;

const USER_COLUMNS: &str = "u.id, u.role, u.email, u.phone, u.name, u.imageUrl, u.birthday,
     u.joinDate, l.lastVisit, h.adherence";

const USER_JOINS: &str = "FROM User u
     LEFT JOIN UserLogin l ON l.userId = u.id
     LEFT JOIN UserHealth h ON h.userId = u.id";

pub fn insert_user(
    conn: &Connection,
    role: Role,
    email: Option<&str>,
    phone: Option<&str>,
    name: Option<&str>,
    image_url: Option<&str>,
    birthday: Option<NaiveDate>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO User (role, email, phone, name, imageUrl, birthday)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            role.as_str(),
            email,
            phone,
            name,
            image_url,
            birthday.map(|d| d.to_string()),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_user(conn: &Connection, id: i64) -> Result<Option<User>, DatabaseError> {
    let sql = format!("SELECT {USER_COLUMNS} {USER_JOINS} WHERE u.id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt
        .query_row(params![id], user_row_from_rusqlite)
        .optional()?;
    row.map(user_from_row).transpose()
}

pub fn user_by_email(conn: &Connection, email: &str) -> Result<Option<User>, DatabaseError> {
    let sql = format!("SELECT {USER_COLUMNS} {USER_JOINS} WHERE u.email = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt
        .query_row(params![email], user_row_from_rusqlite)
        .optional()?;
    row.map(user_from_row).transpose()
}

pub fn user_by_phone(conn: &Connection, phone: &str) -> Result<Option<User>, DatabaseError> {
    let sql = format!("SELECT {USER_COLUMNS} {USER_JOINS} WHERE u.phone = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt
        .query_row(params![phone], user_row_from_rusqlite)
        .optional()?;
    row.map(user_from_row).transpose()
}

pub fn list_users(conn: &Connection) -> Result<Vec<User>, DatabaseError> {
    let sql = format!("SELECT {USER_COLUMNS} {USER_JOINS} ORDER BY u.id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], user_row_from_rusqlite)?;

    let mut users = Vec::new();
    for row in rows {
        users.push(user_from_row(row?)?);
    }
    Ok(users)
}

pub fn users_by_role(conn: &Connection, role: Role) -> Result<Vec<User>, DatabaseError> {
    let sql = format!("SELECT {USER_COLUMNS} {USER_JOINS} WHERE u.role = ?1 ORDER BY u.id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![role.as_str()], user_row_from_rusqlite)?;

    let mut users = Vec::new();
    for row in rows {
        users.push(user_from_row(row?)?);
    }
    Ok(users)
}

/// Partial profile update — only the supplied fields change.
pub struct UserPatch<'a> {
    pub name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub role: Option<Role>,
    pub image_url: Option<&'a str>,
    pub birthday: Option<NaiveDate>,
}

pub fn update_user(conn: &Connection, id: i64, patch: &UserPatch<'_>) -> Result<(), DatabaseError> {
    let mut sets: Vec<&str> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(name) = patch.name {
        values.push(Box::new(name.to_string()));
        sets.push("name");
    }
    if let Some(email) = patch.email {
        values.push(Box::new(email.to_string()));
        sets.push("email");
    }
    if let Some(phone) = patch.phone {
        values.push(Box::new(phone.to_string()));
        sets.push("phone");
    }
    if let Some(role) = patch.role {
        values.push(Box::new(role.as_str()));
        sets.push("role");
    }
    if let Some(url) = patch.image_url {
        values.push(Box::new(url.to_string()));
        sets.push("imageUrl");
    }
    if let Some(birthday) = patch.birthday {
        values.push(Box::new(birthday.to_string()));
        sets.push("birthday");
    }

    if sets.is_empty() {
        return Ok(());
    }

    let assignments: Vec<String> = sets
        .iter()
        .enumerate()
        .map(|(i, col)| format!("{} = ?{}", col, i + 1))
        .collect();
    values.push(Box::new(id));
    let sql = format!(
        "UPDATE User SET {} WHERE id = ?{}",
        assignments.join(", "),
        values.len()
    );

    let refs: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    conn.execute(&sql, refs.as_slice())?;
    Ok(())
}

// ── Credentials ────────────────────────────────────────────────────────────

pub fn set_password_hash(conn: &Connection, user_id: i64, hash: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO UserLogin (userId, passwordHash) VALUES (?1, ?2)
         ON CONFLICT(userId) DO UPDATE SET passwordHash = excluded.passwordHash",
        params![user_id, hash],
    )?;
    Ok(())
}

pub fn password_hash_for(conn: &Connection, user_id: i64) -> Result<Option<String>, DatabaseError> {
    let hash = conn
        .query_row(
            "SELECT passwordHash FROM UserLogin WHERE userId = ?1",
            params![user_id],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()?;
    Ok(hash.flatten())
}

pub fn touch_last_visit(conn: &Connection, user_id: i64) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO UserLogin (userId, lastVisit) VALUES (?1, datetime('now'))
         ON CONFLICT(userId) DO UPDATE SET lastVisit = excluded.lastVisit",
        params![user_id],
    )?;
    Ok(())
}

pub fn set_adherence(conn: &Connection, user_id: i64, adherence: i64) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO UserHealth (userId, adherence) VALUES (?1, ?2)
         ON CONFLICT(userId) DO UPDATE SET adherence = excluded.adherence",
        params![user_id, adherence],
    )?;
    Ok(())
}

// ── Doctor/patient relationship ────────────────────────────────────────────

pub fn link_doctor_patient(
    conn: &Connection,
    doctor_id: i64,
    patient_id: i64,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO DoctorPatientRelationship (doctorId, patientId) VALUES (?1, ?2)",
        params![doctor_id, patient_id],
    )?;
    Ok(())
}

pub fn unlink_doctor_patient(
    conn: &Connection,
    doctor_id: i64,
    patient_id: i64,
) -> Result<bool, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM DoctorPatientRelationship WHERE doctorId = ?1 AND patientId = ?2",
        params![doctor_id, patient_id],
    )?;
    Ok(deleted > 0)
}

pub fn is_patient_of(
    conn: &Connection,
    doctor_id: i64,
    patient_id: i64,
) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM DoctorPatientRelationship WHERE doctorId = ?1 AND patientId = ?2",
        params![doctor_id, patient_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn patients_of(conn: &Connection, doctor_id: i64) -> Result<Vec<User>, DatabaseError> {
    let sql = format!(
        "SELECT {USER_COLUMNS} {USER_JOINS}
         JOIN DoctorPatientRelationship r ON r.patientId = u.id
         WHERE r.doctorId = ?1 ORDER BY u.id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![doctor_id], user_row_from_rusqlite)?;

    let mut users = Vec::new();
    for row in rows {
        users.push(user_from_row(row?)?);
    }
    Ok(users)
}

pub fn doctors_of(conn: &Connection, patient_id: i64) -> Result<Vec<User>, DatabaseError> {
    let sql = format!(
        "SELECT {USER_COLUMNS} {USER_JOINS}
         JOIN DoctorPatientRelationship r ON r.doctorId = u.id
         WHERE r.patientId = ?1 ORDER BY u.id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![patient_id], user_row_from_rusqlite)?;

    let mut users = Vec::new();
    for row in rows {
        users.push(user_from_row(row?)?);
    }
    Ok(users)
}

// Internal row type for User mapping
struct UserRow {
    id: i64,
    role: String,
    email: Option<String>,
    phone: Option<String>,
    name: Option<String>,
    image_url: Option<String>,
    birthday: Option<String>,
    join_date: String,
    last_visit: Option<String>,
    adherence: Option<i64>,
}

fn user_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<UserRow, rusqlite::Error> {
    Ok(UserRow {
        id: row.get(0)?,
        role: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        name: row.get(4)?,
        image_url: row.get(5)?,
        birthday: row.get(6)?,
        join_date: row.get(7)?,
        last_visit: row.get(8)?,
        adherence: row.get(9)?,
    })
}

fn user_from_row(row: UserRow) -> Result<User, DatabaseError> {
    Ok(User {
        id: row.id,
        role: Role::from_str(&row.role)?,
        email: row.email,
        phone: row.phone,
        name: row.name,
        image_url: row.image_url,
        birthday: row
            .birthday
            .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        join_date: parse_datetime(&row.join_date),
        last_visit: row.last_visit.as_deref().map(parse_datetime),
        adherence: row.adherence,
    })
}
