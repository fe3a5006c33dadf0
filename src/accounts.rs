//! Accounts — user creation and profile updates, password credentials,
//! persisted token auth, invite codes, and the doctor/patient relationship.
//!
//! Tokens live in the UserToken table, never in process memory, so a restart
//! invalidates nothing and every running process sees the same sessions.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::NaiveDate;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use regex::Regex;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use uuid::Uuid;

use crate::db::repository::auth::{
    delete_auth_code, delete_token, delete_tokens_for_user, get_auth_code, insert_auth_code,
    insert_token, user_id_for_token,
};
use crate::db::repository::user::{
    self, doctors_of, get_user, insert_user, link_doctor_patient, list_users, patients_of,
    set_adherence, unlink_doctor_patient, user_by_email, user_by_phone, users_by_role, UserPatch,
};
use crate::db::DatabaseError;
use crate::models::enums::Role;
use crate::models::{AuthCode, User};

const PBKDF2_ITERATIONS: u32 = 600_000;
const HASH_LENGTH: usize = 32;
const SALT_LENGTH: usize = 16;

#[derive(Error, Debug)]
pub enum AccountError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("An email address or phone number is required")]
    MissingContact,

    #[error("'{0}' is not a valid email address or phone number")]
    InvalidContact(String),

    #[error("A user with that contact already exists")]
    ContactTaken,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unknown invite code")]
    UnknownAuthCode,
}

pub fn is_email(text: &str) -> bool {
    let re = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    re.is_match(text)
}

pub fn is_phone(text: &str) -> bool {
    let re = Regex::new(r"^[0-9]{5,15}$").unwrap();
    re.is_match(text)
}

// ── User creation & profile ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub role: Role,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub password: Option<String>,
}

pub fn create_user(conn: &Connection, new_user: &NewUser) -> Result<User, AccountError> {
    if new_user.email.is_none() && new_user.phone.is_none() {
        return Err(AccountError::MissingContact);
    }
    if let Some(email) = new_user.email.as_deref() {
        if !is_email(email) {
            return Err(AccountError::InvalidContact(email.to_string()));
        }
        if user_by_email(conn, email)?.is_some() {
            return Err(AccountError::ContactTaken);
        }
    }
    if let Some(phone) = new_user.phone.as_deref() {
        if !is_phone(phone) {
            return Err(AccountError::InvalidContact(phone.to_string()));
        }
        if user_by_phone(conn, phone)?.is_some() {
            return Err(AccountError::ContactTaken);
        }
    }

    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    let id = insert_user(
        &tx,
        new_user.role,
        new_user.email.as_deref(),
        new_user.phone.as_deref(),
        new_user.name.as_deref(),
        new_user.image_url.as_deref(),
        new_user.birthday,
    )?;
    if let Some(password) = new_user.password.as_deref() {
        user::set_password_hash(&tx, id, &hash_password(password))?;
    }
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(user_id = id, role = new_user.role.as_str(), "user created");
    get_user(conn, id)?.ok_or(AccountError::Database(DatabaseError::NotFound {
        entity_type: "User",
        id,
    }))
}

/// Profile update for the acting user; only supplied fields change.
pub fn update_me(conn: &Connection, user_id: i64, patch: &UserPatch<'_>) -> Result<User, AccountError> {
    if let Some(email) = patch.email {
        if !is_email(email) {
            return Err(AccountError::InvalidContact(email.to_string()));
        }
    }
    if let Some(phone) = patch.phone {
        if !is_phone(phone) {
            return Err(AccountError::InvalidContact(phone.to_string()));
        }
    }

    user::update_user(conn, user_id, patch)?;
    get_user(conn, user_id)?.ok_or(AccountError::Database(DatabaseError::NotFound {
        entity_type: "User",
        id: user_id,
    }))
}

/// Set (or replace) a user's password and revoke any outstanding sessions.
pub fn set_password(conn: &Connection, user_id: i64, password: &str) -> Result<(), AccountError> {
    user::set_password_hash(conn, user_id, &hash_password(password))?;
    delete_tokens_for_user(conn, user_id)?;
    Ok(())
}

// ── Token auth ─────────────────────────────────────────────────────────────

/// Verify credentials and mint a persisted session token. The identity may
/// be an email address or a phone number; failures are indistinguishable to
/// the caller.
pub fn authenticate(conn: &Connection, identity: &str, password: &str) -> Result<String, AccountError> {
    let user = if is_email(identity) {
        user_by_email(conn, identity)?
    } else if is_phone(identity) {
        user_by_phone(conn, identity)?
    } else {
        None
    };
    let Some(user) = user else {
        return Err(AccountError::InvalidCredentials);
    };

    let Some(stored) = user::password_hash_for(conn, user.id)? else {
        return Err(AccountError::InvalidCredentials);
    };
    if !verify_password(password, &stored) {
        return Err(AccountError::InvalidCredentials);
    }

    let token = Uuid::new_v4().to_string();
    insert_token(conn, user.id, &token)?;
    user::touch_last_visit(conn, user.id)?;
    tracing::info!(user_id = user.id, "authenticated");
    Ok(token)
}

/// Revoke one session token. Returns false if the token was already gone.
pub fn deauthenticate(conn: &Connection, token: &str) -> Result<bool, AccountError> {
    Ok(delete_token(conn, token)?)
}

/// Resolve the acting user for a presented token.
pub fn user_for_token(conn: &Connection, token: &str) -> Result<Option<User>, DatabaseError> {
    match user_id_for_token(conn, token)? {
        Some(user_id) => get_user(conn, user_id),
        None => Ok(None),
    }
}

// ── Invite codes ───────────────────────────────────────────────────────────

/// Issue an invite code for an email address or phone number. Delivery of
/// the code (mail, SMS) happens outside this crate.
pub fn create_auth_code(
    conn: &Connection,
    contact: &str,
    role: Role,
    name: Option<&str>,
    inviter_id: Option<i64>,
) -> Result<AuthCode, AccountError> {
    let (email, phone) = if is_email(contact) {
        (Some(contact), None)
    } else if is_phone(contact) {
        (None, Some(contact))
    } else {
        return Err(AccountError::InvalidContact(contact.to_string()));
    };

    let code = Uuid::new_v4().to_string();
    insert_auth_code(conn, email, phone, role, name, &code, inviter_id)?;
    tracing::info!(contact, role = role.as_str(), "invite code issued");

    get_auth_code(conn, &code)?.ok_or(AccountError::UnknownAuthCode)
}

/// Redeem an invite code: find or create the invited user, consume the code,
/// and mint a session token.
pub fn redeem_auth_code(conn: &Connection, code: &str) -> Result<(User, String), AccountError> {
    let Some(auth_code) = get_auth_code(conn, code)? else {
        return Err(AccountError::UnknownAuthCode);
    };

    let existing = match (auth_code.email.as_deref(), auth_code.phone.as_deref()) {
        (Some(email), _) => user_by_email(conn, email)?,
        (None, Some(phone)) => user_by_phone(conn, phone)?,
        (None, None) => None,
    };

    let user = match existing {
        Some(user) => user,
        None => create_user(
            conn,
            &NewUser {
                role: auth_code.role,
                email: auth_code.email.clone(),
                phone: auth_code.phone.clone(),
                name: auth_code.name.clone(),
                image_url: None,
                birthday: None,
                password: None,
            },
        )?,
    };

    delete_auth_code(conn, code)?;
    let token = Uuid::new_v4().to_string();
    insert_token(conn, user.id, &token)?;
    tracing::info!(user_id = user.id, "invite code redeemed");
    Ok((user, token))
}

// ── Doctor/patient relationship ────────────────────────────────────────────

pub fn assign_patient_to_doctor(
    conn: &Connection,
    patient_id: i64,
    doctor_id: i64,
) -> Result<(), AccountError> {
    link_doctor_patient(conn, doctor_id, patient_id)?;
    tracing::info!(doctor_id, patient_id, "patient assigned to doctor");
    Ok(())
}

pub fn unassign_patient_from_doctor(
    conn: &Connection,
    patient_id: i64,
    doctor_id: i64,
) -> Result<bool, AccountError> {
    Ok(unlink_doctor_patient(conn, doctor_id, patient_id)?)
}

pub fn my_patients(conn: &Connection, doctor_id: i64) -> Result<Vec<User>, DatabaseError> {
    patients_of(conn, doctor_id)
}

pub fn my_doctors(conn: &Connection, patient_id: i64) -> Result<Vec<User>, DatabaseError> {
    doctors_of(conn, patient_id)
}

// ── Directory queries ──────────────────────────────────────────────────────

pub fn all_users(conn: &Connection) -> Result<Vec<User>, DatabaseError> {
    list_users(conn)
}

pub fn all_patients(conn: &Connection) -> Result<Vec<User>, DatabaseError> {
    users_by_role(conn, Role::Patient)
}

pub fn all_doctors(conn: &Connection) -> Result<Vec<User>, DatabaseError> {
    users_by_role(conn, Role::Doctor)
}

/// Record a patient's computed adherence score (shown on their profile).
pub fn record_adherence(conn: &Connection, user_id: i64, adherence: i64) -> Result<(), DatabaseError> {
    set_adherence(conn, user_id, adherence)
}

// ── Password hashing ───────────────────────────────────────────────────────

/// PBKDF2-SHA256, stored as `pbkdf2-sha256$iterations$salt$hash` with
/// base64-encoded salt and hash.
fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    let hash = derive(password, &salt, PBKDF2_ITERATIONS);
    format!(
        "pbkdf2-sha256${}${}${}",
        PBKDF2_ITERATIONS,
        BASE64.encode(salt),
        BASE64.encode(hash)
    )
}

fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some("pbkdf2-sha256"), Some(iterations), Some(salt), Some(hash), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (BASE64.decode(salt), BASE64.decode(hash)) else {
        return false;
    };

    let computed = derive(password, &salt, iterations);
    computed.as_slice().ct_eq(expected.as_slice()).into()
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_LENGTH] {
    let mut out = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    fn new_patient(email: &str, password: Option<&str>) -> NewUser {
        NewUser {
            role: Role::Patient,
            email: Some(email.to_string()),
            phone: None,
            name: Some("Pat".to_string()),
            image_url: None,
            birthday: None,
            password: password.map(str::to_string),
        }
    }

    #[test]
    fn contact_validation() {
        assert!(is_email("user@example.com"));
        assert!(!is_email("not-an-email"));
        assert!(!is_email("a@b"));
        assert!(is_phone("5551234567"));
        assert!(!is_phone("555-123"));
        assert!(!is_phone(""));
    }

    #[test]
    fn create_user_requires_a_contact() {
        let conn = open_memory_database().unwrap();
        let mut user = new_patient("p@x.com", None);
        user.email = None;
        let err = create_user(&conn, &user).unwrap_err();
        assert!(matches!(err, AccountError::MissingContact));
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let conn = open_memory_database().unwrap();
        create_user(&conn, &new_patient("p@x.com", None)).unwrap();
        let err = create_user(&conn, &new_patient("p@x.com", None)).unwrap_err();
        assert!(matches!(err, AccountError::ContactTaken));
    }

    #[test]
    fn authenticate_and_resolve_token() {
        let conn = open_memory_database().unwrap();
        let user = create_user(&conn, &new_patient("p@x.com", Some("hunter2"))).unwrap();

        let token = authenticate(&conn, "p@x.com", "hunter2").unwrap();
        let resolved = user_for_token(&conn, &token).unwrap().unwrap();
        assert_eq!(resolved.id, user.id);
        // authentication stamps lastVisit
        assert!(resolved.last_visit.is_some());

        assert!(deauthenticate(&conn, &token).unwrap());
        assert!(user_for_token(&conn, &token).unwrap().is_none());
    }

    #[test]
    fn wrong_password_is_invalid_credentials() {
        let conn = open_memory_database().unwrap();
        create_user(&conn, &new_patient("p@x.com", Some("hunter2"))).unwrap();

        let err = authenticate(&conn, "p@x.com", "wrong").unwrap_err();
        assert!(matches!(err, AccountError::InvalidCredentials));
        let err = authenticate(&conn, "nobody@x.com", "hunter2").unwrap_err();
        assert!(matches!(err, AccountError::InvalidCredentials));
    }

    #[test]
    fn redeeming_code_creates_user_and_consumes_code() {
        let conn = open_memory_database().unwrap();
        let doctor = create_user(
            &conn,
            &NewUser {
                role: Role::Doctor,
                email: Some("d@x.com".into()),
                phone: None,
                name: None,
                image_url: None,
                birthday: None,
                password: None,
            },
        )
        .unwrap();

        let code = create_auth_code(
            &conn,
            "invitee@example.com",
            Role::Patient,
            Some("Ida"),
            Some(doctor.id),
        )
        .unwrap();

        let (user, token) = redeem_auth_code(&conn, &code.code).unwrap();
        assert_eq!(user.role, Role::Patient);
        assert_eq!(user.email.as_deref(), Some("invitee@example.com"));
        assert_eq!(user.name.as_deref(), Some("Ida"));
        assert!(user_for_token(&conn, &token).unwrap().is_some());

        // consumed: a second redemption fails
        let err = redeem_auth_code(&conn, &code.code).unwrap_err();
        assert!(matches!(err, AccountError::UnknownAuthCode));
    }

    #[test]
    fn redeeming_code_for_existing_user_logs_them_in() {
        let conn = open_memory_database().unwrap();
        let existing = create_user(&conn, &new_patient("p@x.com", None)).unwrap();
        let code = create_auth_code(&conn, "p@x.com", Role::Patient, None, None).unwrap();

        let (user, _token) = redeem_auth_code(&conn, &code.code).unwrap();
        assert_eq!(user.id, existing.id);
    }

    #[test]
    fn invite_to_garbage_contact_fails() {
        let conn = open_memory_database().unwrap();
        let err = create_auth_code(&conn, "garbage", Role::Patient, None, None).unwrap_err();
        assert!(matches!(err, AccountError::InvalidContact(_)));
    }

    #[test]
    fn directory_queries_filter_by_role() {
        let conn = open_memory_database().unwrap();
        create_user(&conn, &new_patient("p1@x.com", None)).unwrap();
        create_user(&conn, &new_patient("p2@x.com", None)).unwrap();
        let mut doctor = new_patient("d@x.com", None);
        doctor.role = Role::Doctor;
        create_user(&conn, &doctor).unwrap();

        assert_eq!(all_users(&conn).unwrap().len(), 3);
        assert_eq!(all_patients(&conn).unwrap().len(), 2);
        assert_eq!(all_doctors(&conn).unwrap().len(), 1);
    }

    #[test]
    fn adherence_shows_up_on_the_profile() {
        let conn = open_memory_database().unwrap();
        let user = create_user(&conn, &new_patient("p@x.com", None)).unwrap();
        assert_eq!(user.adherence, None);

        record_adherence(&conn, user.id, 85).unwrap();
        let reloaded = get_user(&conn, user.id).unwrap().unwrap();
        assert_eq!(reloaded.adherence, Some(85));
    }

    #[test]
    fn password_hashes_are_salted() {
        let a = hash_password("same password");
        let b = hash_password("same password");
        assert_ne!(a, b);
        assert!(verify_password("same password", &a));
        assert!(verify_password("same password", &b));
        assert!(!verify_password("different", &a));
    }

    #[test]
    fn malformed_stored_hash_never_verifies() {
        assert!(!verify_password("anything", ""));
        assert!(!verify_password("anything", "bcrypt$whatever"));
        assert!(!verify_password("anything", "pbkdf2-sha256$notanumber$AA$AA"));
    }
}
