//! Role and ownership policy checks.
//!
//! One policy function per rule, called before every mutating operation
//! that touches assignments, users, or responses. Default-deny: anything
//! not explicitly allowed fails with a `PolicyError`.

use rusqlite::Connection;

use crate::db::repository::assignment::get_assignment;
use crate::db::repository::user::is_patient_of;
use crate::db::DatabaseError;
use crate::models::enums::Role;
use crate::models::User;

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("Operation requires one of {required:?}, actor has role {actual:?}")]
    RoleDenied { required: Vec<Role>, actual: Role },

    #[error("Patient {patient_id} is not a patient of doctor {doctor_id}")]
    NotYourPatient { doctor_id: i64, patient_id: i64 },

    #[error("Only the creator of assignment {assignment_id} may modify it")]
    NotAssignmentCreator { assignment_id: i64 },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Allow the operation only for actors holding one of the given roles.
pub fn enforce_role(actor: &User, required: &[Role]) -> Result<(), PolicyError> {
    if required.contains(&actor.role) {
        return Ok(());
    }
    Err(PolicyError::RoleDenied {
        required: required.to_vec(),
        actual: actor.role,
    })
}

/// Admins pass everywhere; everyone else needs one of the given roles.
pub fn enforce_role_or_admin(actor: &User, required: &[Role]) -> Result<(), PolicyError> {
    if actor.role == Role::Admin {
        return Ok(());
    }
    enforce_role(actor, required)
}

/// A doctor may only act on users who are already their patients.
pub fn ensure_patient_of(
    conn: &Connection,
    doctor_id: i64,
    patient_id: i64,
) -> Result<(), PolicyError> {
    if is_patient_of(conn, doctor_id, patient_id)? {
        return Ok(());
    }
    Err(PolicyError::NotYourPatient { doctor_id, patient_id })
}

/// Only the assignment's own creator may update or delete it.
pub fn ensure_assignment_creator(
    conn: &Connection,
    assignment_id: i64,
    actor_id: i64,
) -> Result<(), PolicyError> {
    let assignment = get_assignment(conn, assignment_id)?.ok_or(DatabaseError::NotFound {
        entity_type: "QuestionnaireAssignment",
        id: assignment_id,
    })?;

    if assignment.assigner_id == actor_id {
        return Ok(());
    }
    Err(PolicyError::NotAssignmentCreator { assignment_id })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::assignments::create_assignment;
    use crate::db::open_memory_database;
    use crate::db::repository::questionnaire::insert_questionnaire;
    use crate::db::repository::user::{get_user, insert_user, link_doctor_patient};

    fn user_with_role(conn: &Connection, role: Role, email: &str) -> User {
        let id = insert_user(conn, role, Some(email), None, None, None, None).unwrap();
        get_user(conn, id).unwrap().unwrap()
    }

    #[test]
    fn role_check_is_exact() {
        let conn = open_memory_database().unwrap();
        let patient = user_with_role(&conn, Role::Patient, "p@x.com");
        let doctor = user_with_role(&conn, Role::Doctor, "d@x.com");

        assert!(enforce_role(&doctor, &[Role::Doctor, Role::Admin]).is_ok());
        let err = enforce_role(&patient, &[Role::Doctor, Role::Admin]).unwrap_err();
        assert!(matches!(err, PolicyError::RoleDenied { .. }));
    }

    #[test]
    fn admin_passes_the_or_admin_variant() {
        let conn = open_memory_database().unwrap();
        let admin = user_with_role(&conn, Role::Admin, "a@x.com");
        assert!(enforce_role_or_admin(&admin, &[Role::Doctor]).is_ok());
        assert!(enforce_role(&admin, &[Role::Doctor]).is_err());
    }

    #[test]
    fn unrelated_patient_is_denied() {
        let conn = open_memory_database().unwrap();
        let doctor = user_with_role(&conn, Role::Doctor, "d@x.com");
        let patient = user_with_role(&conn, Role::Patient, "p@x.com");

        let err = ensure_patient_of(&conn, doctor.id, patient.id).unwrap_err();
        assert!(matches!(err, PolicyError::NotYourPatient { .. }));

        link_doctor_patient(&conn, doctor.id, patient.id).unwrap();
        assert!(ensure_patient_of(&conn, doctor.id, patient.id).is_ok());
    }

    #[test]
    fn only_creator_may_modify_assignment() {
        let conn = open_memory_database().unwrap();
        let doctor = user_with_role(&conn, Role::Doctor, "d@x.com");
        let other_doctor = user_with_role(&conn, Role::Doctor, "d2@x.com");
        let patient = user_with_role(&conn, Role::Patient, "p@x.com");
        let questionnaire = insert_questionnaire(&conn, None, doctor.id).unwrap();
        let assignment =
            create_assignment(&conn, questionnaire, patient.id, doctor.id, None).unwrap();

        assert!(ensure_assignment_creator(&conn, assignment.id, doctor.id).is_ok());
        let err = ensure_assignment_creator(&conn, assignment.id, other_doctor.id).unwrap_err();
        assert!(matches!(err, PolicyError::NotAssignmentCreator { .. }));
    }

    #[test]
    fn missing_assignment_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = ensure_assignment_creator(&conn, 404, 1).unwrap_err();
        assert!(matches!(err, PolicyError::Database(DatabaseError::NotFound { .. })));
    }
}
