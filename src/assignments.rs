//! Assignment & instance management.
//!
//! An assignment is the standing doctor→patient link; an instance is one
//! concrete occurrence the patient fills out. Creating an assignment seeds
//! its first instance immediately so the patient has something to answer
//! regardless of the repeat interval; later instances come from the
//! recurrence sweep. Deleting an assignment never touches its instances —
//! response history must stay reachable forever.

use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assembly::{assemble_questionnaire, AssembledQuestionnaire};
use crate::db::repository::assignment::{
    self, assignments_by_assigner, instances_for_assignee, AssignmentPatch,
};
use crate::db::repository::questionnaire::get_questionnaire;
use crate::db::repository::user::get_user;
use crate::db::DatabaseError;
use crate::models::{Assignment, User};

#[derive(Error, Debug)]
pub enum AssignmentError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Questionnaire {0} does not exist")]
    QuestionnaireNotFound(i64),

    #[error("Assignment {0} does not exist")]
    AssignmentNotFound(i64),
}

/// Create a standing assignment and immediately mint its first instance,
/// atomically. `repeat_interval` is in minutes; None or 0 means no repeats.
pub fn create_assignment(
    conn: &Connection,
    questionnaire_id: i64,
    assignee_id: i64,
    assigner_id: i64,
    repeat_interval: Option<i64>,
) -> Result<Assignment, AssignmentError> {
    if get_questionnaire(conn, questionnaire_id)?.is_none() {
        return Err(AssignmentError::QuestionnaireNotFound(questionnaire_id));
    }

    let now = Utc::now().naive_utc();
    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    let id = assignment::insert_assignment(
        &tx,
        questionnaire_id,
        assignee_id,
        assigner_id,
        repeat_interval,
        now,
    )?;
    let assignment = assignment::get_assignment(&tx, id)?
        .ok_or(AssignmentError::AssignmentNotFound(id))?;
    assignment::insert_instance(&tx, &assignment, now)?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(
        assignment_id = assignment.id,
        questionnaire_id,
        assignee_id,
        assigner_id,
        "assignment created with initial instance"
    );
    Ok(assignment)
}

/// Partial update of assignee/assigner/repeat interval. Never mints an
/// instance.
pub fn update_assignment(
    conn: &Connection,
    id: i64,
    patch: &AssignmentPatch,
) -> Result<Assignment, AssignmentError> {
    if !assignment::update_assignment(conn, id, patch)? {
        return Err(AssignmentError::AssignmentNotFound(id));
    }
    assignment::get_assignment(conn, id)?.ok_or(AssignmentError::AssignmentNotFound(id))
}

/// Remove the standing assignment. Instances and their responses are left
/// untouched and stay queryable by instance id.
pub fn delete_assignment(conn: &Connection, id: i64) -> Result<bool, AssignmentError> {
    Ok(assignment::delete_assignment(conn, id)?)
}

/// Everything a patient has to fill out (or has filled out): one assembled
/// questionnaire per instance ever minted for them, each stamped with its
/// instance id and carrying that instance's responses.
pub fn find_assigned_to_user(
    conn: &Connection,
    patient_id: i64,
) -> Result<Vec<AssembledQuestionnaire>, DatabaseError> {
    let instances = instances_for_assignee(conn, patient_id)?;

    let mut questionnaires = Vec::with_capacity(instances.len());
    for instance in instances {
        match assemble_questionnaire(
            conn,
            instance.questionnaire_id,
            Some(patient_id),
            Some(instance.id),
        )? {
            Some(questionnaire) => questionnaires.push(questionnaire),
            None => {
                tracing::warn!(
                    instance_id = instance.id,
                    questionnaire_id = instance.questionnaire_id,
                    "instance references a questionnaire that no longer exists"
                );
            }
        }
    }
    Ok(questionnaires)
}

/// An assignment enriched for the assigner's overview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentView {
    pub assignment: Assignment,
    pub questionnaire: Option<AssembledQuestionnaire>,
    pub assignee: Option<User>,
}

/// The standing assignments (not instances) a doctor has created, with
/// questionnaire and assignee attached for display.
pub fn find_by_assigner(
    conn: &Connection,
    assigner_id: i64,
) -> Result<Vec<AssignmentView>, DatabaseError> {
    let assignments = assignments_by_assigner(conn, assigner_id)?;

    let mut views = Vec::with_capacity(assignments.len());
    for assignment in assignments {
        let questionnaire = assemble_questionnaire(conn, assignment.questionnaire_id, None, None)?;
        let assignee = get_user(conn, assignment.assignee_id)?;
        views.push(AssignmentView { assignment, questionnaire, assignee });
    }
    Ok(views)
}
