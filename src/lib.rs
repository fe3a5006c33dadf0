//! Milli backend core.
//!
//! Doctors create questionnaires and assign them to patients, optionally on
//! a repeating interval; patients answer them. This crate is the data and
//! scheduling core: accounts and auth tokens, questionnaire assembly,
//! assignment instances, response submission, the timeline, and the
//! recurrence sweep. The GraphQL transport sits above it and only ever calls
//! the service modules here.

pub mod accounts;
pub mod assembly;
pub mod assignments;
pub mod authorization;
pub mod config;
pub mod db;
pub mod models;
pub mod questionnaires;
pub mod recurrence;
pub mod responses;
pub mod timeline;

use std::path::Path;

use tracing_subscriber::EnvFilter;

/// Initialize tracing from RUST_LOG, falling back to the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

/// Open (and migrate) the database, then start the recurrence scheduler.
/// The returned handle stops the scheduler when dropped.
pub fn bootstrap(db_path: &Path) -> Result<recurrence::RecurrenceHandle, db::DatabaseError> {
    tracing::info!("{} core starting v{}", config::APP_NAME, config::APP_VERSION);
    db::open_database(db_path)?;
    Ok(recurrence::start_recurrence_scheduler(db_path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    //! End-to-end walk through the main flow: create a questionnaire, assign
    //! it, answer it, check the doctor's view, delete the assignment, and
    //! confirm history survives.

    use crate::assembly::AssembledQuestion;
    use crate::assignments::{create_assignment, delete_assignment, find_assigned_to_user};
    use crate::db::open_memory_database;
    use crate::db::repository::assignment::get_instance;
    use crate::db::repository::user::{insert_user, link_doctor_patient};
    use crate::models::enums::{QuestionType, Role};
    use crate::questionnaires::{create_questionnaire, QuestionInput, QuestionOptionInput};
    use crate::responses::{submit_boolean, submit_multiple_choice};

    #[test]
    fn questionnaire_lifecycle_survives_assignment_deletion() {
        let conn = open_memory_database().unwrap();
        let doctor = insert_user(&conn, Role::Doctor, Some("d@x.com"), None, None, None, None).unwrap();
        let patient = insert_user(&conn, Role::Patient, Some("p@x.com"), None, None, None, None).unwrap();
        link_doctor_patient(&conn, doctor, patient).unwrap();

        // one boolean and one two-option multiple choice question
        let questionnaire = create_questionnaire(
            &conn,
            Some("Weekly check-in"),
            &[
                QuestionInput {
                    id: None,
                    text: Some("Feeling well?".into()),
                    question_type: QuestionType::Boolean,
                    options: None,
                    questionnaire_id: None,
                },
                QuestionInput {
                    id: None,
                    text: Some("Symptoms?".into()),
                    question_type: QuestionType::MultipleChoice,
                    options: Some(vec![
                        QuestionOptionInput { text: Some("Cough".into()) },
                        QuestionOptionInput { text: Some("Fatigue".into()) },
                    ]),
                    questionnaire_id: None,
                },
            ],
            doctor,
        )
        .unwrap();

        // assigning with repeatInterval 0 still seeds one instance
        let assignment =
            create_assignment(&conn, questionnaire.id, patient, doctor, Some(0)).unwrap();

        let assigned = find_assigned_to_user(&conn, patient).unwrap();
        assert_eq!(assigned.len(), 1);
        let instance = assigned[0].assignment_instance_id.unwrap();

        let bool_question = assigned[0].questions[0].id();
        let (mc_question, options) = match &assigned[0].questions[1] {
            AssembledQuestion::MultipleChoice { id, options, .. } => (*id, options.clone()),
            other => panic!("expected multiple choice, got {other:?}"),
        };

        submit_boolean(&conn, bool_question, patient, instance, true).unwrap();
        let option_ids: Vec<i64> = options.iter().map(|o| o.id).collect();
        submit_multiple_choice(&conn, mc_question, &option_ids, patient, instance).unwrap();

        // the instance-scoped view now carries both answers
        let filled = find_assigned_to_user(&conn, patient).unwrap();
        match &filled[0].questions[0] {
            AssembledQuestion::Boolean { response, .. } => assert_eq!(*response, Some(true)),
            other => panic!("expected boolean, got {other:?}"),
        }
        match &filled[0].questions[1] {
            AssembledQuestion::MultipleChoice { response, .. } => {
                let stored: Vec<i64> = response.as_ref().unwrap().iter().map(|o| o.id).collect();
                assert_eq!(stored, option_ids);
            }
            other => panic!("expected multiple choice, got {other:?}"),
        }

        // deleting the assignment leaves the instance and both responses intact
        assert!(delete_assignment(&conn, assignment.id).unwrap());
        assert!(get_instance(&conn, instance).unwrap().is_some());
        let after = find_assigned_to_user(&conn, patient).unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].assignment_instance_id, Some(instance));
        match &after[0].questions[0] {
            AssembledQuestion::Boolean { response, .. } => assert_eq!(*response, Some(true)),
            other => panic!("expected boolean, got {other:?}"),
        }
    }
}
