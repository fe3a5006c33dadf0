//! Response submission — idempotent upserts for boolean/text answers,
//! wholesale replacement for choice selections, and delete-then-recreate for
//! event answers (which live on the timeline).
//!
//! Validation runs before any row is touched; each multi-statement path runs
//! inside a transaction so a submission never leaves a partially replaced
//! answer behind.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::repository::questionnaire::get_option;
use crate::db::repository::response::{
    delete_choice_responses, delete_event_response, event_timeline_item_id, insert_choice_response,
    insert_event_response, upsert_boolean_response, upsert_text_response, ResponseKey,
};
use crate::db::repository::timeline::{delete_item, insert_item, TimelineItemValues};
use crate::db::DatabaseError;
use crate::models::enums::TimelineItemType;

#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Unknown option id {0}")]
    UnknownOption(i64),

    #[error("Option {option_id} belongs to question {actual}, not question {expected}")]
    QuestionMismatch {
        option_id: i64,
        expected: i64,
        actual: i64,
    },
}

/// Submit a boolean answer. Re-submitting replaces the stored value; exactly
/// one row exists per (question, user, instance) afterwards.
pub fn submit_boolean(
    conn: &Connection,
    question_id: i64,
    user_id: i64,
    assignment_instance_id: i64,
    value: bool,
) -> Result<(), SubmissionError> {
    let key = ResponseKey { question_id, user_id, assignment_instance_id };
    upsert_boolean_response(conn, key, value)?;
    tracing::debug!(question_id, user_id, assignment_instance_id, "boolean response stored");
    Ok(())
}

/// Submit a text answer, with the same upsert semantics as booleans.
pub fn submit_text(
    conn: &Connection,
    question_id: i64,
    user_id: i64,
    assignment_instance_id: i64,
    value: &str,
) -> Result<(), SubmissionError> {
    let key = ResponseKey { question_id, user_id, assignment_instance_id };
    upsert_text_response(conn, key, value)?;
    tracing::debug!(question_id, user_id, assignment_instance_id, "text response stored");
    Ok(())
}

/// Submit a single-choice answer. The owning question is resolved from the
/// option itself; any previously selected option for that question is
/// replaced, so at most one selection exists at a time.
pub fn submit_single_choice(
    conn: &Connection,
    option_id: i64,
    user_id: i64,
    assignment_instance_id: i64,
) -> Result<(), SubmissionError> {
    let option = get_option(conn, option_id)?.ok_or(SubmissionError::UnknownOption(option_id))?;
    let key = ResponseKey {
        question_id: option.question_id,
        user_id,
        assignment_instance_id,
    };

    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    delete_choice_responses(&tx, key)?;
    insert_choice_response(&tx, key, option_id)?;
    tx.commit().map_err(DatabaseError::from)?;
    Ok(())
}

/// Submit a multi-choice answer, replacing all prior selections wholesale.
/// Every option must belong to the question the caller names — a mismatch
/// fails before any row is deleted or inserted. An empty list is a valid
/// submission that clears the selection.
pub fn submit_multiple_choice(
    conn: &Connection,
    question_id: i64,
    option_ids: &[i64],
    user_id: i64,
    assignment_instance_id: i64,
) -> Result<(), SubmissionError> {
    for &option_id in option_ids {
        let option = get_option(conn, option_id)?.ok_or(SubmissionError::UnknownOption(option_id))?;
        if option.question_id != question_id {
            return Err(SubmissionError::QuestionMismatch {
                option_id,
                expected: question_id,
                actual: option.question_id,
            });
        }
    }

    let key = ResponseKey { question_id, user_id, assignment_instance_id };
    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    delete_choice_responses(&tx, key)?;
    for &option_id in option_ids {
        insert_choice_response(&tx, key, option_id)?;
    }
    tx.commit().map_err(DatabaseError::from)?;
    Ok(())
}

/// The event payload a patient submits for an EVENT question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventResponse {
    pub title: Option<String>,
    pub details: Option<String>,
    pub start: String,
    pub end: Option<String>,
}

/// Submit an event answer. The payload becomes a TimelineItem on the user's
/// timeline; re-answering removes the previous item and response row before
/// creating the new pair.
pub fn submit_event(
    conn: &Connection,
    question_id: i64,
    user_id: i64,
    assignment_instance_id: i64,
    event: &EventResponse,
) -> Result<(), SubmissionError> {
    let key = ResponseKey { question_id, user_id, assignment_instance_id };

    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;

    if let Some(old_item) = event_timeline_item_id(&tx, key)? {
        delete_event_response(&tx, key)?;
        delete_item(&tx, old_item)?;
        tracing::debug!(question_id, user_id, old_item, "replacing previous event response");
    }

    let item_type = if event.end.is_some() {
        TimelineItemType::Range
    } else {
        TimelineItemType::Point
    };
    let item_id = insert_item(
        &tx,
        &TimelineItemValues {
            class_name: None,
            content: event.details.as_deref().unwrap_or_default(),
            start: &event.start,
            end: event.end.as_deref(),
            group: None,
            style: None,
            subgroup: None,
            title: event.title.as_deref(),
            item_type: Some(item_type),
            editable: None,
            selectable: None,
            user_id,
        },
    )?;
    insert_event_response(&tx, key, item_id)?;

    tx.commit().map_err(DatabaseError::from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::db::open_memory_database;
    use crate::db::repository::assignment::{get_assignment, insert_assignment, insert_instance};
    use crate::db::repository::questionnaire::{insert_option, insert_question, insert_questionnaire};
    use crate::db::repository::response::{choice_option_ids, get_boolean_response, get_text_response};
    use crate::db::repository::timeline::{get_item, items_for_user};
    use crate::db::repository::user::insert_user;
    use crate::models::enums::{QuestionType, Role};

    struct Fixture {
        patient: i64,
        questionnaire: i64,
        instance: i64,
    }

    fn fixture(conn: &Connection) -> Fixture {
        let doctor = insert_user(conn, Role::Doctor, Some("d@x.com"), None, None, None, None).unwrap();
        let patient = insert_user(conn, Role::Patient, Some("p@x.com"), None, None, None, None).unwrap();
        let questionnaire = insert_questionnaire(conn, None, doctor).unwrap();
        let now = Utc::now().naive_utc();
        let assignment_id =
            insert_assignment(conn, questionnaire, patient, doctor, None, now).unwrap();
        let assignment = get_assignment(conn, assignment_id).unwrap().unwrap();
        let instance = insert_instance(conn, &assignment, now).unwrap();
        Fixture { patient, questionnaire, instance }
    }

    fn key(f: &Fixture, question_id: i64) -> ResponseKey {
        ResponseKey {
            question_id,
            user_id: f.patient,
            assignment_instance_id: f.instance,
        }
    }

    #[test]
    fn boolean_resubmission_is_idempotent() {
        let conn = open_memory_database().unwrap();
        let f = fixture(&conn);
        let question = insert_question(&conn, f.questionnaire, Some("Q"), QuestionType::Boolean).unwrap();

        submit_boolean(&conn, question, f.patient, f.instance, true).unwrap();
        submit_boolean(&conn, question, f.patient, f.instance, true).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM QuestionResponseBoolean", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(get_boolean_response(&conn, key(&f, question)).unwrap(), Some(true));
    }

    #[test]
    fn text_resubmission_keeps_latest_value() {
        let conn = open_memory_database().unwrap();
        let f = fixture(&conn);
        let question = insert_question(&conn, f.questionnaire, Some("Q"), QuestionType::Text).unwrap();

        submit_text(&conn, question, f.patient, f.instance, "draft").unwrap();
        submit_text(&conn, question, f.patient, f.instance, "final").unwrap();

        assert_eq!(
            get_text_response(&conn, key(&f, question)).unwrap().as_deref(),
            Some("final")
        );
    }

    #[test]
    fn single_choice_is_exclusive() {
        let conn = open_memory_database().unwrap();
        let f = fixture(&conn);
        let question =
            insert_question(&conn, f.questionnaire, Some("Q"), QuestionType::SingleChoice).unwrap();
        let opt_a = insert_option(&conn, question, Some("A")).unwrap();
        let opt_b = insert_option(&conn, question, Some("B")).unwrap();

        submit_single_choice(&conn, opt_a, f.patient, f.instance).unwrap();
        submit_single_choice(&conn, opt_b, f.patient, f.instance).unwrap();

        assert_eq!(choice_option_ids(&conn, key(&f, question)).unwrap(), vec![opt_b]);
    }

    #[test]
    fn single_choice_unknown_option_fails() {
        let conn = open_memory_database().unwrap();
        let f = fixture(&conn);
        let err = submit_single_choice(&conn, 404, f.patient, f.instance).unwrap_err();
        assert!(matches!(err, SubmissionError::UnknownOption(404)));
    }

    #[test]
    fn multiple_choice_replaces_wholesale_and_clears_on_empty() {
        let conn = open_memory_database().unwrap();
        let f = fixture(&conn);
        let question =
            insert_question(&conn, f.questionnaire, Some("Q"), QuestionType::MultipleChoice).unwrap();
        let opt_a = insert_option(&conn, question, Some("A")).unwrap();
        let opt_b = insert_option(&conn, question, Some("B")).unwrap();
        let opt_c = insert_option(&conn, question, Some("C")).unwrap();

        submit_multiple_choice(&conn, question, &[opt_a, opt_b], f.patient, f.instance).unwrap();
        submit_multiple_choice(&conn, question, &[opt_c], f.patient, f.instance).unwrap();
        assert_eq!(choice_option_ids(&conn, key(&f, question)).unwrap(), vec![opt_c]);

        submit_multiple_choice(&conn, question, &[], f.patient, f.instance).unwrap();
        assert!(choice_option_ids(&conn, key(&f, question)).unwrap().is_empty());
    }

    #[test]
    fn cross_question_options_fail_without_touching_rows() {
        let conn = open_memory_database().unwrap();
        let f = fixture(&conn);
        let question =
            insert_question(&conn, f.questionnaire, Some("Q1"), QuestionType::MultipleChoice).unwrap();
        let other =
            insert_question(&conn, f.questionnaire, Some("Q2"), QuestionType::MultipleChoice).unwrap();
        let opt_mine = insert_option(&conn, question, Some("A")).unwrap();
        let opt_foreign = insert_option(&conn, other, Some("X")).unwrap();

        submit_multiple_choice(&conn, question, &[opt_mine], f.patient, f.instance).unwrap();

        let err = submit_multiple_choice(
            &conn,
            question,
            &[opt_mine, opt_foreign],
            f.patient,
            f.instance,
        )
        .unwrap_err();
        assert!(matches!(err, SubmissionError::QuestionMismatch { .. }));

        // prior selection untouched by the failed submission
        assert_eq!(choice_option_ids(&conn, key(&f, question)).unwrap(), vec![opt_mine]);
    }

    #[test]
    fn event_resubmission_replaces_timeline_item() {
        let conn = open_memory_database().unwrap();
        let f = fixture(&conn);
        let question = insert_question(&conn, f.questionnaire, Some("Q"), QuestionType::Event).unwrap();

        submit_event(
            &conn,
            question,
            f.patient,
            f.instance,
            &EventResponse {
                title: Some("Migraine".into()),
                details: Some("lasted an hour".into()),
                start: "2026-05-01 10:00:00".into(),
                end: Some("2026-05-01 11:00:00".into()),
            },
        )
        .unwrap();

        let first_item = event_timeline_item_id(&conn, key(&f, question)).unwrap().unwrap();

        submit_event(
            &conn,
            question,
            f.patient,
            f.instance,
            &EventResponse {
                title: Some("Migraine".into()),
                details: None,
                start: "2026-05-01 10:30:00".into(),
                end: None,
            },
        )
        .unwrap();

        // old item deleted, exactly one item on the user's timeline
        assert!(get_item(&conn, first_item).unwrap().is_none());
        let items = items_for_user(&conn, f.patient).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].start, "2026-05-01 10:30:00");
        assert_eq!(items[0].item_type, Some(TimelineItemType::Point));
    }
}
