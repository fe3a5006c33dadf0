use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::repository::questionnaire::{options_for_question, relations_for_question};
use crate::db::repository::response::{
    choice_option_ids, event_timeline_item_id, get_boolean_response, get_text_response, ResponseKey,
};
use crate::db::repository::timeline::get_item;
use crate::db::DatabaseError;
use crate::models::enums::QuestionType;
use crate::models::{QuestionOption, QuestionRelation, QuestionRow, TimelineItem};

/// One question in API shape. The tag mirrors the stored `type` column;
/// `response` is present only when assembly ran in an instance scope AND a
/// stored row exists — for booleans that makes a stored `false`
/// distinguishable from "not answered yet".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AssembledQuestion {
    #[serde(rename = "BOOLEAN")]
    Boolean {
        id: i64,
        questionnaire_id: i64,
        text: Option<String>,
        next: Vec<QuestionRelation>,
        response: Option<bool>,
    },
    #[serde(rename = "TEXT")]
    Text {
        id: i64,
        questionnaire_id: i64,
        text: Option<String>,
        next: Vec<QuestionRelation>,
        response: Option<String>,
    },
    #[serde(rename = "SINGLE_CHOICE")]
    SingleChoice {
        id: i64,
        questionnaire_id: i64,
        text: Option<String>,
        next: Vec<QuestionRelation>,
        options: Vec<QuestionOption>,
        response: Option<QuestionOption>,
    },
    #[serde(rename = "MULTIPLE_CHOICE")]
    MultipleChoice {
        id: i64,
        questionnaire_id: i64,
        text: Option<String>,
        next: Vec<QuestionRelation>,
        options: Vec<QuestionOption>,
        response: Option<Vec<QuestionOption>>,
    },
    #[serde(rename = "EVENT")]
    Event {
        id: i64,
        questionnaire_id: i64,
        text: Option<String>,
        next: Vec<QuestionRelation>,
        response: Option<TimelineItem>,
    },
}

impl AssembledQuestion {
    pub fn id(&self) -> i64 {
        match self {
            Self::Boolean { id, .. }
            | Self::Text { id, .. }
            | Self::SingleChoice { id, .. }
            | Self::MultipleChoice { id, .. }
            | Self::Event { id, .. } => *id,
        }
    }

    pub fn question_type(&self) -> QuestionType {
        match self {
            Self::Boolean { .. } => QuestionType::Boolean,
            Self::Text { .. } => QuestionType::Text,
            Self::SingleChoice { .. } => QuestionType::SingleChoice,
            Self::MultipleChoice { .. } => QuestionType::MultipleChoice,
            Self::Event { .. } => QuestionType::Event,
        }
    }
}

/// Attach relations, options, and (when both a user and an instance are
/// given) the stored response to each question row. Responses are scoped to
/// an assignment instance; a user id alone never loads them.
pub fn assemble_questions(
    conn: &Connection,
    rows: &[QuestionRow],
    for_user: Option<i64>,
    for_instance: Option<i64>,
) -> Result<Vec<AssembledQuestion>, DatabaseError> {
    let scope = match (for_user, for_instance) {
        (Some(user_id), Some(instance_id)) => Some((user_id, instance_id)),
        _ => None,
    };

    let mut assembled = Vec::with_capacity(rows.len());
    for row in rows {
        assembled.push(assemble_one(conn, row, scope)?);
    }
    Ok(assembled)
}

fn assemble_one(
    conn: &Connection,
    row: &QuestionRow,
    scope: Option<(i64, i64)>,
) -> Result<AssembledQuestion, DatabaseError> {
    let next = relations_for_question(conn, row.id)?;
    let key = scope.map(|(user_id, instance_id)| ResponseKey {
        question_id: row.id,
        user_id,
        assignment_instance_id: instance_id,
    });

    let question = match row.question_type {
        QuestionType::Boolean => AssembledQuestion::Boolean {
            id: row.id,
            questionnaire_id: row.questionnaire_id,
            text: row.text.clone(),
            next,
            response: match key {
                Some(key) => get_boolean_response(conn, key)?,
                None => None,
            },
        },
        QuestionType::Text => AssembledQuestion::Text {
            id: row.id,
            questionnaire_id: row.questionnaire_id,
            text: row.text.clone(),
            next,
            response: match key {
                Some(key) => get_text_response(conn, key)?,
                None => None,
            },
        },
        QuestionType::SingleChoice => {
            let options = options_for_question(conn, row.id)?;
            let response = match key {
                Some(key) => selected_options(&options, &choice_option_ids(conn, key)?)
                    .into_iter()
                    .next(),
                None => None,
            };
            AssembledQuestion::SingleChoice {
                id: row.id,
                questionnaire_id: row.questionnaire_id,
                text: row.text.clone(),
                next,
                options,
                response,
            }
        }
        QuestionType::MultipleChoice => {
            let options = options_for_question(conn, row.id)?;
            let response = match key {
                Some(key) => {
                    let stored = choice_option_ids(conn, key)?;
                    if stored.is_empty() {
                        None
                    } else {
                        Some(selected_options(&options, &stored))
                    }
                }
                None => None,
            };
            AssembledQuestion::MultipleChoice {
                id: row.id,
                questionnaire_id: row.questionnaire_id,
                text: row.text.clone(),
                next,
                options,
                response,
            }
        }
        QuestionType::Event => {
            let response = match key {
                Some(key) => match event_timeline_item_id(conn, key)? {
                    Some(item_id) => get_item(conn, item_id)?,
                    None => None,
                },
                None => None,
            };
            AssembledQuestion::Event {
                id: row.id,
                questionnaire_id: row.questionnaire_id,
                text: row.text.clone(),
                next,
                response,
            }
        }
    };

    Ok(question)
}

/// Map stored option ids onto the question's option objects, preserving the
/// order the responses were stored in.
fn selected_options(options: &[QuestionOption], stored_ids: &[i64]) -> Vec<QuestionOption> {
    stored_ids
        .iter()
        .filter_map(|id| options.iter().find(|o| o.id == *id).cloned())
        .collect()
}
