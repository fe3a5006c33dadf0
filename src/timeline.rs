//! Timeline — CRUD over calendar items and groups. Besides direct edits,
//! this is the storage target for EVENT question responses.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::repository::timeline::{
    self, TimelineGroupValues, TimelineItemValues,
};
use crate::db::DatabaseError;
use crate::models::enums::TimelineItemType;
use crate::models::{TimelineGroup, TimelineItem};

#[derive(Error, Debug)]
pub enum TimelineError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Update input must carry the id of an existing row")]
    MissingId,

    #[error("TimelineItem {0} does not exist")]
    ItemNotFound(i64),

    #[error("TimelineGroup {0} does not exist")]
    GroupNotFound(i64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineItemInput {
    /// Set when updating an existing item.
    pub id: Option<i64>,
    pub class_name: Option<String>,
    pub content: String,
    pub start: String,
    pub end: Option<String>,
    pub group: Option<i64>,
    pub style: Option<String>,
    pub subgroup: Option<i64>,
    pub title: Option<String>,
    pub item_type: Option<TimelineItemType>,
    pub editable: Option<bool>,
    pub selectable: Option<bool>,
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineGroupInput {
    pub id: Option<i64>,
    pub content: String,
    pub class_name: Option<String>,
    pub title: Option<String>,
    pub style: Option<String>,
    pub order: Option<i64>,
    pub visible: Option<bool>,
    pub show_nested: Option<bool>,
    pub nested_groups: Option<Vec<i64>>,
}

pub fn create_timeline_item(
    conn: &Connection,
    input: &TimelineItemInput,
) -> Result<TimelineItem, TimelineError> {
    let id = timeline::insert_item(conn, &item_values(input))?;
    timeline::get_item(conn, id)?.ok_or(TimelineError::ItemNotFound(id))
}

pub fn update_timeline_item(
    conn: &Connection,
    input: &TimelineItemInput,
) -> Result<TimelineItem, TimelineError> {
    let id = input.id.ok_or(TimelineError::MissingId)?;
    if !timeline::update_item(conn, id, &item_values(input))? {
        return Err(TimelineError::ItemNotFound(id));
    }
    timeline::get_item(conn, id)?.ok_or(TimelineError::ItemNotFound(id))
}

pub fn get_timeline_item(conn: &Connection, id: i64) -> Result<Option<TimelineItem>, DatabaseError> {
    timeline::get_item(conn, id)
}

pub fn timeline_items_for_user(
    conn: &Connection,
    user_id: i64,
) -> Result<Vec<TimelineItem>, DatabaseError> {
    timeline::items_for_user(conn, user_id)
}

pub fn create_timeline_group(
    conn: &Connection,
    input: &TimelineGroupInput,
) -> Result<TimelineGroup, TimelineError> {
    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    let id = timeline::insert_group(&tx, &group_values(input))?;
    if let Some(nested) = &input.nested_groups {
        timeline::set_nested_groups(&tx, id, nested)?;
    }
    tx.commit().map_err(DatabaseError::from)?;

    timeline::get_group(conn, id)?.ok_or(TimelineError::GroupNotFound(id))
}

pub fn update_timeline_group(
    conn: &Connection,
    input: &TimelineGroupInput,
) -> Result<TimelineGroup, TimelineError> {
    let id = input.id.ok_or(TimelineError::MissingId)?;

    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    if !timeline::update_group(&tx, id, &group_values(input))? {
        return Err(TimelineError::GroupNotFound(id));
    }
    if let Some(nested) = &input.nested_groups {
        timeline::set_nested_groups(&tx, id, nested)?;
    }
    tx.commit().map_err(DatabaseError::from)?;

    timeline::get_group(conn, id)?.ok_or(TimelineError::GroupNotFound(id))
}

pub fn get_timeline_group(conn: &Connection, id: i64) -> Result<Option<TimelineGroup>, DatabaseError> {
    timeline::get_group(conn, id)
}

pub fn list_timeline_groups(conn: &Connection) -> Result<Vec<TimelineGroup>, DatabaseError> {
    timeline::list_groups(conn)
}

fn item_values<'a>(input: &'a TimelineItemInput) -> TimelineItemValues<'a> {
    TimelineItemValues {
        class_name: input.class_name.as_deref(),
        content: &input.content,
        start: &input.start,
        end: input.end.as_deref(),
        group: input.group,
        style: input.style.as_deref(),
        subgroup: input.subgroup,
        title: input.title.as_deref(),
        item_type: input.item_type,
        editable: input.editable,
        selectable: input.selectable,
        user_id: input.user_id,
    }
}

fn group_values<'a>(input: &'a TimelineGroupInput) -> TimelineGroupValues<'a> {
    TimelineGroupValues {
        content: &input.content,
        class_name: input.class_name.as_deref(),
        title: input.title.as_deref(),
        style: input.style.as_deref(),
        order: input.order,
        visible: input.visible,
        show_nested: input.show_nested,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::user::insert_user;
    use crate::models::enums::Role;

    fn some_user(conn: &Connection) -> i64 {
        insert_user(conn, Role::Patient, Some("p@x.com"), None, None, None, None).unwrap()
    }

    fn item_input(user_id: i64) -> TimelineItemInput {
        TimelineItemInput {
            id: None,
            class_name: None,
            content: "Checkup".to_string(),
            start: "2026-06-01 09:00:00".to_string(),
            end: None,
            group: None,
            style: None,
            subgroup: None,
            title: Some("GP visit".to_string()),
            item_type: Some(TimelineItemType::Point),
            editable: Some(true),
            selectable: Some(true),
            user_id,
        }
    }

    #[test]
    fn create_then_update_item() {
        let conn = open_memory_database().unwrap();
        let user = some_user(&conn);

        let item = create_timeline_item(&conn, &item_input(user)).unwrap();
        assert_eq!(item.title.as_deref(), Some("GP visit"));

        let mut input = item_input(user);
        input.id = Some(item.id);
        input.content = "Checkup (rescheduled)".to_string();
        input.start = "2026-06-02 09:00:00".to_string();
        let updated = update_timeline_item(&conn, &input).unwrap();
        assert_eq!(updated.id, item.id);
        assert_eq!(updated.content, "Checkup (rescheduled)");

        assert_eq!(timeline_items_for_user(&conn, user).unwrap().len(), 1);
    }

    #[test]
    fn updating_missing_item_fails() {
        let conn = open_memory_database().unwrap();
        let user = some_user(&conn);
        let mut input = item_input(user);
        input.id = Some(404);
        let err = update_timeline_item(&conn, &input).unwrap_err();
        assert!(matches!(err, TimelineError::ItemNotFound(404)));
    }

    #[test]
    fn group_with_nesting_round_trips() {
        let conn = open_memory_database().unwrap();

        let inner = create_timeline_group(
            &conn,
            &TimelineGroupInput {
                id: None,
                content: "Morning".to_string(),
                class_name: None,
                title: None,
                style: None,
                order: Some(1),
                visible: Some(true),
                show_nested: None,
                nested_groups: None,
            },
        )
        .unwrap();

        let outer = create_timeline_group(
            &conn,
            &TimelineGroupInput {
                id: None,
                content: "Medication".to_string(),
                class_name: None,
                title: None,
                style: None,
                order: Some(0),
                visible: Some(true),
                show_nested: Some(true),
                nested_groups: Some(vec![inner.id]),
            },
        )
        .unwrap();

        assert_eq!(outer.nested_groups, vec![inner.id]);
        assert_eq!(list_timeline_groups(&conn).unwrap().len(), 2);
    }
}
