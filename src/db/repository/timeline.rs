use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::enums::TimelineItemType;
use crate::models::{TimelineGroup, TimelineItem};

// ── TimelineItem ───────────────────────────────────────────────────────────

/// Column values for a new or updated item; the id lives outside.
pub struct TimelineItemValues<'a> {
    pub class_name: Option<&'a str>,
    pub content: &'a str,
    pub start: &'a str,
    pub end: Option<&'a str>,
    pub group: Option<i64>,
    pub style: Option<&'a str>,
    pub subgroup: Option<i64>,
    pub title: Option<&'a str>,
    pub item_type: Option<TimelineItemType>,
    pub editable: Option<bool>,
    pub selectable: Option<bool>,
    pub user_id: i64,
}

pub fn insert_item(conn: &Connection, values: &TimelineItemValues<'_>) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO TimelineItem
         (className, content, start, \"end\", \"group\", style, subgroup, title, type, editable, selectable, userId)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            values.class_name,
            values.content,
            values.start,
            values.end,
            values.group,
            values.style,
            values.subgroup,
            values.title,
            values.item_type.map(|t| t.as_str()),
            values.editable.map(|b| b as i64),
            values.selectable.map(|b| b as i64),
            values.user_id,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_item(
    conn: &Connection,
    id: i64,
    values: &TimelineItemValues<'_>,
) -> Result<bool, DatabaseError> {
    let updated = conn.execute(
        "UPDATE TimelineItem SET
         className = ?1, content = ?2, start = ?3, \"end\" = ?4, \"group\" = ?5, style = ?6,
         subgroup = ?7, title = ?8, type = ?9, editable = ?10, selectable = ?11, userId = ?12
         WHERE id = ?13",
        params![
            values.class_name,
            values.content,
            values.start,
            values.end,
            values.group,
            values.style,
            values.subgroup,
            values.title,
            values.item_type.map(|t| t.as_str()),
            values.editable.map(|b| b as i64),
            values.selectable.map(|b| b as i64),
            values.user_id,
            id,
        ],
    )?;
    Ok(updated > 0)
}

pub fn get_item(conn: &Connection, id: i64) -> Result<Option<TimelineItem>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, className, content, start, \"end\", \"group\", style, subgroup, title,
                    type, editable, selectable, userId
             FROM TimelineItem WHERE id = ?1",
            params![id],
            item_row_from_rusqlite,
        )
        .optional()?;
    row.map(item_from_row).transpose()
}

pub fn items_for_user(conn: &Connection, user_id: i64) -> Result<Vec<TimelineItem>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, className, content, start, \"end\", \"group\", style, subgroup, title,
                type, editable, selectable, userId
         FROM TimelineItem WHERE userId = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![user_id], item_row_from_rusqlite)?;

    let mut items = Vec::new();
    for row in rows {
        items.push(item_from_row(row?)?);
    }
    Ok(items)
}

pub fn delete_item(conn: &Connection, id: i64) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM TimelineItem WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

// ── TimelineGroup ──────────────────────────────────────────────────────────

pub struct TimelineGroupValues<'a> {
    pub content: &'a str,
    pub class_name: Option<&'a str>,
    pub title: Option<&'a str>,
    pub style: Option<&'a str>,
    pub order: Option<i64>,
    pub visible: Option<bool>,
    pub show_nested: Option<bool>,
}

pub fn insert_group(conn: &Connection, values: &TimelineGroupValues<'_>) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO TimelineGroup (content, className, title, style, \"order\", visible, showNested)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            values.content,
            values.class_name,
            values.title,
            values.style,
            values.order,
            values.visible.map(|b| b as i64),
            values.show_nested.map(|b| b as i64),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_group(
    conn: &Connection,
    id: i64,
    values: &TimelineGroupValues<'_>,
) -> Result<bool, DatabaseError> {
    let updated = conn.execute(
        "UPDATE TimelineGroup SET
         content = ?1, className = ?2, title = ?3, style = ?4, \"order\" = ?5,
         visible = ?6, showNested = ?7
         WHERE id = ?8",
        params![
            values.content,
            values.class_name,
            values.title,
            values.style,
            values.order,
            values.visible.map(|b| b as i64),
            values.show_nested.map(|b| b as i64),
            id,
        ],
    )?;
    Ok(updated > 0)
}

pub fn get_group(conn: &Connection, id: i64) -> Result<Option<TimelineGroup>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, content, className, title, style, \"order\", visible, showNested
             FROM TimelineGroup WHERE id = ?1",
            params![id],
            group_row_from_rusqlite,
        )
        .optional()?;

    let Some(mut group) = row else {
        return Ok(None);
    };
    group.nested_groups = nested_group_ids(conn, id)?;
    Ok(Some(group))
}

pub fn list_groups(conn: &Connection) -> Result<Vec<TimelineGroup>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, content, className, title, style, \"order\", visible, showNested
         FROM TimelineGroup ORDER BY id",
    )?;
    let rows = stmt.query_map([], group_row_from_rusqlite)?;

    let mut groups = Vec::new();
    for row in rows {
        let mut group = row?;
        group.nested_groups = nested_group_ids(conn, group.id)?;
        groups.push(group);
    }
    Ok(groups)
}

/// Replace the nesting links of a group wholesale.
pub fn set_nested_groups(
    conn: &Connection,
    group_id: i64,
    nested: &[i64],
) -> Result<(), DatabaseError> {
    conn.execute(
        "DELETE FROM TimelineGroupNesting WHERE groupId = ?1",
        params![group_id],
    )?;
    for nested_id in nested {
        conn.execute(
            "INSERT INTO TimelineGroupNesting (groupId, nestedGroupId) VALUES (?1, ?2)",
            params![group_id, nested_id],
        )?;
    }
    Ok(())
}

fn nested_group_ids(conn: &Connection, group_id: i64) -> Result<Vec<i64>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT nestedGroupId FROM TimelineGroupNesting WHERE groupId = ?1 ORDER BY nestedGroupId",
    )?;
    let rows = stmt.query_map(params![group_id], |row| row.get::<_, i64>(0))?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

// Internal row type for TimelineItem mapping
struct ItemRow {
    id: i64,
    class_name: Option<String>,
    content: String,
    start: String,
    end: Option<String>,
    group: Option<i64>,
    style: Option<String>,
    subgroup: Option<i64>,
    title: Option<String>,
    item_type: Option<String>,
    editable: Option<i64>,
    selectable: Option<i64>,
    user_id: i64,
}

fn item_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<ItemRow, rusqlite::Error> {
    Ok(ItemRow {
        id: row.get(0)?,
        class_name: row.get(1)?,
        content: row.get(2)?,
        start: row.get(3)?,
        end: row.get(4)?,
        group: row.get(5)?,
        style: row.get(6)?,
        subgroup: row.get(7)?,
        title: row.get(8)?,
        item_type: row.get(9)?,
        editable: row.get(10)?,
        selectable: row.get(11)?,
        user_id: row.get(12)?,
    })
}

fn item_from_row(row: ItemRow) -> Result<TimelineItem, DatabaseError> {
    Ok(TimelineItem {
        id: row.id,
        class_name: row.class_name,
        content: row.content,
        start: row.start,
        end: row.end,
        group: row.group,
        style: row.style,
        subgroup: row.subgroup,
        title: row.title,
        item_type: row
            .item_type
            .as_deref()
            .map(TimelineItemType::from_str)
            .transpose()?,
        editable: row.editable.map(|v| v != 0),
        selectable: row.selectable.map(|v| v != 0),
        user_id: row.user_id,
    })
}

fn group_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<TimelineGroup, rusqlite::Error> {
    Ok(TimelineGroup {
        id: row.get(0)?,
        content: row.get(1)?,
        class_name: row.get(2)?,
        title: row.get(3)?,
        style: row.get(4)?,
        order: row.get(5)?,
        visible: row.get::<_, Option<i64>>(6)?.map(|v| v != 0),
        show_nested: row.get::<_, Option<i64>>(7)?.map(|v| v != 0),
        nested_groups: Vec::new(),
    })
}
