use serde::{Deserialize, Serialize};

use super::enums::TimelineItemType;

/// A calendar entry. Start/end stay as strings — they are display data the
/// frontend timeline widget consumes verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineItem {
    pub id: i64,
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
pub struct TimelineGroup {
    pub id: i64,
    pub content: String,
    pub class_name: Option<String>,
    pub title: Option<String>,
    pub style: Option<String>,
    pub order: Option<i64>,
    pub visible: Option<bool>,
    pub show_nested: Option<bool>,
    pub nested_groups: Vec<i64>,
}
