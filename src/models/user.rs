use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::enums::Role;

/// An account: doctor, patient, or admin. `last_visit` and `adherence`
/// come from the UserLogin / UserHealth side tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub role: Role,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub join_date: NaiveDateTime,
    pub last_visit: Option<NaiveDateTime>,
    pub adherence: Option<i64>,
}

/// A pending invite: the contact it was sent to plus the account fields
/// the redeemed user will be created with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthCode {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub name: Option<String>,
    pub code: String,
    pub inviter_id: Option<i64>,
    pub created: NaiveDateTime,
}
