use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{id_string, optional_id_string};

/// An attendance session as reported by `GET /api/sessions`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttendanceSession {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(deserialize_with = "id_string")]
    pub student_id: String,
    pub start_time: NaiveDateTime,
    pub end_time: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "optional_id_string")]
    pub class_id: Option<String>,
}

impl AttendanceSession {
    /// Sessions stay open until the server records an end time.
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Student {
    #[serde(deserialize_with = "id_string")]
    pub student_id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}
