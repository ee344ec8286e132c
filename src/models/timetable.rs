use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use super::id_string;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lecturer {
    #[serde(deserialize_with = "id_string")]
    pub lecturer_id: String,
    pub first_name: String,
    pub last_name: String,
}

impl Lecturer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassInfo {
    #[serde(deserialize_with = "id_string")]
    pub class_id: String,
    pub class_name: String,
    #[serde(deserialize_with = "id_string")]
    pub lecturer_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimetableEntry {
    #[serde(deserialize_with = "id_string")]
    pub timetable_id: String,
    #[serde(deserialize_with = "id_string")]
    pub class_id: String,
    pub day_of_week: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl TimetableEntry {
    /// `day_of_week` is a full English weekday name ("Monday").
    pub fn weekday(&self) -> Option<Weekday> {
        self.day_of_week.trim().parse().ok()
    }
}
