//! Read-only list views over the backend's collections, joined client-side.

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::api::ApiClient;
use crate::models::{AttendanceSession, ClassInfo, Lecturer, Student, TimetableEntry};

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RosterRow {
    pub session_id: String,
    pub student_id: String,
    pub student_name: String,
    pub start_time: NaiveDateTime,
    pub end_time: Option<NaiveDateTime>,
    pub class_id: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimetableRow {
    pub timetable_id: String,
    pub day_of_week: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub class_name: String,
    pub lecturer_id: Option<String>,
    pub lecturer_name: String,
    pub is_current: bool,
}

/// Sessions that started on `day`, each joined to its student by
/// `student_id`, earliest first.
pub fn join_roster(
    sessions: Vec<AttendanceSession>,
    students: &[Student],
    day: NaiveDate,
) -> Vec<RosterRow> {
    let names: HashMap<&str, &str> = students
        .iter()
        .map(|student| (student.student_id.as_str(), student.name.as_str()))
        .collect();

    let mut rows: Vec<RosterRow> = sessions
        .into_iter()
        .filter(|session| session.start_time.date() == day)
        .map(|session| RosterRow {
            student_name: names
                .get(session.student_id.as_str())
                .copied()
                .unwrap_or(UNKNOWN)
                .to_string(),
            active: session.is_open(),
            session_id: session.id,
            student_id: session.student_id,
            start_time: session.start_time,
            end_time: session.end_time,
            class_id: session.class_id,
        })
        .collect();

    rows.sort_by_key(|row| row.start_time);
    rows
}

/// Timetable entries joined to class and lecturer names, ordered Monday
/// first. `is_current` marks the slot containing `now`.
pub fn join_timetable(
    entries: Vec<TimetableEntry>,
    classes: &[ClassInfo],
    lecturers: &[Lecturer],
    now: NaiveDateTime,
) -> Vec<TimetableRow> {
    let classes: HashMap<&str, &ClassInfo> = classes
        .iter()
        .map(|class| (class.class_id.as_str(), class))
        .collect();
    let lecturers: HashMap<&str, &Lecturer> = lecturers
        .iter()
        .map(|lecturer| (lecturer.lecturer_id.as_str(), lecturer))
        .collect();

    let mut rows: Vec<(u32, TimetableRow)> = entries
        .into_iter()
        .map(|entry| {
            let class = classes.get(entry.class_id.as_str()).copied();
            let lecturer = class.and_then(|class| lecturers.get(class.lecturer_id.as_str()).copied());
            let weekday = entry.weekday();
            let is_current = weekday == Some(now.weekday())
                && entry.start_time <= now.time()
                && now.time() < entry.end_time;

            let order = weekday.map(|day| day.num_days_from_monday()).unwrap_or(u32::MAX);
            (
                order,
                TimetableRow {
                    timetable_id: entry.timetable_id,
                    day_of_week: entry.day_of_week,
                    start_time: entry.start_time,
                    end_time: entry.end_time,
                    class_name: class
                        .map(|class| class.class_name.clone())
                        .unwrap_or_else(|| UNKNOWN.to_string()),
                    lecturer_id: class.map(|class| class.lecturer_id.clone()),
                    lecturer_name: lecturer
                        .map(Lecturer::full_name)
                        .unwrap_or_else(|| UNKNOWN.to_string()),
                    is_current,
                },
            )
        })
        .collect();

    rows.sort_by(|(lhs_day, lhs), (rhs_day, rhs)| {
        lhs_day
            .cmp(rhs_day)
            .then_with(|| lhs.start_time.cmp(&rhs.start_time))
    });
    rows.into_iter().map(|(_, row)| row).collect()
}

#[derive(Clone)]
pub struct DirectoryService {
    api: ApiClient,
}

impl DirectoryService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn attendance_roster(&self, day: NaiveDate) -> Result<Vec<RosterRow>> {
        let (sessions, students) = tokio::try_join!(self.api.sessions(), self.api.students())
            .context("failed to fetch session data")?;
        Ok(join_roster(sessions, &students, day))
    }

    pub async fn timetable_rows(&self, now: NaiveDateTime) -> Result<Vec<TimetableRow>> {
        let (lecturers, classes, entries) = tokio::try_join!(
            self.api.lecturers(),
            self.api.classes(),
            self.api.timetable()
        )
        .context("failed to fetch timetable data")?;
        Ok(join_timetable(entries, &classes, &lecturers, now))
    }
}
