mod role;
mod session;
mod timetable;

pub use role::{MenuEntry, Operator, Role};
pub use session::{AttendanceSession, Student};
pub use timetable::{ClassInfo, Lecturer, TimetableEntry};

use serde::{Deserialize, Deserializer};

/// The backend is inconsistent about identifier types (`student_id` is a
/// string in one table and an integer in another), so ids are normalised to
/// strings on the way in.
pub(crate) fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(value) => value,
        RawId::Number(value) => value.to_string(),
    })
}

pub(crate) fn optional_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "id_string")] String);

    Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|Wrapper(value)| value))
}
