use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Who is operating the kiosk. Navigation and menus branch on this with
/// exhaustive matches instead of comparing role strings at each call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Role {
    Student { student_id: String },
    Lecturer { lecturer_id: String },
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MenuEntry {
    pub label: &'static str,
    pub route: &'static str,
}

const fn entry(label: &'static str, route: &'static str) -> MenuEntry {
    MenuEntry { label, route }
}

impl Role {
    /// Builds a role from the backend's `role` string and the account id.
    pub fn parse(role: &str, id: Option<&str>) -> Result<Self> {
        let id = id.map(str::trim).filter(|value| !value.is_empty());
        match (role.trim().to_ascii_lowercase().as_str(), id) {
            ("student", Some(id)) => Ok(Role::Student {
                student_id: id.to_string(),
            }),
            ("lecturer", Some(id)) => Ok(Role::Lecturer {
                lecturer_id: id.to_string(),
            }),
            ("admin", _) => Ok(Role::Admin),
            ("student" | "lecturer", None) => bail!("role '{role}' requires an account id"),
            _ => bail!("unknown role '{role}'"),
        }
    }

    pub fn home_route(&self) -> &'static str {
        match self {
            Role::Student { .. } => "/student/dashboard",
            Role::Lecturer { .. } => "/lecturer/dashboard",
            Role::Admin => "/admin/dashboard",
        }
    }

    pub fn menu(&self) -> Vec<MenuEntry> {
        match self {
            Role::Student { .. } => vec![
                entry("Dashboard", "/student/dashboard"),
                entry("Timetable", "/student/timetable"),
                entry("My Attendance", "/student/reports"),
            ],
            Role::Lecturer { .. } => vec![
                entry("Dashboard", "/lecturer/dashboard"),
                entry("Timetable", "/lecturer/timetable"),
                entry("Live Recognition", "/recognition"),
                entry("Attendance", "/attendance"),
            ],
            Role::Admin => vec![
                entry("Dashboard", "/admin/dashboard"),
                entry("Pending Registrations", "/admin/pending"),
                entry("Students", "/students"),
                entry("Timetable", "/timetable"),
                entry("Live Recognition", "/recognition"),
                entry("Attendance", "/attendance"),
                entry("Reports", "/admin/reports"),
            ],
        }
    }

    /// Only staff may confirm the end of another person's session.
    pub fn can_end_sessions(&self) -> bool {
        match self {
            Role::Student { .. } => false,
            Role::Lecturer { .. } | Role::Admin => true,
        }
    }
}

/// Operator account configured for this kiosk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub username: String,
    pub role: String,
    #[serde(default)]
    pub id: Option<String>,
}

impl Operator {
    pub fn role(&self) -> Result<Role> {
        Role::parse(&self.role, self.id.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_roles_case_insensitively() {
        assert_eq!(
            Role::parse("Student", Some("S001")).unwrap(),
            Role::Student {
                student_id: "S001".into()
            }
        );
        assert_eq!(Role::parse(" ADMIN ", None).unwrap(), Role::Admin);
        assert!(Role::parse("lecturer", None).is_err());
        assert!(Role::parse("lecturer", Some("  ")).is_err());
        assert!(Role::parse("janitor", Some("1")).is_err());
    }

    #[test]
    fn menus_follow_role() {
        let student = Role::Student {
            student_id: "S1".into(),
        };
        assert!(!student
            .menu()
            .iter()
            .any(|item| item.route == "/recognition"));
        assert!(Role::Admin
            .menu()
            .iter()
            .any(|item| item.route == "/admin/pending"));
        assert_eq!(student.home_route(), "/student/dashboard");
        assert!(!student.can_end_sessions());
        assert!(Role::Admin.can_end_sessions());
    }
}
