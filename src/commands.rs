use anyhow::{anyhow, bail, Result};
use chrono::Local;

use crate::api::EndSessionProof;
use crate::capture::{CapturePhase, CaptureSnapshot, ReactivateReason};
use crate::AppState;

/// Operator input read by the kiosk binary, one command per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KioskCommand {
    Reactivate,
    EndSession { username: String, password: String },
    EndSessionByFace { session_id: String },
    Status,
    Roster,
    Timetable,
    Menu,
    DarkMode(bool),
    Quit,
}

impl KioskCommand {
    pub fn parse(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            bail!("empty command");
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "reactivate" | "r" => KioskCommand::Reactivate,
            "end" => match (words.next(), words.next()) {
                (Some(username), Some(password)) => KioskCommand::EndSession {
                    username: username.to_string(),
                    password: password.to_string(),
                },
                _ => bail!("usage: end <username> <password>"),
            },
            "endface" => match words.next() {
                Some(session_id) => KioskCommand::EndSessionByFace {
                    session_id: session_id.to_string(),
                },
                None => bail!("usage: endface <session_id>"),
            },
            "status" => KioskCommand::Status,
            "roster" => KioskCommand::Roster,
            "timetable" => KioskCommand::Timetable,
            "menu" => KioskCommand::Menu,
            "dark" => match words.next() {
                Some("on") => KioskCommand::DarkMode(true),
                Some("off") => KioskCommand::DarkMode(false),
                _ => bail!("usage: dark on|off"),
            },
            "quit" | "exit" | "q" => KioskCommand::Quit,
            other => bail!("unknown command '{other}'"),
        };

        if words.next().is_some() {
            bail!("too many arguments for '{verb}'");
        }
        Ok(command)
    }
}

pub async fn execute(state: &AppState, command: KioskCommand) -> Result<String> {
    match command {
        KioskCommand::Reactivate => {
            if state.capture.reactivate().await? {
                Ok("Reactivating video".into())
            } else {
                Ok("Video is already active".into())
            }
        }
        KioskCommand::EndSession { username, password } => {
            if let Some(role) = state.operator_role() {
                if !role.can_end_sessions() {
                    bail!("the configured operator role may not end sessions");
                }
            }
            let response = state
                .capture
                .end_session(EndSessionProof::credentials(username, password))
                .await?;
            Ok(response
                .message
                .unwrap_or_else(|| "Session ended successfully".into()))
        }
        KioskCommand::EndSessionByFace { session_id } => {
            // The camera is exclusive: pause the capture view while the
            // student faces it, then bring it back.
            let resume = state.capture.is_running().await;
            if resume {
                state.capture.stop().await?;
            }
            let result = tokio::select! {
                result = state.capture.end_session_by_face(&session_id) => result,
                _ = tokio::signal::ctrl_c() => Err(anyhow!("ending session {session_id} cancelled")),
            };
            if resume {
                state.capture.start().await?;
            }
            let response = result?;
            Ok(response
                .message
                .unwrap_or_else(|| format!("Session {session_id} ended")))
        }
        KioskCommand::Status => {
            let snapshot = state.capture.snapshot().await;
            Ok(serde_json::to_string_pretty(&snapshot)?)
        }
        KioskCommand::Roster => {
            let today = Local::now().date_naive();
            let rows = state.directory.attendance_roster(today).await?;
            if rows.is_empty() {
                return Ok(format!("No sessions on {today}"));
            }
            Ok(rows
                .iter()
                .map(|row| {
                    format!(
                        "{:>6}  {:<24} {:<10} {}  {}",
                        row.session_id,
                        row.student_name,
                        row.student_id,
                        row.start_time.format("%H:%M"),
                        if row.active { "open" } else { "ended" }
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"))
        }
        KioskCommand::Timetable => {
            let rows = state
                .directory
                .timetable_rows(Local::now().naive_local())
                .await?;
            Ok(rows
                .iter()
                .map(|row| {
                    format!(
                        "{} {:<10} {}-{}  {:<28} {}",
                        if row.is_current { "*" } else { " " },
                        row.day_of_week,
                        row.start_time.format("%H:%M"),
                        row.end_time.format("%H:%M"),
                        row.class_name,
                        row.lecturer_name
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"))
        }
        KioskCommand::Menu => match state.operator_role() {
            Some(role) => Ok(role
                .menu()
                .iter()
                .map(|entry| format!("{:<24} {}", entry.label, entry.route))
                .collect::<Vec<_>>()
                .join("\n")),
            None => Ok("No operator configured".into()),
        },
        KioskCommand::DarkMode(enabled) => {
            state.settings.set_dark_mode(enabled)?;
            Ok(format!("Dark mode {}", if enabled { "on" } else { "off" }))
        }
        KioskCommand::Quit => Ok(String::new()),
    }
}

/// Operator-facing line for a visible state change, if there is one.
pub fn describe_transition(previous: &CaptureSnapshot, next: &CaptureSnapshot) -> Option<String> {
    match (previous.phase, next.phase) {
        (CapturePhase::ResultShown, CapturePhase::ResultShown) => None,
        (_, CapturePhase::ResultShown) => {
            let recognized = next.recognized.as_ref()?;
            let who = format!(
                "Recognized {} ({})",
                recognized.name.as_deref().unwrap_or("unknown"),
                recognized.student_id.as_deref().unwrap_or("-")
            );
            Some(match &next.artifact {
                Some(artifact) => format!(
                    "{who}. New session {} started; end it at {}",
                    artifact.session_id, artifact.end_session_url
                ),
                None => format!("{who}. Session already active"),
            })
        }
        (CapturePhase::ResultShown, phase) if phase.is_sampling() => {
            Some(match next.last_reactivation {
                Some(ReactivateReason::SessionEnded) => "Session ended; video reactivated".into(),
                Some(ReactivateReason::DwellElapsed) => "Video reactivated".into(),
                Some(ReactivateReason::Manual) | None => "Video reactivated by operator".into(),
            })
        }
        (_, CapturePhase::Idle) if next.notice.is_some() && previous.notice != next.notice => {
            next.notice
                .as_ref()
                .map(|notice| format!("Camera unavailable: {notice}"))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureConfig, CaptureState};
    use crate::api::RecognitionResponse;
    use chrono::Utc;

    #[test]
    fn parses_operator_commands() {
        assert_eq!(KioskCommand::parse(" R ").unwrap(), KioskCommand::Reactivate);
        assert_eq!(
            KioskCommand::parse("end ops s3cret").unwrap(),
            KioskCommand::EndSession {
                username: "ops".into(),
                password: "s3cret".into()
            }
        );
        assert_eq!(KioskCommand::parse("quit").unwrap(), KioskCommand::Quit);
        assert_eq!(
            KioskCommand::parse("dark on").unwrap(),
            KioskCommand::DarkMode(true)
        );
        assert!(KioskCommand::parse("dark maybe").is_err());
        assert_eq!(
            KioskCommand::parse("endface 42").unwrap(),
            KioskCommand::EndSessionByFace {
                session_id: "42".into()
            }
        );
        assert!(KioskCommand::parse("endface").is_err());
        assert!(KioskCommand::parse("end ops").is_err());
        assert!(KioskCommand::parse("status now").is_err());
        assert!(KioskCommand::parse("").is_err());
        assert!(KioskCommand::parse("dance").is_err());
    }

    #[test]
    fn describes_match_and_reactivation() {
        let mut state = CaptureState::new(&CaptureConfig::default());
        state.begin_sampling();
        let sampling = state.snapshot();

        let token = state.begin_request().unwrap();
        state.apply_recognition(
            token,
            Ok(RecognitionResponse {
                matched: true,
                student_id: Some("S001".into()),
                name: Some("Ada".into()),
                image_filename: Some("f1.jpg".into()),
                qr_code: Some("sess/42".into()),
                ..RecognitionResponse::default()
            }),
            |filename| format!("http://localhost:5000/temp_image/{filename}"),
            Utc::now(),
        );
        let shown = state.snapshot();

        let line = describe_transition(&sampling, &shown).unwrap();
        assert!(line.starts_with("Recognized Ada (S001)"));
        assert!(line.contains("http://localhost:3000/end-session/42"));
        assert_eq!(describe_transition(&shown, &shown), None);

        state.reactivate(shown.epoch, ReactivateReason::SessionEnded);
        let resumed = state.snapshot();
        assert_eq!(
            describe_transition(&shown, &resumed).as_deref(),
            Some("Session ended; video reactivated")
        );
    }
}
