use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;

use crate::api::RecognitionResponse;

use super::artifact::SessionArtifact;
use super::config::CaptureConfig;
use super::history::HistoryBuffer;

/// Identifies one recognition request. A response is only applied while the
/// state is still waiting on the exact same token.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct RequestToken {
    pub epoch: u64,
    pub seq: u64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum CapturePhase {
    /// Not mounted, stopped, or waiting for the camera to become available.
    Idle,
    Sampling,
    AwaitingResponse { token: RequestToken },
    ResultShown,
}

impl Default for CapturePhase {
    fn default() -> Self {
        CapturePhase::Idle
    }
}

impl CapturePhase {
    /// True while the camera is streaming, including while a frame is out
    /// for recognition.
    pub fn is_sampling(&self) -> bool {
        matches!(
            self,
            CapturePhase::Sampling | CapturePhase::AwaitingResponse { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ReactivateReason {
    DwellElapsed,
    Manual,
    SessionEnded,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecognizedSubject {
    pub student_id: Option<String>,
    pub name: Option<String>,
    pub image_url: String,
}

/// What became of a recognition response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The state moved on while the request was in flight.
    Stale,
    NoMatch,
    /// Transport failed; handled exactly like a miss.
    Failed,
    Matched,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CaptureStats {
    pub requests: u64,
    pub matches: u64,
    pub failures: u64,
    pub stale_discarded: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSnapshot {
    #[serde(flatten)]
    pub phase: CapturePhase,
    pub epoch: u64,
    pub current_image: Option<String>,
    pub recognized: Option<RecognizedSubject>,
    pub artifact: Option<SessionArtifact>,
    pub history: Vec<String>,
    pub notice: Option<String>,
    pub shown_at: Option<DateTime<Utc>>,
    pub dwell_until: Option<DateTime<Utc>>,
    pub last_reactivation: Option<ReactivateReason>,
    pub stats: CaptureStats,
}

/// In-memory state of one capture view. Pure: the loop worker performs all
/// I/O and feeds the outcomes in here.
#[derive(Debug, Clone)]
pub struct CaptureState {
    phase: CapturePhase,
    /// Bumped on every mount, match and reactivation.
    epoch: u64,
    next_seq: u64,
    current_image: Option<String>,
    recognized: Option<RecognizedSubject>,
    artifact: Option<SessionArtifact>,
    history: HistoryBuffer,
    notice: Option<String>,
    shown_at: Option<DateTime<Utc>>,
    dwell: ChronoDuration,
    frontend_base_url: String,
    last_reactivation: Option<ReactivateReason>,
    stats: CaptureStats,
}

impl CaptureState {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            phase: CapturePhase::Idle,
            epoch: 0,
            next_seq: 0,
            current_image: None,
            recognized: None,
            artifact: None,
            history: HistoryBuffer::new(config.history_capacity),
            notice: None,
            shown_at: None,
            dwell: ChronoDuration::from_std(config.dwell).unwrap_or_else(|_| ChronoDuration::zero()),
            frontend_base_url: config.frontend_base_url.clone(),
            last_reactivation: None,
            stats: CaptureStats::default(),
        }
    }

    pub fn phase(&self) -> CapturePhase {
        self.phase
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    pub fn artifact(&self) -> Option<&SessionArtifact> {
        self.artifact.as_ref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Camera is streaming: start (or restart) sampling.
    pub fn begin_sampling(&mut self) {
        self.clear_result();
        self.notice = None;
        self.epoch += 1;
        self.phase = CapturePhase::Sampling;
    }

    /// Camera could not be opened; nothing is sampled until a retry.
    pub fn camera_unavailable(&mut self, notice: String) {
        self.clear_result();
        self.notice = Some(notice);
        self.epoch += 1;
        self.phase = CapturePhase::Idle;
    }

    /// Claims the single in-flight slot. `None` while a request is already
    /// outstanding or when not sampling.
    pub fn begin_request(&mut self) -> Option<RequestToken> {
        if self.phase != CapturePhase::Sampling {
            return None;
        }
        self.next_seq += 1;
        let token = RequestToken {
            epoch: self.epoch,
            seq: self.next_seq,
        };
        self.phase = CapturePhase::AwaitingResponse { token };
        self.stats.requests += 1;
        Some(token)
    }

    /// Frame grab failed after the slot was claimed; give it back.
    pub fn abandon_request(&mut self, token: RequestToken) {
        if self.phase == (CapturePhase::AwaitingResponse { token }) {
            self.phase = CapturePhase::Sampling;
        }
    }

    /// Applies a recognition outcome. `image_url` resolves the server's
    /// still filename to a fetchable URL.
    pub fn apply_recognition(
        &mut self,
        token: RequestToken,
        outcome: Result<RecognitionResponse, String>,
        image_url: impl FnOnce(&str) -> String,
        now: DateTime<Utc>,
    ) -> Applied {
        if self.phase != (CapturePhase::AwaitingResponse { token }) {
            self.stats.stale_discarded += 1;
            return Applied::Stale;
        }

        let response = match outcome {
            Ok(response) => response,
            Err(_) => {
                self.stats.failures += 1;
                self.phase = CapturePhase::Sampling;
                return Applied::Failed;
            }
        };

        let Some(filename) = response.matched_image() else {
            self.phase = CapturePhase::Sampling;
            return Applied::NoMatch;
        };

        let url = image_url(filename);
        self.artifact = response
            .qr_code
            .as_deref()
            .and_then(|payload| SessionArtifact::from_payload(payload, &self.frontend_base_url));
        self.recognized = Some(RecognizedSubject {
            student_id: response.student_id.clone(),
            name: response.name.clone(),
            image_url: url.clone(),
        });
        self.current_image = Some(url);
        self.shown_at = Some(now);
        self.stats.matches += 1;
        self.epoch += 1;
        self.phase = CapturePhase::ResultShown;
        Applied::Matched
    }

    /// Leaves `ResultShown` for `Sampling`, archiving the frozen still.
    /// Ignored unless `epoch` names the result currently on screen.
    pub fn reactivate(&mut self, epoch: u64, reason: ReactivateReason) -> bool {
        if self.phase != CapturePhase::ResultShown || epoch != self.epoch {
            return false;
        }
        if let Some(image) = self.current_image.take() {
            self.history.push_front(image);
        }
        self.begin_sampling();
        self.last_reactivation = Some(reason);
        true
    }

    /// The session artifact that may still be ended, with the epoch the
    /// end-session command must carry.
    pub fn pending_session(&self) -> Option<(u64, &SessionArtifact)> {
        match self.phase {
            CapturePhase::ResultShown => self.artifact.as_ref().map(|a| (self.epoch, a)),
            _ => None,
        }
    }

    /// View unmounted: drop any result and camera notice, keep the history
    /// of this view.
    pub fn stop(&mut self) {
        self.clear_result();
        self.notice = None;
        self.epoch += 1;
        self.phase = CapturePhase::Idle;
    }

    fn clear_result(&mut self) {
        self.current_image = None;
        self.recognized = None;
        self.artifact = None;
        self.shown_at = None;
    }

    pub fn snapshot(&self) -> CaptureSnapshot {
        CaptureSnapshot {
            phase: self.phase,
            epoch: self.epoch,
            current_image: self.current_image.clone(),
            recognized: self.recognized.clone(),
            artifact: self.artifact.clone(),
            history: self.history.to_vec(),
            notice: self.notice.clone(),
            shown_at: self.shown_at,
            dwell_until: self.shown_at.map(|at| at + self.dwell),
            last_reactivation: self.last_reactivation,
            stats: self.stats,
        }
    }
}
