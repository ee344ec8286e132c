//! The capture-and-recognition loop: samples a camera, sends frames to the
//! recognizer, and freezes on a match until the dwell timer or the operator
//! releases it.

mod artifact;
mod config;
pub mod controller;
mod face_end;
mod history;
mod loop_worker;
pub mod state;

pub use artifact::{session_id_from_payload, SessionArtifact};
pub use config::{CaptureConfig, ConfigError};
pub use controller::CaptureController;
pub use history::HistoryBuffer;
pub use state::{
    CapturePhase, CaptureSnapshot, CaptureState, CaptureStats, ReactivateReason,
    RecognizedSubject, RequestToken,
};
