use anyhow::{Context, Result};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::api::{ApiError, EndSessionProof, EndSessionResponse, RecognitionBackend};
use crate::camera::CameraDevice;

use super::config::CaptureConfig;
use super::loop_worker::encode_frame;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Ends `session_id` by showing the student's face: one frame per capture
/// interval is posted as proof until the server answers `success: true`.
///
/// Requests never overlap; the interval restarts after each answer. The
/// camera stream is held only for the duration of this call.
pub(super) async fn end_session_by_face(
    camera: &dyn CameraDevice,
    backend: &dyn RecognitionBackend,
    config: &CaptureConfig,
    session_id: &str,
) -> Result<EndSessionResponse> {
    let mut stream = camera
        .open()
        .with_context(|| format!("camera unavailable for ending session {session_id}"))?;

    let period = config.capture_interval;
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut attempts: u64 = 0;

    loop {
        ticker.tick().await;

        let frame = match stream.grab() {
            Ok(frame) => frame,
            Err(err) => {
                log_warn!("frame grab failed: {err}");
                continue;
            }
        };
        let Some(image) = encode_frame(config, frame).await else {
            ticker.reset();
            continue;
        };

        attempts += 1;
        match backend
            .end_session(session_id, &EndSessionProof::Face { image })
            .await
        {
            Ok(response) if response.success == Some(true) => {
                log_info!("session {session_id} ended by face after {attempts} attempt(s)");
                return Ok(response);
            }
            Ok(_) => log_debug!("session {session_id}: face not confirmed yet"),
            Err(ApiError::Rejected(reason)) => {
                log_debug!("session {session_id}: face rejected ({reason})")
            }
            Err(err) => log_warn!("ending session {session_id} by face failed: {err}"),
        }
        ticker.reset();
    }
}
