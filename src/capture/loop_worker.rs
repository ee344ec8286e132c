use std::sync::Arc;

use chrono::Utc;
use image::DynamicImage;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::api::RecognitionBackend;
use crate::camera::{frame::encode_data_url, CameraDevice, FrameStream};

use super::config::CaptureConfig;
use super::state::{Applied, CaptureSnapshot, CaptureState, ReactivateReason};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Requests the controller sends into the running loop. Each carries the
/// epoch it was issued against; the loop drops it if the state has moved on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopCommand {
    Reactivate {
        epoch: u64,
        reason: ReactivateReason,
    },
    RetryCamera {
        epoch: u64,
    },
}

#[derive(Clone)]
pub(crate) struct LoopContext {
    pub state: Arc<Mutex<CaptureState>>,
    pub camera: Arc<dyn CameraDevice>,
    pub backend: Arc<dyn RecognitionBackend>,
    pub config: CaptureConfig,
    pub snapshots: Arc<watch::Sender<CaptureSnapshot>>,
}

impl LoopContext {
    async fn update<R>(&self, f: impl FnOnce(&mut CaptureState) -> R) -> R {
        let mut guard = self.state.lock().await;
        let result = f(&mut *guard);
        self.snapshots.send_replace(guard.snapshot());
        result
    }

    async fn publish(&self) {
        let guard = self.state.lock().await;
        self.snapshots.send_replace(guard.snapshot());
    }
}

enum SampleOutcome {
    Continue,
    Matched { epoch: u64 },
    Cancelled,
}

/// Drives one mounted capture view: sample until a match, show the result
/// until the dwell timer or a command releases it, repeat.
///
/// The camera stream only lives inside `sample_until_match`, so it is
/// released on every path out of sampling, before any re-acquire.
pub(crate) async fn capture_loop(
    ctx: LoopContext,
    mut commands: mpsc::Receiver<LoopCommand>,
    cancel_token: CancellationToken,
) {
    log_info!("capture loop started");

    loop {
        let stream = match ctx.camera.open() {
            Ok(stream) => stream,
            Err(err) => {
                log_error!("camera unavailable: {err}");
                let epoch = ctx
                    .update(|state| {
                        state.camera_unavailable(err.to_string());
                        state.epoch()
                    })
                    .await;
                if wait_for_retry(&mut commands, epoch, &cancel_token).await {
                    continue;
                }
                break;
            }
        };

        ctx.update(CaptureState::begin_sampling).await;

        let Some(shown_epoch) =
            sample_until_match(&ctx, stream, &mut commands, &cancel_token).await
        else {
            break;
        };

        // Recreated per result, so a dwell timer never outlives the result it
        // belongs to.
        let dwell = time::sleep(ctx.config.dwell);
        let reason = tokio::select! {
            _ = dwell => ReactivateReason::DwellElapsed,
            reason = wait_for_reactivation(&mut commands, shown_epoch) => match reason {
                Some(reason) => reason,
                None => break,
            },
            _ = cancel_token.cancelled() => break,
        };

        let reactivated = ctx
            .update(|state| state.reactivate(shown_epoch, reason))
            .await;
        if reactivated {
            log_info!("capture reactivated ({reason:?})");
        }
    }

    ctx.update(CaptureState::stop).await;
    log_info!("capture loop shutting down");
}

/// Ticks every `capture_interval` with at most one request outstanding.
/// Ticks that fall due while a request is in flight are dropped and the
/// interval restarts once the response is in.
async fn sample_until_match(
    ctx: &LoopContext,
    mut stream: Box<dyn FrameStream>,
    commands: &mut mpsc::Receiver<LoopCommand>,
    cancel_token: &CancellationToken,
) -> Option<u64> {
    let period = ctx.config.capture_interval;
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => return None,
            command = commands.recv() => match command {
                Some(command) => log_debug!("ignoring {command:?} while sampling"),
                None => return None,
            },
            _ = ticker.tick() => {
                match sample_once(ctx, stream.as_mut(), cancel_token).await {
                    SampleOutcome::Continue => ticker.reset(),
                    SampleOutcome::Matched { epoch } => {
                        drop(stream);
                        ctx.publish().await;
                        return Some(epoch);
                    }
                    SampleOutcome::Cancelled => return None,
                }
            }
        }
    }
}

async fn sample_once(
    ctx: &LoopContext,
    stream: &mut dyn FrameStream,
    cancel_token: &CancellationToken,
) -> SampleOutcome {
    let Some(token) = ctx.update(CaptureState::begin_request).await else {
        return SampleOutcome::Continue;
    };

    let frame = match stream.grab() {
        Ok(frame) => frame,
        Err(err) => {
            log_warn!("frame grab failed: {err}");
            ctx.update(|state| state.abandon_request(token)).await;
            return SampleOutcome::Continue;
        }
    };

    let Some(data_url) = encode_frame(&ctx.config, frame).await else {
        ctx.update(|state| state.abandon_request(token)).await;
        return SampleOutcome::Continue;
    };

    let response = tokio::select! {
        _ = cancel_token.cancelled() => return SampleOutcome::Cancelled,
        response = ctx.backend.recognize(&data_url) => response,
    };

    let outcome = response.map_err(|err| {
        log_warn!("recognition request failed: {err}");
        err.to_string()
    });

    let mut state = ctx.state.lock().await;
    let applied = state.apply_recognition(
        token,
        outcome,
        |filename| ctx.backend.temp_image_url(filename),
        Utc::now(),
    );

    match applied {
        Applied::Matched => {
            match state.artifact() {
                Some(artifact) => log_info!(
                    "match recognized; new session {} opened",
                    artifact.session_id
                ),
                None => log_info!("match recognized; session already active"),
            }
            SampleOutcome::Matched {
                epoch: state.epoch(),
            }
        }
        Applied::Stale => {
            log_debug!("discarding stale recognition response {token:?}");
            SampleOutcome::Continue
        }
        Applied::NoMatch | Applied::Failed => {
            ctx.snapshots.send_replace(state.snapshot());
            SampleOutcome::Continue
        }
    }
}

/// JPEG-encodes a frame on the blocking pool. `None` when encoding failed.
pub(super) async fn encode_frame(config: &CaptureConfig, frame: DynamicImage) -> Option<String> {
    let (width, height, quality) = (config.frame_width, config.frame_height, config.jpeg_quality);
    let encoded =
        tokio::task::spawn_blocking(move || encode_data_url(frame, width, height, quality)).await;
    match encoded {
        Ok(Ok(data_url)) => Some(data_url),
        Ok(Err(err)) => {
            log_warn!("frame encoding failed: {err:?}");
            None
        }
        Err(err) => {
            log_error!("frame encoding worker join failed: {err}");
            None
        }
    }
}

async fn wait_for_reactivation(
    commands: &mut mpsc::Receiver<LoopCommand>,
    shown_epoch: u64,
) -> Option<ReactivateReason> {
    while let Some(command) = commands.recv().await {
        match command {
            LoopCommand::Reactivate { epoch, reason } if epoch == shown_epoch => {
                return Some(reason)
            }
            other => log_debug!("ignoring stale {other:?}"),
        }
    }
    None
}

/// Parks the loop until the operator asks to retry the camera. `false` means
/// stop.
async fn wait_for_retry(
    commands: &mut mpsc::Receiver<LoopCommand>,
    notice_epoch: u64,
    cancel_token: &CancellationToken,
) -> bool {
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => return false,
            command = commands.recv() => match command {
                Some(LoopCommand::RetryCamera { epoch }) if epoch == notice_epoch => return true,
                Some(other) => log_debug!("ignoring {other:?} while camera is unavailable"),
                None => return false,
            },
        }
    }
}
