use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use log::{info, warn};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::api::{EndSessionProof, EndSessionResponse, RecognitionBackend};
use crate::camera::CameraDevice;

use super::config::CaptureConfig;
use super::face_end;
use super::loop_worker::{capture_loop, LoopCommand, LoopContext};
use super::state::{CapturePhase, CaptureSnapshot, CaptureState, ReactivateReason};

const COMMAND_BUFFER: usize = 8;

struct Worker {
    id: Uuid,
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
    commands: mpsc::Sender<LoopCommand>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        // Dropping the controller unmounts the view.
        self.cancel_token.cancel();
    }
}

/// Mounts and unmounts the capture view and relays operator actions into
/// the running loop.
#[derive(Clone)]
pub struct CaptureController {
    state: Arc<Mutex<CaptureState>>,
    camera: Arc<dyn CameraDevice>,
    backend: Arc<dyn RecognitionBackend>,
    config: CaptureConfig,
    snapshots: Arc<watch::Sender<CaptureSnapshot>>,
    worker: Arc<Mutex<Option<Worker>>>,
}

impl CaptureController {
    pub fn new(
        camera: Arc<dyn CameraDevice>,
        backend: Arc<dyn RecognitionBackend>,
        config: CaptureConfig,
    ) -> Result<Self> {
        config.validate().context("invalid capture configuration")?;

        let state = CaptureState::new(&config);
        let (snapshots, _) = watch::channel(state.snapshot());

        Ok(Self {
            state: Arc::new(Mutex::new(state)),
            camera,
            backend,
            config,
            snapshots: Arc::new(snapshots),
            worker: Arc::new(Mutex::new(None)),
        })
    }

    /// Mounts the capture view: acquires the camera and starts sampling.
    pub async fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock().await;
        if let Some(existing) = worker.as_ref() {
            if !existing.handle.is_finished() {
                bail!("capture already active");
            }
        }

        let id = Uuid::new_v4();
        let cancel_token = CancellationToken::new();
        let (commands, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let ctx = LoopContext {
            state: Arc::clone(&self.state),
            camera: Arc::clone(&self.camera),
            backend: Arc::clone(&self.backend),
            config: self.config.clone(),
            snapshots: Arc::clone(&self.snapshots),
        };

        info!("starting capture view {id}");
        let handle = tokio::spawn(capture_loop(ctx, command_rx, cancel_token.clone()));

        *worker = Some(Worker {
            id,
            handle,
            cancel_token,
            commands,
        });
        Ok(())
    }

    /// Unmounts the capture view. The camera is released before this returns.
    pub async fn stop(&self) -> Result<()> {
        let Some(mut worker) = self.worker.lock().await.take() else {
            return Ok(());
        };

        worker.cancel_token.cancel();
        let joined = (&mut worker.handle)
            .await
            .with_context(|| format!("capture loop {} failed to join", worker.id));

        // The loop resets its own state on a clean exit; cover a panicked one.
        if joined.is_err() {
            let mut state = self.state.lock().await;
            state.stop();
            self.snapshots.send_replace(state.snapshot());
        }
        info!("capture view {} stopped", worker.id);
        joined
    }

    pub async fn is_running(&self) -> bool {
        self.worker
            .lock()
            .await
            .as_ref()
            .map(|worker| !worker.handle.is_finished())
            .unwrap_or(false)
    }

    pub async fn snapshot(&self) -> CaptureSnapshot {
        self.state.lock().await.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<CaptureSnapshot> {
        self.snapshots.subscribe()
    }

    /// Manual "Reactivate Video". Dismisses the shown result, or retries the
    /// camera after it failed to open. Returns whether anything was requested.
    pub async fn reactivate(&self) -> Result<bool> {
        let command = {
            let state = self.state.lock().await;
            match state.phase() {
                CapturePhase::ResultShown => LoopCommand::Reactivate {
                    epoch: state.epoch(),
                    reason: ReactivateReason::Manual,
                },
                CapturePhase::Idle if state.notice().is_some() => {
                    LoopCommand::RetryCamera {
                        epoch: state.epoch(),
                    }
                }
                CapturePhase::Idle
                | CapturePhase::Sampling
                | CapturePhase::AwaitingResponse { .. } => return Ok(false),
            }
        };

        self.send(command).await?;
        Ok(true)
    }

    /// Ends the session opened by the match currently on screen, then resumes
    /// sampling without waiting out the dwell time.
    pub async fn end_session(&self, proof: EndSessionProof) -> Result<EndSessionResponse> {
        let (epoch, session_id) = {
            let state = self.state.lock().await;
            let Some((epoch, artifact)) = state.pending_session() else {
                bail!("no new session is awaiting confirmation");
            };
            (epoch, artifact.session_id.clone())
        };

        let response = match self.backend.end_session(&session_id, &proof).await {
            Ok(response) => response,
            Err(err) => {
                warn!("ending session {session_id} failed: {err}");
                return Err(anyhow!(err).context(format!("failed to end session {session_id}")));
            }
        };
        info!("session {session_id} ended");

        let resume = LoopCommand::Reactivate {
            epoch,
            reason: ReactivateReason::SessionEnded,
        };
        if let Err(err) = self.send(resume).await {
            warn!("session {session_id} ended but capture could not resume: {err}");
        }
        Ok(response)
    }

    /// Ends a session by face instead of credentials, polling the camera
    /// until the server confirms. The camera is exclusive, so the capture
    /// view must not be running.
    pub async fn end_session_by_face(&self, session_id: &str) -> Result<EndSessionResponse> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            bail!("a session id is required");
        }
        if self.is_running().await {
            bail!("capture view is active; stop it before ending a session by face");
        }

        face_end::end_session_by_face(
            self.camera.as_ref(),
            self.backend.as_ref(),
            &self.config,
            session_id,
        )
        .await
    }

    async fn send(&self, command: LoopCommand) -> Result<()> {
        let sender = {
            let worker = self.worker.lock().await;
            worker
                .as_ref()
                .map(|worker| worker.commands.clone())
                .ok_or_else(|| anyhow!("capture is not running"))?
        };
        sender
            .send(command)
            .await
            .map_err(|_| anyhow!("capture loop has stopped"))
    }
}
