pub mod api;
pub mod camera;
pub mod capture;
pub mod commands;
pub mod directory;
pub mod models;
pub mod settings;
mod utils;

use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{Context, Result};
use api::ApiClient;
use camera::{CameraDevice, FrameDirectoryCamera};
use capture::{CaptureController, CaptureSnapshot};
use commands::{describe_transition, KioskCommand};
use directory::DirectoryService;
use log::{info, warn};
use models::{Operator, Role};
use settings::{default_settings_path, SettingsStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

/// Everything the kiosk screens share, built once at startup and passed by
/// reference.
pub struct AppState {
    pub settings: SettingsStore,
    pub api: ApiClient,
    pub capture: CaptureController,
    pub directory: DirectoryService,
    operator: RwLock<Option<Operator>>,
}

impl AppState {
    /// Builds the state with the frame-directory camera named in settings.
    pub fn new(settings: SettingsStore) -> Result<Self> {
        let frames_dir = settings.get().frames_dir;
        Self::with_camera(settings, Arc::new(FrameDirectoryCamera::new(frames_dir)))
    }

    pub fn with_camera(settings: SettingsStore, camera: Arc<dyn CameraDevice>) -> Result<Self> {
        let current = settings.get();
        let api = ApiClient::new(current.api_base_url.clone(), current.request_timeout())
            .context("failed to build API client")?;
        let capture = CaptureController::new(
            camera,
            Arc::new(api.clone()),
            current.capture_config(),
        )?;

        Ok(Self {
            directory: DirectoryService::new(api.clone()),
            api,
            capture,
            operator: RwLock::new(current.operator),
            settings,
        })
    }

    pub fn operator(&self) -> Option<Operator> {
        self.operator
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_operator(&self, operator: Option<Operator>) {
        *self.operator.write().unwrap_or_else(PoisonError::into_inner) = operator;
    }

    /// The operator's role; a misconfigured role is logged and treated as
    /// no operator.
    pub fn operator_role(&self) -> Option<Role> {
        let operator = self.operator()?;
        match operator.role() {
            Ok(role) => Some(role),
            Err(err) => {
                warn!("ignoring operator '{}': {err}", operator.username);
                None
            }
        }
    }
}

pub fn run() -> Result<()> {
    // RUST_LOG still overrides the default level.
    let level = if settings::debug_enabled() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    info!("Attendance kiosk starting up...");

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(run_kiosk())
}

async fn run_kiosk() -> Result<()> {
    let settings_path = default_settings_path();
    let settings = SettingsStore::new(settings_path.clone())
        .with_context(|| format!("failed to load settings from {}", settings_path.display()))?;
    let state = AppState::new(settings)?;
    info!("recognition backend at {}", state.api.base_url());

    if let Some(role) = state.operator_role() {
        info!("operator role: {role:?}, home {}", role.home_route());
    }

    let transitions = tokio::spawn(report_transitions(state.capture.subscribe()));
    state.capture.start().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => line.context("failed to read operator input")?,
        };
        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match KioskCommand::parse(&line) {
            Ok(KioskCommand::Quit) => break,
            Ok(command) => match commands::execute(&state, command).await {
                Ok(output) => println!("{output}"),
                Err(err) => {
                    warn!("command failed: {err:#}");
                    eprintln!("error: {err:#}");
                }
            },
            Err(err) => eprintln!("error: {err}"),
        }
    }

    state.capture.stop().await?;
    transitions.abort();
    info!("Attendance kiosk stopped");
    Ok(())
}

async fn report_transitions(mut rx: watch::Receiver<CaptureSnapshot>) {
    let mut previous = rx.borrow_and_update().clone();
    while rx.changed().await.is_ok() {
        let next = rx.borrow_and_update().clone();
        if let Some(line) = describe_transition(&previous, &next) {
            println!("{line}");
        }
        previous = next;
    }
}
