//! Application entry point: emotion-aware voice assistant.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create the [`tokio`] runtime.
//! 4. Open the camera.  Failure here is fatal.
//! 5. Build the emotion model client, the Whisper engine (optional) and the
//!    system voice.
//! 6. Start the pipeline workers.
//! 7. Run [`eframe::run_native`], which blocks the main thread until the window
//!    is closed.
//! 8. Join the workers and shut the runtime down.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use eframe::egui;
use emotion_assistant::{
    app::EmotionApp,
    audio::{CpalMicrophone, Microphone, MicrophoneError},
    config::{AppConfig, AppPaths},
    pipeline::{Capabilities, Pipeline},
    speech::MicrophoneOpener,
    stt::{SttEngine, TranscribeParams, WhisperEngine},
    tts::SystemVoice,
    vision::{DeepFaceClient, SnapshotCamera},
};

/// Time left to in-flight blocking work once the window is gone.
const RUNTIME_SHUTDOWN: Duration = Duration::from_secs(1);

fn load_stt(config: &AppConfig) -> Option<Arc<dyn SttEngine>> {
    let path = AppPaths::new().model_file(&config.speech.model);
    match WhisperEngine::load(&path, TranscribeParams::from_config(&config.speech)) {
        Ok(engine) => {
            log::info!("Whisper model loaded: {}", path.display());
            Some(Arc::new(engine))
        }
        Err(e) => {
            log::warn!("Could not load Whisper model ({}): {e}", path.display());
            None
        }
    }
}

fn cpal_opener() -> MicrophoneOpener {
    Box::new(|| {
        let mic = CpalMicrophone::open()?;
        log::info!(
            "Microphone open ({} Hz, {} ch)",
            mic.native_rate(),
            mic.channels()
        );
        Ok::<Box<dyn Microphone>, MicrophoneError>(Box::new(mic))
    })
}

fn native_options(config: &AppConfig) -> eframe::NativeOptions {
    eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(config.ui.window_title.clone())
            .with_inner_size([
                config.camera.width.max(320) as f32,
                config.camera.height.max(240) as f32,
            ]),
        ..Default::default()
    }
}

fn main() -> ExitCode {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Emotion assistant starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            log::error!("Failed to create tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    // 4. Camera
    let camera = match SnapshotCamera::open(&config.camera) {
        Ok(camera) => camera,
        Err(e) => {
            log::error!("Could not open video device: {e}");
            return ExitCode::FAILURE;
        }
    };

    // 5. Engines
    let caps = Capabilities {
        model: Arc::new(DeepFaceClient::from_config(&config.analysis)),
        stt: load_stt(&config),
        synth: Arc::new(SystemVoice::from_config(&config.voice)),
        open_mic: cpal_opener(),
    };

    // 6. Workers
    let (pipeline, cycle) = Pipeline::start(rt.handle(), &config, caps, Box::new(camera));

    // 7. Window
    let app = EmotionApp::new(cycle, pipeline, &config.ui);
    let result = eframe::run_native(
        &config.ui.window_title,
        native_options(&config),
        Box::new(move |_cc| Ok(Box::new(app))),
    );

    // 8. Runtime
    rt.shutdown_timeout(RUNTIME_SHUTDOWN);

    match result {
        Ok(()) => {
            log::info!("Emotion assistant stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Display window failed: {e}");
            ExitCode::FAILURE
        }
    }
}
