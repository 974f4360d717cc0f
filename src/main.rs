//! Application entry point: StoryWeaver.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk, apply environment overrides, validate.
//!    Any configuration error is fatal.
//! 3. Create the [`tokio`] runtime.
//! 4. Build the collaborators: language model, Whisper engine, speech
//!    synthesis.
//! 5. Spawn the practice orchestrator on the runtime.
//! 6. Start microphone capture and the playback thread.
//! 7. Run [`eframe::run_native`], which blocks until the window is closed.

use std::process::ExitCode;
use std::sync::Arc;

use tokio::sync::mpsc;

use storyweaver::{
    app::StoryWeaverApp,
    audio::{Microphone, Player, StreamHandle},
    config::{AppConfig, AppPaths},
    llm::build_model,
    progress::ProgressStore,
    session::{
        new_audio_buffer, Collaborators, PictureLibrary, PracticeCommand, PracticeEvent,
        PracticeOrchestrator, SharedAudioBuffer,
    },
    stt::{SttEngine, TranscribeParams, UnavailableStt, WhisperEngine},
    tts::GoogleTranslateTts,
};

use eframe::egui;

// ---------------------------------------------------------------------------
// Startup helpers
// ---------------------------------------------------------------------------

fn load_config(paths: &AppPaths) -> anyhow::Result<AppConfig> {
    let first_run = !paths.settings_file.exists();
    let mut config = AppConfig::load_from(&paths.settings_file)?;
    if first_run {
        match config.save_to(&paths.settings_file) {
            Ok(()) => log::info!("wrote default settings to {}", paths.settings_file.display()),
            Err(e) => log::warn!("could not write default settings: {e}"),
        }
    }

    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

fn build_stt(config: &AppConfig, paths: &AppPaths) -> Arc<dyn SttEngine> {
    let model_path = paths.whisper_model(&config.stt.model);
    let params = TranscribeParams {
        language: config.stt.language.clone(),
        ..TranscribeParams::default()
    };

    match WhisperEngine::load(&model_path, params) {
        Ok(engine) => {
            log::info!("Whisper model loaded: {}", model_path.display());
            Arc::new(engine)
        }
        Err(e) => {
            log::warn!("Could not load Whisper model: {e}. Recording will not work.");
            Arc::new(UnavailableStt::new(e))
        }
    }
}

fn start_capture(audio_buf: SharedAudioBuffer) -> Option<StreamHandle> {
    let mic = match Microphone::open() {
        Ok(mic) => mic,
        Err(e) => {
            log::warn!("Audio capture unavailable: {e}");
            return None;
        }
    };
    let format = mic.format();
    log::info!(
        "capturing at {} Hz, {} channel(s)",
        format.sample_rate,
        format.channels
    );
    match mic.record_into(audio_buf) {
        Ok(handle) => Some(handle),
        Err(e) => {
            log::warn!("Failed to start audio stream: {e}");
            None
        }
    }
}

fn native_options(config: &AppConfig) -> eframe::NativeOptions {
    let (width, height) = config.ui.window_size;
    eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("StoryWeaver")
            .with_inner_size([width, height])
            .with_min_inner_size([640.0, 480.0]),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("StoryWeaver starting up");

    // 2. Configuration
    let paths = AppPaths::new();
    let config = match load_config(&paths) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Configuration error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    // 3. Tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            log::error!("failed to create tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    // 4. Collaborators
    let collaborators = Collaborators {
        stt: build_stt(&config, &paths),
        model: build_model(&config.llm),
        tts: Arc::new(GoogleTranslateTts::from_config(&config.tts)),
    };

    // 5. Orchestrator
    let (command_tx, command_rx) = mpsc::channel::<PracticeCommand>(16);
    let (event_tx, event_rx) = mpsc::channel::<PracticeEvent>(32);
    let audio_buf = new_audio_buffer();

    let orchestrator = PracticeOrchestrator::new(
        collaborators,
        ProgressStore::new(&config.storage.progress_file),
        PictureLibrary::new(&config.storage.picture_dir),
        config.practice,
        Arc::clone(&audio_buf),
    )
    .with_recent_sessions(config.ui.recent_sessions);
    rt.spawn(orchestrator.run(command_rx, event_tx));

    // 6. Audio in / out
    let _stream_handle = start_capture(Arc::clone(&audio_buf));
    let player = match Player::spawn() {
        Ok(player) => Some(player),
        Err(e) => {
            log::warn!("Audio playback unavailable: {e}");
            None
        }
    };

    // 7. Window
    let app = StoryWeaverApp::new(command_tx, event_rx, player, config.clone());
    let result = eframe::run_native(
        "StoryWeaver",
        native_options(&config),
        Box::new(move |cc| {
            egui_extras::install_image_loaders(&cc.egui_ctx);
            Ok(Box::new(app))
        }),
    );

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("window error: {e}");
            ExitCode::FAILURE
        }
    }
}
