//! Application entry point — realtime voice chat.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create [`tokio`] runtime (multi-thread, 2 workers).
//! 4. Build the credential provider, audio devices and realtime client.
//! 5. Spawn [`VoiceSession::run`] on the runtime.
//! 6. Spawn the hotkey listener thread.
//! 7. Run [`eframe::run_native`] — blocks the main thread until the window
//!    is closed.
//! 8. Drop the command sender and wait for the session to tear down.

use std::sync::Arc;
use std::time::Duration;

use eframe::egui;
use tokio::sync::mpsc;
use voice_chat::{
    app::VoiceChatApp,
    audio::{CpalCapture, CpalPlayback},
    config::{AppConfig, AppPaths},
    credential::{
        CredentialPrompt, CredentialProvider, FileCredentialStore, NoPrompt, StdinPrompt,
    },
    hotkey::{parse_key, HotkeyListener},
    realtime::{RealtimeClient, SessionParameters},
    session::{new_shared_state, SessionCommand, VoiceSession},
};

/// How long teardown may take after the window closes.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

// ---------------------------------------------------------------------------
// Native options builder
// ---------------------------------------------------------------------------

fn native_options(config: &AppConfig) -> eframe::NativeOptions {
    let mut vp = egui::ViewportBuilder::default()
        .with_decorations(false)
        .with_transparent(true)
        .with_inner_size([300.0, 80.0])
        .with_min_inner_size([250.0, 60.0])
        .with_resizable(false);

    if config.ui.always_on_top {
        vp = vp.with_always_on_top();
    }

    if let Some((x, y)) = config.ui.window_position {
        vp = vp.with_position(egui::pos2(x, y));
    }

    eframe::NativeOptions {
        viewport: vp,
        ..Default::default()
    }
}

fn credential_provider(config: &AppConfig) -> CredentialProvider {
    let prompt: Box<dyn CredentialPrompt> = if config.credential.prompt {
        Box::new(StdinPrompt)
    } else {
        Box::new(NoPrompt)
    };
    CredentialProvider::new(
        Box::new(FileCredentialStore::new(AppPaths::new().credentials_file)),
        config.credential.cache_key.clone(),
        config.credential.configured_value(),
        prompt,
    )
}

fn start_hotkey(config: &AppConfig, commands: mpsc::Sender<SessionCommand>) -> Option<HotkeyListener> {
    if !config.hotkey.enabled {
        return None;
    }
    let key = parse_key(&config.hotkey.toggle_recording_key).unwrap_or_else(|| {
        log::warn!(
            "unknown hotkey {:?}; falling back to F9",
            config.hotkey.toggle_recording_key
        );
        rdev::Key::F9
    });
    match HotkeyListener::start(key, commands) {
        Ok(listener) => Some(listener),
        Err(e) => {
            log::warn!("hotkey listener unavailable: {e}");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> eframe::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Voice Chat starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .map_err(|e| eframe::Error::AppCreation(Box::new(e)))?;

    // 4. Session components
    let rate = config.audio.sample_rate;
    let credentials = Arc::new(credential_provider(&config));
    let capture = CpalCapture::new(rate, config.audio.frame_samples());
    let playback = CpalPlayback::new(rate);
    let channel = RealtimeClient::from_config(&config.realtime, rate);
    let params = SessionParameters::new(
        config.realtime.instructions.clone(),
        config.realtime.voice.clone(),
    );

    let state = new_shared_state();
    let session = VoiceSession::new(
        Arc::clone(&state),
        credentials,
        Box::new(capture),
        Box::new(playback),
        Box::new(channel),
        params,
        config.realtime.greeting.clone(),
    );

    // 5. Session task
    let (command_tx, command_rx) = mpsc::channel::<SessionCommand>(16);
    let session_task = rt.spawn(session.run(command_rx));

    // 6. Hotkey listener thread
    let hotkey = start_hotkey(&config, command_tx.clone());

    // 7. Build the egui app and run it (blocks until the window is closed)
    let app = VoiceChatApp::new(state, command_tx, config.clone());
    let options = native_options(&config);

    let result = eframe::run_native(
        "Voice Chat",
        options,
        Box::new(move |_cc| Ok(Box::new(app))),
    );

    // 8. Closing the last sender ends `VoiceSession::run`, which releases
    //    the microphone, speaker and connection.
    drop(hotkey);
    rt.block_on(async {
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, session_task).await {
            Ok(Ok(())) => log::info!("session shut down"),
            Ok(Err(e)) => log::error!("session task failed: {e}"),
            Err(_) => log::warn!("session teardown timed out"),
        }
    });

    result
}
