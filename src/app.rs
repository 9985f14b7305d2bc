//! Voice chat floating widget — egui/eframe application.
//!
//! # Architecture
//!
//! [`VoiceChatApp`] is the top-level [`eframe::App`].  It owns no session
//! logic; each frame it reads the [`SessionSnapshot`] behind [`SharedState`]
//! and turns button clicks into [`SessionCommand`]s for the session task.
//!
//! ```text
//!  egui update loop ──SessionCommand──▶ VoiceSession::run (tokio)
//!        ▲                                     │
//!        └────────── SharedState (Mutex) ◀─────┘
//! ```
//!
//! # Widget States
//!
//! | Status | Primary button | Accent |
//! |--------|----------------|--------|
//! | `Disconnected` | "Start Voice Chat" | gray |
//! | `Connecting` | "Connecting…" (disabled) | blue |
//! | `Connected` | "Start Recording" | green |
//! | `Recording` | "Stop Recording" | red |

use std::time::Duration;

use eframe::egui;
use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::session::{
    lock_state, ConnectionState, SessionCommand, SessionSnapshot, SessionStatus, SharedState,
};

/// Command sent by the primary button for `status`.  `None` while the button
/// is disabled.
pub fn primary_command(status: SessionStatus) -> Option<SessionCommand> {
    match status.connection {
        ConnectionState::Disconnected => Some(SessionCommand::Start),
        ConnectionState::Connecting => None,
        ConnectionState::Connected => Some(SessionCommand::ToggleRecording),
    }
}

/// Window inner size for the current snapshot.
fn window_size(snapshot: &SessionSnapshot, show_settings: bool) -> egui::Vec2 {
    if show_settings {
        return egui::vec2(300.0, 130.0);
    }
    let mut height: f32 = match snapshot.status.connection {
        ConnectionState::Disconnected | ConnectionState::Connecting => 80.0,
        ConnectionState::Connected => 95.0,
    };
    if !snapshot.transcript.is_empty() {
        height += 60.0;
    }
    if snapshot.last_error.is_some() {
        height += 20.0;
    }
    egui::vec2(300.0, height)
}

/// Accent colour for the status icon and label.
fn status_color(status: SessionStatus) -> egui::Color32 {
    match (status.connection, status.is_recording()) {
        (ConnectionState::Disconnected, _) => egui::Color32::from_rgb(100, 100, 100),
        (ConnectionState::Connecting, _) => egui::Color32::from_rgb(68, 136, 255),
        (ConnectionState::Connected, false) => egui::Color32::from_rgb(80, 200, 120),
        (ConnectionState::Connected, true) => egui::Color32::from_rgb(255, 68, 68),
    }
}

// ---------------------------------------------------------------------------
// VoiceChatApp
// ---------------------------------------------------------------------------

pub struct VoiceChatApp {
    state: SharedState,
    commands: mpsc::Sender<SessionCommand>,
    config: AppConfig,

    /// Whether the settings panel is expanded.
    show_settings: bool,
    /// Spinner animation phase while connecting.
    spinner_phase: f32,
    /// Last observed outer window position, persisted on exit.
    position: Option<egui::Pos2>,
}

impl VoiceChatApp {
    /// * `state`    — snapshot written by the session task.
    /// * `commands` — sender end of the session command channel.
    /// * `config`   — loaded configuration, saved back on exit.
    pub fn new(
        state: SharedState,
        commands: mpsc::Sender<SessionCommand>,
        config: AppConfig,
    ) -> Self {
        Self {
            state,
            commands,
            config,
            show_settings: false,
            spinner_phase: 0.0,
            position: None,
        }
    }

    fn send(&self, command: SessionCommand) {
        if let Err(e) = self.commands.try_send(command) {
            log::warn!("ui: dropping {command:?}: {e}");
        }
    }

    fn spinner_char(&self) -> char {
        ['|', '/', '-', '\\'][(self.spinner_phase as usize) % 4]
    }

    // ── Custom title bar ─────────────────────────────────────────────────

    fn draw_title_bar(&mut self, ui: &mut egui::Ui, ctx: &egui::Context, status: SessionStatus) {
        ui.horizontal(|ui| {
            let icon = match (status.connection, status.is_recording()) {
                (ConnectionState::Disconnected, _) => "  ",
                (ConnectionState::Connecting, _) => ". ",
                (ConnectionState::Connected, false) => "o ",
                (ConnectionState::Connected, true) => "* ",
            };
            ui.label(egui::RichText::new(icon).color(status_color(status)));

            let title = ui.label(
                egui::RichText::new("Voice Chat")
                    .color(egui::Color32::from_rgb(200, 200, 200))
                    .size(13.0),
            );
            if title.is_pointer_button_down_on() {
                if let Some(outer_rect) = ctx.input(|i| i.viewport().outer_rect) {
                    let delta = ctx.input(|i| i.pointer.delta());
                    ctx.send_viewport_cmd(egui::ViewportCommand::OuterPosition(
                        outer_rect.min + delta,
                    ));
                }
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if title_button(ui, "x", egui::Color32::from_rgb(200, 100, 100)) {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
                if title_button(ui, "-", egui::Color32::from_rgb(150, 150, 150)) {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Minimized(true));
                }
                if title_button(ui, "=", egui::Color32::from_rgb(150, 150, 150)) {
                    self.show_settings = !self.show_settings;
                }
            });
        });
    }

    // ── Session panel ────────────────────────────────────────────────────

    fn draw_session(&self, ui: &mut egui::Ui, snapshot: &SessionSnapshot) {
        let status = snapshot.status;

        ui.add_space(4.0);
        ui.horizontal(|ui| {
            let primary = primary_command(status);
            let caption = if primary.is_none() {
                format!("{} {}", self.spinner_char(), status.button_label())
            } else {
                status.button_label().to_string()
            };
            let button = egui::Button::new(egui::RichText::new(caption).size(12.0));
            if ui.add_enabled(primary.is_some(), button).clicked() {
                if let Some(command) = primary {
                    self.send(command);
                }
            }

            if status.connection != ConnectionState::Disconnected
                && ui
                    .add(egui::Button::new(egui::RichText::new("Disconnect").size(12.0)))
                    .clicked()
            {
                self.send(SessionCommand::Stop);
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(
                    egui::RichText::new(status.label())
                        .color(status_color(status))
                        .size(11.0),
                );
            });
        });

        if let Some(err) = &snapshot.last_error {
            ui.add_space(2.0);
            ui.label(
                egui::RichText::new(err.as_str())
                    .color(egui::Color32::from_rgb(255, 136, 68))
                    .size(11.0),
            );
        }

        if !snapshot.transcript.is_empty() {
            ui.add_space(4.0);
            egui::ScrollArea::vertical()
                .max_height(56.0)
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    ui.label(
                        egui::RichText::new(snapshot.transcript.as_str())
                            .color(egui::Color32::from_rgb(200, 200, 200))
                            .size(12.0),
                    );
                });
        }
    }

    fn draw_settings(&self, ui: &mut egui::Ui) {
        let dim = egui::Color32::from_rgb(140, 140, 140);
        ui.add_space(4.0);
        for line in [
            format!("Model: {}", self.config.realtime.model),
            format!("Voice: {}", self.config.realtime.voice),
            format!("Sample rate: {} Hz", self.config.audio.sample_rate),
            format!(
                "Hotkey: {}",
                if self.config.hotkey.enabled {
                    self.config.hotkey.toggle_recording_key.as_str()
                } else {
                    "off"
                }
            ),
        ] {
            ui.label(egui::RichText::new(line).color(dim).size(11.0));
        }
    }
}

/// Frameless title-bar glyph button.
fn title_button(ui: &mut egui::Ui, glyph: &str, color: egui::Color32) -> bool {
    ui.add(egui::Button::new(egui::RichText::new(glyph).color(color).size(12.0)).frame(false))
        .clicked()
}

// ---------------------------------------------------------------------------
// eframe::App impl
// ---------------------------------------------------------------------------

impl eframe::App for VoiceChatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Copy out so the session task is never blocked on rendering.
        let snapshot = lock_state(&self.state).clone();

        if let Some(rect) = ctx.input(|i| i.viewport().outer_rect) {
            self.position = Some(rect.min);
        }

        self.spinner_phase = (self.spinner_phase + 0.08) % 4.0;

        // The session task changes state without waking egui.
        let repaint = match snapshot.status.connection {
            ConnectionState::Connecting => Duration::from_millis(66),
            ConnectionState::Connected => Duration::from_millis(100),
            ConnectionState::Disconnected => Duration::from_millis(250),
        };
        ctx.request_repaint_after(repaint);

        ctx.send_viewport_cmd(egui::ViewportCommand::InnerSize(window_size(
            &snapshot,
            self.show_settings,
        )));

        let frame = egui::Frame::new()
            .fill(egui::Color32::from_rgba_premultiplied(30, 30, 30, 220))
            .corner_radius(egui::CornerRadius::same(8))
            .inner_margin(egui::Margin::same(8));

        egui::CentralPanel::default().frame(frame).show(ctx, |ui| {
            self.draw_title_bar(ui, ctx, snapshot.status);
            ui.separator();
            if self.show_settings {
                self.draw_settings(ui);
            } else {
                self.draw_session(ui, &snapshot);
            }
        });
    }

    /// Persist the window position (best-effort).
    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        log::info!("voice chat widget closing");
        if let Some(pos) = self.position {
            self.config.ui.window_position = Some((pos.x, pos.y));
            if let Err(e) = self.config.save() {
                log::warn!("ui: could not save window position: {e:#}");
            }
        }
    }
}
