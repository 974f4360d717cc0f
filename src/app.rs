//! StoryWeaver window: egui/eframe application.
//!
//! # Architecture
//!
//! [`StoryWeaverApp`] owns two channel endpoints:
//!
//! * `command_tx` sends [`PracticeCommand`]s to the practice orchestrator.
//! * `event_rx` receives [`PracticeEvent`]s: busy markers, full session
//!   snapshots and synthesised speech.
//!
//! The window never mutates the session itself.  Each frame it drains the
//! event channel and renders the latest [`SessionView`].
//!
//! | Session stage | View |
//! |---------------|------|
//! | `Description` | picture, record button, transcript, error table |
//! | `StoryGenerated` | story, current line with focus words, Listen, record, feedback |
//! | complete | summary metrics, per-section table, "Start New Session" |

use std::time::{Duration, Instant};

use eframe::egui;
use tokio::sync::mpsc;

use crate::audio::Player;
use crate::config::AppConfig;
use crate::llm::ErrorRecord;
use crate::progress::ProgressEntry;
use crate::scoring::Feedback;
use crate::session::{
    Activity, NoticeLevel, PracticeCommand, PracticeEvent, Reading, SessionView, Stage,
};

const ACCENT: egui::Color32 = egui::Color32::from_rgb(33, 150, 243);
const GOOD: egui::Color32 = egui::Color32::from_rgb(76, 175, 80);
const WARN: egui::Color32 = egui::Color32::from_rgb(255, 152, 0);
const BAD: egui::Color32 = egui::Color32::from_rgb(229, 57, 53);
const HIGHLIGHT: egui::Color32 = egui::Color32::from_rgb(255, 235, 59);

// ---------------------------------------------------------------------------
// StoryWeaverApp
// ---------------------------------------------------------------------------

pub struct StoryWeaverApp {
    // ── Orchestrator state ───────────────────────────────────────────────
    /// Latest snapshot; `None` until the orchestrator publishes one.
    view: Option<SessionView>,
    /// Step the orchestrator is blocked on.
    busy: Option<Activity>,
    /// A command was sent and its snapshot has not arrived yet.
    pending: bool,

    // ── Local UI state ───────────────────────────────────────────────────
    recording_start: Option<Instant>,
    spinner_phase: f32,
    /// Playback problems are local to the window.
    playback_error: Option<String>,

    // ── Channels / output ────────────────────────────────────────────────
    command_tx: mpsc::Sender<PracticeCommand>,
    event_rx: mpsc::Receiver<PracticeEvent>,
    player: Option<Player>,

    config: AppConfig,
}

impl StoryWeaverApp {
    pub fn new(
        command_tx: mpsc::Sender<PracticeCommand>,
        event_rx: mpsc::Receiver<PracticeEvent>,
        player: Option<Player>,
        config: AppConfig,
    ) -> Self {
        Self {
            view: None,
            busy: None,
            pending: false,
            recording_start: None,
            spinner_phase: 0.0,
            playback_error: None,
            command_tx,
            event_rx,
            player,
            config,
        }
    }

    // ── Channel handling ─────────────────────────────────────────────────

    fn poll_events(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            match event {
                PracticeEvent::Busy(activity) => self.busy = Some(activity),
                PracticeEvent::Snapshot(view) => {
                    self.busy = None;
                    self.pending = false;
                    match (view.recording, self.recording_start) {
                        (true, None) => self.recording_start = Some(Instant::now()),
                        (false, Some(_)) => self.recording_start = None,
                        _ => {}
                    }
                    self.view = Some(*view);
                }
                PracticeEvent::Speech { section, audio } => self.play(section, audio),
            }
        }
    }

    fn play(&mut self, section: usize, audio: Vec<u8>) {
        self.playback_error = match &self.player {
            Some(player) => player.play(audio).err().map(|e| e.to_string()),
            None => Some("No speaker available to play the story.".into()),
        };
        log::debug!("ui: playing section {section}");
    }

    fn send(&mut self, command: PracticeCommand) {
        match self.command_tx.try_send(command) {
            Ok(()) => {
                self.pending = true;
                self.playback_error = None;
            }
            Err(e) => log::warn!("ui: could not send {command:?}: {e}"),
        }
    }

    fn is_idle(&self) -> bool {
        !self.pending && self.busy.is_none()
    }

    // ── Shared widgets ───────────────────────────────────────────────────

    fn draw_status(&self, ui: &mut egui::Ui) {
        if let Some(activity) = self.busy {
            ui.label(
                egui::RichText::new(format!("{} {}", self.spinner_char(), activity.label()))
                    .color(ACCENT)
                    .size(16.0),
            );
        }

        let Some(view) = &self.view else { return };
        for notice in &view.notices {
            let color = match notice.level {
                NoticeLevel::Info => GOOD,
                NoticeLevel::Warning => WARN,
                NoticeLevel::Error => BAD,
            };
            ui.label(egui::RichText::new(&notice.message).color(color).size(15.0));
        }
        if let Some(message) = &self.playback_error {
            ui.label(egui::RichText::new(message).color(WARN).size(15.0));
        }
    }

    /// Record / Stop toggle.  The orchestrator decides what the clip is for.
    fn draw_record_button(&mut self, ui: &mut egui::Ui, recording: bool, label: &str) {
        if recording {
            let elapsed = self
                .recording_start
                .map(|t| t.elapsed().as_secs_f32())
                .unwrap_or(0.0);
            ui.horizontal(|ui| {
                if ui
                    .add(egui::Button::new(egui::RichText::new("Stop").size(18.0)).fill(BAD))
                    .clicked()
                {
                    self.send(PracticeCommand::StopRecording);
                }
                if ui.button("Cancel").clicked() {
                    self.send(PracticeCommand::Cancel);
                }
                ui.label(egui::RichText::new(format!("Recording... {elapsed:.1}s")).color(BAD));
            });
        } else {
            let idle = self.is_idle();
            if ui
                .add_enabled(idle, egui::Button::new(egui::RichText::new(label).size(18.0)))
                .clicked()
            {
                self.send(PracticeCommand::StartRecording);
            }
        }
    }

    // ── Stage views ──────────────────────────────────────────────────────

    fn draw_description(&mut self, ui: &mut egui::Ui, view: &SessionView) {
        ui.heading("Look at the picture and tell me what you see!");
        ui.add_space(8.0);

        let Some(picture) = view.session.picture() else {
            ui.label(format!(
                "Please add images to the '{}' folder (dog.jpg, cat.jpg, dolphin.jpg, car.jpg, rainbow.jpg)",
                self.config.storage.picture_dir
            ));
            if ui.add_enabled(self.is_idle(), egui::Button::new("Look again")).clicked() {
                self.send(PracticeCommand::Reset);
            }
            return;
        };

        ui.add(
            egui::Image::new(format!("file://{}", picture.file.display()))
                .max_height(320.0)
                .maintain_aspect_ratio(true),
        );
        ui.label(egui::RichText::new(format!("Picture: {}", picture.title())).size(16.0));
        ui.add_space(8.0);

        self.draw_record_button(ui, view.recording, "Record your description");

        let transcript = view.session.transcript();
        if !transcript.is_empty() {
            ui.add_space(8.0);
            ui.label(egui::RichText::new(format!("You said: {transcript}")).italics());
        }
        if !view.session.errors().is_empty() {
            ui.add_space(8.0);
            ui.label(egui::RichText::new("Let's work on these:").strong());
            draw_error_table(ui, "description_errors", view.session.errors());
        }
    }

    fn draw_practice(&mut self, ui: &mut egui::Ui, view: &SessionView) {
        let session = &view.session;
        let title = session.picture().map(|p| p.title()).unwrap_or_default();
        ui.heading(format!("Story Time: {title}"));

        if !session.errors().is_empty() {
            egui::CollapsingHeader::new("Areas to Focus On")
                .default_open(false)
                .show(ui, |ui| {
                    ui.label("These are the areas we're working on in this story:");
                    draw_error_table(ui, "practice_errors", session.errors());
                });
        }

        ui.add_space(6.0);
        ui.label(egui::RichText::new("Your Practice Story:").strong());
        egui::Frame::new()
            .fill(egui::Color32::from_rgb(240, 248, 255))
            .stroke(egui::Stroke::new(2.0, GOOD))
            .corner_radius(egui::CornerRadius::same(10))
            .inner_margin(egui::Margin::same(14))
            .show(ui, |ui| {
                ui.label(
                    egui::RichText::new(session.sections().join("\n\n"))
                        .size(17.0)
                        .color(egui::Color32::from_rgb(51, 51, 51)),
                );
            });

        ui.add_space(10.0);
        ui.heading("Practice Each Line");

        let Some(current) = session.current_text() else {
            return;
        };
        let total = session.sections().len();
        ui.add(egui::ProgressBar::new(session.cursor() as f32 / total as f32));
        ui.label(format!("Section {} of {}", session.cursor() + 1, total));

        let focus = session.focus_words();
        egui::Frame::new()
            .fill(egui::Color32::from_rgb(227, 242, 253))
            .stroke(egui::Stroke::new(3.0, ACCENT))
            .corner_radius(egui::CornerRadius::same(10))
            .inner_margin(egui::Margin::same(18))
            .show(ui, |ui| {
                ui.label(highlighted_line(current, &focus));
            });
        if !focus.is_empty() {
            ui.label(
                egui::RichText::new(format!("Focus on: {}", focus.join(", ")))
                    .color(WARN)
                    .strong(),
            );
        }

        ui.add_space(6.0);
        ui.horizontal(|ui| {
            if ui
                .add_enabled(self.is_idle() && !view.recording, egui::Button::new("Listen"))
                .clicked()
            {
                self.send(PracticeCommand::Listen);
            }
            ui.label(egui::RichText::new("Now you read it!").strong());
        });

        ui.add_space(6.0);
        self.draw_record_button(ui, view.recording, "Record yourself reading this line");

        if let Some(reading) = view
            .last_reading
            .as_ref()
            .filter(|r| r.section == session.cursor())
        {
            self.draw_reading(ui, reading, view.recording);
        }
    }

    fn draw_reading(&mut self, ui: &mut egui::Ui, reading: &Reading, recording: bool) {
        ui.add_space(8.0);
        ui.label(egui::RichText::new(format!("You said: {}", reading.transcript)).italics());

        let color = match reading.feedback {
            Feedback::Excellent => GOOD,
            Feedback::GoodTry => WARN,
            Feedback::KeepPracticing => BAD,
        };
        ui.label(
            egui::RichText::new(format!(
                "{} Accuracy: {:.1}%",
                reading.feedback.headline(),
                reading.accuracy
            ))
            .color(color)
            .size(18.0),
        );

        let enabled = self.is_idle() && !recording;
        ui.horizontal(|ui| {
            if reading.feedback.offers_retry()
                && ui.add_enabled(enabled, egui::Button::new("Try Again")).clicked()
            {
                self.send(PracticeCommand::StartRecording);
            }
            if reading.feedback.offers_advance()
                && ui.add_enabled(enabled, egui::Button::new("Next Line")).clicked()
            {
                self.send(PracticeCommand::Advance);
            }
        });
    }

    fn draw_complete(&mut self, ui: &mut egui::Ui, view: &SessionView) {
        ui.heading(egui::RichText::new("Congratulations! You completed the story!").color(GOOD));
        let Some(summary) = view.session.summary() else {
            return;
        };

        ui.add_space(8.0);
        ui.label(egui::RichText::new("Session Summary").strong().size(18.0));
        ui.horizontal(|ui| {
            metric(ui, "Sections", summary.sections.to_string());
            metric(ui, "Total Attempts", summary.total_attempts.to_string());
            metric(ui, "Average Accuracy", format!("{:.1}%", summary.average_accuracy));
            metric(ui, "Initial Errors", summary.initial_errors.to_string());
        });

        if !summary.per_section.is_empty() {
            ui.add_space(8.0);
            ui.label(egui::RichText::new("Detailed Progress").strong().size(18.0));
            egui::Grid::new("section_breakdown")
                .striped(true)
                .num_columns(3)
                .show(ui, |ui| {
                    ui.strong("Section");
                    ui.strong("Attempts");
                    ui.strong("Best Accuracy");
                    ui.end_row();
                    for stats in &summary.per_section {
                        ui.label(stats.number.to_string());
                        ui.label(stats.attempts.to_string());
                        ui.label(format!("{:.1}%", stats.best_accuracy));
                        ui.end_row();
                    }
                });
        }

        ui.add_space(12.0);
        if ui
            .add_enabled(
                self.is_idle(),
                egui::Button::new(egui::RichText::new("Start New Session").size(18.0)),
            )
            .clicked()
        {
            self.send(PracticeCommand::Reset);
        }
    }

    fn draw_progress_panel(&self, ui: &mut egui::Ui) {
        ui.heading("Your Progress");
        let Some(view) = &self.view else { return };
        let overview = &view.overview;

        if overview.total_sessions == 0 {
            ui.label("No sessions yet. Complete your first story!");
            return;
        }
        metric(ui, "Total Sessions", overview.total_sessions.to_string());
        metric(ui, "Average Accuracy", format!("{:.1}%", overview.average_accuracy));

        ui.separator();
        ui.label(egui::RichText::new("Recent Sessions").strong());
        egui::ScrollArea::vertical().show(ui, |ui| {
            for (i, entry) in overview.recent.iter().enumerate() {
                draw_recent_entry(ui, i, entry);
            }
        });
    }

    // ── Helpers ──────────────────────────────────────────────────────────

    fn spinner_char(&self) -> char {
        let chars = ['|', '/', '-', '\\'];
        chars[(self.spinner_phase as usize) % chars.len()]
    }
}

// ---------------------------------------------------------------------------
// Free-standing widgets
// ---------------------------------------------------------------------------

fn metric(ui: &mut egui::Ui, label: &str, value: String) {
    ui.vertical(|ui| {
        ui.label(egui::RichText::new(label).size(12.0).weak());
        ui.label(egui::RichText::new(value).size(20.0).strong());
    });
    ui.add_space(12.0);
}

fn draw_error_table(ui: &mut egui::Ui, id: &str, errors: &[ErrorRecord]) {
    egui::Grid::new(id)
        .striped(true)
        .num_columns(4)
        .show(ui, |ui| {
            ui.strong("Type");
            ui.strong("You Said");
            ui.strong("Better Way");
            ui.strong("Why");
            ui.end_row();
            for error in errors {
                ui.label(error.kind.as_str());
                ui.label(error.incorrect.as_str());
                ui.label(egui::RichText::new(error.correction.as_str()).color(GOOD));
                ui.label(error.explanation.as_str());
                ui.end_row();
            }
        });
}

fn draw_recent_entry(ui: &mut egui::Ui, index: usize, entry: &ProgressEntry) {
    egui::CollapsingHeader::new(format!("{} - {}", entry.date, entry.subject))
        .id_salt(("recent_session", index))
        .show(ui, |ui| {
            ui.label(format!("Subject: {}", entry.subject));
            ui.label(format!("Initial Errors: {}", entry.initial_errors));
            ui.label(format!("Sections Completed: {}", entry.sections_completed));
            ui.label(format!("Average Accuracy: {:.1}%", entry.average_accuracy));
            if !entry.errors_detail.is_empty() {
                draw_error_table(ui, &format!("recent_errors_{index}"), &entry.errors_detail);
            }
        });
}

/// Split `text` into runs, marking case-insensitive matches of any `words`.
fn highlight_runs(text: &str, words: &[String]) -> Vec<(String, bool)> {
    let lower = text.to_ascii_lowercase();
    let mut marked = vec![false; text.len()];
    for word in words.iter().filter(|w| !w.is_empty()) {
        let needle = word.to_ascii_lowercase();
        let mut from = 0;
        while let Some(pos) = lower[from..].find(&needle) {
            let start = from + pos;
            marked[start..start + needle.len()].fill(true);
            from = start + needle.len();
        }
    }

    let mut runs: Vec<(String, bool)> = Vec::new();
    for (i, ch) in text.char_indices() {
        let hit = marked[i];
        match runs.last_mut() {
            Some((run, flag)) if *flag == hit => run.push(ch),
            _ => runs.push((ch.to_string(), hit)),
        }
    }
    runs
}

fn highlighted_line(text: &str, words: &[String]) -> egui::text::LayoutJob {
    let mut job = egui::text::LayoutJob::default();
    for (run, hit) in highlight_runs(text, words) {
        let format = egui::TextFormat {
            font_id: egui::FontId::proportional(24.0),
            color: egui::Color32::from_rgb(21, 101, 192),
            background: if hit { HIGHLIGHT } else { egui::Color32::TRANSPARENT },
            ..Default::default()
        };
        job.append(&run, 0.0, format);
    }
    job
}

// ---------------------------------------------------------------------------
// eframe::App impl
// ---------------------------------------------------------------------------

impl eframe::App for StoryWeaverApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_events();

        self.spinner_phase += 0.08;
        if self.spinner_phase >= 4.0 {
            self.spinner_phase = 0.0;
        }

        // Events arrive from another thread; keep polling, faster while
        // something is in flight.
        let active = !self.is_idle() || self.recording_start.is_some();
        ctx.request_repaint_after(Duration::from_millis(if active { 66 } else { 250 }));

        egui::SidePanel::right("progress_panel")
            .resizable(true)
            .default_width(260.0)
            .show(ctx, |ui| self.draw_progress_panel(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(egui::RichText::new("StoryWeaver").size(26.0).strong());
                ui.label(egui::RichText::new("Speech Practice for Kids").size(14.0).weak());
            });
            ui.separator();
            self.draw_status(ui);

            // Clone the snapshot so the stage views can take `&mut self`.
            let Some(view) = self.view.clone() else {
                ui.label("Getting ready...");
                return;
            };

            egui::ScrollArea::vertical().show(ui, |ui| {
                if view.session.is_complete() {
                    self.draw_complete(ui, &view);
                } else {
                    match view.session.stage() {
                        Stage::Description => self.draw_description(ui, &view),
                        Stage::StoryGenerated => self.draw_practice(ui, &view),
                    }
                }
            });
        });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        log::info!("StoryWeaver window closing");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
