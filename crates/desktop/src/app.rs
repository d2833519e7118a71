//! Analyst Desktop — egui app state and UI.
//!
//! The app owns one [`SessionState`]. Widgets turn clicks and dropped files into
//! intents; upload and chat effects run on worker threads and report back through
//! mpsc receivers polled each frame.

use analyst::api::{AnalystClient, ApiError, Backend, ChatReply, RawFile, UploadResponse};
use analyst::chat::{ChatMessage, ChatRole, TurnId};
use analyst::config::Config;
use analyst::debug_log::{DebugPanelContent, PLACEHOLDER_TEXT};
use analyst::files::StatsTrust;
use analyst::render::{self, Segment};
use analyst::session::{Effect, Intent, SessionState};
use analyst::upload::{StatusTone, UploadError};
use eframe::egui;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

const LOG_BUFFER_MAX_LINES: usize = 2000;
const SIDE_PANEL_WIDTH: f32 = 320.0;

/// Ring buffer of log lines for the Logs screen. Written by DesktopLogger.
static LOG_LINES: OnceLock<Mutex<VecDeque<String>>> = OnceLock::new();

fn log_buffer() -> &'static Mutex<VecDeque<String>> {
    LOG_LINES.get_or_init(|| Mutex::new(VecDeque::new()))
}

fn push_log_line(line: String) {
    if let Ok(mut buf) = log_buffer().lock() {
        buf.push_back(line);
        while buf.len() > LOG_BUFFER_MAX_LINES {
            buf.pop_front();
        }
    }
}

/// Logger that appends to LOG_LINES for display in the Logs screen.
struct DesktopLogger;

impl log::Log for DesktopLogger {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let line = format!(
            "{} [{}] {}",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            record.level(),
            record.args()
        );
        push_log_line(line);
    }

    fn flush(&self) {}
}

static LOGGER: DesktopLogger = DesktopLogger;

#[derive(Clone, Copy, PartialEq, Eq, Default)]
enum Screen {
    #[default]
    Session,
    Logs,
}

fn tone_color(tone: StatusTone) -> egui::Color32 {
    match tone {
        StatusTone::Neutral => egui::Color32::GRAY,
        StatusTone::Progress | StatusTone::Success => egui::Color32::from_rgb(0x4a, 0xde, 0x80),
        StatusTone::Error => egui::Color32::RED,
        StatusTone::Warning => egui::Color32::from_rgb(0xfb, 0xbf, 0x24),
        StatusTone::Info => egui::Color32::from_rgb(0x60, 0xa5, 0xfa),
    }
}

/// Run one backend call on a throwaway current-thread runtime. Called from worker threads.
fn block_on<T>(fut: impl std::future::Future<Output = Result<T, ApiError>>) -> Result<T, ApiError> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| ApiError::Decode(format!("runtime: {}", e)))?;
    rt.block_on(fut)
}

pub struct AnalystApp {
    /// Session state (files, stats, transcript, debug panel).
    state: SessionState,
    /// Backend client; None when it could not be built from config.
    client: Option<AnalystClient>,
    /// Error from loading config or building the client.
    setup_error: Option<String>,
    /// When Some, an upload is in flight; we read the result here.
    upload_receiver: Option<mpsc::Receiver<Result<UploadResponse, ApiError>>>,
    /// When Some, a chat turn is in flight; we read its result here.
    chat_receiver: Option<(TurnId, mpsc::Receiver<Result<ChatReply, ApiError>>)>,
    /// Current input text for the chat box.
    chat_input: String,
    /// PDF password sent with every upload.
    password: String,
    /// Path typed into the "add file" box.
    path_input: String,
    /// Files picked but not yet uploaded.
    staged: Vec<RawFile>,
    /// Error reading a picked/dropped file from disk.
    pick_error: Option<String>,
    current_screen: Screen,
}

impl AnalystApp {
    /// Space between the main screen title and the content below.
    const SCREEN_TITLE_BOTTOM_SPACING: f32 = 18.0;

    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let _ = LOG_LINES.get_or_init(|| Mutex::new(VecDeque::new()));
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(log::LevelFilter::Debug);
        log::info!("desktop started");

        match analyst::config::load_config(None) {
            Ok((config, _)) => Self::from_config(config, None),
            Err(e) => Self::from_config(
                Config::default(),
                Some(format!("failed to load config: {}", e)),
            ),
        }
    }

    fn from_config(config: Config, setup_error: Option<String>) -> Self {
        let (client, setup_error) = match AnalystClient::from_config(&config) {
            Ok(c) => {
                log::info!("using backend {}", c.base_url());
                (Some(c), setup_error)
            }
            Err(e) => (None, Some(format!("failed to create http client: {}", e))),
        };
        Self {
            state: SessionState::new(config.chat.quick_actions.clone()),
            client,
            setup_error,
            upload_receiver: None,
            chat_receiver: None,
            chat_input: String::new(),
            password: String::new(),
            path_input: String::new(),
            staged: Vec::new(),
            pick_error: None,
            current_screen: Screen::default(),
        }
    }

    /// Apply an intent and start whatever effect it produced.
    fn dispatch(&mut self, ctx: &egui::Context, intent: Intent) {
        let Some(effect) = self.state.apply(intent) else {
            return;
        };
        match effect {
            Effect::Upload { files, password } => {
                let Some(client) = self.client.clone() else {
                    self.state
                        .upload_finished(Err(ApiError::Decode("no backend client".to_string())));
                    return;
                };
                let (tx, rx) = mpsc::channel();
                let ctx = ctx.clone();
                std::thread::spawn(move || {
                    let result = block_on(client.upload(&files, password.as_deref()));
                    let _ = tx.send(result);
                    ctx.request_repaint();
                });
                self.upload_receiver = Some(rx);
            }
            Effect::Chat { turn, message } => {
                let Some(client) = self.client.clone() else {
                    self.state
                        .chat_finished(turn, Err(ApiError::Decode("no backend client".to_string())));
                    return;
                };
                let (tx, rx) = mpsc::channel();
                let ctx = ctx.clone();
                std::thread::spawn(move || {
                    let result = block_on(client.chat(&message));
                    let _ = tx.send(result);
                    ctx.request_repaint();
                });
                self.chat_receiver = Some((turn, rx));
            }
            Effect::CopyToClipboard(text) => {
                ctx.output_mut(|o| o.copied_text = text);
                log::debug!("copied message to clipboard");
            }
        }
    }

    /// Poll in-flight upload/chat results. Call each frame.
    fn poll_results(&mut self) {
        if let Some(rx) = &self.upload_receiver {
            match rx.try_recv() {
                Ok(result) => {
                    self.upload_receiver = None;
                    self.state.upload_finished(result);
                }
                Err(mpsc::TryRecvError::Empty) => {}
                Err(mpsc::TryRecvError::Disconnected) => {
                    self.upload_receiver = None;
                    self.state
                        .upload_finished(Err(ApiError::Decode("upload worker exited".to_string())));
                }
            }
        }
        if let Some((turn, rx)) = &self.chat_receiver {
            let turn = *turn;
            match rx.try_recv() {
                Ok(result) => {
                    self.chat_receiver = None;
                    self.state.chat_finished(turn, result);
                }
                Err(mpsc::TryRecvError::Empty) => {}
                Err(mpsc::TryRecvError::Disconnected) => {
                    log::error!("chat worker exited without a result");
                    self.chat_receiver = None;
                    self.state
                        .chat_finished(turn, Err(ApiError::Decode("chat worker exited".to_string())));
                }
            }
        }
    }

    /// Collect files dropped onto the window into the staged list.
    fn collect_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        if dropped.is_empty() {
            return;
        }
        let mut files = Vec::new();
        for f in dropped {
            let bytes = match (&f.bytes, &f.path) {
                (Some(b), _) => b.to_vec(),
                (None, Some(p)) => match std::fs::read(p) {
                    Ok(b) => b,
                    Err(e) => {
                        self.pick_error = Some(format!("cannot read {}: {}", p.display(), e));
                        return;
                    }
                },
                (None, None) => continue,
            };
            let name = f
                .path
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| f.name.clone());
            files.push(RawFile::new(name, bytes));
        }
        self.accept_dropped(ctx, files);
    }

    /// Upload dropped files, or stage them while another upload is running.
    fn accept_dropped(&mut self, ctx: &egui::Context, files: Vec<RawFile>) {
        if files.is_empty() {
            return;
        }
        if self.state.upload.is_busy() {
            log::warn!("{} dropped file(s) staged: upload in progress", files.len());
            self.staged.extend(files);
            self.pick_error = Some(format!(
                "{}; dropped files were staged for the next upload.",
                UploadError::Busy
            ));
            return;
        }
        self.upload_files(ctx, files);
    }

    /// Stage the file at the typed path.
    fn add_typed_path(&mut self) {
        let path = PathBuf::from(self.path_input.trim());
        if path.as_os_str().is_empty() {
            return;
        }
        match std::fs::read(&path) {
            Ok(bytes) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.display().to_string());
                self.staged.push(RawFile::new(name, bytes));
                self.path_input.clear();
                self.pick_error = None;
            }
            Err(e) => self.pick_error = Some(format!("cannot read {}: {}", path.display(), e)),
        }
    }

    fn upload_files(&mut self, ctx: &egui::Context, files: Vec<RawFile>) {
        if files.is_empty() {
            return;
        }
        self.pick_error = None;
        let password = Some(self.password.clone()).filter(|p| !p.is_empty());
        self.dispatch(ctx, Intent::Upload { files, password });
    }

    fn ui_upload_panel(&mut self, ui: &mut egui::Ui) {
        ui.label(egui::RichText::new("Statements").strong());
        ui.label("Drop .csv or .pdf files on the window, or add them by path.");
        ui.add_space(6.0);

        ui.horizontal(|ui| {
            let r = ui.add(
                egui::TextEdit::singleline(&mut self.path_input)
                    .hint_text("/path/to/statement.csv")
                    .desired_width(ui.available_width() - 50.0),
            );
            let enter = r.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if ui.button("Add").clicked() || enter {
                self.add_typed_path();
            }
        });
        ui.horizontal(|ui| {
            ui.label("PDF password");
            ui.add(egui::TextEdit::singleline(&mut self.password).password(true));
        });

        if !self.staged.is_empty() {
            ui.add_space(4.0);
            let mut unstage = None;
            for (i, f) in self.staged.iter().enumerate() {
                ui.horizontal(|ui| {
                    ui.label(&f.name);
                    if ui.small_button("✖").clicked() {
                        unstage = Some(i);
                    }
                });
            }
            if let Some(i) = unstage {
                self.staged.remove(i);
            }
            let uploading = self.state.upload.is_busy();
            if ui
                .add_enabled(!uploading, egui::Button::new(format!("Upload {} file(s)", self.staged.len())))
                .clicked()
            {
                let files = std::mem::take(&mut self.staged);
                self.upload_files(ui.ctx(), files);
            }
        }

        if let Some(ref e) = self.pick_error {
            ui.colored_label(egui::Color32::RED, e);
        }

        let status = self.state.upload.status();
        let text = status.text();
        if !text.is_empty() {
            ui.add_space(6.0);
            ui.horizontal(|ui| {
                if self.state.upload.is_busy() {
                    ui.spinner();
                }
                ui.colored_label(tone_color(status.tone()), text);
            });
        }

        ui.add_space(12.0);
        let mut remove = None;
        for (i, f) in self.state.upload.files().iter().enumerate() {
            egui::Frame::group(ui.style()).show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.label(f.kind.icon());
                    ui.vertical(|ui| {
                        ui.label(egui::RichText::new(&f.name).strong());
                        ui.small(f.share_label());
                    });
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.small_button("🗑").on_hover_text("Remove locally").clicked() {
                            remove = Some(i);
                        }
                    });
                });
            });
        }
        if let Some(i) = remove {
            self.state.apply(Intent::RemoveFile(i));
        }

        if let Some(stats) = self.state.upload.stats() {
            ui.add_space(12.0);
            ui.label(egui::RichText::new("Stats").strong());
            egui::Grid::new("stats_grid").num_columns(2).show(ui, |ui| {
                ui.label(egui::RichText::new(stats.total_rows.to_string()).heading());
                ui.label(egui::RichText::new(stats.file_count.to_string()).heading());
                ui.end_row();
                ui.label("Transactions");
                ui.label("Files");
                ui.end_row();
            });
            if stats.trust == StatsTrust::Stale {
                ui.small("Counts reflect the last upload; re-upload to refresh.");
            }
        }
    }

    /// Renders a single chat message (frame, role-based fill, body with images as links).
    /// Returns true when its copy button was clicked.
    fn render_chat_message(ui: &mut egui::Ui, m: &ChatMessage) -> bool {
        let mut copy = false;
        let fill = match m.role {
            ChatRole::User => ui.style().visuals.extreme_bg_color,
            ChatRole::Ai => ui.style().visuals.panel_fill,
            ChatRole::System => ui.style().visuals.faint_bg_color,
        };
        let frame = egui::Frame::none()
            .fill(fill)
            .stroke(egui::Stroke::new(
                1.0,
                ui.style().visuals.widgets.noninteractive.bg_stroke.color,
            ))
            .rounding(egui::Rounding::same(8.0))
            .inner_margin(egui::Margin::same(8.0));

        frame.show(ui, |ui| {
            if m.is_pending {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Analyzing…");
                });
                return;
            }
            for seg in render::segments(&m.text) {
                match seg {
                    Segment::Text(t) if m.role == ChatRole::User => {
                        ui.label(egui::RichText::new(t.trim()).strong());
                    }
                    Segment::Text(t) if m.role == ChatRole::System => {
                        ui.colored_label(egui::Color32::from_rgb(0xf8, 0x71, 0x71), t.trim());
                    }
                    Segment::Text(t) => {
                        ui.label(t.trim());
                    }
                    Segment::Image { alt, url } => {
                        let label = if alt.is_empty() { "image".to_string() } else { alt };
                        ui.hyperlink_to(format!("🖼 {}", label), url);
                    }
                }
            }
            if m.role == ChatRole::Ai {
                ui.add_space(4.0);
                copy = ui.small_button("📋 Copy").clicked();
            }
        });
        if let Some(ts) = &m.timestamp {
            ui.small(ts);
        }
        copy
    }

    fn ui_chat(&mut self, ui: &mut egui::Ui) {
        let can_chat = self.state.can_chat();

        egui::TopBottomPanel::bottom("chat_input")
            .resizable(false)
            .show_inside(ui, |ui| {
                ui.add_space(6.0);
                ui.horizontal_wrapped(|ui| {
                    let mut picked = None;
                    for (i, qa) in self.state.quick_actions().iter().enumerate() {
                        if ui
                            .add_enabled(can_chat, egui::Button::new(&qa.label))
                            .on_hover_text(&qa.query)
                            .clicked()
                        {
                            picked = Some(i);
                        }
                    }
                    if let Some(i) = picked {
                        self.dispatch(ui.ctx(), Intent::QuickAction(i));
                    }
                });
                ui.add_space(6.0);
                ui.horizontal(|ui| {
                    let send_width = 60.0;
                    let response = ui.add_enabled(
                        can_chat,
                        egui::TextEdit::singleline(&mut self.chat_input)
                            .hint_text(if can_chat {
                                "Ask about your transactions…"
                            } else {
                                "Upload statements to start chatting"
                            })
                            .desired_width(ui.available_width() - send_width),
                    );
                    let enter = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                    let clicked = ui.add_enabled(can_chat, egui::Button::new("Send")).clicked();
                    if (enter || clicked) && can_chat {
                        let text = std::mem::take(&mut self.chat_input);
                        self.dispatch(ui.ctx(), Intent::Send(text));
                    }
                    if self.state.chat.take_focus_request() {
                        response.request_focus();
                    }
                });
                ui.add_space(6.0);
            });

        if self.state.debug.is_visible() {
            egui::SidePanel::right("debug_panel")
                .resizable(true)
                .default_width(320.0)
                .show_inside(ui, |ui| self.ui_debug_panel(ui));
        }

        let mut copy_index = None;
        egui::ScrollArea::vertical()
            .stick_to_bottom(true)
            .auto_shrink([false, false])
            .show(ui, |ui| {
                for (i, m) in self.state.chat.messages().iter().enumerate() {
                    if Self::render_chat_message(ui, m) {
                        copy_index = Some(i);
                    }
                    ui.add_space(8.0);
                }
                if self.state.chat.messages().is_empty() {
                    ui.label("Upload a statement to begin.");
                }
            });
        if let Some(i) = copy_index {
            self.dispatch(ui.ctx(), Intent::Copy(i));
        }
    }

    fn ui_debug_panel(&mut self, ui: &mut egui::Ui) {
        ui.label(egui::RichText::new("Agent trace").strong());
        ui.separator();
        let scroll = self.state.debug.take_scroll_request();
        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                match self.state.debug.content() {
                    DebugPanelContent::Placeholder => {
                        ui.label(PLACEHOLDER_TEXT);
                    }
                    DebugPanelContent::Entries(entries) => {
                        for e in entries {
                            ui.label(egui::RichText::new(&e.header).small().strong());
                            ui.label(&e.body);
                            if let Some(d) = &e.details {
                                ui.label(egui::RichText::new(d).family(egui::FontFamily::Monospace).small());
                            }
                            ui.add_space(6.0);
                        }
                    }
                }
                if scroll {
                    ui.scroll_to_cursor(Some(egui::Align::BOTTOM));
                }
            });
    }

    fn ui_logs_screen(&self, ui: &mut egui::Ui) {
        ui.add_space(24.0);
        ui.heading("Logs");
        ui.add_space(Self::SCREEN_TITLE_BOTTOM_SPACING);
        let lines: Vec<String> = log_buffer()
            .lock()
            .map(|b| b.iter().cloned().collect())
            .unwrap_or_default();
        egui::ScrollArea::vertical()
            .stick_to_bottom(true)
            .auto_shrink([false, false])
            .show(ui, |ui| {
                for line in &lines {
                    ui.label(egui::RichText::new(line.as_str()).family(egui::FontFamily::Monospace));
                }
                if lines.is_empty() {
                    ui.label("No log output yet.");
                }
            });
    }
}

impl eframe::App for AnalystApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_results();
        self.collect_dropped_files(ctx);
        if self.upload_receiver.is_some() || self.chat_receiver.is_some() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }

        egui::SidePanel::left("nav")
            .exact_width(SIDE_PANEL_WIDTH)
            .show(ctx, |ui| {
                ui.add_space(24.0);
                ui.heading("💳 Analyst");
                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    ui.selectable_value(&mut self.current_screen, Screen::Session, "Session");
                    ui.selectable_value(&mut self.current_screen, Screen::Logs, "Logs");
                });
                if let Some(ref e) = self.setup_error {
                    ui.colored_label(egui::Color32::RED, e);
                }
                ui.separator();
                egui::ScrollArea::vertical().show(ui, |ui| self.ui_upload_panel(ui));
            });

        egui::CentralPanel::default().show(ctx, |ui| match self.current_screen {
            Screen::Session => {
                ui.horizontal(|ui| {
                    ui.heading("Chat");
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        let label = if self.state.debug.is_visible() {
                            "Hide trace"
                        } else {
                            "🐞 Show trace"
                        };
                        if ui.button(label).clicked() {
                            self.state.apply(Intent::ToggleDebug);
                        }
                    });
                });
                ui.add_space(8.0);
                self.ui_chat(ui);
            }
            Screen::Logs => self.ui_logs_screen(ui),
        });
    }
}
