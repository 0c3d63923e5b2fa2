//! The hiho session browser.
//!
//! ```text
//! ┌ Sessions ──┐┌ Conversation │ Tmux Window • hiho-1-0 ──┐
//! │> hiho-1-0  ││ ...                                       │
//! │  hiho-1-1  ││                                           │
//! └────────────┘└───────────────────────────────────────────┘
//! ┌ > /new <cmd> or type a note ────────────────────────────┐
//! │ help line                                               │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Sidebar takes a third of the width; the input panel takes the bottom four
//! rows.

mod commands;
pub mod widgets;

#[cfg(test)]
mod testing;

use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::core::{Cmd, Event, KeyEvent, Model, MouseEvent, MouseKind};
use crate::tmux::{self, Session, SessionManager};
use crate::ui::{join_columns, join_vertical, truncate_with_ellipsis, Border, Color, Style};

use widgets::{TextInput, Viewport};

pub use commands::COMMAND_HELP;

/// Rows reserved for the input panel.
const INPUT_PANEL_HEIGHT: usize = 4;

const ACCENT: Color = Color::Indexed(62);

/// Errors reported to the user as `error` messages.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("no hiho sessions available")]
    NoSessions,

    #[error(transparent)]
    Session(#[from] tmux::Error),
}

type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Conversation,
    Tmux,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Sidebar,
    Main,
    Input,
}

/// One entry of the conversation log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: String,
    pub content: String,
}

pub struct App<S> {
    manager: S,
    config: Config,
    messages: Vec<Message>,
    current_session: String,
    session_log: String,
    active_tab: Tab,
    focus: Focus,
    input: TextInput,
    viewport: Viewport,
    width: usize,
    height: usize,
    /// Managed sessions, as last listed
    sessions: Vec<Session>,
    /// Sidebar selection
    session_index: usize,
}

impl<S: SessionManager> App<S> {
    pub fn new(manager: S, config: Config) -> Self {
        let mut input = TextInput::new("> ", "/new <cmd> or type a note");
        input.focus();
        Self {
            manager,
            config,
            messages: Vec::new(),
            current_session: String::new(),
            session_log: String::new(),
            active_tab: Tab::Conversation,
            focus: Focus::Input,
            input,
            viewport: Viewport::new(0, 0),
            width: 0,
            height: 0,
            sessions: Vec::new(),
            session_index: 0,
        }
    }

    pub fn manager(&self) -> &S {
        &self.manager
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn current_session(&self) -> &str {
        &self.current_session
    }

    pub fn active_tab(&self) -> Tab {
        self.active_tab
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    fn sidebar_width(&self) -> usize {
        self.width / 3
    }

    fn main_width(&self) -> usize {
        self.width - self.sidebar_width()
    }

    fn body_height(&self) -> usize {
        self.height.saturating_sub(INPUT_PANEL_HEIGHT)
    }

    fn set_focus(&mut self, focus: Focus) {
        self.focus = focus;
        if focus == Focus::Input {
            self.input.focus();
        } else {
            self.input.blur();
        }
    }

    fn cycle_focus(&mut self) {
        let next = match self.focus {
            Focus::Sidebar => Focus::Main,
            Focus::Main => Focus::Input,
            Focus::Input => Focus::Sidebar,
        };
        self.set_focus(next);
    }

    fn toggle_tab(&mut self) {
        self.active_tab = match self.active_tab {
            Tab::Conversation => Tab::Tmux,
            Tab::Tmux => Tab::Conversation,
        };
        self.refresh_viewport();
    }

    fn report<T>(&mut self, result: AppResult<T>) {
        if let Err(e) = result {
            self.append_message("error", &e.to_string());
        }
    }

    fn handle_key(&mut self, key: &KeyEvent) -> Option<Cmd> {
        let key = key.as_str();
        let bindings = self.config.keybindings.clone();

        if key == bindings.quit {
            return Some(Cmd::quit());
        }
        if key == bindings.toggle_tab {
            self.toggle_tab();
            return None;
        }
        if key == bindings.next_session {
            let result = self.navigate_session(1);
            self.report(result);
            return None;
        }
        if key == bindings.prev_session {
            let result = self.navigate_session(-1);
            self.report(result);
            return None;
        }
        if key == bindings.cycle_windows {
            self.cycle_focus();
            return None;
        }
        if key == bindings.focus_sidebar {
            self.set_focus(Focus::Sidebar);
            return None;
        }
        if key == bindings.focus_main {
            self.set_focus(Focus::Main);
            return None;
        }

        match self.focus {
            Focus::Sidebar => {
                if key == bindings.session_up || key == "up" || key == "k" {
                    self.select_previous_session();
                    return None;
                }
                if key == bindings.session_down || key == "down" || key == "j" {
                    self.select_next_session();
                    return None;
                }
                if key == "enter" {
                    self.activate_selected_session();
                    return None;
                }
            }
            Focus::Input => {
                if key == "enter" {
                    let value = self.input.value().trim().to_string();
                    if !value.is_empty() {
                        let result = self.handle_submit(&value);
                        self.report(result);
                        self.input.reset();
                        self.refresh_viewport();
                    }
                } else {
                    self.input.handle_key(key);
                }
                return None;
            }
            Focus::Main => {}
        }

        // Older alt+hjkl session navigation
        let delta = match key {
            "alt+h" | "alt+j" => -1,
            "alt+l" | "alt+k" => 1,
            _ => return None,
        };
        let result = self.navigate_session(delta);
        self.report(result);
        None
    }

    fn handle_mouse(&mut self, mouse: &MouseEvent) {
        if mouse.kind != MouseKind::Left {
            return;
        }
        let (x, y) = (mouse.x as usize, mouse.y as usize);
        let sidebar_width = self.sidebar_width();
        let body_height = self.body_height();

        if x < sidebar_width && y > 0 && y < body_height {
            // Title is on row 1 inside the border; sessions start at row 2
            if let Some(index) = y.checked_sub(2).filter(|i| *i < self.sessions.len()) {
                self.session_index = index;
                self.activate_selected_session();
                self.set_focus(Focus::Sidebar);
            }
            return;
        }

        if x >= sidebar_width && y == 1 {
            // Left half of the tab bar is Conversation
            self.active_tab = if x - sidebar_width < self.main_width() / 2 {
                Tab::Conversation
            } else {
                Tab::Tmux
            };
            self.refresh_viewport();
            return;
        }

        if y >= body_height {
            self.set_focus(Focus::Input);
            return;
        }

        if x >= sidebar_width && y > 1 {
            self.set_focus(Focus::Main);
        }
    }

    fn handle_resize(&mut self, width: u16, height: u16) {
        self.width = width as usize;
        self.height = height as usize;
        self.viewport.width = self.main_width().saturating_sub(2);
        self.viewport.height = self.body_height().saturating_sub(4);
        self.refresh_sessions();
        self.refresh_viewport();
    }

    fn refresh_sessions(&mut self) {
        match self.manager.list_managed() {
            Ok(sessions) => self.sessions = sessions,
            Err(e) => debug!("Failed to list sessions: {}", e),
        }
    }

    fn select_previous_session(&mut self) {
        if self.sessions.is_empty() {
            self.refresh_sessions();
        }
        if !self.sessions.is_empty() && self.session_index > 0 {
            self.session_index -= 1;
        }
    }

    fn select_next_session(&mut self) {
        if self.sessions.is_empty() {
            self.refresh_sessions();
        }
        if self.session_index + 1 < self.sessions.len() {
            self.session_index += 1;
        }
    }

    fn activate_selected_session(&mut self) {
        if self.sessions.is_empty() {
            self.refresh_sessions();
        }
        if let Some(session) = self.sessions.get(self.session_index) {
            self.current_session = session.name.clone();
            let result = self.capture_current_session();
            self.report(result);
            self.active_tab = Tab::Tmux;
            self.refresh_viewport();
        }
    }

    /// Move the current session `delta` steps through the managed list,
    /// wrapping around.
    fn navigate_session(&mut self, delta: isize) -> AppResult<()> {
        self.refresh_sessions();
        if self.sessions.is_empty() {
            return Err(AppError::NoSessions);
        }

        if self.current_session.is_empty() {
            self.session_index = 0;
            self.current_session = self.sessions[0].name.clone();
            return self.capture_current_session();
        }

        if let Some(i) = self.sessions.iter().position(|s| s.name == self.current_session) {
            self.session_index = i;
        }
        let len = self.sessions.len() as isize;
        self.session_index = (self.session_index as isize + delta).rem_euclid(len) as usize;
        self.current_session = self.sessions[self.session_index].name.clone();
        self.capture_current_session()
    }

    fn capture_current_session(&mut self) -> AppResult<()> {
        if self.current_session.is_empty() {
            return Err(tmux::Error::SessionNotFound.into());
        }
        let output = self.manager.capture_output(&self.current_session)?;
        self.session_log = output.clone();
        let role = self.current_session.clone();
        self.append_message(&role, &output);
        Ok(())
    }

    fn append_message(&mut self, role: &str, content: &str) {
        self.messages.push(Message {
            role: role.to_string(),
            content: content.to_string(),
        });
        self.refresh_viewport();
    }

    fn refresh_viewport(&mut self) {
        let body = self.render_body();
        self.viewport.set_content(body);
    }

    fn render_body(&self) -> String {
        let bold = Style::new().bold(true);
        if self.active_tab == Tab::Tmux {
            if self.current_session.is_empty() {
                return "No active session. Use /new <command> to create one.".to_string();
            }
            return join_vertical(&[bold.render(&self.current_session), self.session_log.trim().to_string()]);
        }

        if self.messages.is_empty() {
            return format!("Welcome to hiho!\n{}", COMMAND_HELP);
        }
        self.messages
            .iter()
            .map(|m| format!("{} {}", bold.render(&format!("{}:", m.role)), m.content.trim()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn panel_style(&self, focus: Focus) -> Style {
        let style = Style::new().border(Border::Normal);
        if self.focus == focus {
            style.border_foreground(ACCENT)
        } else {
            style
        }
    }

    fn render_sidebar(&self) -> String {
        let width = self.sidebar_width().saturating_sub(2);
        let height = self.body_height().saturating_sub(2);

        let mut lines = vec![Style::new().bold(true).render("Sessions")];
        if self.sessions.is_empty() {
            lines.push("No sessions".to_string());
            lines.push("Use /new <cmd>".to_string());
        } else {
            for (i, session) in self.sessions.iter().enumerate() {
                let is_current = session.name == self.current_session;
                let prefix = if is_current { "> " } else { "  " };
                let line = format!(
                    "{}{}",
                    prefix,
                    truncate_with_ellipsis(&session.name, width.saturating_sub(4))
                );
                let line = if i == self.session_index && self.focus == Focus::Sidebar {
                    Style::new().reverse(true).render(&line)
                } else if is_current {
                    Style::new().bold(true).render(&line)
                } else {
                    line
                };
                lines.push(line);
            }
        }

        self.panel_style(Focus::Sidebar)
            .width(width)
            .height(height)
            .render(&lines.join("\n"))
    }

    fn render_tab_bar(&self) -> String {
        let active = Style::new()
            .bold(true)
            .background(ACCENT)
            .foreground(Color::Indexed(230))
            .padding(0, 1);
        let inactive = Style::new().foreground(Color::Indexed(250)).padding(0, 1);

        let (conversation, tmux) = match self.active_tab {
            Tab::Conversation => (active.render("Conversation"), inactive.render("Tmux Window")),
            Tab::Tmux => (inactive.render("Conversation"), active.render("Tmux Window")),
        };
        let info = if self.current_session.is_empty() {
            String::new()
        } else {
            Style::new()
                .foreground(Color::Indexed(244))
                .render(&format!(" • {}", self.current_session))
        };
        join_columns(&[conversation, " ".to_string(), tmux, info])
    }

    fn render_main_panel(&self) -> String {
        let width = self.main_width().saturating_sub(2);
        let height = self.body_height().saturating_sub(2);
        let content = join_vertical(&[self.render_tab_bar(), self.viewport.view()]);
        self.panel_style(Focus::Main)
            .width(width)
            .height(height)
            .render(&content)
    }

    fn render_input_panel(&self) -> String {
        let help = format!(
            "{}: toggle view • {}: cycle focus • ↑↓: navigate • {}: quit",
            self.config.keybindings.toggle_tab,
            self.config.keybindings.cycle_windows,
            self.config.keybindings.quit
        );
        let content = join_vertical(&[
            self.input.view(),
            Style::new().foreground(Color::Indexed(240)).render(&help),
        ]);
        self.panel_style(Focus::Input)
            .width(self.width.saturating_sub(2))
            .render(&content)
    }
}

impl<S: SessionManager> Model for App<S> {
    fn update(mut self, event: Event) -> (Self, Option<Cmd>) {
        let cmd = match &event {
            Event::Key(key) => self.handle_key(key),
            Event::Mouse(mouse) => {
                self.handle_mouse(mouse);
                None
            }
            Event::Resize(size) => {
                self.handle_resize(size.width, size.height);
                None
            }
        };
        (self, cmd)
    }

    fn view(&self) -> String {
        if self.width == 0 || self.height == 0 {
            return "Loading...".to_string();
        }
        let top = join_columns(&[self.render_sidebar(), self.render_main_panel()]);
        join_vertical(&[top, self.render_input_panel()])
    }
}
