//! Slash commands typed into the input line.

use super::{App, AppError, AppResult, Tab};
use crate::tmux::{SessionManager, SESSION_PREFIX};

pub const COMMAND_HELP: &str = "Commands:
  /help                 Show this help
  /new <cmd>            Create a tmux session and run the command
  /list                 List hiho-managed sessions
  /sessions             List all tmux sessions
  /next                 Cycle to next session
  /prev                 Cycle to previous session
  /switch <session>     Jump to a specific session
  /switch               Cycle to next session (Tmux tab only)
  /closeall             Close all hiho-managed sessions
  /view tmux            Switch to Tmux Window tab
  /view conversation    Switch to Conversation tab";

impl<S: SessionManager> App<S> {
    /// Handle a submitted input line: commands start with `/`, anything
    /// else is kept as a note.
    pub(super) fn handle_submit(&mut self, input: &str) -> AppResult<()> {
        match input.strip_prefix('/') {
            Some(command) => self.handle_command(command),
            None => {
                self.append_message("user", input);
                Ok(())
            }
        }
    }

    fn handle_command(&mut self, line: &str) -> AppResult<()> {
        let (command, arg) = match line.split_once(' ') {
            Some((command, arg)) => (command, arg.trim()),
            None => (line, ""),
        };

        match command {
            "help" => self.append_message("info", COMMAND_HELP),
            "new" => {
                if arg.is_empty() {
                    return Err(AppError::Usage("/new <command>"));
                }
                let session = self.manager.create_session(arg)?;
                self.current_session = session.name;
                self.active_tab = Tab::Tmux;
                self.refresh_sessions();
                return self.capture_current_session();
            }
            "next" => {
                let session = self.manager.next(&self.current_session)?;
                self.current_session = session.name;
                self.refresh_sessions();
                return self.capture_current_session();
            }
            "prev" => {
                let session = self.manager.previous(&self.current_session)?;
                self.current_session = session.name;
                self.refresh_sessions();
                return self.capture_current_session();
            }
            "switch" => {
                if arg.is_empty() {
                    if self.active_tab == Tab::Tmux {
                        return self.navigate_session(1);
                    }
                    return Err(AppError::Usage(
                        "/switch <session> (or use without arg in Tmux tab to cycle)",
                    ));
                }
                let session = self.manager.switch_to(arg)?;
                self.current_session = session.name;
                self.refresh_sessions();
                return self.capture_current_session();
            }
            "list" => {
                self.refresh_sessions();
                if self.sessions.is_empty() {
                    self.append_message("info", "No hiho sessions found");
                } else {
                    let names: Vec<&str> = self.sessions.iter().map(|s| s.name.as_str()).collect();
                    let content = names.join("\n");
                    self.append_message("sessions", &content);
                }
            }
            "sessions" => {
                let names: Vec<String> = self.manager.list_all()?.into_iter().map(|s| s.name).collect();
                self.append_message("sessions", &names.join(", "));
            }
            "closeall" => {
                self.manager.kill_all_managed()?;
                if self.current_session.starts_with(SESSION_PREFIX) {
                    self.current_session.clear();
                    self.session_log.clear();
                }
                self.refresh_sessions();
                self.session_index = 0;
                self.append_message("info", "All hiho sessions closed");
            }
            "view" => {
                self.active_tab = match arg {
                    "session" | "tmux" => Tab::Tmux,
                    _ => Tab::Conversation,
                };
                self.refresh_viewport();
            }
            other => return Err(AppError::UnknownCommand(other.to_string())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::StubManager;
    use super::*;
    use crate::config::Config;

    fn app(manager: StubManager) -> App<StubManager> {
        App::new(manager, Config::default())
    }

    #[test]
    fn test_new_creates_session_and_captures_output() {
        let manager = StubManager::default().with_output("hiho-123-0", "hello world\n");
        let mut app = app(manager);

        app.handle_submit("/new echo hello world").unwrap();

        assert_eq!(app.manager().created(), vec!["echo hello world".to_string()]);
        assert_eq!(app.current_session(), "hiho-123-0");
        assert_eq!(app.messages().last().unwrap().content, "hello world\n");
        assert_eq!(app.active_tab(), Tab::Tmux);
    }

    #[test]
    fn test_new_without_argument_is_usage_error() {
        let mut app = app(StubManager::default());
        let err = app.handle_submit("/new").unwrap_err();
        assert!(err.to_string().contains("usage"));
        assert!(app.manager().created().is_empty());
    }

    #[test]
    fn test_list_shows_only_managed_sessions() {
        let mut app = app(StubManager::with_sessions(&["hiho-123-0", "hiho-123-1", "other-session"]));
        app.handle_submit("/list").unwrap();

        assert_eq!(app.messages().len(), 1);
        let msg = &app.messages()[0];
        assert_eq!(msg.role, "sessions");
        assert_eq!(msg.content, "hiho-123-0\nhiho-123-1");
    }

    #[test]
    fn test_list_without_managed_sessions() {
        let mut app = app(StubManager::with_sessions(&["other-session"]));
        app.handle_submit("/list").unwrap();
        assert_eq!(app.messages().len(), 1);
        assert_eq!(app.messages()[0].role, "info");
    }

    #[test]
    fn test_sessions_lists_everything() {
        let mut app = app(StubManager::with_sessions(&["hiho-123-0", "other-session"]));
        app.handle_submit("/sessions").unwrap();
        assert_eq!(app.messages()[0].content, "hiho-123-0, other-session");
    }

    #[test]
    fn test_closeall_kills_managed_sessions() {
        let mut app = app(StubManager::with_sessions(&["hiho-123-0", "hiho-123-1", "other-session"]));
        app.current_session = "hiho-123-0".to_string();

        app.handle_submit("/closeall").unwrap();

        assert_eq!(app.manager().killed(), vec!["hiho-123-0".to_string(), "hiho-123-1".to_string()]);
        assert_eq!(app.manager().names(), vec!["other-session".to_string()]);
        assert_eq!(app.current_session(), "");
    }

    #[test]
    fn test_switch_without_argument_cycles_in_tmux_tab() {
        let mut app = app(StubManager::with_sessions(&["hiho-123-0", "hiho-123-1"]));
        app.active_tab = Tab::Tmux;
        app.current_session = "hiho-123-0".to_string();

        app.handle_submit("/switch").unwrap();
        assert_eq!(app.current_session(), "hiho-123-1");
    }

    #[test]
    fn test_switch_without_argument_in_conversation_tab() {
        let mut app = app(StubManager::with_sessions(&["hiho-123-0", "hiho-123-1"]));
        let err = app.handle_submit("/switch").unwrap_err();
        assert!(err.to_string().starts_with("usage: /switch"));
    }

    #[test]
    fn test_switch_to_named_session() {
        let manager = StubManager::with_sessions(&["hiho-123-0", "hiho-123-1"]).with_output("hiho-123-1", "out1");
        let mut app = app(manager);

        app.handle_submit("/switch hiho-123-1").unwrap();
        assert_eq!(app.current_session(), "hiho-123-1");
        assert_eq!(app.session_log, "out1");

        let err = app.handle_submit("/switch nope").unwrap_err();
        assert_eq!(err.to_string(), "session not found");
    }

    #[test]
    fn test_next_and_prev_wrap() {
        let mut app = app(StubManager::with_sessions(&["hiho-123-0", "hiho-123-1"]));
        app.current_session = "hiho-123-0".to_string();

        app.handle_submit("/next").unwrap();
        assert_eq!(app.current_session(), "hiho-123-1");
        app.handle_submit("/next").unwrap();
        assert_eq!(app.current_session(), "hiho-123-0");
        app.handle_submit("/prev").unwrap();
        assert_eq!(app.current_session(), "hiho-123-1");
    }

    #[test]
    fn test_next_without_current_session() {
        let mut app = app(StubManager::with_sessions(&["hiho-123-0"]));
        assert!(app.handle_submit("/next").is_err());
    }

    #[test]
    fn test_navigate_selects_first_without_current() {
        let mut app = app(StubManager::with_sessions(&["hiho-123-0", "hiho-123-1"]));
        app.navigate_session(1).unwrap();
        assert_eq!(app.current_session(), "hiho-123-0");
    }

    #[test]
    fn test_view_switches_tabs() {
        let mut app = app(StubManager::default());
        app.handle_submit("/view tmux").unwrap();
        assert_eq!(app.active_tab(), Tab::Tmux);
        app.handle_submit("/view conversation").unwrap();
        assert_eq!(app.active_tab(), Tab::Conversation);
        app.handle_submit("/view session").unwrap();
        assert_eq!(app.active_tab(), Tab::Tmux);
    }

    #[test]
    fn test_help_lists_commands() {
        let mut app = app(StubManager::default());
        app.handle_submit("/help").unwrap();
        assert_eq!(app.messages().len(), 1);
        assert_eq!(app.messages()[0].role, "info");
        assert!(app.messages()[0].content.contains("/new <cmd>"));
        assert!(app.messages()[0].content.contains("/view conversation"));
    }

    #[test]
    fn test_unknown_command() {
        let mut app = app(StubManager::default());
        let err = app.handle_submit("/unknown").unwrap_err();
        assert_eq!(err.to_string(), "unknown command: unknown");
    }
}
