//! tmux session orchestration
//!
//! The UI only talks to [`SessionManager`]; [`TmuxManager`] implements it by
//! shelling out to the `tmux` binary.

use std::io;
use std::process::{Command, Output};
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tracing::{debug, info};

/// Prefix of every session created by this program.
pub const SESSION_PREFIX: &str = "hiho-";

/// Lines of scrollback included in a capture.
const CAPTURE_HISTORY: &str = "-200";

const TMUX: &str = "tmux";

/// A tmux session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub name: String,
}

impl Session {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Whether this session was created by hiho.
    pub fn is_managed(&self) -> bool {
        self.name.starts_with(SESSION_PREFIX)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("session not found")]
    SessionNotFound,

    #[error("Failed to run tmux: {0}")]
    Spawn(#[source] io::Error),

    #[error("{command} failed:{output}")]
    CommandFailed { command: String, output: String },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Session operations used by the UI.
pub trait SessionManager {
    /// Start a detached session running `command`.
    fn create_session(&self, command: &str) -> Result<Session>;

    /// Recent output of the session's active pane.
    fn capture_output(&self, name: &str) -> Result<String>;

    /// Every session on the server.
    fn list_all(&self) -> Result<Vec<Session>>;

    /// Sessions created by hiho.
    fn list_managed(&self) -> Result<Vec<Session>> {
        Ok(self.list_all()?.into_iter().filter(Session::is_managed).collect())
    }

    /// Look up a session by name.
    fn switch_to(&self, name: &str) -> Result<Session> {
        self.list_all()?
            .into_iter()
            .find(|s| s.name == name)
            .ok_or(Error::SessionNotFound)
    }

    /// The session after `current`, wrapping around.
    fn next(&self, current: &str) -> Result<Session> {
        select_relative(self.list_all()?, current, 1)
    }

    /// The session before `current`, wrapping around.
    fn previous(&self, current: &str) -> Result<Session> {
        select_relative(self.list_all()?, current, -1)
    }

    fn kill(&self, name: &str) -> Result<()>;

    /// Kill every hiho session.
    fn kill_all_managed(&self) -> Result<()> {
        for session in self.list_managed()? {
            self.kill(&session.name)?;
        }
        Ok(())
    }
}

/// Pick the session `delta` steps away from `current`, wrapping around.
pub fn select_relative(sessions: Vec<Session>, current: &str, delta: isize) -> Result<Session> {
    let len = sessions.len() as isize;
    let index = sessions
        .iter()
        .position(|s| s.name == current)
        .ok_or(Error::SessionNotFound)? as isize;
    let next = (index + delta).rem_euclid(len) as usize;
    sessions.into_iter().nth(next).ok_or(Error::SessionNotFound)
}

/// [`SessionManager`] backed by the tmux binary.
pub struct TmuxManager {
    counter: AtomicUsize,
}

impl TmuxManager {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
        }
    }

    /// Next session name: `hiho-<pid>-<counter>`.
    fn unique_name(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}{}-{}", SESSION_PREFIX, std::process::id(), n)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        debug!("tmux {}", args.join(" "));
        let output = Command::new(TMUX).args(args).output().map_err(Error::Spawn)?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(Error::CommandFailed {
                command: format!("tmux {}", args.first().copied().unwrap_or_default()),
                output: format_output(&output),
            })
        }
    }
}

impl Default for TmuxManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager for TmuxManager {
    fn create_session(&self, command: &str) -> Result<Session> {
        let name = self.unique_name();
        self.run(&["new-session", "-d", "-s", &name, "bash"])?;
        let command = format!("set -o pipefail; {}", command);
        self.run(&["send-keys", "-t", &name, &command, "C-m"])?;
        info!("Created tmux session {}", name);
        Ok(Session { name })
    }

    fn capture_output(&self, name: &str) -> Result<String> {
        let output = self.run(&["capture-pane", "-p", "-t", name, "-S", CAPTURE_HISTORY])?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn list_all(&self) -> Result<Vec<Session>> {
        match self.run(&["list-sessions", "-F", "#S"]) {
            Ok(output) => Ok(parse_session_list(&String::from_utf8_lossy(&output.stdout))),
            // A missing server just means there are no sessions yet
            Err(Error::CommandFailed { output, .. }) if is_no_server(&output) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn kill(&self, name: &str) -> Result<()> {
        self.run(&["kill-session", "-t", name])?;
        info!("Killed tmux session {}", name);
        Ok(())
    }
}

/// One session per non-blank line of `list-sessions -F #S` output.
fn parse_session_list(stdout: &str) -> Vec<Session> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(Session::new)
        .collect()
}

fn is_no_server(output: &str) -> bool {
    output.contains("no server running") || output.contains("error connecting to")
}

fn format_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let mut parts = Vec::new();
    if !stdout.trim().is_empty() {
        parts.push(stdout.trim().to_string());
    }
    if !stderr.trim().is_empty() {
        parts.push(stderr.trim().to_string());
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" {}", parts.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn sessions(names: &[&str]) -> Vec<Session> {
        names.iter().map(|n| Session::new(*n)).collect()
    }

    fn tmux_available() -> bool {
        Command::new(TMUX).arg("-V").output().map(|o| o.status.success()).unwrap_or(false)
    }

    #[test]
    fn test_parse_session_list() {
        let parsed = parse_session_list("hiho-1-0\n\n  work  \nhiho-1-1\n");
        assert_eq!(parsed, sessions(&["hiho-1-0", "work", "hiho-1-1"]));
        assert!(parse_session_list("").is_empty());
    }

    #[test]
    fn test_is_managed() {
        assert!(Session::new("hiho-42-0").is_managed());
        assert!(!Session::new("main").is_managed());
        assert!(!Session::new("xhiho-1").is_managed());
    }

    #[test]
    fn test_select_relative_wraps() {
        let list = sessions(&["a", "b", "c"]);
        assert_eq!(select_relative(list.clone(), "a", 1).unwrap().name, "b");
        assert_eq!(select_relative(list.clone(), "c", 1).unwrap().name, "a");
        assert_eq!(select_relative(list.clone(), "a", -1).unwrap().name, "c");
        assert_eq!(select_relative(list, "b", -1).unwrap().name, "a");
    }

    #[test]
    fn test_select_relative_unknown_session() {
        assert!(matches!(
            select_relative(sessions(&["a"]), "zzz", 1),
            Err(Error::SessionNotFound)
        ));
        assert!(matches!(select_relative(Vec::new(), "", 1), Err(Error::SessionNotFound)));
    }

    #[test]
    fn test_unique_names_use_pid_and_counter() {
        let manager = TmuxManager::new();
        let pid = std::process::id();
        assert_eq!(manager.unique_name(), format!("hiho-{}-0", pid));
        assert_eq!(manager.unique_name(), format!("hiho-{}-1", pid));
    }

    #[test]
    fn test_no_server_detection() {
        assert!(is_no_server("no server running on /tmp/tmux-0/default"));
        assert!(!is_no_server("can't find session: foo"));
    }

    #[test]
    fn test_session_lifecycle() {
        if !tmux_available() {
            return;
        }
        let manager = TmuxManager::new();

        let session = match manager.create_session("echo hello world") {
            Ok(session) => session,
            // tmux present but unable to start a server here
            Err(Error::CommandFailed { .. }) => return,
            Err(e) => panic!("create_session: {}", e),
        };
        assert!(session.is_managed());

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut output = String::new();
        while Instant::now() < deadline {
            output = manager.capture_output(&session.name).unwrap();
            if output.contains("hello world") {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        assert!(output.contains("hello world"), "capture: {:?}", output);

        let managed = manager.list_managed().unwrap();
        assert!(managed.contains(&session));
        assert!(managed.iter().all(Session::is_managed));
        assert_eq!(manager.switch_to(&session.name).unwrap(), session);

        manager.kill(&session.name).unwrap();
        assert!(!manager.list_all().unwrap().contains(&session));
        assert!(matches!(manager.switch_to(&session.name), Err(Error::SessionNotFound)));
    }
}
