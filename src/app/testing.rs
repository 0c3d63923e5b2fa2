//! In-memory session manager for app tests.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::tmux::{Error, Result, Session, SessionManager};

#[derive(Default)]
pub struct StubManager {
    sessions: RefCell<Vec<String>>,
    created: RefCell<Vec<String>>,
    killed: RefCell<Vec<String>>,
    output: HashMap<String, String>,
}

impl StubManager {
    pub fn with_sessions(names: &[&str]) -> Self {
        let stub = Self::default();
        stub.sessions.replace(names.iter().map(|n| n.to_string()).collect());
        stub
    }

    pub fn with_output(mut self, name: &str, output: &str) -> Self {
        self.output.insert(name.to_string(), output.to_string());
        self
    }

    pub fn created(&self) -> Vec<String> {
        self.created.borrow().clone()
    }

    pub fn killed(&self) -> Vec<String> {
        self.killed.borrow().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.sessions.borrow().clone()
    }
}

impl SessionManager for StubManager {
    fn create_session(&self, command: &str) -> Result<Session> {
        self.created.borrow_mut().push(command.to_string());
        let name = format!("hiho-123-{}", self.sessions.borrow().len());
        self.sessions.borrow_mut().push(name.clone());
        Ok(Session::new(name))
    }

    fn capture_output(&self, name: &str) -> Result<String> {
        if !self.sessions.borrow().iter().any(|s| s == name) {
            return Err(Error::SessionNotFound);
        }
        Ok(self.output.get(name).cloned().unwrap_or_default())
    }

    fn list_all(&self) -> Result<Vec<Session>> {
        Ok(self.sessions.borrow().iter().map(|n| Session::new(n.as_str())).collect())
    }

    fn kill(&self, name: &str) -> Result<()> {
        self.killed.borrow_mut().push(name.to_string());
        self.sessions.borrow_mut().retain(|s| s != name);
        Ok(())
    }
}
