//! Fixed environment a script can observe.

use chrono::{Local, NaiveDateTime};
use std::collections::HashMap;
use std::path::PathBuf;

/// Snapshot of the outside world visible to `env()`, `home()` and `now()`.
///
/// Scripts never read the process environment or clock directly, so every
/// evaluation against the same `ScriptEnv` produces the same result.
#[derive(Debug, Clone)]
pub struct ScriptEnv {
    vars: HashMap<String, String>,
    now: NaiveDateTime,
    home: Option<PathBuf>,
}

impl Default for ScriptEnv {
    fn default() -> Self {
        Self::from_process()
    }
}

impl ScriptEnv {
    /// Capture the current process environment, local time and home directory.
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
            now: Local::now().naive_local(),
            home: dirs::home_dir(),
        }
    }

    /// An empty environment stamped with the current local time.
    pub fn empty() -> Self {
        Self {
            vars: HashMap::new(),
            now: Local::now().naive_local(),
            home: None,
        }
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = now;
        self
    }

    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn now(&self) -> NaiveDateTime {
        self.now
    }

    pub fn home(&self) -> Option<&PathBuf> {
        self.home.as_ref()
    }
}
