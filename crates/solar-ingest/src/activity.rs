//! Bounded operator-facing activity log.
//!
//! Keeps the most recent [`DEFAULT_CAPACITY`] entries in memory, oldest
//! dropped first. The log is an injected handle rather than a global; clones
//! share the same buffer. Every entry is also emitted through `tracing`.

use std::{
  collections::VecDeque,
  fmt,
  sync::{Arc, Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::{AsRefStr, Display};

pub const DEFAULT_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Level {
  Info,
  /// A completed run.
  #[serde(rename = "OK")]
  #[strum(serialize = "OK")]
  Success,
  Warn,
  Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityEntry {
  pub at:      DateTime<Utc>,
  pub level:   Level,
  pub context: String,
  pub message: String,
}

impl fmt::Display for ActivityEntry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "[{}] [{}] [{}] {}",
      self.at.format("%Y-%m-%d %H:%M:%S"),
      self.level,
      self.context,
      self.message
    )
  }
}

#[derive(Debug, Clone)]
pub struct ActivityLog {
  entries:  Arc<Mutex<VecDeque<ActivityEntry>>>,
  capacity: usize,
}

impl Default for ActivityLog {
  fn default() -> Self { Self::with_capacity(DEFAULT_CAPACITY) }
}

impl ActivityLog {
  pub fn new() -> Self { Self::default() }

  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
      capacity: capacity.max(1),
    }
  }

  pub fn record(&self, level: Level, context: &str, message: impl Into<String>) {
    let message = message.into();
    match level {
      Level::Info | Level::Success => tracing::info!(context, "{message}"),
      Level::Warn => tracing::warn!(context, "{message}"),
      Level::Error => tracing::error!(context, "{message}"),
    }

    let entry = ActivityEntry {
      at: Utc::now(),
      level,
      context: context.to_owned(),
      message,
    };
    // A panic while holding the lock cannot leave the deque half-updated.
    let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    while entries.len() >= self.capacity {
      entries.pop_front();
    }
    entries.push_back(entry);
  }

  pub fn info(&self, context: &str, message: impl Into<String>) {
    self.record(Level::Info, context, message);
  }

  pub fn success(&self, context: &str, message: impl Into<String>) {
    self.record(Level::Success, context, message);
  }

  pub fn warn(&self, context: &str, message: impl Into<String>) {
    self.record(Level::Warn, context, message);
  }

  pub fn error(&self, context: &str, message: impl Into<String>) {
    self.record(Level::Error, context, message);
  }

  /// Snapshot of all entries, oldest first.
  pub fn entries(&self) -> Vec<ActivityEntry> {
    self
      .entries
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .iter()
      .cloned()
      .collect()
  }

  /// Entries rendered as `[timestamp] [LEVEL] [context] message` lines.
  pub fn lines(&self) -> Vec<String> {
    self.entries().iter().map(ToString::to_string).collect()
  }

  pub fn len(&self) -> usize {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}
