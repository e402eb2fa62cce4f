//! Where middleware log lines go.
//!
//! The middleware renders text; a [`Sink`] decides what happens to it. Two
//! sinks ship with the crate: [`TracingSink`] forwards lines as `tracing`
//! events, [`MemorySink`] keeps them in memory.
//!
//! Verbosity uses `tracing`'s ordering: more verbose is greater, so
//! `LevelFilter::DEBUG < LevelFilter::TRACE` and `LevelFilter::OFF` is the
//! least permissive of all.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::Level;
use tracing::level_filters::LevelFilter;

/// A logging backend that accepts leveled lines.
pub trait Sink: Send + Sync {
    /// Current verbosity.
    fn level(&self) -> LevelFilter;

    fn write_line(&self, level: Level, line: &str);
}

/// A sink shared by every request a middleware instance handles.
pub type SharedSink = Arc<dyn Sink>;

// ── TracingSink ───────────────────────────────────────────────────────────────

/// Forwards lines as `tracing` events with target `watchpost`.
///
/// Reports the global max level of the installed subscriber unless pinned
/// with [`TracingSink::with_level`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink {
    level: Option<LevelFilter>,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(level: LevelFilter) -> Self {
        Self { level: Some(level) }
    }
}

impl Sink for TracingSink {
    fn level(&self) -> LevelFilter {
        self.level.unwrap_or_else(LevelFilter::current)
    }

    fn write_line(&self, level: Level, line: &str) {
        match level {
            Level::ERROR => tracing::error!(target: "watchpost", "{line}"),
            Level::WARN => tracing::warn!(target: "watchpost", "{line}"),
            Level::INFO => tracing::info!(target: "watchpost", "{line}"),
            Level::DEBUG => tracing::debug!(target: "watchpost", "{line}"),
            _ => tracing::trace!(target: "watchpost", "{line}"),
        }
    }
}

// ── MemorySink ────────────────────────────────────────────────────────────────

/// Keeps every line in memory. Handy in tests and for inspecting output.
#[derive(Debug)]
pub struct MemorySink {
    level: Mutex<LevelFilter>,
    lines: Mutex<Vec<(Level, String)>>,
}

impl MemorySink {
    pub fn new(level: LevelFilter) -> Self {
        Self { level: Mutex::new(level), lines: Mutex::new(Vec::new()) }
    }

    pub fn set_level(&self, level: LevelFilter) {
        *lock(&self.level) = level;
    }

    /// Every line written so far, oldest first.
    pub fn lines(&self) -> Vec<(Level, String)> {
        lock(&self.lines).clone()
    }
}

impl Sink for MemorySink {
    fn level(&self) -> LevelFilter {
        *lock(&self.level)
    }

    fn write_line(&self, level: Level, line: &str) {
        lock(&self.lines).push((level, line.to_owned()));
    }
}

// A panicking writer must not take the sink down with it.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
