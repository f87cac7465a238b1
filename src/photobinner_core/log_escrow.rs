//! Deferred logging.
//!
//! Lines can be held back under an event name and released later, either when
//! that event is triggered or when something at least as severe is logged.
//! The driver uses it to print a file's heading only once that file turns out
//! to be interesting.

use log::Level;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Held {
    event: String,
    level: Level,
    statement: String,
}

#[derive(Debug, Default)]
pub struct LogEscrow {
    /// In the order they were held.
    held: Vec<Held>,
    flushed: usize,
}

impl LogEscrow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps `statement` until `event` is released.
    pub fn hold(&mut self, event: &str, level: Level, statement: impl Into<String>) {
        self.held.push(Held {
            event: event.to_string(),
            level,
            statement: statement.into(),
        });
    }

    /// Logs now, first flushing held lines that are no more severe than this one.
    pub fn log(&mut self, level: Level, statement: &str) {
        self.release_level(level);
        log::log!(level, "{}", statement);
    }

    /// Flushes held lines that are as severe as `level` or less, so context
    /// appears before the line that needed it.
    pub fn release_level(&mut self, level: Level) {
        // log::Level orders Error < Warn < Info < Debug
        self.flush_where(|held| held.level >= level);
    }

    /// Flushes everything held under `trigger`, in order.
    pub fn release(&mut self, trigger: &str) {
        self.flush_where(|held| held.event == trigger);
    }

    /// Drops the lines held under `event` without logging them.
    pub fn discard(&mut self, event: &str) {
        self.held.retain(|held| held.event != event);
    }

    /// Drops all held lines without logging them.
    pub fn clear(&mut self) {
        self.held.clear();
    }

    pub fn pending(&self) -> usize {
        self.held.len()
    }

    /// Number of held lines written out so far.
    pub fn flushed(&self) -> usize {
        self.flushed
    }

    fn flush_where(&mut self, mut matches: impl FnMut(&Held) -> bool) {
        let mut kept = Vec::with_capacity(self.held.len());
        for held in self.held.drain(..) {
            if matches(&held) {
                log::log!(held.level, "{}", held.statement);
                self.flushed += 1;
            } else {
                kept.push(held);
            }
        }
        self.held = kept;
    }
}
