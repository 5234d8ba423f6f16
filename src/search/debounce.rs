//! Coalesces rapid filter edits into a single resolve.

use std::time::{Duration, Instant};

use crate::config::ReviewConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Text,
    Date,
    /// Conversation selector; fires immediately.
    Scope,
}

#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    text_delay: Duration,
    date_delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(text_delay: Duration, date_delay: Duration) -> Self {
        Self {
            text_delay,
            date_delay,
            pending: None,
        }
    }

    pub fn from_config(config: &ReviewConfig) -> Self {
        Self::new(config.text_debounce(), config.date_debounce())
    }

    fn delay(&self, kind: ChangeKind) -> Duration {
        match kind {
            ChangeKind::Text => self.text_delay,
            ChangeKind::Date => self.date_delay,
            ChangeKind::Scope => Duration::ZERO,
        }
    }

    /// Record a change. The request replaces any pending one; its deadline is the
    /// later of the pending deadline and `now + delay(kind)`, except that a scope
    /// change is due at once.
    pub fn schedule(&mut self, request: T, kind: ChangeKind, now: Instant) {
        let due = now + self.delay(kind);
        let deadline = match (&self.pending, kind) {
            (_, ChangeKind::Scope) => now,
            (Some((_, existing)), _) => due.max(*existing),
            (None, _) => due,
        };
        self.pending = Some((request, deadline));
    }

    /// Take the pending request once its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, deadline)) if now >= *deadline => self.pending.take().map(|(r, _)| r),
            _ => None,
        }
    }

    /// Time left before the pending request is due.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.pending
            .as_ref()
            .map(|(_, deadline)| deadline.saturating_duration_since(now))
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(r, _)| r)
    }
}
