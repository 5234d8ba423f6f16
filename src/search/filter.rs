//! Per-message filter predicate.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::model::types::Message;

/// Inclusive day-granular date range. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    pub fn is_bounded(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }

    /// Undated messages never fall inside a bounded range.
    pub fn contains(&self, sent_at: Option<NaiveDateTime>) -> bool {
        if !self.is_bounded() {
            return true;
        }
        let Some(ts) = sent_at else {
            return false;
        };
        if let Some(from) = self.from
            && ts < from.and_time(NaiveTime::MIN)
        {
            return false;
        }
        if let Some(to) = self.to
            && ts.date() > to
        {
            return false;
        }
        true
    }
}

/// Compiled text filter. Build once per resolve, apply to many messages.
#[derive(Debug, Clone)]
pub enum TextMatcher {
    /// Empty search text: everything passes.
    Any,
    /// Lower-cased needle, substring containment.
    Substring(String),
    /// `\b<needle>\b`, case-insensitive.
    WholeWord(Regex),
}

impl TextMatcher {
    pub fn new(text: &str, whole_word: bool) -> Self {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return Self::Any;
        }
        if whole_word {
            let pattern = format!(r"\b{}\b", regex::escape(&needle));
            match RegexBuilder::new(&pattern).case_insensitive(true).build() {
                Ok(re) => return Self::WholeWord(re),
                Err(e) => {
                    tracing::warn!(error = %e, "whole-word pattern rejected; using substring match");
                }
            }
        }
        Self::Substring(needle)
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Test a single field value.
    pub fn matches_text(&self, haystack: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Substring(needle) => haystack.to_lowercase().contains(needle.as_str()),
            Self::WholeWord(re) => re.is_match(haystack),
        }
    }

    /// Test the searchable fields of a message: sender, receiver, body, formatted
    /// timestamp and content id.
    pub fn matches_message(&self, message: &Message) -> bool {
        if self.is_any() {
            return true;
        }
        self.matches_text(&message.sender)
            || self.matches_text(&message.receiver)
            || self.matches_text(&message.body)
            || self.matches_text(&message.formatted_timestamp())
            || self.matches_text(&message.content_id)
    }
}

/// Filter applied to every message during a store scan.
#[derive(Debug, Clone)]
pub struct MessageFilter {
    pub text: TextMatcher,
    pub dates: DateRange,
}

impl MessageFilter {
    pub fn new(text: &str, whole_word: bool, dates: DateRange) -> Self {
        Self {
            text: TextMatcher::new(text, whole_word),
            dates,
        }
    }

    pub fn matches(&self, message: &Message) -> bool {
        self.dates.contains(message.sent_at) && self.text.matches_message(message)
    }
}

/// One-shot form of the predicate. Prefer [`MessageFilter`] when testing many messages.
pub fn matches(
    message: &Message,
    text: &str,
    whole_word: bool,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
) -> bool {
    MessageFilter::new(text, whole_word, DateRange::new(date_from, date_to)).matches(message)
}
