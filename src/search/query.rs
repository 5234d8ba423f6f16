//! Filter parameters, cache keys and resolved display lists.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::model::types::ConversationKey;
use crate::search::filter::DateRange;

/// Which conversations a search covers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    #[default]
    All,
    Conversation(ConversationKey),
}

impl Scope {
    /// `"all"` (any case) selects everything; anything else is parsed as a label.
    /// Returns `None` for a label that names no conversation at all (`"<->"`).
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
            return Some(Self::All);
        }
        ConversationKey::parse_label(raw).map(Self::Conversation)
    }

    pub fn label(&self) -> String {
        match self {
            Self::All => "all".to_string(),
            Self::Conversation(key) => key.label(),
        }
    }
}

/// Everything the user can change about a search.
///
/// The text is lower-cased on construction so equal searches compare equal
/// regardless of typing case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterParams {
    text: String,
    pub whole_word: bool,
    pub search_all: bool,
    pub dates: DateRange,
    pub scope: Scope,
    /// Active keyword-highlight list; affects row color only.
    pub keyword_list: Option<String>,
}

impl FilterParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.set_text(text);
        self
    }

    pub fn whole_word(mut self, whole_word: bool) -> Self {
        self.whole_word = whole_word;
        self
    }

    pub fn search_all(mut self, search_all: bool) -> Self {
        self.search_all = search_all;
        self
    }

    pub fn dates(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.dates = DateRange::new(from, to);
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn keyword_list(mut self, name: Option<String>) -> Self {
        self.keyword_list = name;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: &str) {
        self.text = text.trim().to_lowercase();
    }

    /// True when every conversation is in play, via the flag or the scope.
    pub fn covers_all(&self) -> bool {
        self.search_all || self.scope == Scope::All
    }

    /// No text, no dates, all conversations: the unfiltered baseline.
    pub fn is_unfiltered(&self) -> bool {
        self.text.is_empty() && !self.dates.is_bounded() && self.covers_all()
    }

    /// Key for the fully-filtered cache level. The keyword list is excluded since it
    /// never changes which rows appear.
    pub fn full_key(&self) -> FullKey {
        FullKey {
            text: self.text.clone(),
            whole_word: self.whole_word,
            date: self.date_key(),
        }
    }

    /// Key for the date-filtered cache level (no text).
    pub fn date_key(&self) -> DateKey {
        DateKey {
            dates: self.dates,
            scope: self.scope.clone(),
            search_all: self.search_all,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DateKey {
    pub dates: DateRange,
    pub scope: Scope,
    pub search_all: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FullKey {
    pub text: String,
    pub whole_word: bool,
    pub date: DateKey,
}

/// One row of a resolved result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DisplayItem {
    Header {
        key: ConversationKey,
        label: String,
    },
    /// `index` is the message's position in its conversation before filtering.
    Message { key: ConversationKey, index: usize },
}

impl DisplayItem {
    pub fn header(key: &ConversationKey) -> Self {
        Self::Header {
            key: key.clone(),
            label: key.label(),
        }
    }

    pub fn is_header(&self) -> bool {
        matches!(self, Self::Header { .. })
    }

    pub fn key(&self) -> &ConversationKey {
        match self {
            Self::Header { key, .. } | Self::Message { key, .. } => key,
        }
    }
}

/// Ordered display rows plus the number of message rows among them.
///
/// Cheap to clone: the rows are shared.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedList {
    items: Arc<[DisplayItem]>,
    count: usize,
}

impl ResolvedList {
    /// Count is derived from the items, so it can never disagree with them.
    pub fn new(items: Vec<DisplayItem>) -> Self {
        let count = items.iter().filter(|i| !i.is_header()).count();
        Self {
            items: items.into(),
            count,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[DisplayItem] {
        &self.items
    }

    /// Number of message rows, headers excluded.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True when both lists share the same row allocation.
    pub fn shares_rows_with(&self, other: &ResolvedList) -> bool {
        Arc::ptr_eq(&self.items, &other.items)
    }
}
