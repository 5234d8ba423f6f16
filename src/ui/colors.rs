//! Row background classification.

use ratatui::style::Color;

use crate::config::{KeywordListConfig, ReviewConfig};
use crate::model::types::{ConversationKey, Message, TagPriority};
use crate::search::filter::TextMatcher;
use crate::ui::components::theme::{ThemeProvider, names};

/// Compiled keyword-highlight list. Matching is against the message body only.
#[derive(Debug, Clone)]
pub struct KeywordList {
    pub name: String,
    matchers: Vec<TextMatcher>,
}

impl KeywordList {
    pub fn new(name: impl Into<String>, words: &[String], whole_word: bool) -> Self {
        let matchers = words
            .iter()
            .map(|w| TextMatcher::new(w, whole_word))
            .filter(|m| !m.is_any())
            .collect();
        Self {
            name: name.into(),
            matchers,
        }
    }

    pub fn from_config(cfg: &KeywordListConfig) -> Self {
        Self::new(&cfg.name, &cfg.words, cfg.whole_word)
    }

    pub fn matches(&self, body: &str) -> bool {
        self.matchers.iter().any(|m| m.matches_text(body))
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

/// Why a row got its background, first rule that applies wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowColor {
    Tag(TagPriority),
    KeywordHit,
    SenderFirst,
    SenderSecond,
    Stripe { odd: bool },
}

impl RowColor {
    pub fn color_name(self) -> &'static str {
        match self {
            Self::Tag(priority) => priority.color_name(),
            Self::KeywordHit => names::KEYWORD_HIT,
            Self::SenderFirst => names::SENDER_FIRST,
            Self::SenderSecond => names::SENDER_SECOND,
            Self::Stripe { odd: false } => names::STRIPE_EVEN,
            Self::Stripe { odd: true } => names::STRIPE_ODD,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RowColorPolicy {
    pub keywords: Option<KeywordList>,
    pub sender_colors: bool,
}

impl RowColorPolicy {
    /// Policy for the config's active keyword list and sender-color flag.
    pub fn from_config(config: &ReviewConfig) -> Self {
        let keywords = config.active_keyword_list.as_deref().and_then(|name| {
            let list = config.keyword_list(name).map(KeywordList::from_config);
            if list.is_none() {
                tracing::warn!(list = name, "active keyword list not found in config");
            }
            list
        });
        Self {
            keywords,
            sender_colors: config.sender_colors,
        }
    }

    pub fn with_keywords(mut self, keywords: Option<KeywordList>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn classify(&self, key: &ConversationKey, message: &Message, row: usize) -> RowColor {
        if let Some(priority) = TagPriority::highest(&message.tags) {
            return RowColor::Tag(priority);
        }
        if let Some(keywords) = &self.keywords
            && keywords.matches(&message.body)
        {
            return RowColor::KeywordHit;
        }
        if self.sender_colors
            && let ConversationKey::Direct(first, _) = key
        {
            return if &message.sender == first {
                RowColor::SenderFirst
            } else {
                RowColor::SenderSecond
            };
        }
        RowColor::Stripe { odd: row % 2 == 1 }
    }

    pub fn background(
        &self,
        theme: &dyn ThemeProvider,
        key: &ConversationKey,
        message: &Message,
        row: usize,
    ) -> Option<Color> {
        theme.color(self.classify(key, message, row).color_name())
    }
}
