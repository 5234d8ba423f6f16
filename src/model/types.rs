//! Normalized entity structs.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Display format for message timestamps; also the text form searched by the filter.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Canonical conversation identifier.
///
/// Direct chats store their two participants sorted, so the key does not depend on
/// which side sent a given message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConversationKey {
    Direct(String, String),
    Group(String),
}

impl ConversationKey {
    /// Build the key for a one-to-one chat regardless of direction.
    pub fn direct(a: impl Into<String>, b: impl Into<String>) -> Self {
        let (a, b) = (a.into(), b.into());
        if a <= b {
            Self::Direct(a, b)
        } else {
            Self::Direct(b, a)
        }
    }

    pub fn group(id: impl Into<String>) -> Self {
        Self::Group(id.into())
    }

    /// Key for a message, computed the same way every time it is ingested.
    pub fn for_participants(sender: &str, receiver: &str, group_id: &str) -> Self {
        if group_id.is_empty() {
            Self::direct(sender, receiver)
        } else {
            Self::group(group_id)
        }
    }

    /// First element of the key; conversations are listed in this order.
    pub fn first(&self) -> &str {
        match self {
            Self::Direct(a, _) => a,
            Self::Group(id) => id,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }

    /// Human-readable label used in header rows and scope selectors.
    pub fn label(&self) -> String {
        match self {
            Self::Direct(a, b) => format!("{a} <-> {b}"),
            Self::Group(id) => id.clone(),
        }
    }

    /// Inverse of [`label`](Self::label). Anything without a `<->` separator is a group id.
    ///
    /// One side of a direct label may be empty (a message exported without a
    /// receiver); both sides empty is rejected.
    pub fn parse_label(label: &str) -> Option<Self> {
        let label = label.trim();
        if label.is_empty() {
            return None;
        }
        match label.split_once("<->") {
            Some((a, b)) => {
                let (a, b) = (a.trim(), b.trim());
                if a.is_empty() && b.is_empty() {
                    None
                } else {
                    Some(Self::direct(a, b))
                }
            }
            None => Some(Self::group(label)),
        }
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// One reviewed message.
///
/// Every optional text field is already normalized: absent values are the empty
/// string, never `"nan"` or `"None"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub msg_id: String,
    pub sender: String,
    pub receiver: String,
    /// Naive local time; any source offset was stripped at ingestion.
    pub sent_at: Option<NaiveDateTime>,
    pub body: String,
    pub content_id: String,
    pub ip: String,
    pub port: String,
    /// Provenance label (e.g. "csv", "log").
    pub source: String,
    pub line_number: Option<u64>,
    /// Investigator tags; a set, so re-adding a tag is a no-op.
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl Message {
    /// `YYYY-MM-DD HH:MM:SS`, or empty when the timestamp is missing.
    pub fn formatted_timestamp(&self) -> String {
        self.sent_at
            .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_default()
    }

    pub fn has_tags(&self) -> bool {
        !self.tags.is_empty()
    }

    /// Tags joined for display, highest priority first.
    pub fn tag_list(&self) -> String {
        let mut tags: Vec<&String> = self.tags.iter().collect();
        tags.sort_by_key(|t| TagPriority::of(t));
        tags.into_iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Built-in tags in triage priority order. Anything else is a custom tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TagPriority {
    Csam,
    Evidence,
    OfInterest,
    Custom,
}

impl TagPriority {
    pub const CSAM: &'static str = "CSAM";
    pub const EVIDENCE: &'static str = "Evidence";
    pub const OF_INTEREST: &'static str = "Of Interest";

    pub fn of(tag: &str) -> Self {
        match tag {
            Self::CSAM => Self::Csam,
            Self::EVIDENCE => Self::Evidence,
            Self::OF_INTEREST => Self::OfInterest,
            _ => Self::Custom,
        }
    }

    /// Highest-priority tag in the set, if any.
    pub fn highest<'a>(tags: impl IntoIterator<Item = &'a String>) -> Option<Self> {
        tags.into_iter().map(|t| Self::of(t)).min()
    }

    /// Theme color name for this priority level.
    pub fn color_name(self) -> &'static str {
        match self {
            Self::Csam => "tag.csam",
            Self::Evidence => "tag.evidence",
            Self::OfInterest => "tag.of_interest",
            Self::Custom => "tag.custom",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_key_is_direction_independent() {
        assert_eq!(
            ConversationKey::for_participants("bob", "alice", ""),
            ConversationKey::for_participants("alice", "bob", "")
        );
        assert_eq!(
            ConversationKey::for_participants("bob", "alice", ""),
            ConversationKey::Direct("alice".into(), "bob".into())
        );
    }

    #[test]
    fn group_id_wins_over_participants() {
        let key = ConversationKey::for_participants("alice", "bob", "team-7");
        assert_eq!(key, ConversationKey::group("team-7"));
        assert!(key.is_group());
    }

    #[test]
    fn label_parses_back_to_key() {
        let direct = ConversationKey::direct("A", "B");
        assert_eq!(direct.label(), "A <-> B");
        assert_eq!(ConversationKey::parse_label("A<->B"), Some(direct.clone()));
        assert_eq!(ConversationKey::parse_label(" B <-> A "), Some(direct));
        assert_eq!(
            ConversationKey::parse_label("G"),
            Some(ConversationKey::group("G"))
        );
        assert_eq!(ConversationKey::parse_label("  "), None);
        assert_eq!(ConversationKey::parse_label(" <-> "), None);
    }

    #[test]
    fn one_sided_direct_label_round_trips() {
        let key = ConversationKey::for_participants("C", "", "");
        assert_eq!(key, ConversationKey::direct("", "C"));
        assert_eq!(key.label(), " <-> C");
        assert_eq!(ConversationKey::parse_label(&key.label()), Some(key.clone()));
        assert_eq!(ConversationKey::parse_label("C <->"), Some(key));
    }

    #[test]
    fn highest_tag_priority() {
        let tags: BTreeSet<String> = ["Of Interest", "CSAM", "mine"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(TagPriority::highest(&tags), Some(TagPriority::Csam));

        let custom: BTreeSet<String> = ["zeta".to_string()].into_iter().collect();
        assert_eq!(TagPriority::highest(&custom), Some(TagPriority::Custom));
        assert_eq!(TagPriority::highest(&BTreeSet::new()), None);
    }

    #[test]
    fn tag_list_orders_by_priority() {
        let msg = Message {
            tags: ["custom", "Evidence", "CSAM"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ..Default::default()
        };
        assert_eq!(msg.tag_list(), "CSAM, Evidence, custom");
    }
}
