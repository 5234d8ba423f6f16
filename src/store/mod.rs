//! In-memory conversation store.
//!
//! Messages are grouped by [`ConversationKey`] and kept sorted by `sent_at` within
//! each conversation. Ingestion appends in any order and calls [`MessageStore::finalize`]
//! once; after that the only mutations are tag and note edits, or a full reload via
//! [`MessageStore::replace`], which bumps the reload epoch.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{Result, ReviewError};
use crate::model::types::{ConversationKey, Message};

/// Store handle shared between the interactive thread and the resolve worker.
///
/// Workers scan under a read lock; reload takes the write lock, so it waits for an
/// in-flight scan to finish.
pub type SharedStore = Arc<RwLock<MessageStore>>;

pub fn shared(store: MessageStore) -> SharedStore {
    Arc::new(RwLock::new(store))
}

#[derive(Debug, Default)]
pub struct MessageStore {
    conversations: HashMap<ConversationKey, Vec<Message>>,
    /// Conversation listing order: by first key element, then full key.
    order: Vec<ConversationKey>,
    /// `msg_id` -> (conversation, position).
    locations: HashMap<String, (ConversationKey, usize)>,
    media: HashMap<String, PathBuf>,
    notes: HashMap<ConversationKey, String>,
    epoch: u64,
    finalized: bool,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message. Order is restored by [`finalize`](Self::finalize).
    pub fn insert(&mut self, key: ConversationKey, message: Message) {
        self.conversations.entry(key).or_default().push(message);
        self.finalized = false;
    }

    pub fn set_media(&mut self, media: HashMap<String, PathBuf>) {
        self.media = media;
    }

    /// Sort every conversation by timestamp and rebuild the lookup tables.
    ///
    /// Undated messages sort first; ties keep insertion order.
    pub fn finalize(&mut self) {
        for messages in self.conversations.values_mut() {
            messages.sort_by(|a, b| a.sent_at.cmp(&b.sent_at));
        }

        self.order = self.conversations.keys().cloned().collect();
        self.order
            .sort_by(|a, b| a.first().cmp(b.first()).then_with(|| a.cmp(b)));

        self.locations.clear();
        let mut duplicates = 0usize;
        for key in &self.order {
            for (idx, message) in self.conversations[key].iter().enumerate() {
                if self.locations.contains_key(&message.msg_id) {
                    duplicates += 1;
                    continue;
                }
                self.locations
                    .insert(message.msg_id.clone(), (key.clone(), idx));
            }
        }
        if duplicates > 0 {
            warn!(duplicates, "duplicate msg_id values; edits apply to the first occurrence");
        }

        self.finalized = true;
        debug!(
            conversations = self.order.len(),
            messages = self.message_count(),
            "store_finalized"
        );
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Swap in a freshly ingested store, advancing the reload epoch.
    pub fn replace(&mut self, mut next: MessageStore) {
        if !next.finalized {
            next.finalize();
        }
        next.epoch = self.epoch + 1;
        *self = next;
    }

    /// Increments on every reload; cached results from an older epoch are stale.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn conversation_count(&self) -> usize {
        self.conversations.len()
    }

    pub fn message_count(&self) -> usize {
        self.conversations.values().map(Vec::len).sum()
    }

    pub fn undated_count(&self) -> usize {
        self.conversations
            .values()
            .flatten()
            .filter(|m| m.sent_at.is_none())
            .count()
    }

    /// Conversation keys in listing order.
    pub fn keys(&self) -> &[ConversationKey] {
        &self.order
    }

    /// Conversations in listing order.
    pub fn conversations(&self) -> impl Iterator<Item = (&ConversationKey, &[Message])> {
        self.order
            .iter()
            .filter_map(|k| self.conversations.get(k).map(|m| (k, m.as_slice())))
    }

    pub fn messages(&self, key: &ConversationKey) -> Option<&[Message]> {
        self.conversations.get(key).map(Vec::as_slice)
    }

    pub fn message(&self, key: &ConversationKey, index: usize) -> Option<&Message> {
        self.conversations.get(key).and_then(|m| m.get(index))
    }

    pub fn locate(&self, msg_id: &str) -> Option<(&ConversationKey, usize)> {
        self.locations.get(msg_id).map(|(k, i)| (k, *i))
    }

    pub fn find(&self, msg_id: &str) -> Option<&Message> {
        let (key, idx) = self.locate(msg_id)?;
        self.message(key, idx)
    }

    fn find_mut(&mut self, msg_id: &str) -> Result<&mut Message> {
        let (key, idx) = self
            .locations
            .get(msg_id)
            .cloned()
            .ok_or_else(|| ReviewError::UnknownMessage(msg_id.to_string()))?;
        self.conversations
            .get_mut(&key)
            .and_then(|m| m.get_mut(idx))
            .ok_or_else(|| ReviewError::UnknownMessage(msg_id.to_string()))
    }

    /// Add a tag. Returns `false` when the message already carried it.
    pub fn add_tag(&mut self, msg_id: &str, tag: &str) -> Result<bool> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Ok(false);
        }
        Ok(self.find_mut(msg_id)?.tags.insert(tag.to_string()))
    }

    /// Remove a tag. Returns `false` when the message did not carry it.
    pub fn remove_tag(&mut self, msg_id: &str, tag: &str) -> Result<bool> {
        Ok(self.find_mut(msg_id)?.tags.remove(tag.trim()))
    }

    pub fn note(&self, key: &ConversationKey) -> Option<&str> {
        self.notes.get(key).map(String::as_str)
    }

    /// Set or, with an empty note, clear a conversation note.
    pub fn set_note(&mut self, key: ConversationKey, note: &str) {
        let note = note.trim();
        if note.is_empty() {
            self.notes.remove(&key);
        } else {
            self.notes.insert(key, note.to_string());
        }
    }

    pub fn media_path(&self, content_id: &str) -> Option<&Path> {
        if content_id.is_empty() {
            return None;
        }
        self.media.get(content_id).map(PathBuf::as_path)
    }
}
