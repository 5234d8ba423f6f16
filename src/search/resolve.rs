//! Store scans that turn filter parameters into display lists.

use crate::model::types::{ConversationKey, Message};
use crate::search::filter::{MessageFilter, TextMatcher};
use crate::search::query::{DisplayItem, FilterParams, ResolvedList, Scope};
use crate::store::MessageStore;

/// Cooperative cancellation hook checked between conversations.
pub trait CancelCheck {
    fn is_cancelled(&self) -> bool;
}

/// Never cancels; for synchronous callers.
pub struct NeverCancel;

impl CancelCheck for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Append a header plus the matching messages of one conversation. The header is
/// only written when at least one message matches.
fn push_conversation(
    out: &mut Vec<DisplayItem>,
    key: &ConversationKey,
    messages: &[Message],
    filter: &MessageFilter,
) {
    let mut header_written = false;
    for (index, message) in messages.iter().enumerate() {
        if !filter.matches(message) {
            continue;
        }
        if !header_written {
            out.push(DisplayItem::header(key));
            header_written = true;
        }
        out.push(DisplayItem::Message {
            key: key.clone(),
            index,
        });
    }
}

/// Full scan of the store for `params`.
///
/// Returns `None` only when `cancel` fired part-way through.
pub fn resolve_with(
    store: &MessageStore,
    params: &FilterParams,
    cancel: &dyn CancelCheck,
) -> Option<ResolvedList> {
    let filter = MessageFilter::new(params.text(), params.whole_word, params.dates);
    let mut items = Vec::new();

    if params.covers_all() {
        for (key, messages) in store.conversations() {
            if cancel.is_cancelled() {
                return None;
            }
            push_conversation(&mut items, key, messages, &filter);
        }
    } else if let Scope::Conversation(key) = &params.scope
        && let Some(messages) = store.messages(key)
    {
        push_conversation(&mut items, key, messages, &filter);
    }

    Some(ResolvedList::new(items))
}

/// Resolve `params` against the store. An unknown conversation scope yields an
/// empty list.
pub fn resolve(store: &MessageStore, params: &FilterParams) -> ResolvedList {
    resolve_with(store, params, &NeverCancel).unwrap_or_default()
}

/// Positional form mirroring the filter inputs one by one.
pub fn resolve_parts(
    store: &MessageStore,
    scope: Scope,
    text: &str,
    whole_word: bool,
    search_all: bool,
    date_from: Option<chrono::NaiveDate>,
    date_to: Option<chrono::NaiveDate>,
) -> ResolvedList {
    let params = FilterParams::new()
        .scope(scope)
        .with_text(text)
        .whole_word(whole_word)
        .search_all(search_all)
        .dates(date_from, date_to);
    resolve(store, &params)
}

/// Apply only a text filter to an already date/scope-resolved list.
///
/// Headers survive only if one of their messages does. Rows whose message is no
/// longer in the store are dropped.
pub fn refilter(
    base: &ResolvedList,
    store: &MessageStore,
    text: &str,
    whole_word: bool,
) -> ResolvedList {
    let matcher = TextMatcher::new(text, whole_word);
    if matcher.is_any() {
        return base.clone();
    }

    let mut items = Vec::new();
    let mut pending_header: Option<&DisplayItem> = None;
    for item in base.items() {
        match item {
            DisplayItem::Header { .. } => pending_header = Some(item),
            DisplayItem::Message { key, index } => {
                let Some(message) = store.message(key, *index) else {
                    continue;
                };
                if !matcher.matches_message(message) {
                    continue;
                }
                if let Some(header) = pending_header.take() {
                    items.push(header.clone());
                }
                items.push(item.clone());
            }
        }
    }
    ResolvedList::new(items)
}
