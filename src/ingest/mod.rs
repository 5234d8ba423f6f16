//! Loading normalized exports into a [`MessageStore`].
//!
//! Platform-specific parsing happens upstream. This module reads records that are
//! already one-message-per-line JSON, normalizes every field exactly once, and
//! assigns each message its conversation key. Duplicate rows are kept as-is.

pub mod normalize;

use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{Result, ReviewError};
use crate::model::types::{ConversationKey, Message};
use crate::store::MessageStore;

use normalize::{clean_integer_text, clean_text, parse_timestamp};

/// One input line. Fields are loosely typed because exports mix strings, numbers
/// and nulls for the same column.
#[derive(Debug, Default, Deserialize)]
pub struct IngestRecord {
    #[serde(default)]
    pub msg_id: Option<Value>,
    #[serde(default)]
    pub sender: Option<Value>,
    #[serde(default)]
    pub receiver: Option<Value>,
    #[serde(default)]
    pub group_id: Option<Value>,
    #[serde(default)]
    pub sent_at: Option<Value>,
    #[serde(default, alias = "message")]
    pub body: Option<Value>,
    #[serde(default)]
    pub content_id: Option<Value>,
    #[serde(default)]
    pub ip: Option<Value>,
    #[serde(default)]
    pub port: Option<Value>,
    #[serde(default)]
    pub source: Option<Value>,
    #[serde(default)]
    pub line_number: Option<Value>,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn value_text(value: &Option<Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(other) => Some(other.to_string()),
    }
}

impl IngestRecord {
    /// Normalize into a message and its conversation key. `fallback_id` is used
    /// when the record carries no id of its own.
    pub fn into_message(self, fallback_id: &str) -> (ConversationKey, Message) {
        let text = |v: &Option<Value>| clean_text(value_text(v).as_deref());

        let sender = text(&self.sender);
        let receiver = text(&self.receiver);
        let group_id = text(&self.group_id);
        let key = ConversationKey::for_participants(&sender, &receiver, &group_id);

        let mut msg_id = clean_integer_text(value_text(&self.msg_id).as_deref());
        if msg_id.is_empty() {
            msg_id = fallback_id.to_string();
        }

        let line_number = clean_integer_text(value_text(&self.line_number).as_deref())
            .parse::<u64>()
            .ok();

        let tags: BTreeSet<String> = self
            .tags
            .iter()
            .map(|t| clean_text(Some(t.as_str())))
            .filter(|t| !t.is_empty())
            .collect();

        let message = Message {
            msg_id,
            sender,
            receiver,
            sent_at: parse_timestamp(value_text(&self.sent_at).as_deref()),
            body: text(&self.body),
            content_id: clean_integer_text(value_text(&self.content_id).as_deref()),
            ip: text(&self.ip),
            port: clean_integer_text(value_text(&self.port).as_deref()),
            source: text(&self.source),
            line_number,
            tags,
        };
        (key, message)
    }
}

/// Read a JSON Lines file of [`IngestRecord`]s. Blank lines are skipped; a
/// malformed line aborts the load with its line number.
pub fn read_jsonl(path: &Path) -> Result<Vec<(ConversationKey, Message)>> {
    let file = std::fs::File::open(path).map_err(|source| ReviewError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("record");

    let mut out = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|source| ReviewError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let record: IngestRecord =
            serde_json::from_str(&line).map_err(|source| ReviewError::MalformedRecord {
                path: path.to_path_buf(),
                line: line_no,
                source,
            })?;
        out.push(record.into_message(&format!("{stem}:{line_no}")));
    }
    Ok(out)
}

/// Read a `content_id -> file path` manifest (a flat JSON object).
pub fn read_media_manifest(path: &Path) -> Result<HashMap<String, PathBuf>> {
    let raw = std::fs::read_to_string(path).map_err(|source| ReviewError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let entries: HashMap<String, PathBuf> =
        serde_json::from_str(&raw).map_err(|source| ReviewError::MediaManifest {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(entries
        .into_iter()
        .filter_map(|(id, p)| {
            let id = clean_integer_text(Some(id.as_str()));
            (!id.is_empty()).then_some((id, p))
        })
        .collect())
}

/// Build a finalized store from one or more message files plus an optional manifest.
pub fn load_store(message_files: &[PathBuf], media_manifest: Option<&Path>) -> Result<MessageStore> {
    let mut store = MessageStore::new();
    for path in message_files {
        let records = read_jsonl(path)?;
        info!(path = %path.display(), records = records.len(), "ingest_file");
        for (key, message) in records {
            store.insert(key, message);
        }
    }
    if let Some(manifest) = media_manifest {
        let media = read_media_manifest(manifest)?;
        info!(path = %manifest.display(), entries = media.len(), "ingest_media");
        store.set_media(media);
    }
    store.finalize();

    let undated = store.undated_count();
    if undated > 0 {
        warn!(undated, "messages without a usable timestamp; excluded from date-bounded searches");
    }
    Ok(store)
}
