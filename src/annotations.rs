//! Persistent review annotations: message tags and conversation notes.
//!
//! Stored in a separate `SQLite` file next to the review data so that reloading the
//! message exports never loses review work. Edits write through: the database is
//! written first and the in-memory store only changes once that succeeded.
//!
//! Removing a tag that arrived with the export records a tombstone in
//! `removed_tags`, applied after ingest so the removal survives a reload.

use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::default_data_dir;
use crate::error::{Result, ReviewError};
use crate::model::types::ConversationKey;
use crate::store::MessageStore;

/// What [`AnnotationStore::load_into`] applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedAnnotations {
    pub tags: usize,
    /// Tag removals re-applied over tags that came with the export.
    pub removed: usize,
    pub notes: usize,
    /// Rows referring to messages or conversations absent from the store.
    pub orphaned: usize,
}

/// Column form of a conversation key: `(kind, a, b)`. Unlike the display label
/// this keeps empty participants intact.
fn key_columns(key: &ConversationKey) -> (&'static str, &str, &str) {
    match key {
        ConversationKey::Direct(a, b) => ("direct", a, b),
        ConversationKey::Group(id) => ("group", id, ""),
    }
}

fn key_from_columns(kind: &str, a: String, b: String) -> Option<ConversationKey> {
    match kind {
        "direct" => Some(ConversationKey::direct(a, b)),
        "group" => Some(ConversationKey::Group(a)),
        _ => None,
    }
}

pub struct AnnotationStore {
    conn: Connection,
}

impl AnnotationStore {
    /// Open or create an annotations database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ReviewError::Read {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        conn.execute_batch(SCHEMA)?;
        debug!(path = %path.display(), "annotations_opened");

        Ok(Self { conn })
    }

    /// Record a tag and drop any earlier removal of it. Returns `false` if the
    /// tag was already recorded.
    pub fn add_tag(&self, msg_id: &str, tag: &str) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM removed_tags WHERE msg_id = ?1 AND tag = ?2",
            params![msg_id, tag.trim()],
        )?;
        let rows = tx.execute(
            "INSERT OR IGNORE INTO message_tags (msg_id, tag) VALUES (?1, ?2)",
            params![msg_id, tag.trim()],
        )?;
        tx.commit()?;
        Ok(rows > 0)
    }

    /// Forget a tag and remember that it was removed. Returns `false` if no
    /// added tag was recorded.
    pub fn remove_tag(&self, msg_id: &str, tag: &str) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        let rows = tx.execute(
            "DELETE FROM message_tags WHERE msg_id = ?1 AND tag = ?2",
            params![msg_id, tag.trim()],
        )?;
        tx.execute(
            "INSERT OR IGNORE INTO removed_tags (msg_id, tag) VALUES (?1, ?2)",
            params![msg_id, tag.trim()],
        )?;
        tx.commit()?;
        Ok(rows > 0)
    }

    /// Set a conversation note; an empty note deletes it.
    pub fn set_note(&self, key: &ConversationKey, note: &str) -> Result<()> {
        let (kind, a, b) = key_columns(key);
        let note = note.trim();
        if note.is_empty() {
            self.conn.execute(
                "DELETE FROM conversation_notes WHERE kind = ?1 AND a = ?2 AND b = ?3",
                params![kind, a, b],
            )?;
            return Ok(());
        }
        self.conn.execute(
            "INSERT INTO conversation_notes (kind, a, b, note, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(kind, a, b) DO UPDATE SET note = excluded.note, updated_at = excluded.updated_at",
            params![kind, a, b, note, chrono::Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    pub fn note(&self, key: &ConversationKey) -> Result<Option<String>> {
        let (kind, a, b) = key_columns(key);
        Ok(self
            .conn
            .query_row(
                "SELECT note FROM conversation_notes WHERE kind = ?1 AND a = ?2 AND b = ?3",
                params![kind, a, b],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Merge every stored tag, tag removal and note into `store`.
    pub fn load_into(&self, store: &mut MessageStore) -> Result<AppliedAnnotations> {
        let mut applied = AppliedAnnotations::default();

        for (msg_id, tag) in self.tag_rows("SELECT msg_id, tag FROM message_tags ORDER BY msg_id, tag")? {
            match store.add_tag(&msg_id, &tag) {
                Ok(_) => applied.tags += 1,
                Err(ReviewError::UnknownMessage(_)) => applied.orphaned += 1,
                Err(e) => return Err(e),
            }
        }

        for (msg_id, tag) in self.tag_rows("SELECT msg_id, tag FROM removed_tags ORDER BY msg_id, tag")? {
            match store.remove_tag(&msg_id, &tag) {
                Ok(true) => applied.removed += 1,
                Ok(false) => {}
                Err(ReviewError::UnknownMessage(_)) => applied.orphaned += 1,
                Err(e) => return Err(e),
            }
        }

        let mut stmt = self
            .conn
            .prepare("SELECT kind, a, b, note FROM conversation_notes")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        for row in rows {
            let (kind, a, b, note) = row?;
            match key_from_columns(&kind, a, b) {
                Some(key) if store.messages(&key).is_some() => {
                    store.set_note(key, &note);
                    applied.notes += 1;
                }
                _ => applied.orphaned += 1,
            }
        }

        if applied.orphaned > 0 {
            warn!(
                orphaned = applied.orphaned,
                "annotations reference messages not present in the loaded data"
            );
        }
        debug!(
            tags = applied.tags,
            removed = applied.removed,
            notes = applied.notes,
            "annotations_applied"
        );
        Ok(applied)
    }

    fn tag_rows(&self, sql: &str) -> Result<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Persist a tag, then apply it to the store.
    pub fn tag_message(&self, store: &mut MessageStore, msg_id: &str, tag: &str) -> Result<bool> {
        if store.find(msg_id).is_none() {
            return Err(ReviewError::UnknownMessage(msg_id.to_string()));
        }
        if tag.trim().is_empty() {
            return Ok(false);
        }
        self.add_tag(msg_id, tag)?;
        store.add_tag(msg_id, tag)
    }

    pub fn untag_message(
        &self,
        store: &mut MessageStore,
        msg_id: &str,
        tag: &str,
    ) -> Result<bool> {
        let carried = store
            .find(msg_id)
            .ok_or_else(|| ReviewError::UnknownMessage(msg_id.to_string()))?
            .tags
            .contains(tag.trim());
        if !carried {
            return Ok(false);
        }
        self.remove_tag(msg_id, tag)?;
        store.remove_tag(msg_id, tag)
    }

    pub fn note_conversation(
        &self,
        store: &mut MessageStore,
        key: &ConversationKey,
        note: &str,
    ) -> Result<()> {
        self.set_note(key, note)?;
        store.set_note(key.clone(), note);
        Ok(())
    }
}

pub fn default_annotations_path() -> PathBuf {
    default_data_dir().join("annotations.db")
}

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS message_tags (
    msg_id TEXT NOT NULL,
    tag TEXT NOT NULL,
    PRIMARY KEY (msg_id, tag)
);

CREATE INDEX IF NOT EXISTS idx_message_tags_tag ON message_tags(tag);

CREATE TABLE IF NOT EXISTS removed_tags (
    msg_id TEXT NOT NULL,
    tag TEXT NOT NULL,
    PRIMARY KEY (msg_id, tag)
);

CREATE TABLE IF NOT EXISTS conversation_notes (
    kind TEXT NOT NULL,
    a TEXT NOT NULL,
    b TEXT NOT NULL,
    note TEXT NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (kind, a, b)
);
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::Message;
    use std::collections::BTreeSet;
    use tempfile::tempdir;

    fn test_db() -> (AnnotationStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = AnnotationStore::open(&dir.path().join("nested").join("annotations.db")).unwrap();
        (db, dir)
    }

    fn stored_tags(db: &AnnotationStore, table: &str, msg_id: &str) -> Vec<String> {
        let mut stmt = db
            .conn
            .prepare(&format!("SELECT tag FROM {table} WHERE msg_id = ?1 ORDER BY tag"))
            .unwrap();
        stmt.query_map([msg_id], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<Vec<String>>>()
            .unwrap()
    }

    fn store() -> MessageStore {
        let mut store = MessageStore::new();
        store.insert(
            ConversationKey::direct("A", "B"),
            Message {
                msg_id: "m1".into(),
                ..Default::default()
            },
        );
        store.insert(
            ConversationKey::for_participants("C", "", ""),
            Message {
                msg_id: "m2".into(),
                sender: "C".into(),
                tags: BTreeSet::from(["Evidence".to_string()]),
                ..Default::default()
            },
        );
        store.finalize();
        store
    }

    #[test]
    fn tags_are_unique_per_message() {
        let (db, _dir) = test_db();
        assert!(db.add_tag("m1", "Evidence").unwrap());
        assert!(!db.add_tag("m1", "Evidence ").unwrap());
        assert!(db.add_tag("m1", "CSAM").unwrap());
        assert_eq!(stored_tags(&db, "message_tags", "m1"), vec!["CSAM", "Evidence"]);
        assert!(db.remove_tag("m1", "CSAM").unwrap());
        assert!(!db.remove_tag("m1", "CSAM").unwrap());
        assert_eq!(stored_tags(&db, "message_tags", "m1"), vec!["Evidence"]);
        assert_eq!(stored_tags(&db, "removed_tags", "m1"), vec!["CSAM"]);

        // Re-adding clears the removal.
        db.add_tag("m1", "CSAM").unwrap();
        assert!(stored_tags(&db, "removed_tags", "m1").is_empty());
    }

    #[test]
    fn notes_upsert_and_clear() {
        let (db, _dir) = test_db();
        let key = ConversationKey::direct("A", "B");
        db.set_note(&key, "first").unwrap();
        db.set_note(&key, "second").unwrap();
        assert_eq!(db.note(&key).unwrap().as_deref(), Some("second"));
        db.set_note(&key, "").unwrap();
        assert_eq!(db.note(&key).unwrap(), None);
    }

    #[test]
    fn write_through_then_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("annotations.db");
        let key = ConversationKey::direct("A", "B");
        {
            let db = AnnotationStore::open(&path).unwrap();
            let mut store = store();
            assert!(db.tag_message(&mut store, "m1", "Of Interest").unwrap());
            db.note_conversation(&mut store, &key, "follow up").unwrap();
            assert!(db.tag_message(&mut store, "missing", "CSAM").is_err());
            assert_eq!(stored_tags(&db, "message_tags", "missing"), Vec::<String>::new());
        }

        let db = AnnotationStore::open(&path).unwrap();
        let mut fresh = store();
        let applied = db.load_into(&mut fresh).unwrap();
        assert_eq!(
            applied,
            AppliedAnnotations {
                tags: 1,
                removed: 0,
                notes: 1,
                orphaned: 0
            }
        );
        assert!(fresh.find("m1").unwrap().tags.contains("Of Interest"));
        assert_eq!(fresh.note(&key), Some("follow up"));
    }

    #[test]
    fn note_on_one_sided_chat_survives_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("annotations.db");
        let key = ConversationKey::for_participants("C", "", "");
        {
            let db = AnnotationStore::open(&path).unwrap();
            let mut store = store();
            db.note_conversation(&mut store, &key, "no receiver").unwrap();
        }

        let db = AnnotationStore::open(&path).unwrap();
        let mut fresh = store();
        let applied = db.load_into(&mut fresh).unwrap();
        assert_eq!(applied.notes, 1);
        assert_eq!(applied.orphaned, 0);
        assert_eq!(fresh.note(&key), Some("no receiver"));
    }

    #[test]
    fn removing_an_exported_tag_survives_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("annotations.db");
        {
            let db = AnnotationStore::open(&path).unwrap();
            let mut store = store();
            assert!(db.untag_message(&mut store, "m2", "Evidence").unwrap());
            assert!(!store.find("m2").unwrap().has_tags());
            assert!(!db.untag_message(&mut store, "m2", "Evidence").unwrap());
        }

        let db = AnnotationStore::open(&path).unwrap();
        let mut fresh = store();
        assert!(fresh.find("m2").unwrap().tags.contains("Evidence"));
        let applied = db.load_into(&mut fresh).unwrap();
        assert_eq!(applied.removed, 1);
        assert!(fresh.find("m2").unwrap().tags.is_empty());

        // Tagging again wins over the earlier removal.
        db.tag_message(&mut fresh, "m2", "Evidence").unwrap();
        let mut again = store();
        db.load_into(&mut again).unwrap();
        assert!(again.find("m2").unwrap().tags.contains("Evidence"));
    }

    #[test]
    fn failed_write_leaves_the_store_untouched() {
        let (db, _dir) = test_db();
        let mut store = store();
        let key = ConversationKey::direct("A", "B");
        db.conn.execute_batch("PRAGMA query_only = ON").unwrap();

        assert!(db.tag_message(&mut store, "m1", "CSAM").is_err());
        assert!(!store.find("m1").unwrap().has_tags());

        assert!(db.untag_message(&mut store, "m2", "Evidence").is_err());
        assert!(store.find("m2").unwrap().tags.contains("Evidence"));

        assert!(db.note_conversation(&mut store, &key, "lost").is_err());
        assert_eq!(store.note(&key), None);
    }

    #[test]
    fn orphaned_rows_are_counted() {
        let (db, _dir) = test_db();
        db.add_tag("gone", "Evidence").unwrap();
        db.remove_tag("also-gone", "CSAM").unwrap();
        db.set_note(&ConversationKey::group("old-group"), "n").unwrap();
        let mut store = store();
        let applied = db.load_into(&mut store).unwrap();
        assert_eq!(applied.orphaned, 3);
        assert_eq!(applied.tags, 0);
    }
}
