//! A loaded review: the message store, its search engine and the annotation DB.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::annotations::AnnotationStore;
use crate::config::ReviewConfig;
use crate::error::Result;
use crate::ingest::load_store;
use crate::model::types::ConversationKey;
use crate::search::engine::{Resolution, SearchEngine};
use crate::search::query::FilterParams;
use crate::store::{MessageStore, SharedStore, shared};

/// Files a review was loaded from; reload reads them again.
#[derive(Debug, Clone, Default)]
pub struct DataSources {
    pub messages: Vec<PathBuf>,
    pub media: Option<PathBuf>,
}

impl DataSources {
    fn load(&self, annotations: &AnnotationStore) -> Result<MessageStore> {
        let mut store = load_store(&self.messages, self.media.as_deref())?;
        annotations.load_into(&mut store)?;
        Ok(store)
    }
}

pub struct ReviewSession {
    pub config: ReviewConfig,
    pub sources: DataSources,
    pub store: SharedStore,
    pub engine: Arc<SearchEngine>,
    pub annotations: AnnotationStore,
}

impl ReviewSession {
    /// Ingest `sources`, apply saved annotations and precompute the unfiltered
    /// snapshot.
    pub fn open(config: ReviewConfig, sources: DataSources, annotations_path: &Path) -> Result<Self> {
        let started = Instant::now();
        let annotations = AnnotationStore::open(annotations_path)?;
        let store = sources.load(&annotations)?;
        let engine = Arc::new(SearchEngine::new(config.cache_capacity));
        engine.prime(&store);
        info!(
            files = sources.messages.len(),
            conversations = store.conversation_count(),
            messages = store.message_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "review_opened"
        );
        Ok(Self {
            config,
            sources,
            store: shared(store),
            engine,
            annotations,
        })
    }

    /// Re-ingest the sources. Takes the store write lock, so it waits for an
    /// in-flight scan; the epoch bump invalidates every cached list.
    pub fn reload(&self) -> Result<()> {
        let next = self.sources.load(&self.annotations)?;
        let mut store = self.store.write();
        store.replace(next);
        self.engine.prime(&store);
        info!(epoch = store.epoch(), messages = store.message_count(), "review_reloaded");
        Ok(())
    }

    pub fn search(&self, params: &FilterParams) -> Resolution {
        self.engine.resolve(&self.store.read(), params)
    }

    pub fn tag(&self, msg_id: &str, tag: &str) -> Result<bool> {
        let mut store = self.store.write();
        self.annotations.tag_message(&mut store, msg_id, tag)
    }

    pub fn untag(&self, msg_id: &str, tag: &str) -> Result<bool> {
        let mut store = self.store.write();
        self.annotations.untag_message(&mut store, msg_id, tag)
    }

    pub fn note(&self, key: &ConversationKey, note: &str) -> Result<()> {
        let mut store = self.store.write();
        self.annotations.note_conversation(&mut store, key, note)
    }
}
