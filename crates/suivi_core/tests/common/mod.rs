#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use suivi_core::db::open_db_in_memory;
use suivi_core::{
    Database, Entity, EntityId, EntityService, SearchError, SearchHits, SearchIndex, SearchQuery,
    SearchResult,
};

#[derive(Debug, Clone, PartialEq)]
pub enum IndexCall<E> {
    Save(E),
    Delete(EntityId),
    Search(SearchQuery),
    Clear,
}

/// Search index double recording every call and answering searches with
/// canned hits.
pub struct RecordingIndex<E> {
    calls: Mutex<Vec<IndexCall<E>>>,
    hits: Mutex<SearchHits<E>>,
    fail_writes: bool,
}

impl<E: Entity> RecordingIndex<E> {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            hits: Mutex::new(SearchHits::empty()),
            fail_writes: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::new()
        }
    }

    pub fn set_hits(&self, hits: SearchHits<E>) {
        *self.hits.lock().unwrap() = hits;
    }

    pub fn calls(&self) -> Vec<IndexCall<E>> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: IndexCall<E>) -> SearchResult<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail_writes {
            return Err(SearchError::InvalidDocument("index unavailable".to_string()));
        }
        Ok(())
    }
}

impl<E: Entity> SearchIndex<E> for RecordingIndex<E> {
    fn save(&self, entity: &E) -> SearchResult<()> {
        self.record(IndexCall::Save(entity.clone()))
    }

    fn delete(&self, id: EntityId) -> SearchResult<()> {
        self.record(IndexCall::Delete(id))
    }

    fn search(&self, query: &SearchQuery) -> SearchResult<SearchHits<E>> {
        self.calls
            .lock()
            .unwrap()
            .push(IndexCall::Search(query.clone()));
        Ok(self.hits.lock().unwrap().clone())
    }

    fn clear(&self) -> SearchResult<()> {
        self.record(IndexCall::Clear)
    }
}

pub fn memory_db() -> Arc<Database> {
    Arc::new(Database::new(open_db_in_memory().unwrap()))
}

pub fn service_with<E: Entity>(
    db: Arc<Database>,
    index: RecordingIndex<E>,
) -> (EntityService<E>, Arc<RecordingIndex<E>>) {
    let index = Arc::new(index);
    (EntityService::new(db, index.clone()), index)
}

pub fn service<E: Entity>(db: Arc<Database>) -> (EntityService<E>, Arc<RecordingIndex<E>>) {
    service_with(db, RecordingIndex::new())
}
