use std::sync::Arc;

use contacts_store::config::EngineConfig;
use contacts_store::engine::ContactsEngine;
use contacts_types::{Collection, CollectionId};
use tempfile::TempDir;

/// Opens a fresh engine rooted at a throwaway directory. The directory is
/// returned alongside the engine so it isn't dropped (and deleted) early.
pub fn open_test_engine() -> (Arc<ContactsEngine>, TempDir) {
    let dir = TempDir::new().expect("tempdir");
    let config = EngineConfig::new("org.example.contacts-store-tests");
    let uuid = uuid::Uuid::new_v4();
    let engine = ContactsEngine::open("org.example.contacts-store-tests", config, dir.path(), uuid)
        .expect("engine opens");
    (engine, dir)
}

/// Creates an aggregable sync-source collection distinct from the sentinel
/// Local/Aggregate collections, via the engine's async Request API.
pub async fn new_sync_collection(engine: &ContactsEngine, application_name: &str) -> CollectionId {
    let mut collection = Collection::new(CollectionId::new(0), application_name);
    collection.aggregable = true;
    engine.save_collection(collection).await.expect("collection saves")
}

/// Creates a non-aggregable collection: contacts saved into it are never
/// fed into the aggregation engine, so a detail projection across all
/// contacts sees exactly the rows the test put there.
pub async fn new_plain_collection(engine: &ContactsEngine, application_name: &str) -> CollectionId {
    let collection = Collection::new(CollectionId::new(0), application_name);
    engine.save_collection(collection).await.expect("collection saves")
}
