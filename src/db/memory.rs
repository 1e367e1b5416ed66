//! In-process document store used when no database is configured and in tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DocumentStore, Filter, UNIQUE_KEYS};
use crate::error::StoreError;

type Collection = Vec<(Uuid, Value)>;

/// Documents are kept per collection in insertion order. Unique keys from
/// [`UNIQUE_KEYS`] are enforced the same way the Postgres indexes enforce them.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<&'static str, Collection>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Values of `fields` in `doc`, or None if any is missing or null.
fn key_values<'a>(doc: &'a Value, fields: &[&str]) -> Option<Vec<&'a Value>> {
    fields
        .iter()
        .map(|f| doc.get(*f).filter(|v| !v.is_null()))
        .collect()
}

fn check_unique(
    collection: &'static str,
    docs: &Collection,
    id: Uuid,
    body: &Value,
) -> Result<(), StoreError> {
    for key in UNIQUE_KEYS.iter().filter(|k| k.collection == collection) {
        let Some(wanted) = key_values(body, key.fields) else {
            continue;
        };
        let taken = docs
            .iter()
            .filter(|(other_id, _)| *other_id != id)
            .any(|(_, other)| key_values(other, key.fields).as_ref() == Some(&wanted));
        if taken {
            tracing::debug!(collection, key = key.name, "unique key conflict");
            return Err(StoreError::Conflict { collection });
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert(
        &self,
        collection: &'static str,
        id: Uuid,
        body: Value,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();
        if docs.iter().any(|(existing, _)| *existing == id) {
            return Err(StoreError::Conflict { collection });
        }
        check_unique(collection, docs, id, &body)?;
        docs.push((id, body));
        Ok(())
    }

    async fn get(&self, collection: &'static str, id: Uuid) -> Result<Option<Value>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|docs| {
            docs.iter()
                .find(|(existing, _)| *existing == id)
                .map(|(_, body)| body.clone())
        }))
    }

    async fn find(
        &self,
        collection: &'static str,
        filter: &Filter,
    ) -> Result<Vec<Value>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, body)| filter.matches(body))
                    .map(|(_, body)| body.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn replace(
        &self,
        collection: &'static str,
        id: Uuid,
        body: Value,
    ) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };
        check_unique(collection, docs, id, &body)?;
        match docs.iter_mut().find(|(existing, _)| *existing == id) {
            Some((_, slot)) => {
                *slot = body;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, collection: &'static str, id: Uuid) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|(existing, _)| *existing != id);
        Ok(docs.len() != before)
    }

    async fn ping(&self) -> Result<Duration, StoreError> {
        let start = Instant::now();
        let _ = self.collections.read().await;
        Ok(start.elapsed())
    }
}
