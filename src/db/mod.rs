//! Document persistence: the store contract, its typed wrapper, and pool setup.

pub mod memory;
pub mod models;
pub mod postgres;
pub mod seed;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::StoreError;

pub use memory::MemoryDocumentStore;
pub use postgres::PgDocumentStore;

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/museum_tour".to_string()),
            max_connections: std::env::var("DB_POOL_MAX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            min_connections: std::env::var("DB_POOL_MIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            connect_timeout_secs: std::env::var("DB_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            idle_timeout_secs: std::env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
        }
    }
}

/// Mask credentials in a connection string before logging it.
fn mask_url(url: &str) -> String {
    match (url.find("//"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}****{}", &url[..scheme_end + 2], &url[at..])
        }
        _ => url.to_string(),
    }
}

pub async fn init_pool(config: Option<DbConfig>) -> Result<PgPool, sqlx::Error> {
    let config = config.unwrap_or_default();

    tracing::info!("Initializing database connection pool...");
    tracing::debug!("Database URL: {}", mask_url(&config.url));

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(1800))
        .test_before_acquire(true)
        .connect(&config.url)
        .await?;

    sqlx::query("SELECT 1").fetch_one(&pool).await?;

    tracing::info!("Database connection pool initialized successfully");
    Ok(pool)
}

// ============================================================================
// Store contract
// ============================================================================

/// Field-level predicate over JSON documents.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Top-level field equals the value.
    Eq(&'static str, Value),
    /// Top-level array field contains the value.
    Contains(&'static str, Value),
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: &'static str, value: impl Serialize) -> Self {
        Filter::Eq(field, serde_json::to_value(value).unwrap_or(Value::Null))
    }

    pub fn contains(field: &'static str, value: impl Serialize) -> Self {
        Filter::Contains(field, serde_json::to_value(value).unwrap_or(Value::Null))
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::And(mut all) => {
                all.push(other);
                Filter::And(all)
            }
            first => Filter::And(vec![first, other]),
        }
    }

    /// Evaluate against an in-memory document.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Filter::Eq(field, value) => doc.get(*field) == Some(value),
            Filter::Contains(field, value) => doc
                .get(*field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(value)),
            Filter::And(all) => all.iter().all(|f| f.matches(doc)),
        }
    }
}

/// A set of fields whose combined values must be unique within a collection.
/// Documents missing any of the fields are not constrained.
#[derive(Debug)]
pub struct UniqueKey {
    pub name: &'static str,
    pub collection: &'static str,
    pub fields: &'static [&'static str],
}

pub const UNIQUE_KEYS: &[UniqueKey] = &[
    UniqueKey {
        name: "uq_users_username",
        collection: models::User::COLLECTION,
        fields: &["username"],
    },
    UniqueKey {
        name: "uq_tours_search_id",
        collection: models::Tour::COLLECTION,
        fields: &["searchId"],
    },
    UniqueKey {
        name: "uq_favourites_user",
        collection: models::Favourites::COLLECTION,
        fields: &["user"],
    },
    UniqueKey {
        name: "uq_promotion_codes_code",
        collection: models::PromotionCode::COLLECTION,
        fields: &["code"],
    },
    UniqueKey {
        name: "uq_answers_question_user",
        collection: models::Answer::COLLECTION,
        fields: &["question", "user"],
    },
    UniqueKey {
        name: "uq_museum_objects_object_id",
        collection: models::MuseumObject::COLLECTION,
        fields: &["objectId"],
    },
];

/// Untyped document store. Each document is a JSON object addressed by
/// collection name and id.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fails with [`StoreError::Conflict`] if the id or a unique key is taken.
    async fn insert(&self, collection: &'static str, id: Uuid, body: Value)
        -> Result<(), StoreError>;

    async fn get(&self, collection: &'static str, id: Uuid) -> Result<Option<Value>, StoreError>;

    /// Matching documents in insertion order.
    async fn find(&self, collection: &'static str, filter: &Filter)
        -> Result<Vec<Value>, StoreError>;

    /// Returns false if no document with that id exists.
    async fn replace(&self, collection: &'static str, id: Uuid, body: Value)
        -> Result<bool, StoreError>;

    /// Returns true only for the call that actually removed the document.
    async fn delete(&self, collection: &'static str, id: Uuid) -> Result<bool, StoreError>;

    async fn ping(&self) -> Result<Duration, StoreError>;
}

/// A typed record stored in a named collection.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: &'static str;

    fn id(&self) -> Uuid;
}

/// Typed handle over a shared [`DocumentStore`].
#[derive(Clone)]
pub struct Db {
    store: Arc<dyn DocumentStore>,
}

impl Db {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryDocumentStore::new()))
    }

    pub async fn insert<T: Document>(&self, doc: &T) -> Result<(), StoreError> {
        let body = serde_json::to_value(doc)?;
        self.store.insert(T::COLLECTION, doc.id(), body).await
    }

    pub async fn get<T: Document>(&self, id: Uuid) -> Result<Option<T>, StoreError> {
        match self.store.get(T::COLLECTION, id).await? {
            Some(body) => Ok(Some(serde_json::from_value(body)?)),
            None => Ok(None),
        }
    }

    pub async fn find<T: Document>(&self, filter: Filter) -> Result<Vec<T>, StoreError> {
        self.store
            .find(T::COLLECTION, &filter)
            .await?
            .into_iter()
            .map(|body| serde_json::from_value(body).map_err(StoreError::from))
            .collect()
    }

    pub async fn find_one<T: Document>(&self, filter: Filter) -> Result<Option<T>, StoreError> {
        Ok(self.find(filter).await?.into_iter().next())
    }

    pub async fn exists<T: Document>(&self, filter: Filter) -> Result<bool, StoreError> {
        Ok(!self.store.find(T::COLLECTION, &filter).await?.is_empty())
    }

    /// Overwrite the stored document with the same id.
    pub async fn save<T: Document>(&self, doc: &T) -> Result<bool, StoreError> {
        let body = serde_json::to_value(doc)?;
        self.store.replace(T::COLLECTION, doc.id(), body).await
    }

    pub async fn delete<T: Document>(&self, id: Uuid) -> Result<bool, StoreError> {
        self.store.delete(T::COLLECTION, id).await
    }

    pub async fn ping(&self) -> Result<Duration, StoreError> {
        self.store.ping().await
    }
}
