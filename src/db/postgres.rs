//! Postgres-backed document store: one JSONB table, unique expression indexes.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{types::Json, PgPool, Postgres, QueryBuilder, Row};
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::{DocumentStore, Filter, UNIQUE_KEYS};
use crate::error::StoreError;

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        tracing::info!("Running database migrations...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id UUID NOT NULL,
                seq BIGSERIAL,
                body JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (collection, id)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_documents_collection_seq
                ON documents(collection, seq)
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_documents_body
                ON documents USING GIN(body jsonb_path_ops)
        "#,
        )
        .execute(&self.pool)
        .await?;

        for key in UNIQUE_KEYS {
            sqlx::query(&unique_index_sql(key.name, key.collection, key.fields))
                .execute(&self.pool)
                .await?;
        }

        tracing::info!("Database migrations completed successfully");
        Ok(())
    }
}

/// Partial unique index over the text value of each field. Rows where a field
/// is missing yield NULL and are not constrained.
fn unique_index_sql(name: &str, collection: &str, fields: &[&str]) -> String {
    let columns = fields
        .iter()
        .map(|f| format!("(body->>'{}')", f))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {} ON documents ({}) WHERE collection = '{}'",
        name, columns, collection
    )
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    match filter {
        Filter::Eq(field, value) => {
            builder
                .push("body -> ")
                .push_bind(field.to_string())
                .push(" = ")
                .push_bind(Json(value.clone()));
        }
        Filter::Contains(field, value) => {
            builder
                .push("body -> ")
                .push_bind(field.to_string())
                .push(" @> ")
                .push_bind(Json(Value::Array(vec![value.clone()])));
        }
        Filter::And(all) if all.is_empty() => {
            builder.push("TRUE");
        }
        Filter::And(all) => {
            builder.push("(");
            for (i, inner) in all.iter().enumerate() {
                if i > 0 {
                    builder.push(" AND ");
                }
                push_filter(builder, inner);
            }
            builder.push(")");
        }
    }
}

fn map_write_error(collection: &'static str, err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            tracing::debug!(collection, "unique key conflict");
            StoreError::Conflict { collection }
        }
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn insert(
        &self,
        collection: &'static str,
        id: Uuid,
        body: Value,
    ) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(id)
            .bind(Json(body))
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(collection, e))?;
        Ok(())
    }

    async fn get(&self, collection: &'static str, id: Uuid) -> Result<Option<Value>, StoreError> {
        let row: Option<(Json<Value>,)> =
            sqlx::query_as("SELECT body FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(Json(body),)| body))
    }

    async fn find(
        &self,
        collection: &'static str,
        filter: &Filter,
    ) -> Result<Vec<Value>, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT body FROM documents WHERE collection = ");
        builder.push_bind(collection).push(" AND ");
        push_filter(&mut builder, filter);
        builder.push(" ORDER BY seq");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| {
                row.try_get::<Json<Value>, _>("body")
                    .map(|Json(body)| body)
                    .map_err(StoreError::from)
            })
            .collect()
    }

    async fn replace(
        &self,
        collection: &'static str,
        id: Uuid,
        body: Value,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE documents SET body = $3, updated_at = now() WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .bind(Json(body))
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(collection, e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, collection: &'static str, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<Duration, StoreError> {
        let start = Instant::now();
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(start.elapsed())
    }
}
