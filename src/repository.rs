use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::PgPool;
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A stored record: a JSON object carrying `_id`, `createdAt` and `updatedAt`.
pub type Document = Map<String, Value>;

/// Field-match query: every key must equal the stored value.
pub type Filter = Map<String, Value>;

/// Collection
///
/// The kinds of records the admin API manages. Each maps to one logical collection
/// with its own uniqueness constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Admin,
    Student,
    Faculty,
    Department,
    Subject,
    Notice,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Admin,
        Collection::Student,
        Collection::Faculty,
        Collection::Department,
        Collection::Subject,
        Collection::Notice,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Admin => "admin",
            Collection::Student => "student",
            Collection::Faculty => "faculty",
            Collection::Department => "department",
            Collection::Subject => "subject",
            Collection::Notice => "notice",
        }
    }

    /// Fields that must hold distinct values across the collection.
    pub fn unique_fields(&self) -> &'static [&'static str] {
        match self {
            Collection::Admin | Collection::Student | Collection::Faculty => &["email", "username"],
            Collection::Department => &["department"],
            Collection::Subject => &["subjectCode"],
            Collection::Notice => &[],
        }
    }
}

/// RepoError
///
/// Failures raised by the persistence collaborator.
#[derive(Error, Debug)]
pub enum RepoError {
    /// A uniqueness constraint was violated; carries the offending field.
    #[error("duplicate key on field {field}")]
    Duplicate { field: String },

    #[error("persistence call timed out")]
    Timeout,

    #[error("database error: {0}")]
    Backend(String),

    #[error("stored document is malformed: {0}")]
    Corrupt(String),
}

/// Repository Trait
///
/// The document-store contract used by the handlers. Implementations must apply a write
/// (including its uniqueness check) atomically: a rejected write leaves the store unchanged.
///
/// **Send + Sync + async_trait** are required to share the trait object
/// (`Arc<dyn Repository>`) across Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Stores a new document and returns it with `_id` and timestamps assigned.
    async fn create(&self, collection: Collection, doc: Document) -> Result<Document, RepoError>;

    async fn find_one(
        &self,
        collection: Collection,
        filter: Filter,
    ) -> Result<Option<Document>, RepoError>;

    async fn find(&self, collection: Collection, filter: Filter) -> Result<Vec<Document>, RepoError>;

    /// Merges `patch` into the first matching document. `None` when nothing matched.
    async fn update_one(
        &self,
        collection: Collection,
        filter: Filter,
        patch: Document,
    ) -> Result<Option<Document>, RepoError>;

    /// Removes the first matching document. Returns whether one was removed.
    async fn delete_one(&self, collection: Collection, filter: Filter) -> Result<bool, RepoError>;

    async fn count(&self, collection: Collection) -> Result<u64, RepoError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// Builds a single-field filter, the common case for `_id` lookups.
pub fn filter_by(field: &str, value: impl Into<Value>) -> Filter {
    let mut filter = Filter::new();
    filter.insert(field.to_string(), value.into());
    filter
}

fn matches(doc: &Document, filter: &Filter) -> bool {
    filter.iter().all(|(key, expected)| doc.get(key) == Some(expected))
}

fn stamp_new(mut doc: Document) -> Document {
    let now = Value::String(Utc::now().to_rfc3339());
    doc.entry("_id")
        .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
    doc.insert("createdAt".to_string(), now.clone());
    doc.insert("updatedAt".to_string(), now);
    doc
}

/// InMemoryRepository
///
/// A process-local document store. Used for tests and for development runs without a
/// `DATABASE_URL`. A single write lock covers the uniqueness check and the write.
#[derive(Default)]
pub struct InMemoryRepository {
    collections: RwLock<HashMap<Collection, Vec<Document>>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Returns the first unique field of `candidate` already held by another document.
fn conflicting_field<'a>(
    collection: Collection,
    existing: impl Iterator<Item = &'a Document> + Clone,
    candidate: &Document,
) -> Option<&'static str> {
    collection.unique_fields().iter().copied().find(|field| {
        candidate.get(*field).is_some_and(|value| {
            !value.is_null()
                && existing
                    .clone()
                    .any(|other| other.get("_id") != candidate.get("_id") && other.get(*field) == Some(value))
        })
    })
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create(&self, collection: Collection, doc: Document) -> Result<Document, RepoError> {
        let doc = stamp_new(doc);
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();

        if let Some(field) = conflicting_field(collection, docs.iter(), &doc) {
            return Err(RepoError::Duplicate {
                field: field.to_string(),
            });
        }

        docs.push(doc.clone());
        Ok(doc)
    }

    async fn find_one(
        &self,
        collection: Collection,
        filter: Filter,
    ) -> Result<Option<Document>, RepoError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|doc| matches(doc, &filter)).cloned()))
    }

    async fn find(&self, collection: Collection, filter: Filter) -> Result<Vec<Document>, RepoError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .map(|docs| docs.iter().filter(|doc| matches(doc, &filter)).cloned().collect())
            .unwrap_or_default())
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: Filter,
        patch: Document,
    ) -> Result<Option<Document>, RepoError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();

        let Some(index) = docs.iter().position(|doc| matches(doc, &filter)) else {
            return Ok(None);
        };

        let mut updated = docs[index].clone();
        for (key, value) in patch {
            // Identity and creation time are immutable.
            if key != "_id" && key != "createdAt" {
                updated.insert(key, value);
            }
        }
        updated.insert(
            "updatedAt".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );

        if let Some(field) = conflicting_field(collection, docs.iter(), &updated) {
            return Err(RepoError::Duplicate {
                field: field.to_string(),
            });
        }

        docs[index] = updated.clone();
        Ok(Some(updated))
    }

    async fn delete_one(&self, collection: Collection, filter: Filter) -> Result<bool, RepoError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(&collection) else {
            return Ok(false);
        };

        match docs.iter().position(|doc| matches(doc, &filter)) {
            Some(index) => {
                docs.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count(&self, collection: Collection) -> Result<u64, RepoError> {
        let collections = self.collections.read().await;
        Ok(collections.get(&collection).map_or(0, |docs| docs.len() as u64))
    }
}

/// PostgresRepository
///
/// The production implementation: every record is a JSONB document in the `documents`
/// table. Uniqueness is enforced by partial unique indexes named `uniq_<collection>_<field>`
/// (see `migrations/`).
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations (document table and unique indexes).
    pub async fn migrate(&self) -> Result<(), RepoError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RepoError::Backend(e.to_string()))
    }
}

/// Translates a driver error, recognising unique-index violations.
fn map_sqlx(collection: Collection, err: sqlx::Error) -> RepoError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let prefix = format!("uniq_{}_", collection.as_str());
            let field = db_err
                .constraint()
                .and_then(|name| name.strip_prefix(prefix.as_str()))
                .unwrap_or("unknown");
            return RepoError::Duplicate {
                field: field.to_string(),
            };
        }
    }
    tracing::error!(collection = collection.as_str(), "postgres error: {:?}", err);
    RepoError::Backend(err.to_string())
}

fn into_document(value: Value) -> Result<Document, RepoError> {
    match value {
        Value::Object(doc) => Ok(doc),
        other => Err(RepoError::Corrupt(format!("expected object, found {other}"))),
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn create(&self, collection: Collection, doc: Document) -> Result<Document, RepoError> {
        let doc = stamp_new(doc);
        let id = doc
            .get("_id")
            .and_then(Value::as_str)
            .and_then(|id| Uuid::parse_str(id).ok())
            .unwrap_or_else(Uuid::new_v4);

        let body: Value = sqlx::query_scalar(
            "INSERT INTO documents (id, collection, body) VALUES ($1, $2, $3) RETURNING body",
        )
        .bind(id)
        .bind(collection.as_str())
        .bind(Value::Object(doc))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx(collection, e))?;

        into_document(body)
    }

    async fn find_one(
        &self,
        collection: Collection,
        filter: Filter,
    ) -> Result<Option<Document>, RepoError> {
        let body: Option<Value> = sqlx::query_scalar(
            "SELECT body FROM documents WHERE collection = $1 AND body @> $2 ORDER BY created_at LIMIT 1",
        )
        .bind(collection.as_str())
        .bind(Value::Object(filter))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx(collection, e))?;

        body.map(into_document).transpose()
    }

    async fn find(&self, collection: Collection, filter: Filter) -> Result<Vec<Document>, RepoError> {
        let bodies: Vec<Value> = sqlx::query_scalar(
            "SELECT body FROM documents WHERE collection = $1 AND body @> $2 ORDER BY created_at",
        )
        .bind(collection.as_str())
        .bind(Value::Object(filter))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx(collection, e))?;

        bodies.into_iter().map(into_document).collect()
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: Filter,
        mut patch: Document,
    ) -> Result<Option<Document>, RepoError> {
        patch.remove("_id");
        patch.remove("createdAt");
        patch.insert(
            "updatedAt".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );

        let body: Option<Value> = sqlx::query_scalar(
            r#"
            UPDATE documents SET body = body || $3
            WHERE id = (
                SELECT id FROM documents
                WHERE collection = $1 AND body @> $2
                ORDER BY created_at LIMIT 1
            )
            RETURNING body
            "#,
        )
        .bind(collection.as_str())
        .bind(Value::Object(filter))
        .bind(Value::Object(patch))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx(collection, e))?;

        body.map(into_document).transpose()
    }

    async fn delete_one(&self, collection: Collection, filter: Filter) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
            DELETE FROM documents
            WHERE id = (
                SELECT id FROM documents
                WHERE collection = $1 AND body @> $2
                ORDER BY created_at LIMIT 1
            )
            "#,
        )
        .bind(collection.as_str())
        .bind(Value::Object(filter))
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx(collection, e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, collection: Collection) -> Result<u64, RepoError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection = $1")
            .bind(collection.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx(collection, e))?;

        Ok(total.max(0) as u64)
    }
}
