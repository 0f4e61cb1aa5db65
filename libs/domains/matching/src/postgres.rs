use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbBackend, DbErr, FromQueryResult, Statement,
    TransactionTrait,
};

use crate::error::{MatchError, MatchResult};
use crate::models::{Embedding, EmbeddingRecord, validate_user_id};
use crate::repository::EmbeddingStore;

/// Advisory lock serializing upserts, so the dimension guard sees every
/// committed vector before writing
const UPSERT_LOCK_KEY: i64 = 0x6672_6965_6e64;

/// PostgreSQL implementation of EmbeddingStore using SeaORM
///
/// Vectors live in a `REAL[]` column so they round-trip as exact `f32`.
#[derive(Clone)]
pub struct PostgresEmbeddingStore {
    db: DatabaseConnection,
}

impl PostgresEmbeddingStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

async fn fetch_dimension<C: ConnectionTrait>(
    conn: &C,
    operation: &str,
) -> MatchResult<Option<usize>> {
    let sql = "SELECT cardinality(embedding) AS dimension FROM user_embeddings LIMIT 1";

    let stmt = Statement::from_sql_and_values(DbBackend::Postgres, sql, []);

    let row = DimensionRow::find_by_statement(stmt)
        .one(conn)
        .await
        .map_err(|e| store_error(operation, e))?;

    Ok(row.map(|r| r.dimension as usize))
}

/// Helper struct for deserializing embedding rows from the database
#[derive(Debug, FromQueryResult)]
struct EmbeddingRow {
    user_id: String,
    embedding: Vec<f32>, // PostgreSQL REAL array
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EmbeddingRow> for EmbeddingRecord {
    type Error = MatchError;

    fn try_from(row: EmbeddingRow) -> Result<Self, Self::Error> {
        Ok(EmbeddingRecord {
            user_id: row.user_id,
            embedding: Embedding::new(row.embedding)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromQueryResult)]
struct PairRow {
    user_id: String,
    embedding: Vec<f32>,
}

#[derive(Debug, FromQueryResult)]
struct DimensionRow {
    dimension: i32,
}

#[derive(Debug, FromQueryResult)]
struct CountRow {
    count: i64,
}

fn store_error(operation: &str, err: DbErr) -> MatchError {
    tracing::error!(operation, error = %err, "Embedding store query failed");
    err.into()
}

#[async_trait]
impl EmbeddingStore for PostgresEmbeddingStore {
    async fn upsert(&self, user_id: &str, embedding: Embedding) -> MatchResult<EmbeddingRecord> {
        validate_user_id(user_id)?;

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| store_error("upsert", e))?;

        // Held until commit or rollback
        let lock = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT pg_advisory_xact_lock($1)",
            [UPSERT_LOCK_KEY.into()],
        );
        txn.execute_raw(lock)
            .await
            .map_err(|e| store_error("upsert", e))?;

        // No row back means a stored vector has a different length
        let sql = r#"
            INSERT INTO user_embeddings (user_id, embedding, created_at, updated_at)
            SELECT $1, $2, NOW(), NOW()
            WHERE NOT EXISTS (
                SELECT 1 FROM user_embeddings
                WHERE cardinality(embedding) <> $3
            )
            ON CONFLICT (user_id) DO UPDATE
            SET embedding = EXCLUDED.embedding, updated_at = NOW()
            RETURNING user_id, embedding, created_at, updated_at
        "#;

        let dimension = embedding.dimension();
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            [
                user_id.into(),
                embedding.into_values().into(),
                (dimension as i32).into(),
            ],
        );

        let row = EmbeddingRow::find_by_statement(stmt)
            .one(&txn)
            .await
            .map_err(|e| store_error("upsert", e))?;

        let Some(row) = row else {
            let expected = fetch_dimension(&txn, "upsert").await?.unwrap_or(dimension);
            txn.rollback()
                .await
                .map_err(|e| store_error("upsert", e))?;
            return Err(MatchError::DimensionMismatch {
                expected,
                actual: dimension,
            });
        };

        txn.commit()
            .await
            .map_err(|e| store_error("upsert", e))?;

        tracing::info!(user_id = %user_id, dimension, "Upserted embedding");
        row.try_into()
    }

    async fn get(&self, user_id: &str) -> MatchResult<Option<Embedding>> {
        let sql = "SELECT user_id, embedding FROM user_embeddings WHERE user_id = $1";

        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, sql, [user_id.into()]);

        let row = PairRow::find_by_statement(stmt)
            .one(&self.db)
            .await
            .map_err(|e| store_error("get", e))?;

        row.map(|r| Embedding::new(r.embedding)).transpose()
    }

    async fn get_record(&self, user_id: &str) -> MatchResult<Option<EmbeddingRecord>> {
        let sql = r#"
            SELECT user_id, embedding, created_at, updated_at
            FROM user_embeddings
            WHERE user_id = $1
        "#;

        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, sql, [user_id.into()]);

        let row = EmbeddingRow::find_by_statement(stmt)
            .one(&self.db)
            .await
            .map_err(|e| store_error("get_record", e))?;

        row.map(EmbeddingRecord::try_from).transpose()
    }

    async fn list_all(&self) -> MatchResult<Vec<(String, Embedding)>> {
        let sql = "SELECT user_id, embedding FROM user_embeddings ORDER BY id";

        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, sql, []);

        let rows = PairRow::find_by_statement(stmt)
            .all(&self.db)
            .await
            .map_err(|e| store_error("list_all", e))?;

        rows.into_iter()
            .map(|r| Ok((r.user_id, Embedding::new(r.embedding)?)))
            .collect()
    }

    async fn delete(&self, user_id: &str) -> MatchResult<bool> {
        let sql = "DELETE FROM user_embeddings WHERE user_id = $1";

        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, sql, [user_id.into()]);

        let result = self
            .db
            .execute_raw(stmt)
            .await
            .map_err(|e| store_error("delete", e))?;

        let removed = result.rows_affected() > 0;
        if removed {
            tracing::info!(user_id = %user_id, "Deleted embedding");
        }
        Ok(removed)
    }

    async fn count(&self) -> MatchResult<usize> {
        let sql = "SELECT COUNT(*) AS count FROM user_embeddings";

        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, sql, []);

        let row = CountRow::find_by_statement(stmt)
            .one(&self.db)
            .await
            .map_err(|e| store_error("count", e))?;

        Ok(row.map(|r| r.count as usize).unwrap_or(0))
    }

    async fn dimension(&self) -> MatchResult<Option<usize>> {
        fetch_dimension(&self.db, "dimension").await
    }
}
