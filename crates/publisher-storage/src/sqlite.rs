//! SQLite-backed [`CollectionStore`].
//!
//! Three tables: `collections` holds the listing row, `collection_info` the
//! per-collection flags and failure report, `tokens` the parsed metadata.
//! Token writes are idempotent upserts keyed on `(collection_id, token_id)`
//! so relisting a token replaces its previous row.

use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use publisher_common::{CollectionRecord, CollectionStore, NewCollection, TokenMetadata};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS collections (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        address TEXT NOT NULL UNIQUE,
        owner TEXT NOT NULL,
        name TEXT NOT NULL,
        description TEXT NOT NULL,
        symbol TEXT NOT NULL,
        total_supply INTEGER NOT NULL,
        visible INTEGER NOT NULL DEFAULT 1,
        verified INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS collection_info (
        collection_id INTEGER PRIMARY KEY REFERENCES collections(id),
        only_gif INTEGER NOT NULL,
        modified_name INTEGER NOT NULL,
        failed_ids TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS tokens (
        collection_id INTEGER NOT NULL REFERENCES collections(id),
        token_id TEXT NOT NULL,
        name TEXT NOT NULL,
        description TEXT,
        image TEXT,
        is_gif INTEGER NOT NULL,
        attributes TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (collection_id, token_id)
    )",
];

pub struct SqliteCollectionStore {
    pool: SqlitePool,
}

impl SqliteCollectionStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid database url {url}"))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("failed to open database")?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// In-memory database for tests. A single connection keeps every query
    /// on the same in-memory instance.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("schema migration failed")?;
        }
        Ok(())
    }

    #[cfg(test)]
    async fn failed_ids(&self, collection_id: &str) -> Result<Option<String>> {
        let id = parse_id(collection_id)?;
        let row =
            sqlx::query("SELECT failed_ids FROM collection_info WHERE collection_id = ?")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.try_get("failed_ids")?)
    }

    #[cfg(test)]
    async fn token_count(&self, collection_id: &str) -> Result<i64> {
        let id = parse_id(collection_id)?;
        let count =
            sqlx::query_scalar("SELECT COUNT(*) FROM tokens WHERE collection_id = ?")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

fn parse_id(collection_id: &str) -> Result<i64> {
    collection_id
        .parse::<i64>()
        .with_context(|| format!("invalid collection id {collection_id}"))
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<CollectionRecord> {
    let id: i64 = row.try_get("id")?;
    let total_supply: i64 = row.try_get("total_supply")?;
    Ok(CollectionRecord {
        id: id.to_string(),
        address: row.try_get("address")?,
        total_supply: u64::try_from(total_supply).unwrap_or_default(),
        only_gif: row.try_get("only_gif")?,
        modified_name: row.try_get("modified_name")?,
    })
}

#[async_trait]
impl CollectionStore for SqliteCollectionStore {
    async fn find_collection(&self, address: &str) -> Result<Option<CollectionRecord>> {
        let row = sqlx::query(
            "SELECT c.id, c.address, c.total_supply, i.only_gif, i.modified_name
             FROM collections c
             JOIN collection_info i ON i.collection_id = c.id
             WHERE c.address = ?",
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn store_collection_if_absent(
        &self,
        data: &NewCollection,
        total_supply: u64,
    ) -> Result<CollectionRecord> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query(
            "SELECT c.id, c.address, c.total_supply, i.only_gif, i.modified_name
             FROM collections c
             JOIN collection_info i ON i.collection_id = c.id
             WHERE c.address = ?",
        )
        .bind(&data.address)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(row) = existing {
            return record_from_row(&row);
        }

        let now = Utc::now().to_rfc3339();
        let supply = i64::try_from(total_supply).context("total supply out of range")?;
        sqlx::query(
            "INSERT INTO collections
                 (address, owner, name, description, symbol, total_supply, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&data.address)
        .bind(&data.owner)
        .bind(&data.name)
        .bind(&data.description)
        .bind(&data.symbol)
        .bind(supply)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let id: i64 = sqlx::query_scalar("SELECT last_insert_rowid()")
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO collection_info
                 (collection_id, only_gif, modified_name, failed_ids, created_at, updated_at)
             VALUES (?, ?, ?, NULL, ?, ?)",
        )
        .bind(id)
        .bind(data.only_gif)
        .bind(data.modified_name)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            target: "publisher_storage::sqlite",
            collection_id = id,
            address = %data.address,
            "stored new collection"
        );
        Ok(CollectionRecord {
            id: id.to_string(),
            address: data.address.clone(),
            total_supply,
            only_gif: data.only_gif,
            modified_name: data.modified_name,
        })
    }

    async fn update_total_supply(&self, collection_id: &str, total_supply: u64) -> Result<()> {
        let id = parse_id(collection_id)?;
        let supply = i64::try_from(total_supply).context("total supply out of range")?;
        sqlx::query("UPDATE collections SET total_supply = ?, updated_at = ? WHERE id = ?")
            .bind(supply)
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn store_token(&self, collection_id: &str, token: &TokenMetadata) -> Result<()> {
        let id = parse_id(collection_id)?;
        let attributes =
            serde_json::to_string(&token.attributes).context("failed to encode attributes")?;
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO tokens
                 (collection_id, token_id, name, description, image, is_gif, attributes,
                  created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (collection_id, token_id) DO UPDATE SET
                 name = excluded.name,
                 description = excluded.description,
                 image = excluded.image,
                 is_gif = excluded.is_gif,
                 attributes = excluded.attributes,
                 updated_at = excluded.updated_at",
        )
        .bind(id)
        .bind(&token.token_id)
        .bind(&token.name)
        .bind(&token.description)
        .bind(&token.image)
        .bind(token.is_gif)
        .bind(attributes)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn store_failed_ids(&self, collection_id: &str, ids: &str) -> Result<()> {
        let id = parse_id(collection_id)?;
        sqlx::query(
            "UPDATE collection_info SET failed_ids = ?, updated_at = ? WHERE collection_id = ?",
        )
        .bind(ids)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_collection(&self, collection_id: &str) -> Result<()> {
        let id = parse_id(collection_id)?;
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM tokens WHERE collection_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM collection_info WHERE collection_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM collections WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
