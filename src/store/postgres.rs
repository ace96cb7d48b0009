use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Row, Transaction};
use std::collections::BTreeSet;

use crate::model::{CodeValueUpdate, LabelMap};
use crate::store::traits::{code_value_problems, ChangeLogStore, CodeListStore, LabelStore};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS labels (
        label_id TEXT NOT NULL,
        lang TEXT NOT NULL,
        text TEXT NOT NULL,
        PRIMARY KEY (label_id, lang)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS label_definitions (
        label_id TEXT NOT NULL,
        definition_id TEXT NOT NULL,
        PRIMARY KEY (label_id, definition_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS code_lists (
        id TEXT PRIMARY KEY
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS code_values (
        code_list_id TEXT NOT NULL REFERENCES code_lists (id),
        value TEXT NOT NULL,
        lang TEXT NOT NULL,
        description TEXT NOT NULL,
        PRIMARY KEY (code_list_id, value, lang)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS model_changes (
        change_index BIGINT PRIMARY KEY,
        deployed BOOLEAN NOT NULL DEFAULT FALSE,
        deployed_at TIMESTAMPTZ
    )
    "#,
];

/// Relational sinks: labels, code values and the deployed state of the change log
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Create the tables used by the store if they do not exist
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to run database migrations")?;
        }
        Ok(())
    }

    async fn replace_labels_tx(
        tx: &mut Transaction<'_, Postgres>,
        label_id: &str,
        labels: &LabelMap,
    ) -> Result<()> {
        sqlx::query("DELETE FROM labels WHERE label_id = $1")
            .bind(label_id)
            .execute(&mut **tx)
            .await
            .context("Failed to clear label texts")?;

        for (lang, text) in labels {
            sqlx::query("INSERT INTO labels (label_id, lang, text) VALUES ($1, $2, $3)")
                .bind(label_id)
                .bind(lang)
                .bind(text)
                .execute(&mut **tx)
                .await
                .context("Failed to insert label text")?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl LabelStore for PostgresStore {
    async fn save_labels(&self, label_id: &str, definition_id: &str, labels: &LabelMap) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        // Replace texts, then record the defining definition
        Self::replace_labels_tx(&mut tx, label_id, labels).await?;
        sqlx::query(
            r#"
            INSERT INTO label_definitions (label_id, definition_id)
            VALUES ($1, $2)
            ON CONFLICT (label_id, definition_id) DO NOTHING
            "#,
        )
        .bind(label_id)
        .bind(definition_id)
        .execute(&mut *tx)
        .await
        .context("Failed to record label definition")?;

        tx.commit().await.context("Failed to commit label save")?;
        Ok(())
    }

    async fn remove_labels(&self, label_id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let texts = sqlx::query("DELETE FROM labels WHERE label_id = $1")
            .bind(label_id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete label texts")?;
        let definitions = sqlx::query("DELETE FROM label_definitions WHERE label_id = $1")
            .bind(label_id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete label definitions")?;

        // Texts and definition links go together
        tx.commit().await.context("Failed to commit label removal")?;
        Ok(texts.rows_affected() + definitions.rows_affected() > 0)
    }

    async fn defined_in(&self, label_id: &str) -> Result<BTreeSet<String>> {
        let rows = sqlx::query("SELECT definition_id FROM label_definitions WHERE label_id = $1")
            .bind(label_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch label definitions")?;

        Ok(rows.into_iter().map(|row| row.get("definition_id")).collect())
    }
}

#[async_trait::async_trait]
impl CodeListStore for PostgresStore {
    async fn validate_code_value(&self, update: &CodeValueUpdate) -> Result<Vec<String>> {
        let exists = sqlx::query("SELECT 1 FROM code_lists WHERE id = $1")
            .bind(&update.code_list_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to look up code list")?
            .is_some();

        let mut errors = Vec::new();
        if !exists {
            errors.push(format!("Code list {} does not exist", update.code_list_id));
        }
        errors.extend(code_value_problems(update));
        Ok(errors)
    }

    async fn save_code_value(&self, update: &CodeValueUpdate) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        // Descriptions are replaced as a whole
        sqlx::query("DELETE FROM code_values WHERE code_list_id = $1 AND value = $2")
            .bind(&update.code_list_id)
            .bind(&update.value)
            .execute(&mut *tx)
            .await
            .context("Failed to clear code value descriptions")?;

        for (lang, description) in &update.descriptions {
            sqlx::query(
                r#"
                INSERT INTO code_values (code_list_id, value, lang, description)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(&update.code_list_id)
            .bind(&update.value)
            .bind(lang)
            .bind(description)
            .execute(&mut *tx)
            .await
            .context("Failed to insert code value description")?;
        }

        tx.commit().await.context("Failed to commit code value")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ChangeLogStore for PostgresStore {
    async fn mark_as_deployed(&self, indices: &BTreeSet<i64>) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let now = Utc::now();

        // Upsert, an index may be marked more than once
        for index in indices {
            sqlx::query(
                r#"
                INSERT INTO model_changes (change_index, deployed, deployed_at)
                VALUES ($1, TRUE, $2)
                ON CONFLICT (change_index) DO UPDATE SET
                    deployed = TRUE,
                    deployed_at = EXCLUDED.deployed_at
                "#,
            )
            .bind(index)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("Failed to mark change as deployed")?;
        }

        tx.commit().await.context("Failed to commit deployed changes")?;
        Ok(())
    }

    async fn deployed_indices(&self) -> Result<BTreeSet<i64>> {
        let rows = sqlx::query("SELECT change_index FROM model_changes WHERE deployed")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch deployed changes")?;

        Ok(rows.into_iter().map(|row| row.get("change_index")).collect())
    }
}
