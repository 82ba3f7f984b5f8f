use std::time::Duration;

use async_trait::async_trait;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};

use crate::application::{AppError, AppResult, WatchRepository};
use crate::domain::{PushSubscription, Watch};

pub struct SqliteWatchRepository {
    pool: SqlitePool,
}

type WatchRow = (String, String, Option<String>);

impl SqliteWatchRepository {
    /// db_url examples
    /// - "sqlite:/data/watches.db?mode=rwc" (docker volume)
    /// - "sqlite::memory:"
    pub async fn new(db_url: &str) -> AppResult<Self> {
        // every connection to an in-memory database gets its own database
        let in_memory = db_url.contains(":memory:");
        let (max_connections, idle_timeout) = if in_memory {
            (1, None)
        } else {
            (5, Some(Duration::from_secs(600)))
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(idle_timeout)
            .connect(db_url)
            .await
            .map_err(storage)?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> AppResult<()> {
        // keywords / subscription are stored as JSON text
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS watches (
              email TEXT PRIMARY KEY,
              keywords TEXT NOT NULL,
              subscription TEXT,
              position INTEGER NOT NULL
            );
          "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(())
    }

    async fn save(&self, watch: &Watch) -> AppResult<()> {
        let keywords = serde_json::to_string(&watch.keywords)
            .map_err(|e| AppError::Storage(e.to_string()))?;
        let subscription = watch
            .subscription
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| AppError::Storage(e.to_string()))?;

        sqlx::query("UPDATE watches SET keywords = ?, subscription = ? WHERE email = ?")
            .bind(keywords)
            .bind(subscription)
            .bind(&watch.email)
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        Ok(())
    }

    async fn modify<F>(&self, email: &str, f: F) -> AppResult<Watch>
    where
        F: FnOnce(&mut Watch) + Send,
    {
        let mut watch = self.get_watch(email).await?;
        f(&mut watch);
        self.save(&watch).await?;
        Ok(watch)
    }
}

fn storage(e: sqlx::Error) -> AppError {
    AppError::Storage(e.to_string())
}

fn row_to_watch((email, keywords, subscription): WatchRow) -> AppResult<Watch> {
    let keywords: Vec<String> =
        serde_json::from_str(&keywords).map_err(|e| AppError::Storage(e.to_string()))?;
    let subscription: Option<PushSubscription> = subscription
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| AppError::Storage(e.to_string()))?;

    Ok(Watch {
        email,
        keywords,
        subscription,
    })
}

#[async_trait]
impl WatchRepository for SqliteWatchRepository {
    async fn list_watches(&self) -> AppResult<Vec<Watch>> {
        let rows: Vec<WatchRow> =
            sqlx::query_as("SELECT email, keywords, subscription FROM watches ORDER BY position")
                .fetch_all(&self.pool)
                .await
                .map_err(storage)?;

        rows.into_iter().map(row_to_watch).collect()
    }

    async fn get_watch(&self, email: &str) -> AppResult<Watch> {
        let row: Option<WatchRow> = sqlx::query_as(
            "SELECT email, keywords, subscription FROM watches WHERE email = ? LIMIT 1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        match row {
            Some(r) => row_to_watch(r),
            None => Err(AppError::NotFound(email.to_string())),
        }
    }

    async fn create_watch(&self, email: &str) -> AppResult<Watch> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO watches(email, keywords, subscription, position)
            VALUES (?, '[]', NULL, (SELECT COALESCE(MAX(position), 0) + 1 FROM watches))
            "#,
        )
        .bind(email)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(email.to_string()));
        }
        Ok(Watch::new(email))
    }

    async fn remove_watch(&self, email: &str) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM watches WHERE email = ?")
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(email.to_string()));
        }
        Ok(())
    }

    async fn add_keyword(&self, email: &str, keyword: &str) -> AppResult<Watch> {
        self.modify(email, |w| {
            w.add_keyword(keyword);
        })
        .await
    }

    async fn remove_keyword(&self, email: &str, keyword: &str) -> AppResult<Watch> {
        self.modify(email, |w| {
            w.remove_keyword(keyword);
        })
        .await
    }

    async fn set_keywords(&self, email: &str, keywords: Vec<String>) -> AppResult<Watch> {
        self.modify(email, |w| w.set_keywords(keywords)).await
    }

    async fn set_subscription(
        &self,
        email: &str,
        subscription: Option<PushSubscription>,
    ) -> AppResult<Watch> {
        self.modify(email, |w| w.subscription = subscription).await
    }

    async fn reset_watches(&self) -> AppResult<()> {
        sqlx::query("DELETE FROM watches")
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }
}
