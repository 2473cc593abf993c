/// SQLite backing store
///
/// Connections are opened by `StoreManager` and leased through the
/// `ResourcePool`. Each handle sits behind an async mutex, so two requests
/// that end up sharing a handle under pool exhaustion take turns on it.

pub mod tasks;
pub mod users;

use async_trait::async_trait;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, SqliteConnection};
use std::str::FromStr;
use tokio::sync::Mutex;

use crate::error::{AppError, ConfigError};
use crate::pool::{Manager, Pooled, ResourcePool};

pub type StoreHandle = Mutex<SqliteConnection>;
pub type StorePool = ResourcePool<StoreManager>;
pub type StoreLease = Pooled<StoreHandle>;

pub struct StoreManager {
    options: SqliteConnectOptions,
}

impl StoreManager {
    /// Parse the URL once; every handle then opens the same database.
    /// For `sqlite::memory:` that means one shared in-memory database that
    /// lives as long as any pooled connection does.
    pub fn new(url: &str) -> Result<Self, AppError> {
        let mut options = SqliteConnectOptions::from_str(url)
            .map_err(|e| ConfigError::InvalidValue(format!("database.url: {}", e)))?
            .create_if_missing(true);
        options.log_statements(log::LevelFilter::Debug);

        Ok(Self { options })
    }
}

#[async_trait]
impl Manager for StoreManager {
    type Handle = StoreHandle;
    type Error = sqlx::Error;

    async fn create(&self) -> Result<StoreHandle, sqlx::Error> {
        let conn = self.options.connect().await?;
        tracing::debug!("Opened backing store connection");
        Ok(Mutex::new(conn))
    }
}

/// Create the tables if they do not exist yet
pub async fn bootstrap_schema(conn: &mut SqliteConnection) -> Result<(), AppError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            created_at INTEGER DEFAULT (strftime('%s','now'))
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'todo',
            priority TEXT NOT NULL DEFAULT 'medium',
            module TEXT,
            user_id INTEGER NOT NULL REFERENCES users(id),
            created_at INTEGER DEFAULT (strftime('%s','now'))
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    Ok(())
}
