//! Postgres-backed repository implementations.
//!
//! The write and read stores are separate databases, each with its own pool and
//! migration set. The change queue lives in the write database.

mod jobs;
mod tasks_read;
mod tasks_write;
mod types;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use apalis_sql::postgres::PostgresStorage;
use sqlx::{
    migrate::Migrator,
    postgres::{PgPool, PgPoolOptions},
};

static READ_MIGRATOR: Migrator = sqlx::migrate!("./migrations/read");

pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
}

/// Authoritative task store plus the change-queue tables.
#[derive(Clone)]
pub struct WriteRepositories {
    pool: Arc<PgPool>,
}

impl WriteRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply task-table migrations and create the queue schema.
    ///
    /// Both migration sets share `_sqlx_migrations`, so each must tolerate the other's rows.
    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        let mut tasks = sqlx::migrate!("./migrations/write");
        tasks.set_ignore_missing(true);
        tasks.run(pool).await?;

        let mut queue = PostgresStorage::migrations();
        queue.set_ignore_missing(true);
        queue.run(pool).await.map_err(Into::into)
    }
}

/// Derived read model.
#[derive(Clone)]
pub struct ReadRepositories {
    pool: Arc<PgPool>,
}

impl ReadRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        READ_MIGRATOR.run(pool).await.map_err(Into::into)
    }
}
