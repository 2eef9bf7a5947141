//! `MetricsPool` over the transfer log's SQLite connection pool.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::Sqlite;

use super::db::{query_in_progress, TransferLogDb};
use super::{MetricsPool, MetricsSource, TransferSample};
use crate::session::SessionIdentity;

/// Hands out pooled connections to the transfer log.
#[derive(Clone)]
pub struct SqliteMetricsPool {
    db: TransferLogDb,
}

impl SqliteMetricsPool {
    pub fn new(db: TransferLogDb) -> Self {
        Self { db }
    }
}

/// A checked-out connection; returned to the pool on release.
pub struct SqliteMetricsHandle {
    conn: PoolConnection<Sqlite>,
}

#[async_trait]
impl MetricsSource for SqliteMetricsHandle {
    async fn query(&mut self, identity: &SessionIdentity) -> Result<Option<TransferSample>> {
        query_in_progress(&mut *self.conn, identity)
            .await
            .context("query in-progress transfer")
    }
}

#[async_trait]
impl MetricsPool for SqliteMetricsPool {
    type Handle = SqliteMetricsHandle;

    async fn acquire(&self) -> Result<Self::Handle> {
        let conn = self
            .db
            .pool
            .acquire()
            .await
            .context("acquire transfer log connection")?;
        Ok(SqliteMetricsHandle { conn })
    }

    fn release(&self, handle: Self::Handle) {
        drop(handle.conn);
    }
}
