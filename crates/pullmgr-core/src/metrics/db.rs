//! SQLite-backed transfer log.
//!
//! One row per file transfer: created as `In Progress` with its start time,
//! updated with elapsed time and bytes while the copy runs, then closed as
//! `Success` or `Failed`.

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::Path;

use super::TransferSample;
use crate::session::SessionIdentity;

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// Transfer row status stored as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    InProgress,
    Success,
    Failed,
    Abandoned,
}

impl TransferStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransferStatus::InProgress => "In Progress",
            TransferStatus::Success => "Success",
            TransferStatus::Failed => "Failed",
            TransferStatus::Abandoned => "Abandoned",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "In Progress" => TransferStatus::InProgress,
            "Success" => TransferStatus::Success,
            "Failed" => TransferStatus::Failed,
            _ => TransferStatus::Abandoned,
        }
    }
}

/// One row of the transfer log.
#[derive(Debug, Clone)]
pub struct TransferRecord {
    pub id: i64,
    pub identity: SessionIdentity,
    pub path: String,
    pub status: TransferStatus,
    pub transfer_time: f64,
    pub transfer_bytes: i64,
}

/// Handle to the transfer log database.
#[derive(Clone)]
pub struct TransferLogDb {
    pub(crate) pool: Pool<Sqlite>,
}

impl TransferLogDb {
    /// Open (or create) the database at `path`. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&uri)
            .await?;
        let db = TransferLogDb { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transfers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                host TEXT NOT NULL,
                mailbox TEXT NOT NULL,
                action TEXT NOT NULL,
                path TEXT NOT NULL,
                status TEXT NOT NULL,
                transfer_time REAL NOT NULL DEFAULT 0,
                transfer_bytes INTEGER NOT NULL DEFAULT 0,
                started_at REAL NOT NULL DEFAULT 0
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        // Logs created before start times were recorded.
        let (has_started_at,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM pragma_table_info('transfers') WHERE name = 'started_at'",
        )
        .fetch_one(&self.pool)
        .await?;
        if has_started_at == 0 {
            sqlx::query("ALTER TABLE transfers ADD COLUMN started_at REAL NOT NULL DEFAULT 0")
                .execute(&self.pool)
                .await?;
        }
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS transfers_by_action ON transfers (host, mailbox, action, status)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark rows left `In Progress` by a previous process as abandoned, so the
    /// rate monitor never samples a transfer that is no longer running.
    pub async fn recover_in_progress(&self) -> Result<u64> {
        let res = sqlx::query("UPDATE transfers SET status = ? WHERE status = ?")
            .bind(TransferStatus::Abandoned.as_str())
            .bind(TransferStatus::InProgress.as_str())
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }

    pub async fn insert_started(&self, identity: &SessionIdentity, path: &str) -> Result<i64> {
        let res = sqlx::query(
            "INSERT INTO transfers (host, mailbox, action, path, status, started_at) \
             VALUES (?, ?, ?, ?, ?, julianday('now'))",
        )
        .bind(identity.host.as_str())
        .bind(identity.mailbox.as_str())
        .bind(identity.action.as_str())
        .bind(path)
        .bind(TransferStatus::InProgress.as_str())
        .execute(&self.pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    pub async fn update_progress(&self, row: i64, elapsed_secs: f64, bytes: u64) -> Result<()> {
        sqlx::query("UPDATE transfers SET transfer_time = ?, transfer_bytes = ? WHERE id = ?")
            .bind(elapsed_secs)
            .bind(bytes as i64)
            .bind(row)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn finish(&self, row: i64, ok: bool, elapsed_secs: f64, bytes: u64) -> Result<()> {
        let status = if ok {
            TransferStatus::Success
        } else {
            TransferStatus::Failed
        };
        sqlx::query(
            "UPDATE transfers SET status = ?, transfer_time = ?, transfer_bytes = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(elapsed_secs)
        .bind(bytes as i64)
        .bind(row)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Newest rows first.
    pub async fn recent(&self, limit: u32) -> Result<Vec<TransferRecord>> {
        let rows: Vec<(i64, String, String, String, String, String, f64, i64)> = sqlx::query_as(
            "SELECT id, host, mailbox, action, path, status, transfer_time, transfer_bytes \
             FROM transfers ORDER BY id DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(
                |(id, host, mailbox, action, path, status, transfer_time, transfer_bytes)| {
                    TransferRecord {
                        id,
                        identity: SessionIdentity {
                            host,
                            mailbox,
                            action,
                        },
                        path,
                        status: TransferStatus::from_str(&status),
                        transfer_time,
                        transfer_bytes,
                    }
                },
            )
            .collect())
    }
}

/// Sample the newest in-progress transfer for `identity`.
///
/// Elapsed time is measured from the row's start time at query time, so a
/// transfer that stops reporting progress still ages and its rate falls.
pub(crate) async fn query_in_progress<'e, E>(
    executor: E,
    identity: &SessionIdentity,
) -> Result<Option<TransferSample>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row: Option<(f64, i64)> = sqlx::query_as(
        "SELECT MAX(transfer_time, (julianday('now') - started_at) * 86400.0), transfer_bytes \
         FROM transfers \
         WHERE host = ? AND mailbox = ? AND action = ? AND status = ? \
         ORDER BY id DESC LIMIT 1",
    )
    .bind(identity.host.as_str())
    .bind(identity.mailbox.as_str())
    .bind(identity.action.as_str())
    .bind(TransferStatus::InProgress.as_str())
    .fetch_optional(executor)
    .await?;
    Ok(row.map(|(elapsed_secs, bytes)| TransferSample {
        elapsed_secs,
        bytes: bytes.max(0) as u64,
    }))
}

#[cfg(test)]
/// Open an in-memory database for tests (no disk I/O).
pub(crate) async fn open_memory() -> Result<TransferLogDb> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let db = TransferLogDb { pool };
    db.migrate().await?;
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident() -> SessionIdentity {
        SessionIdentity::new("partner", "acme", "receive")
    }

    #[tokio::test]
    async fn in_progress_row_is_sampled_until_finished() {
        let db = open_memory().await.unwrap();
        assert!(query_in_progress(&db.pool, &ident()).await.unwrap().is_none());

        let row = db.insert_started(&ident(), "a.bin").await.unwrap();
        db.update_progress(row, 2.5, 4096).await.unwrap();
        let sample = query_in_progress(&db.pool, &ident()).await.unwrap().unwrap();
        assert_eq!(sample.elapsed_secs, 2.5);
        assert_eq!(sample.bytes, 4096);

        let other = SessionIdentity::new("partner", "acme", "send");
        assert!(query_in_progress(&db.pool, &other).await.unwrap().is_none());

        db.finish(row, true, 3.0, 8192).await.unwrap();
        assert!(query_in_progress(&db.pool, &ident()).await.unwrap().is_none());

        let recent = db.recent(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].status, TransferStatus::Success);
        assert_eq!(recent[0].transfer_bytes, 8192);
        assert_eq!(recent[0].identity, ident());
    }

    #[tokio::test]
    async fn stalled_transfer_keeps_aging() {
        let db = open_memory().await.unwrap();
        let row = db.insert_started(&ident(), "stuck.bin").await.unwrap();
        db.update_progress(row, 0.3, 1024).await.unwrap();
        // Started three seconds ago, no progress since the first report.
        sqlx::query("UPDATE transfers SET started_at = julianday('now') - 3.0 / 86400.0 WHERE id = ?")
            .bind(row)
            .execute(&db.pool)
            .await
            .unwrap();

        let sample = query_in_progress(&db.pool, &ident()).await.unwrap().unwrap();
        assert!(sample.elapsed_secs >= 2.9, "elapsed {}", sample.elapsed_secs);
        assert_eq!(sample.bytes, 1024);
        assert!(sample.rate_kbps().unwrap() < 0.5);
    }

    #[tokio::test]
    async fn migrate_adds_start_time_to_older_logs() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE transfers (id INTEGER PRIMARY KEY AUTOINCREMENT, host TEXT NOT NULL, \
             mailbox TEXT NOT NULL, action TEXT NOT NULL, path TEXT NOT NULL, status TEXT NOT NULL, \
             transfer_time REAL NOT NULL DEFAULT 0, transfer_bytes INTEGER NOT NULL DEFAULT 0)",
        )
        .execute(&pool)
        .await
        .unwrap();
        let db = TransferLogDb { pool };
        db.migrate().await.unwrap();
        db.migrate().await.unwrap();
        db.insert_started(&ident(), "a.bin").await.unwrap();
        assert!(query_in_progress(&db.pool, &ident()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn recover_marks_stale_rows_abandoned() {
        let db = open_memory().await.unwrap();
        let row = db.insert_started(&ident(), "a.bin").await.unwrap();
        let done = db.insert_started(&ident(), "b.bin").await.unwrap();
        db.finish(done, false, 1.0, 10).await.unwrap();

        assert_eq!(db.recover_in_progress().await.unwrap(), 1);
        let recent = db.recent(10).await.unwrap();
        let stale = recent.iter().find(|r| r.id == row).unwrap();
        assert_eq!(stale.status, TransferStatus::Abandoned);
        let failed = recent.iter().find(|r| r.id == done).unwrap();
        assert_eq!(failed.status, TransferStatus::Failed);
    }

    #[tokio::test]
    async fn open_at_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state dir").join("transfers.db");
        let db = TransferLogDb::open_at(&path).await.unwrap();
        db.insert_started(&ident(), "x").await.unwrap();
        assert!(path.exists());
    }
}
