//! Background task that persists session transfer events to the transfer log.

use std::collections::HashMap;

use anyhow::Result;

use super::{TransferEvent, TransferLogDb};

/// Receive transfer events and mirror them into the `transfers` table until
/// every sender is dropped. DB failures are logged and skipped: the log feeds
/// the rate monitor, it never fails a transfer.
pub async fn run_transfer_log_loop(
    mut rx: tokio::sync::mpsc::Receiver<TransferEvent>,
    db: TransferLogDb,
) -> Result<()> {
    let mut rows: HashMap<u64, i64> = HashMap::new();
    while let Some(event) = rx.recv().await {
        match event {
            TransferEvent::Started { id, identity, path } => {
                match db.insert_started(&identity, &path).await {
                    Ok(row) => {
                        rows.insert(id, row);
                    }
                    Err(e) => tracing::warn!(transfer = id, "transfer log insert failed: {:#}", e),
                }
            }
            TransferEvent::Progress {
                id,
                elapsed_secs,
                bytes,
            } => {
                let Some(&row) = rows.get(&id) else {
                    continue;
                };
                if let Err(e) = db.update_progress(row, elapsed_secs, bytes).await {
                    tracing::warn!(transfer = id, "transfer log update failed: {:#}", e);
                }
            }
            TransferEvent::Finished {
                id,
                ok,
                elapsed_secs,
                bytes,
            } => {
                let Some(row) = rows.remove(&id) else {
                    continue;
                };
                if let Err(e) = db.finish(row, ok, elapsed_secs, bytes).await {
                    tracing::warn!(transfer = id, "transfer log finish failed: {:#}", e);
                }
            }
        }
    }
    Ok(())
}
