//! Snapshot dump: a JSON array of every canvas, replaced atomically.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use tokio::{
    io::{AsyncWriteExt, BufWriter},
    task::JoinHandle,
    time::{Duration, MissedTickBehavior},
};
use tracing::{error, info};

use crate::persist::PersistResult;

use super::handle::CanvasStorage;

/// Streams all canvases, page by page, to `<path>.tmp` and renames it over
/// `path`. Returns the number of records written.
///
/// Readers of `path` only ever see a complete snapshot. A failed dump leaves
/// the previous snapshot in place.
pub async fn write_snapshot(storage: &CanvasStorage, path: &Path) -> PersistResult<usize> {
    let tmp = temp_path(path);
    match stream_to(storage, &tmp).await {
        Ok(records) => {
            tokio::fs::rename(&tmp, path).await?;
            Ok(records)
        }
        Err(err) => {
            let _ = tokio::fs::remove_file(&tmp).await;
            Err(err)
        }
    }
}

async fn stream_to(storage: &CanvasStorage, tmp: &Path) -> PersistResult<usize> {
    let file = tokio::fs::File::create(tmp).await?;
    let mut out = BufWriter::new(file);
    let mut pages = storage.pages();
    let mut records = 0usize;

    out.write_all(b"[").await?;
    while let Some(page) = pages.next_page().await? {
        for canvas in page {
            if records > 0 {
                out.write_all(b",").await?;
            }
            out.write_all(&serde_json::to_vec(&canvas)?).await?;
            records += 1;
        }
    }
    out.write_all(b"]").await?;
    out.flush().await?;
    out.into_inner().sync_all().await?;
    Ok(records)
}

/// Dumps to the configured snapshot path once now, then every
/// `dump_interval_secs` (unless that is 0). Failures are logged and the next
/// tick retries.
///
/// Ticks run one after another on a single task, so scheduled dumps never
/// overlap each other.
pub fn spawn_snapshot_dumps(storage: CanvasStorage) -> JoinHandle<()> {
    tokio::spawn(async move {
        let path = storage.config().snapshot_path.clone();
        let interval_secs = storage.config().dump_interval_secs;

        if interval_secs == 0 {
            dump_once(&storage, &path).await;
            return;
        }

        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            dump_once(&storage, &path).await;
        }
    })
}

async fn dump_once(storage: &CanvasStorage, path: &Path) {
    match storage.dump_snapshot(path).await {
        Ok(records) => info!(records, path = %path.display(), "wrote canvas snapshot"),
        Err(err) => error!(path = %path.display(), error = %err, "canvas snapshot failed"),
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}
