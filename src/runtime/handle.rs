//! Storage facade handle, configuration, and error taxonomy.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::{
    canvas::{Canvas, CanvasCandidate},
    core::{
        cache::RenderCache,
        validate::{Mode, ValidationError, validate},
    },
    persist::{
        BulkReport, CanvasStore, PageQuery, PersistError, PersistResult,
        sqlite::{SqliteCanvasStore, StoreOptions},
    },
    render::{RenderError, Renderer, render_canvas},
    types::{LATEST_TOKEN, RANDOM_TOKEN, SortOrder},
};

use super::{dump, events::StorageEvent};

/// Failure surfaced to collaborators.
///
/// `Display` is the user-facing message; `source()` carries the cause for
/// server-side logging.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The candidate broke a canvas rule.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The name is taken.
    #[error("a canvas with that name may already exist")]
    Conflict(#[source] PersistError),
    /// No canvas matched the lookup.
    #[error("no such canvas")]
    NotFound,
    /// The store failed.
    #[error("storage is unavailable, try again later")]
    Storage(#[source] PersistError),
    /// The canvas exists but could not be rendered.
    #[error("canvas could not be rendered")]
    Render(#[source] RenderError),
}

/// Result alias for facade calls.
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage settings. Every field has a default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file.
    pub db_path: PathBuf,
    /// Snapshot JSON file.
    pub snapshot_path: PathBuf,
    /// Seconds between snapshot dumps; 0 dumps once at start-up only.
    pub dump_interval_secs: u64,
    /// Rows fetched per page while dumping.
    pub dump_page_size: usize,
    /// Rows per gallery page.
    pub gallery_page_size: usize,
    /// Render cache budget in bytes.
    pub cache_capacity_bytes: usize,
    /// SQLite lock-wait timeout.
    pub busy_timeout_ms: u64,
    /// Most pooled SQLite connections open at once.
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("canvases.db"),
            snapshot_path: PathBuf::from("canvases.json"),
            dump_interval_secs: 3600,
            dump_page_size: 200,
            gallery_page_size: 12,
            cache_capacity_bytes: 32 * 1024 * 1024,
            busy_timeout_ms: 5_000,
            max_connections: 8,
        }
    }
}

impl StorageConfig {
    /// Reads a JSON config file; absent keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> PersistResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Entry point for collaborators: validation, storage, rendering and dumps.
///
/// A value of this type always wraps an opened store.
pub struct CanvasStorage {
    store: Arc<dyn CanvasStore>,
    cache: Arc<RenderCache>,
    renderer: Arc<dyn Renderer>,
    config: Arc<StorageConfig>,
    events_tx: broadcast::Sender<StorageEvent>,
}

impl Clone for CanvasStorage {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            renderer: Arc::clone(&self.renderer),
            config: Arc::clone(&self.config),
            events_tx: self.events_tx.clone(),
        }
    }
}

impl CanvasStorage {
    /// Opens the SQLite store at `config.db_path`, creating the schema if
    /// needed. Failure here is fatal for the caller.
    pub async fn open(config: StorageConfig, renderer: impl Renderer) -> StorageResult<Self> {
        let path = config.db_path.clone();
        let options = StoreOptions {
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
            max_connections: config.max_connections,
        };
        let opened =
            tokio::task::spawn_blocking(move || SqliteCanvasStore::open_with(path, options))
                .await
                .map_err(|e| PersistError::Message(format!("join error: {e}")))
                .and_then(|opened| opened);
        let store = opened.map_err(|err| {
            error!(path = %config.db_path.display(), error = %err, "failed to open canvas store");
            StorageError::Storage(err)
        })?;
        Ok(Self::with_store(Box::new(store), renderer, config))
    }

    /// Wraps an already opened store.
    pub fn with_store(
        store: Box<dyn CanvasStore>,
        renderer: impl Renderer,
        config: StorageConfig,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(256);
        Self {
            store: Arc::from(store),
            cache: Arc::new(RenderCache::new(config.cache_capacity_bytes)),
            renderer: Arc::new(renderer),
            config: Arc::new(config),
            events_tx,
        }
    }

    /// Subscribes to storage events.
    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events_tx.subscribe()
    }

    /// Active configuration.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Shared render cache.
    pub fn cache(&self) -> &RenderCache {
        &self.cache
    }

    /// Validates strictly and stores a new canvas.
    pub async fn new_canvas(&self, candidate: CanvasCandidate) -> StorageResult<String> {
        let canvas = validate(candidate, Mode::Strict, Utc::now())?;
        let name = canvas.name.clone();

        match self.run(move |store| store.insert(&canvas)).await {
            Ok(()) => {
                info!(name = %name, "stored canvas");
                let _ = self.events_tx.send(StorageEvent::Created { name: name.clone() });
                Ok(format!("canvas \"{name}\" saved"))
            }
            Err(err @ PersistError::Conflict { .. }) => {
                debug!(name = %name, "rejected duplicate canvas name");
                Err(StorageError::Conflict(err))
            }
            Err(err) => Err(storage_failure("insert", err)),
        }
    }

    /// Historical import: every candidate is validated leniently before
    /// anything is written, so one structural failure aborts the batch.
    ///
    /// Validation runs on a blocking thread; large batches are CPU-bound.
    pub async fn bulk_import(&self, candidates: Vec<CanvasCandidate>) -> StorageResult<BulkReport> {
        let now = Utc::now();
        let canvases = tokio::task::spawn_blocking(move || validate_batch(candidates, now))
            .await
            .map_err(|e| {
                storage_failure("validate", PersistError::Message(format!("join error: {e}")))
            })??;

        let report = self
            .run(move |store| store.bulk_insert(&canvases))
            .await
            .map_err(|err| storage_failure("bulk_insert", err))?;

        let _ = self.events_tx.send(StorageEvent::BulkImported {
            inserted: report.inserted,
            skipped: report.skipped.len(),
        });
        Ok(report)
    }

    /// Reads a snapshot file and feeds its records to [`Self::bulk_import`].
    pub async fn import_snapshot(&self, path: impl AsRef<Path>) -> StorageResult<BulkReport> {
        let bytes = tokio::fs::read(path.as_ref())
            .await
            .map_err(|err| storage_failure("read_snapshot", err.into()))?;
        let candidates: Vec<CanvasCandidate> = serde_json::from_slice(&bytes)
            .map_err(|err| ValidationError::Malformed(err.to_string()))?;
        self.bulk_import(candidates).await
    }

    /// Resolves `random`, `latest`, or a literal name.
    pub async fn get_canvas(&self, query: &str) -> StorageResult<Canvas> {
        let found = match query {
            RANDOM_TOKEN => self.run(|store| store.get_random()).await,
            LATEST_TOKEN => self.run(|store| store.get_latest()).await,
            name => {
                let name = name.to_string();
                self.run(move |store| store.get_by_name(&name)).await
            }
        };
        found
            .map_err(|err| storage_failure("get_canvas", err))?
            .ok_or(StorageError::NotFound)
    }

    /// One gallery page of `gallery_page_size` rows, optionally name-searched.
    pub async fn get_gallery(
        &self,
        search: Option<&str>,
        page: usize,
        order: SortOrder,
    ) -> StorageResult<Vec<Canvas>> {
        let limit = self.config.gallery_page_size;
        let query = PageQuery {
            search: search.map(str::to_string),
            offset: page.saturating_mul(limit),
            limit,
            order,
        };
        self.run(move |store| store.get_page(&query))
            .await
            .map_err(|err| storage_failure("get_page", err))
    }

    /// Rendered bytes for `name`, served from the cache when possible.
    pub async fn get_image(&self, name: &str) -> StorageResult<Arc<[u8]>> {
        if let Some(bytes) = self.cache.get(name) {
            return Ok(bytes);
        }

        let owned = name.to_string();
        let canvas = self
            .run(move |store| store.get_by_name(&owned))
            .await
            .map_err(|err| storage_failure("get_by_name", err))?
            .ok_or(StorageError::NotFound)?;

        let renderer = Arc::clone(&self.renderer);
        let rendered =
            tokio::task::spawn_blocking(move || render_canvas(renderer.as_ref(), &canvas))
                .await
                .map_err(|e| RenderError::new(format!("render task failed: {e}")))
                .and_then(|out| out)
                .map_err(|err| {
                    error!(name = %name, error = %err, "render failed");
                    StorageError::Render(err)
                })?;

        let bytes: Arc<[u8]> = Arc::from(rendered);
        self.cache.put(name, Arc::clone(&bytes));
        Ok(bytes)
    }

    /// Removes a canvas. Cached renders are left to age out.
    pub async fn delete_canvas(&self, name: &str) -> StorageResult<()> {
        let owned = name.to_string();
        let removed = self
            .run(move |store| store.delete(&owned))
            .await
            .map_err(|err| storage_failure("delete", err))?;
        if !removed {
            return Err(StorageError::NotFound);
        }
        info!(name = %name, "deleted canvas");
        let _ = self.events_tx.send(StorageEvent::Deleted {
            name: name.to_string(),
        });
        Ok(())
    }

    /// Number of stored canvases.
    pub async fn count(&self) -> StorageResult<usize> {
        self.run(|store| store.count())
            .await
            .map_err(|err| storage_failure("count", err))
    }

    /// Oldest-first page walk over every canvas, one fetch per page.
    pub fn pages(&self) -> CanvasPages {
        CanvasPages {
            storage: self.clone(),
            offset: 0,
            page_size: self.config.dump_page_size.max(1),
            done: false,
        }
    }

    /// Writes a full snapshot to `path` via a temp file and atomic rename.
    pub async fn dump_snapshot(&self, path: impl AsRef<Path>) -> StorageResult<usize> {
        let records = dump::write_snapshot(self, path.as_ref())
            .await
            .map_err(|err| storage_failure("dump_snapshot", err))?;
        let _ = self.events_tx.send(StorageEvent::SnapshotWritten { records });
        Ok(records)
    }

    async fn run<T, F>(&self, f: F) -> PersistResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn CanvasStore) -> PersistResult<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| PersistError::Message(format!("join error: {e}")))?
    }
}

/// Lazy page sequence produced by [`CanvasStorage::pages`].
///
/// Each [`CanvasPages::next_page`] is a separate store call; no transaction
/// spans the walk.
pub struct CanvasPages {
    storage: CanvasStorage,
    offset: usize,
    page_size: usize,
    done: bool,
}

impl CanvasPages {
    /// Fetches the next page, or `None` once a page comes back empty.
    pub async fn next_page(&mut self) -> PersistResult<Option<Vec<Canvas>>> {
        if self.done {
            return Ok(None);
        }
        let query = PageQuery {
            search: None,
            offset: self.offset,
            limit: self.page_size,
            order: SortOrder::Asc,
        };
        let page = self.storage.run(move |store| store.get_page(&query)).await?;
        if page.is_empty() {
            self.done = true;
            return Ok(None);
        }
        self.offset += page.len();
        Ok(Some(page))
    }
}

fn validate_batch(
    candidates: Vec<CanvasCandidate>,
    now: DateTime<Utc>,
) -> Result<Vec<Canvas>, ValidationError> {
    candidates
        .into_iter()
        .enumerate()
        .map(|(idx, candidate)| {
            validate(candidate, Mode::Lenient, now).inspect_err(|err| {
                warn!(index = idx, error = %err, "bulk import rejected");
            })
        })
        .collect()
}

fn storage_failure(operation: &'static str, err: PersistError) -> StorageError {
    error!(operation, error = %err, "storage operation failed");
    StorageError::Storage(err)
}
