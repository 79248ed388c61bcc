use std::{
    io,
    sync::{Arc, Mutex},
};

use gridstore::{
    canvas::CanvasCandidate,
    core::grid::Grid,
    persist::sqlite::SqliteCanvasStore,
    render::RenderError,
    runtime::handle::{CanvasStorage, StorageConfig},
};

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log buffer").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// Lenient repairs log from the thread that validates, so the thread name
// on the rename warning shows where bulk validation ran.
#[tokio::test(flavor = "current_thread")]
async fn bulk_validation_runs_off_the_async_thread() {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_thread_names(true)
        .init();

    let store = SqliteCanvasStore::open_in_memory().expect("open");
    let renderer =
        |_: &Grid, _: Option<&Grid>| -> Result<Vec<u8>, RenderError> { Ok(Vec::new()) };
    let storage = CanvasStorage::with_store(Box::new(store), renderer, StorageConfig::default());

    let image = vec!["0".repeat(26); 15].join("\n");
    let report = storage
        .bulk_import(vec![CanvasCandidate::new("random", image)])
        .await
        .expect("import");
    assert_eq!(report.inserted, 1);

    let logs = String::from_utf8_lossy(&buffer.0.lock().expect("log buffer")).into_owned();
    let rename = logs
        .lines()
        .find(|line| line.contains("renamed reserved canvas name"))
        .unwrap_or_else(|| panic!("no rename warning in {logs}"));
    let test_thread = std::thread::current().name().map(str::to_string).unwrap_or_default();
    assert!(!test_thread.is_empty());
    assert!(!rename.contains(&test_thread), "validated on the test thread: {rename}");
}
