use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use rusqlite::Connection;
use tokio::sync::oneshot;

use super::migrations::run_migrations;

const WORKER_NAME: &str = "qsdash-store";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

type StoreJob = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum StoreCommand {
    Run(StoreJob),
    Close,
}

/// Owns the worker thread; the last `RecordStore` clone to go away closes it.
struct StoreWorker {
    jobs: mpsc::Sender<StoreCommand>,
    handle: Mutex<Option<JoinHandle<()>>>,
    path: PathBuf,
}

impl Drop for StoreWorker {
    fn drop(&mut self) {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(handle) = handle else {
            return;
        };

        // The worker also stops on its own once every sender is gone.
        let _ = self.jobs.send(StoreCommand::Close);
        if handle.join().is_err() {
            error!("Record store worker for {} panicked", self.path.display());
        }
    }
}

/// Open the SQLite file and prepare it for concurrent readers.
fn open_connection(path: &Path) -> Result<(Connection, i32)> {
    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open record store {}", path.display()))?;

    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        warn!("Record store {} stays in rollback journal mode: {err}", path.display());
    }
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("failed to set record store busy timeout")?;

    let version = run_migrations(&mut conn)
        .with_context(|| format!("failed to migrate record store {}", path.display()))?;
    Ok((conn, version))
}

fn serve(mut conn: Connection, jobs: mpsc::Receiver<StoreCommand>) {
    while let Ok(command) = jobs.recv() {
        match command {
            StoreCommand::Run(job) => job(&mut conn),
            StoreCommand::Close => break,
        }
    }
    info!("Record store worker stopped");
}

/// SQLite-backed durable record store.
///
/// A dedicated thread owns the connection; async callers hand it closures
/// and await the reply.
#[derive(Clone)]
pub struct RecordStore {
    worker: Arc<StoreWorker>,
    schema_version: i32,
}

impl RecordStore {
    pub fn open(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create store directory {}", parent.display())
            })?;
        }

        let (jobs_tx, jobs_rx) = mpsc::channel::<StoreCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<i32>>();
        let worker_path = db_path.clone();

        let handle = thread::Builder::new()
            .name(WORKER_NAME.into())
            .spawn(move || match open_connection(&worker_path) {
                Ok((conn, version)) => {
                    if ready_tx.send(Ok(version)).is_ok() {
                        serve(conn, jobs_rx);
                    }
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            })
            .context("failed to spawn record store worker thread")?;

        let schema_version = ready_rx
            .recv()
            .map_err(|_| anyhow!("record store worker for {} exited during startup", db_path.display()))??;

        info!(
            "Record store opened at {} (schema v{schema_version})",
            db_path.display()
        );

        Ok(Self {
            worker: Arc::new(StoreWorker {
                jobs: jobs_tx,
                handle: Mutex::new(Some(handle)),
                path: db_path,
            }),
            schema_version,
        })
    }

    pub fn path(&self) -> &Path {
        &self.worker.path
    }

    pub fn schema_version(&self) -> i32 {
        self.schema_version
    }

    /// Run `task` on the store's connection and wait for its result.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: StoreJob = Box::new(move |conn| {
            // A dropped receiver means the caller stopped waiting.
            let _ = reply_tx.send(task(conn));
        });

        self.worker
            .jobs
            .send(StoreCommand::Run(job))
            .map_err(|_| anyhow!("record store {} is closed", self.path().display()))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("record store worker for {} stopped mid-request", self.path().display()))?
    }
}
