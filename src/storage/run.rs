//! Archiving one CLI run of fetches

use crate::fetch::{RequestHandler, ResponseShape, Transport};
use crate::storage::traits::{Archive, StorageResult};
use crate::storage::RunStatus;
use tracing::{error, info, warn};

/// Totals of a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: i64,
    pub status: RunStatus,
    pub fetched: usize,
    pub failed: usize,
}

/// Queues every URL on `handler`, archives each outcome and finishes the run
///
/// The handler is shut down and the run is marked finished even when an
/// archive write fails part way; the run is then `Interrupted` and the write
/// error is returned.
pub async fn archive_fetches<A, T>(
    archive: &mut A,
    run_id: i64,
    handler: &RequestHandler<T>,
    urls: Vec<String>,
    shape: ResponseShape,
) -> StorageResult<RunSummary>
where
    A: Archive,
    T: Transport,
{
    info!(run = run_id, urls = urls.len(), shape = %shape, "Queueing fetches");

    // Queue everything up front; the scheduler paces the actual requests.
    let pending: Vec<_> = urls
        .into_iter()
        .map(|url| {
            let handle = handler.fetch(&url, shape);
            (url, handle)
        })
        .collect();

    let mut fetched = 0usize;
    let mut failed = 0usize;
    let mut write_error = None;
    for (url, handle) in pending {
        let outcome = match handle {
            Ok(handle) => handle.await,
            Err(e) => Err(e),
        };

        let recorded = match outcome {
            Ok(body) => {
                info!(url = %url, bytes = body.len(), "Fetched");
                fetched += 1;
                archive.record_fetched(run_id, &url, &body)
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Fetch failed");
                failed += 1;
                archive.record_failed(run_id, &url, shape, &e.to_string())
            }
        };

        if let Err(e) = recorded {
            error!(url = %url, error = %e, "Failed to archive fetch, stopping run");
            write_error = Some(e);
            break;
        }
    }

    let status = if write_error.is_some() || handler.is_shutting_down() {
        RunStatus::Interrupted
    } else {
        RunStatus::Completed
    };
    handler.shutdown().await;
    archive.finish_run(run_id, status)?;

    match write_error {
        Some(e) => Err(e),
        None => Ok(RunSummary {
            run_id,
            status,
            fetched,
            failed,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, PacingConfig, ShutdownConfig};
    use crate::dispatch::PooledResource;
    use crate::fetch::Body;
    use crate::storage::{FetchOutcome, FetchRecord, RunRecord, SqliteArchive, StorageError};
    use crate::TransportError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct EchoTransport {
        closed: AtomicBool,
    }

    #[async_trait]
    impl PooledResource for EchoTransport {
        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }

        async fn close(&self) -> Result<(), TransportError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl Transport for EchoTransport {
        async fn get(
            &self,
            url: &str,
            _user_agent: Option<&str>,
            _shape: ResponseShape,
        ) -> Result<Body, TransportError> {
            if url.ends_with("/missing") {
                return Err(TransportError::Other("connection reset".to_string()));
            }
            Ok(Body::Text(format!("body of {}", url)))
        }
    }

    /// Archive whose body writes fail
    struct ReadOnlyBodies {
        inner: SqliteArchive,
    }

    impl Archive for ReadOnlyBodies {
        fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
            self.inner.create_run(config_hash)
        }

        fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
            self.inner.get_run(run_id)
        }

        fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
            self.inner.get_latest_run()
        }

        fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
            self.inner.finish_run(run_id, status)
        }

        fn count_runs(&self) -> StorageResult<u64> {
            self.inner.count_runs()
        }

        fn record_fetched(&mut self, _run_id: i64, _url: &str, _body: &Body) -> StorageResult<i64> {
            Err(StorageError::Sqlite(rusqlite::Error::InvalidQuery))
        }

        fn record_failed(
            &mut self,
            run_id: i64,
            url: &str,
            shape: ResponseShape,
            error_message: &str,
        ) -> StorageResult<i64> {
            self.inner.record_failed(run_id, url, shape, error_message)
        }

        fn get_fetches(&self, run_id: i64) -> StorageResult<Vec<FetchRecord>> {
            self.inner.get_fetches(run_id)
        }

        fn count_total_fetches(&self) -> StorageResult<u64> {
            self.inner.count_total_fetches()
        }

        fn count_fetches_by_outcome(&self, outcome: FetchOutcome) -> StorageResult<u64> {
            self.inner.count_fetches_by_outcome(outcome)
        }

        fn total_bytes(&self) -> StorageResult<u64> {
            self.inner.total_bytes()
        }

        fn get_error_summary(&self) -> StorageResult<HashMap<String, u64>> {
            self.inner.get_error_summary()
        }
    }

    async fn configured_handler() -> RequestHandler<EchoTransport> {
        let config = Config {
            pacing: PacingConfig {
                delay_min_secs: 0,
                delay_max_secs: 0,
                pull_timeout_ms: 20,
                idle_pause_ms: 5,
                ..PacingConfig::default()
            },
            shutdown: ShutdownConfig {
                install_signal_hooks: false,
            },
            ..Config::default()
        };
        let handler = RequestHandler::with_transport(&config, || Ok(EchoTransport::default()));
        handler.configure().await.unwrap();
        handler
    }

    #[tokio::test]
    async fn test_run_archives_every_outcome() {
        let mut archive = SqliteArchive::new_in_memory().unwrap();
        let run_id = archive.create_run("hash").unwrap();
        let handler = configured_handler().await;

        let urls = vec!["/table".to_string(), "/missing".to_string()];
        let summary = archive_fetches(&mut archive, run_id, &handler, urls, ResponseShape::Text)
            .await
            .unwrap();

        assert_eq!(summary.status, RunStatus::Completed);
        assert_eq!((summary.fetched, summary.failed), (1, 1));
        assert_eq!(archive.get_run(run_id).unwrap().status, RunStatus::Completed);
        assert_eq!(archive.get_fetches(run_id).unwrap().len(), 2);
        assert!(handler.is_shutting_down());
    }

    #[tokio::test]
    async fn test_failed_write_still_finishes_run() {
        let mut archive = ReadOnlyBodies {
            inner: SqliteArchive::new_in_memory().unwrap(),
        };
        let run_id = archive.create_run("hash").unwrap();
        let handler = configured_handler().await;
        let transport = handler.dispatcher().resource().unwrap();

        let urls = vec!["/table".to_string(), "/fixtures".to_string()];
        let result =
            archive_fetches(&mut archive, run_id, &handler, urls, ResponseShape::Text).await;

        assert!(matches!(result, Err(StorageError::Sqlite(_))));
        let run = archive.get_run(run_id).unwrap();
        assert_eq!(run.status, RunStatus::Interrupted);
        assert!(run.finished_at.is_some());
        assert!(handler.is_shutting_down());
        assert!(transport.is_closed());
    }
}
