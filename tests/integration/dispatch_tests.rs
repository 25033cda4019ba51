//! Integration tests for the paced dispatchers
//!
//! Stub transports exercise the scheduler end-to-end under a paused clock;
//! wiremock covers the real HTTP session.

use async_trait::async_trait;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::time::Instant;
use touchline::config::{load_config, Config, HttpConfig, PacingConfig, ShutdownConfig};
use touchline::dispatch::PooledResource;
use touchline::fetch::{Body, RequestHandler, ResponseShape, Transport};
use touchline::{DispatchError, TransportError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Transport that tracks concurrency and the instant each request started
#[derive(Default)]
struct TrackingTransport {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    started: Mutex<Vec<(String, Instant)>>,
    closed: AtomicBool,
}

#[async_trait]
impl PooledResource for TrackingTransport {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl Transport for TrackingTransport {
    async fn get(
        &self,
        url: &str,
        _user_agent: Option<&str>,
        _shape: ResponseShape,
    ) -> Result<Body, TransportError> {
        self.started
            .lock()
            .unwrap()
            .push((url.to_string(), Instant::now()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(200)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(Body::Text(format!("body of {}", url)))
    }
}

fn quiet_config(pacing: PacingConfig) -> Config {
    Config {
        pacing,
        shutdown: ShutdownConfig {
            install_signal_hooks: false,
        },
        ..Config::default()
    }
}

fn tracking_handler(pacing: PacingConfig) -> RequestHandler<TrackingTransport> {
    RequestHandler::with_transport(&quiet_config(pacing), || Ok(TrackingTransport::default()))
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_fetches_all_resolve_in_small_batches() {
    let handler = tracking_handler(PacingConfig::default());
    handler.configure().await.unwrap();

    let callers: Vec<_> = (0..5)
        .map(|i| {
            let handler = handler.clone();
            tokio::spawn(async move {
                handler
                    .fetch_text(&format!("https://example.com/{}", i))
                    .await
            })
        })
        .collect();

    for (i, caller) in callers.into_iter().enumerate() {
        let body = caller.await.unwrap().unwrap();
        assert_eq!(body, format!("body of https://example.com/{}", i));
    }

    let transport = handler.dispatcher().resource().unwrap();
    assert!(transport.max_in_flight.load(Ordering::SeqCst) <= 5);
    assert_eq!(transport.started.lock().unwrap().len(), 5);

    let stats = handler.dispatcher().stats().unwrap();
    assert_eq!(stats.jobs(), 5);
    assert!(stats.batches() >= 1);

    handler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_single_job_batches_run_in_order_with_pauses() {
    let handler = tracking_handler(PacingConfig {
        batch_size_min: 1,
        batch_size_max: 1,
        ..PacingConfig::default()
    });
    handler.configure().await.unwrap();

    let handles: Vec<_> = ["/1", "/2", "/3", "/4"]
        .iter()
        .map(|url| handler.fetch(url, ResponseShape::Text).unwrap())
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let transport = handler.dispatcher().resource().unwrap();
    let started = transport.started.lock().unwrap().clone();
    let order: Vec<_> = started.iter().map(|(url, _)| url.as_str()).collect();
    assert_eq!(order, vec!["/1", "/2", "/3", "/4"]);

    for pair in started.windows(2) {
        let gap = pair[1].1 - pair[0].1;
        assert!(
            gap >= Duration::from_secs(5),
            "batches only {:?} apart",
            gap
        );
    }
    assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 1);

    handler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_batch_size_stays_in_configured_bounds() {
    let handler = tracking_handler(PacingConfig::default());
    handler.configure().await.unwrap();

    for round in 0..4 {
        let size = handler.dispatcher().batch_size().unwrap();
        assert!((3..=5).contains(&size), "round {}: batch size {}", round, size);

        handler
            .fetch_text(&format!("https://example.com/round/{}", round))
            .await
            .unwrap();
    }

    handler.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_abandons_queued_fetches() {
    let handler = tracking_handler(PacingConfig {
        batch_size_min: 1,
        batch_size_max: 1,
        delay_min_secs: 60,
        delay_max_secs: 60,
        pull_timeout_ms: 20,
        idle_pause_ms: 5,
    });
    handler.configure().await.unwrap();

    let first = handler.fetch("/first", ResponseShape::Text).unwrap();
    let queued = handler.fetch("/queued", ResponseShape::Text).unwrap();

    assert!(first.await.is_ok());
    handler.shutdown().await;

    assert!(matches!(queued.await, Err(DispatchError::Abandoned)));
    assert!(handler.dispatcher().resource().unwrap().is_closed());
    assert!(matches!(
        handler.fetch("/late", ResponseShape::Text),
        Err(DispatchError::ShutDown(_))
    ));
}

#[tokio::test]
async fn test_http_session_end_to_end() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fixtures"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<table>fixtures</table>"))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/crest.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89, b'P', b'N', b'G']))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = Config {
        http: HttpConfig {
            user_agents: vec!["IntegrationAgent/1.0".to_string()],
            ..HttpConfig::default()
        },
        ..quiet_config(PacingConfig {
            delay_min_secs: 0,
            delay_max_secs: 0,
            pull_timeout_ms: 50,
            idle_pause_ms: 5,
            ..PacingConfig::default()
        })
    };
    let handler = RequestHandler::new(&config);
    handler.configure().await.unwrap();

    let text = handler.fetch(
        &format!("{}/fixtures", mock_server.uri()),
        ResponseShape::Text,
    );
    let raw = handler.fetch(
        &format!("{}/crest.png", mock_server.uri()),
        ResponseShape::Raw,
    );

    assert_eq!(
        text.unwrap().await.unwrap(),
        Body::Text("<table>fixtures</table>".to_string())
    );
    assert_eq!(
        raw.unwrap().await.unwrap(),
        Body::Raw(vec![0x89, b'P', b'N', b'G'])
    );

    let requests = mock_server.received_requests().await.unwrap();
    for request in requests {
        assert_eq!(
            request.headers.get("user-agent").map(|v| v.to_str().unwrap()),
            Some("IntegrationAgent/1.0")
        );
    }

    handler.shutdown().await;
}

#[tokio::test]
async fn test_handler_from_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[pacing]
batch-size-min = 2
batch-size-max = 2
delay-min-secs = 0
delay-max-secs = 0
pull-timeout-ms = 20

[shutdown]
install-signal-hooks = false
"#
    )
    .unwrap();

    let config = load_config(file.path()).unwrap();
    let handler =
        RequestHandler::with_transport(&config, || Ok(TrackingTransport::default()));
    handler.configure().await.unwrap();
    assert_eq!(handler.dispatcher().batch_size(), Some(2));

    let body = handler.fetch_text("/configured").await.unwrap();
    assert_eq!(body, "body of /configured");
    handler.shutdown().await;
}

#[test]
fn test_global_handler_is_one_instance_across_threads_and_tasks() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();

    // Threads and tasks all reach global() for the first time together
    let start = Arc::new(Barrier::new(8));

    let threads: Vec<_> = (0..4)
        .map(|_| {
            let start = Arc::clone(&start);
            std::thread::spawn(move || {
                start.wait();
                RequestHandler::global() as *const RequestHandler as usize
            })
        })
        .collect();

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let start = Arc::clone(&start);
            runtime.spawn_blocking(move || {
                start.wait();
                RequestHandler::global() as *const RequestHandler as usize
            })
        })
        .collect();

    let mut ptrs: Vec<usize> = threads.into_iter().map(|t| t.join().unwrap()).collect();
    runtime.block_on(async {
        for task in tasks {
            ptrs.push(task.await.unwrap());
        }
    });

    assert_eq!(ptrs.len(), 8);
    assert!(ptrs.iter().all(|&ptr| ptr == ptrs[0]));
    assert_eq!(ptrs[0], RequestHandler::global() as *const RequestHandler as usize);
}

#[tokio::test]
async fn test_global_handler_rejects_fetch_before_configure() {
    // The global instance is never configured in this test binary
    let result = RequestHandler::global().fetch("https://example.com/", ResponseShape::Text);
    assert!(matches!(result, Err(DispatchError::NotConfigured(_))));
}
