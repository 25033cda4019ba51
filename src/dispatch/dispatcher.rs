//! Dispatcher lifecycle
//!
//! A [`Dispatcher`] owns one job queue, one scheduler task and one pooled
//! resource (an HTTP session or a browser context). It goes through three
//! phases: unconfigured, running, shut down. Each transition happens at most
//! once, no matter how many callers race for it.

use crate::dispatch::job::{self, ResultHandle};
use crate::dispatch::pacing::Pacing;
use crate::dispatch::scheduler::{Scheduler, SchedulerStats};
use crate::dispatch::shutdown::{self, InstalledHooks, ShutdownFuture, ShutdownTarget};
use crate::{DispatchError, DispatchResult, TransportError};
use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, OnceCell};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Long-lived resource shared by every job of a dispatcher
#[async_trait]
pub trait PooledResource: Send + Sync + 'static {
    /// Returns true once the resource has been closed
    fn is_closed(&self) -> bool;

    /// Releases the resource
    async fn close(&self) -> Result<(), TransportError>;
}

/// Running state created by the first successful configure()
struct Engine<R> {
    queue: mpsc::UnboundedSender<job::Job>,
    batch_size: Arc<AtomicUsize>,
    scheduler: Mutex<Option<JoinHandle<()>>>,
    resource: Arc<R>,
    stats: Arc<SchedulerStats>,
}

struct Shared<R> {
    name: &'static str,
    pacing: Pacing,
    install_signal_hooks: bool,
    engine: OnceCell<Engine<R>>,
    shutdown_started: AtomicBool,
    released: AtomicBool,
    // Orders the shutdown flag against a configure() that finishes late
    lifecycle: Mutex<()>,
    hooks: Mutex<Option<InstalledHooks>>,
}

/// Paced, batch-draining job dispatcher
///
/// Cloning yields another handle to the same dispatcher.
pub struct Dispatcher<R: PooledResource> {
    shared: Arc<Shared<R>>,
}

impl<R: PooledResource> Clone for Dispatcher<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R: PooledResource> std::fmt::Debug for Dispatcher<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.shared.name)
            .field("pacing", &self.shared.pacing)
            .field("configured", &self.is_configured())
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}

impl<R: PooledResource> Dispatcher<R> {
    /// Creates an unconfigured dispatcher
    ///
    /// # Arguments
    ///
    /// * `name` - Name used in log lines and errors
    /// * `pacing` - Batch size and delay bounds for the scheduler
    /// * `install_signal_hooks` - Whether configure() hooks SIGINT/SIGTERM
    pub fn new(name: &'static str, pacing: Pacing, install_signal_hooks: bool) -> Self {
        Self {
            shared: Arc::new(Shared {
                name,
                pacing,
                install_signal_hooks,
                engine: OnceCell::new(),
                shutdown_started: AtomicBool::new(false),
                released: AtomicBool::new(false),
                lifecycle: Mutex::new(()),
                hooks: Mutex::new(None),
            }),
        }
    }

    /// Starts the dispatcher, opening its resource with `open`
    ///
    /// Only the first call does any work; concurrent callers wait for it and
    /// later calls return immediately. `open` is not invoked at all when the
    /// dispatcher is already configured.
    ///
    /// # Errors
    ///
    /// * `DispatchError::Config` - the pacing bounds are unusable
    /// * `DispatchError::ShutDown` - shutdown() started before or while
    ///   the resource was being opened; a late resource is closed again
    /// * `DispatchError::Transport` - `open` failed; a later call may retry
    pub async fn configure_with<F>(&self, open: F) -> DispatchResult<()>
    where
        F: FnOnce() -> Result<R, TransportError>,
    {
        if self.is_shutting_down() {
            return Err(DispatchError::ShutDown(self.shared.name));
        }
        self.shared.pacing.validate()?;

        let engine = self
            .shared
            .engine
            .get_or_try_init(|| async move { Ok::<_, DispatchError>(self.start(open()?)) })
            .await?;

        let shutting_down = {
            let _lifecycle = self.lock_lifecycle();
            self.is_shutting_down()
        };
        if shutting_down {
            warn!(
                dispatcher = self.shared.name,
                "Shutdown started while configuring, releasing resources"
            );
            self.release(engine).await;
            return Err(DispatchError::ShutDown(self.shared.name));
        }

        Ok(())
    }

    /// Builds the running state: queue, scheduler task, signal hooks
    fn start(&self, resource: R) -> Engine<R> {
        let pacing = self.shared.pacing.clone();
        let initial_size = pacing.roll_batch_size(&mut rand::rng());

        let (queue, receiver) = mpsc::unbounded_channel();
        let batch_size = Arc::new(AtomicUsize::new(initial_size));
        let stats = Arc::new(SchedulerStats::default());

        let scheduler = Scheduler::new(
            self.shared.name,
            receiver,
            pacing,
            Arc::clone(&batch_size),
            Arc::clone(&stats),
        );
        let task = tokio::spawn(scheduler.run());

        if self.shared.install_signal_hooks {
            let hooks = shutdown::install(Arc::new(self.clone()));
            if let Ok(mut slot) = self.shared.hooks.lock() {
                *slot = Some(hooks);
            }
        }

        info!(
            dispatcher = self.shared.name,
            batch_size = initial_size,
            "Dispatcher configured"
        );

        Engine {
            queue,
            batch_size,
            scheduler: Mutex::new(Some(task)),
            resource: Arc::new(resource),
            stats,
        }
    }

    /// Queues the work built by `make` and returns its pending result handle
    ///
    /// `make` receives the pooled resource and is called synchronously; the
    /// future it returns runs later, inside a scheduler batch. Enqueueing
    /// never waits.
    ///
    /// # Errors
    ///
    /// * `DispatchError::NotConfigured` - configure() has not completed
    /// * `DispatchError::ShutDown` - shutdown() has started
    pub fn submit<T, F, Fut>(&self, make: F) -> DispatchResult<ResultHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce(Arc<R>) -> Fut,
        Fut: Future<Output = Result<T, TransportError>> + Send + 'static,
    {
        let engine = self.engine()?;
        if self.is_shutting_down() {
            return Err(DispatchError::ShutDown(self.shared.name));
        }

        let (job, handle) = job::bind(make(Arc::clone(&engine.resource)));
        engine
            .queue
            .send(job)
            .map_err(|_| DispatchError::ShutDown(self.shared.name))?;

        trace!(dispatcher = self.shared.name, "Job queued");
        Ok(handle)
    }

    /// Stops the scheduler and closes the pooled resource
    ///
    /// Idempotent: only the first call does any work. Never fails; problems
    /// while closing the resource are logged. Jobs still waiting in the
    /// queue resolve to `DispatchError::Abandoned`.
    pub async fn shutdown(&self) {
        let engine = {
            let _lifecycle = self.lock_lifecycle();
            if self.shared.shutdown_started.swap(true, Ordering::SeqCst) {
                return;
            }
            self.shared.engine.get()
        };

        info!(dispatcher = self.shared.name, "Shutting down");

        match engine {
            Some(engine) => self.release(engine).await,
            // A configure() still opening its resource releases it itself
            None => debug!(dispatcher = self.shared.name, "Never configured, nothing to release"),
        }
    }

    /// Tears down the running state; only the first call does any work
    async fn release(&self, engine: &Engine<R>) {
        if self.shared.released.swap(true, Ordering::SeqCst) {
            return;
        }

        let hooks = self
            .shared
            .hooks
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        if let Some(hooks) = hooks {
            hooks.release();
        }

        let task = engine
            .scheduler
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        if let Some(task) = task {
            task.abort();
            match task.await {
                Ok(()) => debug!(dispatcher = self.shared.name, "Scheduler had already stopped"),
                Err(e) if e.is_cancelled() => {
                    debug!(dispatcher = self.shared.name, "Scheduler cancelled")
                }
                Err(e) => warn!(
                    dispatcher = self.shared.name,
                    error = %e,
                    "Scheduler task failed"
                ),
            }
        }

        if engine.resource.is_closed() {
            debug!(dispatcher = self.shared.name, "Resource already closed");
        } else if let Err(e) = engine.resource.close().await {
            warn!(
                dispatcher = self.shared.name,
                error = %e,
                "Failed to close pooled resource"
            );
        }
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, ()> {
        self.shared
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn engine(&self) -> DispatchResult<&Engine<R>> {
        self.shared
            .engine
            .get()
            .ok_or(DispatchError::NotConfigured(self.shared.name))
    }

    /// Name used in log lines and errors
    pub fn name(&self) -> &'static str {
        self.shared.name
    }

    /// Pacing bounds this dispatcher was built with
    pub fn pacing(&self) -> &Pacing {
        &self.shared.pacing
    }

    /// Returns true once configure() has completed
    pub fn is_configured(&self) -> bool {
        self.shared.engine.initialized()
    }

    /// Returns true once shutdown() has been called
    pub fn is_shutting_down(&self) -> bool {
        self.shared.shutdown_started.load(Ordering::SeqCst)
    }

    /// Batch size the scheduler will use for its next cycle
    pub fn batch_size(&self) -> Option<usize> {
        self.engine()
            .ok()
            .map(|engine| engine.batch_size.load(Ordering::Relaxed))
    }

    /// Scheduler counters, once configured
    pub fn stats(&self) -> Option<Arc<SchedulerStats>> {
        self.engine().ok().map(|engine| Arc::clone(&engine.stats))
    }

    /// The pooled resource, once configured
    pub fn resource(&self) -> Option<Arc<R>> {
        self.engine().ok().map(|engine| Arc::clone(&engine.resource))
    }
}

impl<R: PooledResource> ShutdownTarget for Dispatcher<R> {
    fn name(&self) -> &'static str {
        self.shared.name
    }

    fn begin_shutdown(&self) -> ShutdownFuture {
        let dispatcher = self.clone();
        Box::pin(async move { dispatcher.shutdown().await })
    }
}
