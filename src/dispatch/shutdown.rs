//! Signal-triggered shutdown
//!
//! A dispatcher tears itself down on SIGINT/SIGTERM through one of three paths:
//!
//! | Path | When |
//! |------|------|
//! | [`ShutdownPath::EventLoop`] | a listener task on the running runtime received the signal |
//! | [`ShutdownPath::ScheduledOnRuntime`] | the OS-level fallback handler fired while the runtime is alive |
//! | [`ShutdownPath::OneShotRuntime`] | the OS-level fallback handler fired after the runtime is gone |
//!
//! The runtime-listener path is used whenever tokio can install its signal
//! driver. The OS-level fallback (a `signal-hook` thread) only exists when
//! that installation fails.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use tokio::runtime::{Builder, Handle};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Future that performs a full shutdown
pub type ShutdownFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Something that can be shut down from a signal handler
pub trait ShutdownTarget: Send + Sync + 'static {
    /// Name used in log lines
    fn name(&self) -> &'static str;

    /// Returns the future that performs the shutdown
    fn begin_shutdown(&self) -> ShutdownFuture;
}

/// Which trigger path carried a signal to its shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPath {
    EventLoop,
    ScheduledOnRuntime,
    OneShotRuntime,
}

/// Routes a received signal to a shutdown target
pub struct SignalHook {
    target: Arc<dyn ShutdownTarget>,

    /// Upgradable only while the runtime the hook was attached to is alive
    runtime: Weak<Handle>,
}

impl SignalHook {
    /// Attaches a hook to `runtime`
    ///
    /// Returns the hook and the sentinel task that keeps the runtime liveness
    /// reference alive; the sentinel is dropped together with the runtime.
    pub fn attach(target: Arc<dyn ShutdownTarget>, runtime: &Handle) -> (Self, JoinHandle<()>) {
        let alive = Arc::new(runtime.clone());
        let weak = Arc::downgrade(&alive);

        let sentinel = runtime.spawn(async move {
            let _alive = alive;
            std::future::pending::<()>().await;
        });

        (
            Self {
                target,
                runtime: weak,
            },
            sentinel,
        )
    }

    /// Handles a signal delivered by the runtime's own listener task
    ///
    /// Must be called from within a tokio runtime.
    pub fn on_event_loop_signal(&self) -> ShutdownPath {
        info!(dispatcher = self.target.name(), "Signal received, shutting down");
        tokio::spawn(self.target.begin_shutdown());
        ShutdownPath::EventLoop
    }

    /// Handles a signal delivered by the OS-level fallback handler
    pub fn on_os_signal(&self) -> ShutdownPath {
        info!(
            dispatcher = self.target.name(),
            "Signal received by fallback handler, shutting down"
        );

        if let Ok(handle) = Handle::try_current() {
            handle.spawn(self.target.begin_shutdown());
            return ShutdownPath::ScheduledOnRuntime;
        }

        if let Some(handle) = self.runtime.upgrade() {
            handle.spawn(self.target.begin_shutdown());
            return ShutdownPath::ScheduledOnRuntime;
        }

        match Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime.block_on(self.target.begin_shutdown()),
            Err(e) => warn!(
                dispatcher = self.target.name(),
                error = %e,
                "Could not build a runtime for shutdown"
            ),
        }
        ShutdownPath::OneShotRuntime
    }

    /// Returns true while the runtime the hook was attached to is running
    pub fn runtime_alive(&self) -> bool {
        self.runtime.strong_count() > 0
    }
}

/// Hooks installed by a dispatcher, released at shutdown
pub(crate) struct InstalledHooks {
    listener: Option<JoinHandle<()>>,
    sentinel: JoinHandle<()>,
    #[cfg(unix)]
    os_handler: Option<signal_hook::iterator::Handle>,
}

impl InstalledHooks {
    /// Stops listening for signals
    pub(crate) fn release(self) {
        if let Some(listener) = self.listener {
            listener.abort();
        }
        self.sentinel.abort();
        #[cfg(unix)]
        if let Some(handle) = self.os_handler {
            handle.close();
        }
    }
}

/// Installs SIGINT/SIGTERM hooks for `target` on the current runtime
///
/// Must be called from within a tokio runtime.
#[cfg(unix)]
pub(crate) fn install(target: Arc<dyn ShutdownTarget>) -> InstalledHooks {
    use tokio::signal::unix::{signal, SignalKind};

    let name = target.name();
    let (hook, sentinel) = SignalHook::attach(target, &Handle::current());
    let hook = Arc::new(hook);

    match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(mut interrupt), Ok(mut terminate)) => {
            let listener = tokio::spawn(async move {
                tokio::select! {
                    _ = interrupt.recv() => {},
                    _ = terminate.recv() => {},
                }
                hook.on_event_loop_signal();
            });

            InstalledHooks {
                listener: Some(listener),
                sentinel,
                os_handler: None,
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            warn!(
                dispatcher = name,
                error = %e,
                "Runtime signal listener unavailable, falling back to OS handler"
            );

            InstalledHooks {
                listener: None,
                sentinel,
                os_handler: install_os_handler(name, hook),
            }
        }
    }
}

/// Installs a Ctrl+C hook for `target` on the current runtime
#[cfg(not(unix))]
pub(crate) fn install(target: Arc<dyn ShutdownTarget>) -> InstalledHooks {
    let name = target.name();
    let (hook, sentinel) = SignalHook::attach(target, &Handle::current());

    let listener = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                hook.on_event_loop_signal();
            }
            Err(e) => warn!(dispatcher = name, error = %e, "Ctrl+C listener failed"),
        }
    });

    InstalledHooks {
        listener: Some(listener),
        sentinel,
    }
}

/// Spawns a thread that waits for SIGINT/SIGTERM outside the runtime
#[cfg(unix)]
fn install_os_handler(
    name: &'static str,
    hook: Arc<SignalHook>,
) -> Option<signal_hook::iterator::Handle> {
    use signal_hook::consts::signal::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = match Signals::new([SIGINT, SIGTERM]) {
        Ok(signals) => signals,
        Err(e) => {
            warn!(dispatcher = name, error = %e, "Failed to install OS signal handler");
            return None;
        }
    };
    let handle = signals.handle();

    let spawned = std::thread::Builder::new()
        .name(format!("{}-signals", name))
        .spawn(move || {
            if signals.forever().next().is_some() {
                hook.on_os_signal();
            }
        });

    match spawned {
        Ok(_) => Some(handle),
        Err(e) => {
            warn!(dispatcher = name, error = %e, "Failed to spawn signal thread");
            handle.close();
            None
        }
    }
}
