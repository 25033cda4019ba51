//! Jobs and their result handles
//!
//! A job is a type-erased future queued for the scheduler. Binding a job
//! produces the [`ResultHandle`] the caller awaits; the two are connected by a
//! oneshot channel, so a handle can be resolved at most once.

use crate::{DispatchError, TransportError};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Deferred unit of work owned by the scheduler once queued
pub(crate) type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Pending outcome of one submitted job
///
/// Awaiting the handle yields the job's value, the job's own transport
/// error, or [`DispatchError::Abandoned`] when the job was dropped before it
/// ran to completion (queue torn down at shutdown, or the job panicked).
#[derive(Debug)]
#[must_use = "a result handle does nothing unless awaited"]
pub struct ResultHandle<T> {
    rx: oneshot::Receiver<Result<T, TransportError>>,
}

impl<T> ResultHandle<T> {
    /// Returns the outcome if the job has already finished, without waiting
    pub fn try_take(&mut self) -> Option<Result<T, DispatchError>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome.map_err(DispatchError::from)),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(DispatchError::Abandoned)),
        }
    }
}

impl<T> Future for ResultHandle<T> {
    type Output = Result<T, DispatchError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| match received {
            Ok(outcome) => outcome.map_err(DispatchError::from),
            Err(_) => Err(DispatchError::Abandoned),
        })
    }
}

/// Wraps `work` into a queueable job and returns the handle it resolves
pub(crate) fn bind<T, Fut>(work: Fut) -> (Job, ResultHandle<T>)
where
    T: Send + 'static,
    Fut: Future<Output = Result<T, TransportError>> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();

    let job: Job = Box::pin(async move {
        let outcome = work.await;
        // The caller may have stopped listening; the work still ran to completion.
        let _ = tx.send(outcome);
    });

    (job, ResultHandle { rx })
}
