//! Handle to a transfer running in the background.
//!
//! The background task owns a [`StatusPublisher`] and is the only writer of
//! the status. Callers hold a [`ProcessController`]: they can read the latest
//! status, register listeners, request an abort and await the outcome.

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::TransferError;
use crate::types::{TransferState, TransferStatus};

/// Callback invoked with every status push.
pub type StatusCallback = Box<dyn Fn(TransferStatus) + Send + Sync>;

type Listeners = Arc<RwLock<Vec<StatusCallback>>>;

/// Caller-side handle to a background transfer.
pub struct ProcessController<T> {
    status_rx: watch::Receiver<TransferStatus>,
    listeners: Listeners,
    cancel: CancellationToken,
    task: JoinHandle<T>,
}

impl<T: Send + 'static> ProcessController<T> {
    /// Spawns `run` on the tokio runtime and returns its controller.
    ///
    /// `listeners` are registered before the task starts, so they observe
    /// every push including the first one.
    pub fn spawn<F, Fut>(initial: TransferStatus, listeners: Vec<StatusCallback>, run: F) -> Self
    where
        F: FnOnce(StatusPublisher) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (status_tx, status_rx) = watch::channel(initial.clone());
        let listeners: Listeners = Arc::new(RwLock::new(listeners));
        let cancel = CancellationToken::new();

        let publisher = StatusPublisher {
            status_tx,
            listeners: Arc::clone(&listeners),
            cancel: cancel.clone(),
            current: initial,
        };
        let task = tokio::spawn(run(publisher));

        Self {
            status_rx,
            listeners,
            cancel,
            task,
        }
    }
}

impl<T> ProcessController<T> {
    /// Returns the latest status without waiting.
    pub fn status(&self) -> TransferStatus {
        self.status_rx.borrow().clone()
    }

    /// Registers a listener for subsequent pushes.
    ///
    /// Listeners run on the transfer task, in registration order, and must
    /// not register further listeners.
    pub fn add_status_listener<F>(&self, listener: F)
    where
        F: Fn(TransferStatus) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(listener));
    }

    /// Returns a receiver that always holds the latest status.
    pub fn subscribe(&self) -> watch::Receiver<TransferStatus> {
        self.status_rx.clone()
    }

    /// Asks the transfer to stop at the next chunk boundary.
    ///
    /// The status only turns `Aborted` once the task observes the request.
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    /// Token shared with the background task.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits until the transfer reaches a terminal status and returns it.
    ///
    /// If the task ends without a terminal push, the last known status is returned.
    pub async fn wait(&self) -> TransferStatus {
        let mut rx = self.status_rx.clone();
        if let Ok(status) = rx.wait_for(TransferStatus::is_terminal).await {
            return status.clone();
        }
        rx.borrow().clone()
    }

    /// Returns `true` once the background task has returned.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the background task and returns its result.
    pub async fn join(self) -> Result<T, TransferError> {
        self.task
            .await
            .map_err(|e| TransferError::Join(e.to_string()))
    }
}

/// Task-side half of a controller: the only writer of the status.
pub struct StatusPublisher {
    status_tx: watch::Sender<TransferStatus>,
    listeners: Listeners,
    cancel: CancellationToken,
    current: TransferStatus,
}

impl StatusPublisher {
    /// Returns `true` once an abort has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The status as last pushed.
    pub fn current(&self) -> &TransferStatus {
        &self.current
    }

    /// Records that every chunk before `current_offset` is done and
    /// `bytes` more bytes went through.
    pub fn advance(&mut self, current_offset: u32, bytes: u64) {
        let mut next = self.current.clone();
        next.state = TransferState::InProgress;
        next.current_offset = current_offset
            .max(self.current.current_offset)
            .min(next.max_position);
        next.bytes_transferred += bytes;
        self.push(next);
    }

    /// Pushes the final `Completed` status.
    pub fn complete(&mut self) {
        let mut next = self.current.clone();
        next.state = TransferState::Completed;
        next.current_offset = next.max_position;
        self.push(next);
    }

    /// Pushes the final `Aborted` status.
    pub fn abort(&mut self) {
        let mut next = self.current.clone();
        next.state = TransferState::Aborted;
        self.push(next);
    }

    /// Pushes the final `Failed` status with `message`.
    pub fn fail(&mut self, message: impl Into<String>) {
        let mut next = self.current.clone();
        next.state = TransferState::Failed;
        next.error = Some(message.into());
        self.push(next);
    }

    fn push(&mut self, next: TransferStatus) {
        if self.current.is_terminal() {
            debug!(state = ?self.current.state, "status already terminal, push dropped");
            return;
        }
        self.current = next;
        self.status_tx.send_replace(self.current.clone());

        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        for listener in listeners.iter() {
            listener(self.current.clone());
        }
    }
}
