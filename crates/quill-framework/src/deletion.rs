//! Background deletion of parent messages.
//!
//! A component handler may ask for the message that carried the component
//! to be deleted. The response goes out first; the deletion is queued here
//! and carried out over REST by [`run_deletion_worker`].

use std::sync::Arc;

use quill_core::RestApi;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default number of deletions that may wait in the queue.
pub const DEFAULT_DELETION_QUEUE: usize = 256;

/// Sending side of the deletion queue.
#[derive(Debug, Clone)]
pub struct ParentDeletions {
    tx: mpsc::Sender<String>,
}

/// Receiving side of the deletion queue, consumed by the worker.
#[derive(Debug)]
pub struct DeletionReceiver {
    rx: mpsc::Receiver<String>,
}

impl ParentDeletions {
    /// A bounded queue holding at most `capacity` pending deletions.
    pub fn channel(capacity: usize) -> (Self, DeletionReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, DeletionReceiver { rx })
    }

    /// Queues the original response of the interaction with `token` for
    /// deletion. Returns `false` if the queue is full or the worker stopped.
    pub fn queue(&self, token: impl Into<String>) -> bool {
        match self.tx.try_send(token.into()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Parent deletion queue is full, dropping deletion");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Parent deletion worker has stopped, dropping deletion");
                false
            }
        }
    }
}

impl DeletionReceiver {
    /// Next queued interaction token, or `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// Deletes queued parent messages until `shutdown` fires or every sender is
/// gone. Failures are logged and never retried.
pub async fn run_deletion_worker(
    mut deletions: DeletionReceiver,
    rest: Arc<dyn RestApi>,
    shutdown: CancellationToken,
) {
    info!("Parent deletion worker started");
    loop {
        let token = tokio::select! {
            () = shutdown.cancelled() => break,
            next = deletions.recv() => match next {
                Some(token) => token,
                None => break,
            },
        };

        match rest.delete_interaction_message(&token).await {
            Ok(()) => debug!("Parent message deleted"),
            Err(error) => warn!(error = %error, "Failed to delete parent message"),
        }
    }
    info!("Parent deletion worker stopped");
}
