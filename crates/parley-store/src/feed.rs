//! Change notification and live queries.
//!
//! Every committed write publishes a [`ChangeEvent`] on the [`ChangeFeed`].
//! A live query is a background task that emits one full snapshot when it
//! starts and a fresh one after every relevant event; the consumer side is a
//! [`Subscription`].

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use parley_shared::{ConversationKey, Identity};

use crate::error::Result;

/// What changed in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A conversation record was created, updated or deleted.
    Conversation {
        key: ConversationKey,
        participants: [Identity; 2],
    },
    /// A message was appended to a conversation.
    Messages { key: ConversationKey },
}

impl ChangeEvent {
    pub fn key(&self) -> &ConversationKey {
        match self {
            ChangeEvent::Conversation { key, .. } | ChangeEvent::Messages { key } => key,
        }
    }
}

/// Broadcast channel of [`ChangeEvent`]s. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: ChangeEvent) {
        // No receivers just means nobody is watching.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}

/// A cancellable live sequence of snapshots.
///
/// Errors are delivered as items; the subscription keeps running after
/// one. [`Subscription::cancel`] is synchronous and idempotent: once it
/// returns, no further item is yielded. Dropping the subscription cancels
/// it.
pub struct Subscription<T> {
    rx: mpsc::Receiver<Result<T>>,
    task: Option<JoinHandle<()>>,
    cancelled: bool,
}

impl<T: Send + 'static> Subscription<T> {
    /// Start a live query.
    ///
    /// `changes` must be obtained before calling so that no event between
    /// the initial read and the first `recv` is missed.
    pub fn spawn<Q, R>(
        mut changes: broadcast::Receiver<ChangeEvent>,
        buffer: usize,
        mut relevant: R,
        mut query: Q,
    ) -> Self
    where
        Q: FnMut() -> Result<T> + Send + 'static,
        R: FnMut(&ChangeEvent) -> bool + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(buffer.max(1));

        let task = tokio::spawn(async move {
            if tx.send(query()).await.is_err() {
                return;
            }
            loop {
                match changes.recv().await {
                    Ok(event) if relevant(&event) => {
                        debug!(key = %event.key(), "change matched live query");
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "change feed lagged, re-reading snapshot");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
                if tx.send(query()).await.is_err() {
                    break;
                }
            }
        });

        Self {
            rx,
            task: Some(task),
            cancelled: false,
        }
    }
}

impl<T> Subscription<T> {
    /// Wrap a plain channel, for store implementations that produce
    /// snapshots some other way.
    pub fn from_channel(rx: mpsc::Receiver<Result<T>>) -> Self {
        Self {
            rx,
            task: None,
            cancelled: false,
        }
    }

    /// Wait for the next snapshot or error. `None` once cancelled or once the
    /// producer is gone.
    pub async fn next(&mut self) -> Option<Result<T>> {
        if self.cancelled {
            return None;
        }
        self.rx.recv().await
    }

    pub fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl<T> Stream for Subscription<T> {
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.cancelled {
            return Poll::Ready(None);
        }
        this.rx.poll_recv(cx)
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("cancelled", &self.cancelled)
            .finish()
    }
}
