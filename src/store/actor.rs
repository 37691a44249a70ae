//! Single-writer store actor.
//!
//! One task owns the state and applies actions in arrival order. Writers only
//! send actions; readers get immutable snapshots through a `watch` channel.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::store::state::{reduce, Action, AppState};

struct Envelope {
    action: Action,
    ack: Option<oneshot::Sender<Arc<AppState>>>,
}

/// The running store.
pub struct Store {
    handle: StoreHandle,
    task: JoinHandle<()>,
}

impl Store {
    /// Spawn a store with the default state.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn() -> Self {
        Self::spawn_with(AppState::default())
    }

    /// Spawn a store with an initial state.
    pub fn spawn_with(initial: AppState) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
        let (state_tx, state_rx) = watch::channel(Arc::new(initial));

        let task = tokio::spawn(async move {
            while let Some(Envelope { action, ack }) = rx.recv().await {
                let name = action.name();
                let current = state_tx.borrow().clone();
                let next = Arc::new(reduce(&current, action));

                trace!("Applied {}", name);
                state_tx.send_replace(next.clone());

                if let Some(ack) = ack {
                    let _ = ack.send(next);
                }
            }

            debug!("Store actor stopped");
        });

        Self {
            handle: StoreHandle { tx, state_rx },
            task,
        }
    }

    /// Get a handle for dispatching and reading.
    pub fn handle(&self) -> StoreHandle {
        self.handle.clone()
    }

    /// Stop the actor. Outstanding handles get [`Error::StoreClosed`].
    pub async fn shutdown(self) {
        self.task.abort();
        let _ = self.task.await;
    }
}

/// Cloneable access to the store.
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::UnboundedSender<Envelope>,
    state_rx: watch::Receiver<Arc<AppState>>,
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl StoreHandle {
    /// Queue an action.
    pub fn dispatch(&self, action: Action) -> Result<()> {
        trace!("Dispatching {}", action.name());
        self.tx
            .send(Envelope { action, ack: None })
            .map_err(|_| Error::StoreClosed)
    }

    /// Queue an action and wait for the state it produced.
    pub async fn apply(&self, action: Action) -> Result<Arc<AppState>> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(Envelope {
                action,
                ack: Some(ack_tx),
            })
            .map_err(|_| Error::StoreClosed)?;
        ack_rx.await.map_err(|_| Error::StoreClosed)
    }

    /// Latest snapshot.
    pub fn state(&self) -> Arc<AppState> {
        self.state_rx.borrow().clone()
    }

    /// Receiver that is notified on every new snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<AppState>> {
        self.state_rx.clone()
    }
}
