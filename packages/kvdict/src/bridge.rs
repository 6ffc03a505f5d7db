//! Synchronous access to an async gateway.
//!
//! A [`SyncBridge`] owns one worker thread running a current-thread tokio
//! runtime. Callers hand it async operations and block until the result
//! comes back. The runtime never leaves the worker thread, so the calling
//! thread may itself be inside (or outside) any other runtime.

use std::future::Future;
use std::pin::Pin;
use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use kvdict_gateway::StoreGateway;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Shared handle to the gateway that operations receive.
pub type GatewayHandle = Arc<dyn StoreGateway>;

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
type Job = Box<dyn FnOnce(GatewayHandle) -> BoxFuture + Send + 'static>;

enum Message {
    Run(Job),
    Shutdown { force: bool },
}

/// Lifecycle of a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// The worker thread is building its runtime.
    Starting,
    /// Accepting operations.
    Running,
    /// Stopped; every submission fails with [`Error::BridgeClosed`].
    Stopped,
}

/// Runs async gateway operations on a dedicated worker thread.
///
/// Operations submitted concurrently from several threads run as independent
/// tasks on the worker. A timeout only releases the caller; the operation
/// keeps running to completion on the worker.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use kvdict::{InMemoryGateway, StoreGateway, SyncBridge};
///
/// let bridge = SyncBridge::start(Arc::new(InMemoryGateway::new()), "example-bridge").unwrap();
///
/// bridge
///     .submit(None, |gateway| async move {
///         gateway.set("ep:k", "1").await?;
///         Ok(())
///     })
///     .unwrap();
/// let value = bridge
///     .submit(None, |gateway| async move { Ok(gateway.get("ep:k").await?) })
///     .unwrap();
/// assert_eq!(value.as_deref(), Some("1"));
///
/// bridge.stop().unwrap();
/// ```
pub struct SyncBridge {
    name: String,
    sender: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    state: Mutex<BridgeState>,
}

impl SyncBridge {
    /// Spawn the worker thread and wait until its runtime is ready.
    ///
    /// Fails with [`Error::Startup`] if the thread cannot be spawned or the
    /// runtime cannot be built.
    pub fn start(gateway: GatewayHandle, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let (sender, receiver) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = std_mpsc::sync_channel(1);

        let bridge = SyncBridge {
            name: name.clone(),
            sender: Mutex::new(None),
            worker: Mutex::new(None),
            state: Mutex::new(BridgeState::Starting),
        };

        let worker = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_worker(gateway, receiver, ready_tx))
            .map_err(Error::Startup)?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                let _ = worker.join();
                *lock(&bridge.state) = BridgeState::Stopped;
                return Err(Error::Startup(err));
            }
            Err(_) => {
                let _ = worker.join();
                *lock(&bridge.state) = BridgeState::Stopped;
                return Err(Error::Startup(std::io::Error::other(
                    "bridge worker exited before becoming ready",
                )));
            }
        }

        *lock(&bridge.sender) = Some(sender);
        *lock(&bridge.worker) = Some(worker);
        *lock(&bridge.state) = BridgeState::Running;
        debug!(worker = %name, "bridge started");
        Ok(bridge)
    }

    /// Name of the worker thread.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> BridgeState {
        *lock(&self.state)
    }

    /// Run `op` on the worker and block until it finishes.
    ///
    /// With `Some(timeout)` the caller gives up after that long and gets
    /// [`Error::Timeout`]; the operation is not cancelled. If the bridge is
    /// stopped, or is force-stopped while `op` runs, the result is
    /// [`Error::BridgeClosed`].
    pub fn submit<T, F, Fut>(&self, timeout: Option<Duration>, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(GatewayHandle) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (result_tx, result_rx) = std_mpsc::sync_channel(1);
        let job: Job = Box::new(move |gateway| {
            Box::pin(async move {
                let result = op(gateway).await;
                // Receiver is gone if the caller timed out
                let _ = result_tx.send(result);
            })
        });

        {
            let sender = lock(&self.sender);
            let sender = sender.as_ref().ok_or(Error::BridgeClosed)?;
            sender
                .send(Message::Run(job))
                .map_err(|_| Error::BridgeClosed)?;
        }

        match timeout {
            Some(after) => match result_rx.recv_timeout(after) {
                Ok(result) => result,
                Err(RecvTimeoutError::Timeout) => Err(Error::Timeout { after }),
                Err(RecvTimeoutError::Disconnected) => Err(Error::BridgeClosed),
            },
            None => result_rx.recv().map_err(|_| Error::BridgeClosed)?,
        }
    }

    /// Finish queued and in-flight work, close the gateway, join the worker.
    ///
    /// Idempotent.
    pub fn stop(&self) -> Result<()> {
        self.shutdown(false)
    }

    /// Abort in-flight work, close the gateway, join the worker.
    ///
    /// Callers blocked on aborted operations get [`Error::BridgeClosed`].
    pub fn stop_now(&self) -> Result<()> {
        self.shutdown(true)
    }

    fn shutdown(&self, force: bool) -> Result<()> {
        let Some(sender) = lock(&self.sender).take() else {
            return Ok(());
        };
        let _ = sender.send(Message::Shutdown { force });
        drop(sender);

        if let Some(worker) = lock(&self.worker).take() {
            if worker.thread().id() == thread::current().id() {
                // Dropped from inside one of our own operations
                warn!(worker = %self.name, "bridge stopped from its own worker; not joining");
            } else if worker.join().is_err() {
                warn!(worker = %self.name, "bridge worker panicked");
            }
        }

        *lock(&self.state) = BridgeState::Stopped;
        debug!(worker = %self.name, force, "bridge stopped");
        Ok(())
    }
}

impl Drop for SyncBridge {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

impl std::fmt::Debug for SyncBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncBridge")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn run_worker(
    gateway: GatewayHandle,
    mut receiver: mpsc::UnboundedReceiver<Message>,
    ready: std_mpsc::SyncSender<std::io::Result<()>>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    runtime.block_on(async move {
        let mut tasks = JoinSet::new();

        let force = loop {
            tokio::select! {
                message = receiver.recv() => match message {
                    Some(Message::Run(job)) => {
                        tasks.spawn(job(Arc::clone(&gateway)));
                    }
                    Some(Message::Shutdown { force }) => break force,
                    None => break false,
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(err) = joined {
                        if err.is_panic() {
                            warn!("bridge operation panicked");
                        }
                    }
                }
            }
        };

        receiver.close();
        if force {
            tasks.abort_all();
            // Dropping queued jobs fails their callers
            while receiver.recv().await.is_some() {}
        } else {
            while let Some(message) = receiver.recv().await {
                if let Message::Run(job) = message {
                    tasks.spawn(job(Arc::clone(&gateway)));
                }
            }
        }
        debug!(pending = tasks.len(), force, "bridge draining");
        while tasks.join_next().await.is_some() {}

        if let Err(err) = gateway.close().await {
            warn!(error = %err, "gateway close failed");
        }
    });
}
