//! Periodic refresh and the last-known device state.
//!
//! A [`Poller`] owns the most recent [`Snapshot`] of one device. Each
//! successful [`refresh`](Poller::refresh) replaces it whole; a failed one
//! keeps the previous snapshot and records the error. Readers get the state
//! through [`Poller::state`] or a `watch` receiver from
//! [`Poller::subscribe`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use venus_udp::{Client, ClientConfig, Poller};
//!
//! # async fn run() -> venus_udp::Result<()> {
//! let client = Arc::new(Client::new(ClientConfig::new("192.168.1.50"))?);
//! let poller = Arc::new(Poller::new(client.clone()));
//!
//! let mut updates = poller.subscribe();
//! let background = tokio::spawn({
//!     let poller = poller.clone();
//!     async move { poller.run(client.config().scan_interval).await }
//! });
//!
//! updates.changed().await.ok();
//! println!("{:?}", updates.borrow().snapshot);
//!
//! poller.shutdown();
//! background.await.ok();
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::client::Client;
use crate::error::Result;
use crate::schema::Snapshot;
use crate::transport::{Transport, UdpTransport};

/// What the poller knows about the device.
#[derive(Debug, Clone, Default)]
pub struct PollState {
    /// Most recent snapshot, if any refresh has succeeded.
    pub snapshot: Option<Arc<Snapshot>>,
    /// Error of the most recent refresh, cleared on success.
    pub last_error: Option<String>,
    /// Refreshes failed since the last success.
    pub consecutive_failures: u32,
    /// When the snapshot was taken.
    pub last_success: Option<Instant>,
}

impl PollState {
    /// Whether the snapshot is current: one exists and no refresh has failed
    /// since it was taken.
    pub fn is_available(&self) -> bool {
        self.snapshot.is_some() && self.consecutive_failures == 0
    }
}

/// Keeps the snapshot of one device up to date.
pub struct Poller<T = UdpTransport> {
    client: Arc<Client<T>>,
    state: watch::Sender<PollState>,
    shutdown: watch::Sender<bool>,
}

impl<T: Transport> Poller<T> {
    /// Creates a poller with no snapshot yet.
    pub fn new(client: Arc<Client<T>>) -> Self {
        let (state, _) = watch::channel(PollState::default());
        let (shutdown, _) = watch::channel(false);
        Self {
            client,
            state,
            shutdown,
        }
    }

    /// The client used for refreshes.
    pub fn client(&self) -> &Arc<Client<T>> {
        &self.client
    }

    /// Fetches a new snapshot and publishes it.
    ///
    /// # Errors
    ///
    /// Returns the client's error. The previous snapshot stays published and
    /// the failure is recorded in the state.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>> {
        match self.client.fetch_snapshot().await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.state.send_replace(PollState {
                    snapshot: Some(snapshot.clone()),
                    last_error: None,
                    consecutive_failures: 0,
                    last_success: Some(Instant::now()),
                });
                debug!(host = %self.client.config().host, fields = snapshot.len(), "snapshot replaced");
                Ok(snapshot)
            }
            Err(err) => {
                self.state.send_modify(|state| {
                    state.last_error = Some(err.report());
                    state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                });
                Err(err)
            }
        }
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.state.borrow().snapshot.clone()
    }

    /// A copy of the current state.
    pub fn state(&self) -> PollState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every refresh, successful or not.
    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state.subscribe()
    }

    /// Refreshes every `period`, starting immediately, until
    /// [`shutdown`](Poller::shutdown) is called.
    ///
    /// A slow refresh delays the following ticks instead of bunching them up.
    /// Shutdown abandons a refresh in progress.
    pub async fn run(&self, period: Duration) {
        let mut shutdown = self.shutdown.subscribe();
        if *shutdown.borrow() {
            return;
        }

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(host = %self.client.config().host, ?period, "poller started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }
            tokio::select! {
                result = self.refresh() => {
                    if let Err(err) = result {
                        let failures = self.state.borrow().consecutive_failures;
                        warn!(
                            host = %self.client.config().host,
                            consecutive_failures = failures,
                            error = %err.report(),
                            "refresh failed, keeping last snapshot"
                        );
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        debug!(host = %self.client.config().host, "poller stopped");
    }

    /// Stops [`run`](Poller::run). Also stops any later call to `run`.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}

impl<T> fmt::Debug for Poller<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Poller")
            .field("client", &self.client)
            .field("state", &*self.state.borrow())
            .finish()
    }
}
