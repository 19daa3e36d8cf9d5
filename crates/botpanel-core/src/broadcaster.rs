//! Periodic process-table broadcast to connected observers.

use tokio::sync::{broadcast, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::lifecycle::BotController;
use crate::observer::ObserverMessage;

/// Default capacity of the observer channel.
pub const DEFAULT_CAPACITY: usize = 64;

/// Polls the process table on a fixed interval and pushes it to every
/// subscriber. Ticks are skipped while nobody is subscribed.
#[derive(Clone)]
pub struct StatusBroadcaster {
    controller: BotController,
    sender: broadcast::Sender<ObserverMessage>,
}

impl StatusBroadcaster {
    /// Creates a broadcaster with the given channel capacity.
    pub fn new(controller: BotController, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { controller, sender }
    }

    /// Registers a new observer.
    pub fn subscribe(&self) -> broadcast::Receiver<ObserverMessage> {
        self.sender.subscribe()
    }

    /// Sender shared with workflows that publish to all observers.
    pub fn sender(&self) -> &broadcast::Sender<ObserverMessage> {
        &self.sender
    }

    /// Number of connected observers.
    pub fn observer_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Current process table as an observer message.
    pub async fn snapshot(&self) -> Result<ObserverMessage> {
        let data = self.controller.list().await?;
        Ok(ObserverMessage::StatusUpdate { data })
    }

    /// Reads the process table and pushes it now. Returns false when there
    /// was nobody to send to or the table could not be read.
    pub async fn broadcast_now(&self) -> bool {
        if self.observer_count() == 0 {
            trace!("no observers, skipping status broadcast");
            return false;
        }
        match self.snapshot().await {
            Ok(message) => self.sender.send(message).is_ok(),
            Err(e) => {
                warn!(error = %e, "status broadcast failed");
                false
            }
        }
    }

    /// Runs the broadcast loop until `shutdown` turns true or its sender is
    /// dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let period = self.controller.config().status_interval;
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(interval_ms = period.as_millis(), "starting status broadcaster");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.broadcast_now().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("shutdown sender dropped, stopping status broadcaster");
                        break;
                    }
                    if *shutdown.borrow() {
                        debug!("status broadcaster received shutdown signal");
                        break;
                    }
                }
            }
        }

        debug!("status broadcaster stopped");
    }
}
