// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Periodic state reads with failure detection.
//!
//! A [`PollingCoordinator`] owns the read-path health of one [`Device`]:
//! it reads the full state on every cycle, tolerates sporadic timeouts and
//! publishes an [`Availability`] determination through a watch channel.
//! Pushes go through the coordinator on demand and never touch the read
//! path counters.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use amberac_lib::{Device, DeviceConfig};
//! use amberac_lib::polling::{PollingConfig, PollingCoordinator};
//! use amberac_lib::types::DeviceInfo;
//!
//! # async fn example() {
//! let info = DeviceInfo::new("192.168.1.40".parse().unwrap(), "f4911e7aca59");
//! let device = Arc::new(Device::new(info, DeviceConfig::default()));
//! let coordinator = Arc::new(PollingCoordinator::new(device, PollingConfig::default()));
//!
//! let mut availability = coordinator.watch_availability();
//! let _task = coordinator.spawn();
//! while availability.changed().await.is_ok() {
//!     println!("now {:?}", *availability.borrow());
//! }
//! # }
//! ```

mod config;
mod health;

pub use config::{
    DEFAULT_ERROR_THRESHOLD, DEFAULT_MAX_RESPONSE_INTERVAL, DEFAULT_POLL_INTERVAL, PollingConfig,
};
pub use health::{Availability, PollingHealth};

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::device::Device;
use crate::error::Error;
use crate::state::PropertyStore;
use crate::subscription::SubscriptionId;

use health::{CycleOutcome, HealthTracker};

/// Why a read cycle failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    /// No session key could be negotiated.
    #[error("device {mac} is not bound")]
    NotBound {
        /// MAC of the device.
        mac: String,
    },

    /// Consecutive errors reached the threshold.
    #[error("device {mac} is unavailable after {errors} consecutive errors")]
    Unavailable {
        /// MAC of the device.
        mac: String,
        /// Errors counted so far.
        errors: u32,
    },
}

/// Polls one device and tracks whether it is reachable.
pub struct PollingCoordinator {
    device: Arc<Device>,
    config: PollingConfig,
    health: Arc<Mutex<HealthTracker>>,
    availability: Arc<watch::Sender<Availability>>,
    result_subscription: SubscriptionId,
}

impl PollingCoordinator {
    /// Creates a coordinator. The device starts out available.
    ///
    /// Command results received by the device count as answers and reset
    /// the error counter.
    #[must_use]
    pub fn new(device: Arc<Device>, config: PollingConfig) -> Self {
        let health = Arc::new(Mutex::new(HealthTracker::new(Instant::now())));
        let (availability, _) = watch::channel(Availability::Available);
        let availability = Arc::new(availability);

        let result_subscription = {
            let health = Arc::clone(&health);
            let availability = Arc::clone(&availability);
            device.on_command_result(move |_| {
                let current = {
                    let mut health = health.lock();
                    health.record_response(Instant::now());
                    health.availability()
                };
                publish(&availability, current);
            })
        };

        Self {
            device,
            config,
            health,
            availability,
            result_subscription,
        }
    }

    /// Returns the polled device.
    #[must_use]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Returns the polling settings.
    #[must_use]
    pub fn config(&self) -> PollingConfig {
        self.config
    }

    /// Returns the current determination.
    #[must_use]
    pub fn availability(&self) -> Availability {
        *self.availability.borrow()
    }

    /// Returns a receiver notified on every availability transition.
    #[must_use]
    pub fn watch_availability(&self) -> watch::Receiver<Availability> {
        self.availability.subscribe()
    }

    /// Returns a snapshot of the read-path counters.
    #[must_use]
    pub fn health(&self) -> PollingHealth {
        self.health.lock().snapshot()
    }

    /// Runs one read cycle and returns the resulting property snapshot.
    ///
    /// Timeouts below the error threshold are tolerated and the cycle still
    /// succeeds. A transition into the failed state is logged once; later
    /// failing cycles only return the error.
    ///
    /// # Errors
    ///
    /// Returns [`PollError::NotBound`] if no session key could be
    /// negotiated, or [`PollError::Unavailable`] once the error threshold
    /// is reached.
    pub async fn refresh(&self) -> Result<PropertyStore, PollError> {
        let mac = self.device.mac();
        let result = self.device.update_state().await;
        let now = Instant::now();

        let (outcome, health) = {
            let mut health = self.health.lock();
            let outcome = match &result {
                Ok(()) => {
                    let (outcome, stale) = health.record_success(now, &self.config);
                    if let Some(elapsed) = stale {
                        tracing::warn!(
                            %mac,
                            elapsed_secs = elapsed.as_secs(),
                            "Device took unusually long to answer"
                        );
                    }
                    outcome
                }
                Err(Error::NotBound) => health.record_not_bound(),
                Err(error) => {
                    tracing::debug!(%mac, %error, "State read failed");
                    health.record_timeout(now, &self.config)
                }
            };
            (outcome, health.snapshot())
        };
        publish(&self.availability, health.availability);

        tracing::debug!(
            %mac,
            ?outcome,
            error_count = health.error_count,
            "Polling cycle finished"
        );

        if outcome == CycleOutcome::Healthy {
            return Ok(self.device.state().properties().clone());
        }

        let error = if health.availability == Availability::NotBound {
            PollError::NotBound { mac }
        } else {
            PollError::Unavailable {
                mac,
                errors: health.error_count,
            }
        };
        if outcome == CycleOutcome::Escalated {
            tracing::warn!(error = %error, info = %self.device.info(), "Device unavailable");
        }
        Err(error)
    }

    /// Pushes locally changed properties to the device.
    ///
    /// # Errors
    ///
    /// Returns the device's error. Timeouts are logged and do not affect
    /// the read path counters.
    pub async fn push_state_update(&self) -> Result<(), Error> {
        let result = self.device.push_state_update().await;
        if let Err(error) = &result
            && error.is_timeout()
        {
            tracing::warn!(mac = %self.device.mac(), %error, "Timed out pushing state update");
        }
        result
    }

    /// Starts refreshing on a fixed interval.
    ///
    /// The first cycle runs immediately. Polling stops when the returned
    /// task is dropped.
    #[must_use = "polling stops when the task is dropped"]
    pub fn spawn(self: &Arc<Self>) -> PollingTask {
        let coordinator = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(coordinator.config.interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                // Failures are logged and published by refresh
                let _ = coordinator.refresh().await;
            }
        });
        PollingTask { handle }
    }
}

impl Drop for PollingCoordinator {
    fn drop(&mut self) {
        self.device.unsubscribe(self.result_subscription);
    }
}

impl std::fmt::Debug for PollingCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingCoordinator")
            .field("device", &self.device)
            .field("config", &self.config)
            .field("availability", &self.availability())
            .finish_non_exhaustive()
    }
}

/// Handle of a spawned polling loop. Dropping it stops the loop.
#[derive(Debug)]
pub struct PollingTask {
    handle: JoinHandle<()>,
}

impl PollingTask {
    /// Stops the loop.
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Returns true once the loop has stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for PollingTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Stores the new determination, notifying receivers only on change.
fn publish(sender: &watch::Sender<Availability>, availability: Availability) {
    sender.send_if_modified(|current| {
        if *current == availability {
            return false;
        }
        *current = availability;
        true
    });
}
