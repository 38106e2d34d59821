// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The regulation loop.
//!
//! A fixed repeating cycle with no terminal state:
//!
//! 1. drain the setpoint channel without blocking and adopt the newest
//!    desired temperature;
//! 2. refresh each switch's override state; a manually overridden switch is
//!    skipped -- the human is authoritative until the override window
//!    elapses;
//! 3. apply hysteresis around the setpoint: power on when the room is at or
//!    above `desired + padding` (and not already on), power off at or below
//!    `desired - padding`, do nothing inside the dead band;
//! 4. report every recoverable error on the error channel and keep going.
//!
//! The loop runs as one background task per home and stops only on the
//! coordinator's shutdown signal.

use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::error::{Error, SensorError};
use crate::sensor::Thermostat;
use crate::switch::{Channel, Switch, SwitchStatus};

/// Hysteresis padding around the desired temperature, in Fahrenheit.
pub const TEMPERATURE_PADDING: f64 = 2.0;

/// Default wait between regulation cycles.
pub const DEFAULT_CYCLE_INTERVAL: Duration = Duration::from_secs(30);

/// Tuning knobs for the regulation loop.
#[derive(Debug, Clone)]
pub struct RegulatorConfig {
    /// Hysteresis padding in Fahrenheit.
    pub padding: f64,
    /// Idle wait between cycles.
    pub cycle_interval: Duration,
}

impl Default for RegulatorConfig {
    fn default() -> Self {
        Self {
            padding: TEMPERATURE_PADDING,
            cycle_interval: DEFAULT_CYCLE_INTERVAL,
        }
    }
}

/// A switch paired with the channel the regulator drives on it.
#[derive(Debug)]
pub struct RegulatedSwitch<S> {
    /// The switch device.
    pub device: S,
    /// The channel automation controls.
    pub channel: Channel,
}

/// Action the hysteresis rule decided on for one switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SwitchAction {
    TurnOn,
    TurnOff,
}

/// Pure hysteresis decision.
///
/// On at or above the upper band edge unless already on; off at or below
/// the lower edge; nothing inside the dead band.
fn plan_action(
    current: f64,
    desired: f64,
    padding: f64,
    already_on: bool,
) -> Option<SwitchAction> {
    if current >= desired + padding {
        if already_on {
            None
        } else {
            Some(SwitchAction::TurnOn)
        }
    } else if current <= desired - padding {
        Some(SwitchAction::TurnOff)
    } else {
        None
    }
}

/// The control loop tying the thermostat and switches together.
///
/// Built and started by the [`Home`](crate::home::Home) coordinator, which
/// owns the channel ends this loop consumes.
#[derive(Debug)]
pub struct Regulator<T: Thermostat, S: Switch> {
    thermostat: T,
    switches: Vec<RegulatedSwitch<S>>,
    desired: Option<f64>,
    config: RegulatorConfig,
    setpoint_rx: watch::Receiver<Option<f64>>,
    error_tx: mpsc::UnboundedSender<Error>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<T: Thermostat, S: Switch> Regulator<T, S> {
    pub(crate) fn new(
        thermostat: T,
        switches: Vec<RegulatedSwitch<S>>,
        config: RegulatorConfig,
        setpoint_rx: watch::Receiver<Option<f64>>,
        error_tx: mpsc::UnboundedSender<Error>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            thermostat,
            switches,
            desired: None,
            config,
            setpoint_rx,
            error_tx,
            shutdown_rx,
        }
    }

    /// Runs cycles until the shutdown signal flips, then disconnects the
    /// thermostat session.
    pub(crate) async fn run(mut self) {
        tracing::info!(switches = self.switches.len(), "regulator started");
        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }

            self.tick().await;

            let mut shutdown_rx = self.shutdown_rx.clone();
            tokio::select! {
                () = tokio::time::sleep(self.config.cycle_interval) => {}
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        self.thermostat.disconnect().await;
        tracing::info!("regulator stopped");
    }

    /// Runs one regulation cycle.
    async fn tick(&mut self) {
        // Newest setpoint wins; never block on the channel.
        if self.setpoint_rx.has_changed().unwrap_or(false) {
            self.desired = *self.setpoint_rx.borrow_and_update();
            if let Some(desired) = self.desired {
                tracing::info!(desired, "adopted new desired temperature");
            }
        }

        let Some(desired) = self.desired else {
            tracing::debug!("no desired temperature set yet, idling");
            return;
        };

        // Fixed configuration order, every cycle.
        for switch in &mut self.switches {
            Self::regulate_switch(
                &self.thermostat,
                switch,
                desired,
                self.config.padding,
                &self.error_tx,
            )
            .await;
        }
    }

    /// Evaluates one switch; any error is reported and control moves on.
    async fn regulate_switch(
        thermostat: &T,
        switch: &mut RegulatedSwitch<S>,
        desired: f64,
        padding: f64,
        error_tx: &mpsc::UnboundedSender<Error>,
    ) {
        // Refreshes the cache when stale and re-evaluates override state.
        let status = match switch.device.current_status(switch.channel).await {
            Ok(status) => status,
            Err(e) => {
                report(error_tx, e.into());
                return;
            }
        };

        if switch.device.override_active() {
            tracing::debug!(channel = %switch.channel, "manual override active, skipping control");
            return;
        }

        let current = match thermostat.current_temperature().await {
            Ok(current) => current,
            Err(Error::Sensor(SensorError::NoReadingYet)) => {
                // Expected right after connect; the feed will catch up.
                tracing::debug!("temperature feed not ready yet");
                return;
            }
            Err(e) => {
                report(error_tx, e);
                return;
            }
        };

        tracing::debug!(current, desired, status = %status, channel = %switch.channel, "evaluating switch");

        let result = match plan_action(current, desired, padding, status == SwitchStatus::On) {
            Some(SwitchAction::TurnOn) => switch.device.turn_on(switch.channel).await,
            Some(SwitchAction::TurnOff) => switch.device.turn_off(switch.channel).await,
            None => Ok(()),
        };

        if let Err(e) = result {
            report(error_tx, e.into());
        }
    }
}

fn report(error_tx: &mpsc::UnboundedSender<Error>, error: Error) {
    tracing::warn!(error = %error, "regulation error");
    let _ = error_tx.send(error);
}
