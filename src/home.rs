// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Top-level coordinator wiring a thermostat to its switches.
//!
//! A [`Home`] is assembled from one thermostat and any number of switches,
//! then [started](Home::start): the thermostat connects, the regulation loop
//! spawns as a background task, and a [`HomeHandle`] comes back for steering
//! it. The handle changes the setpoint, drains reported errors, and shuts
//! the home down.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::regulator::{RegulatedSwitch, Regulator, RegulatorConfig};
use crate::sensor::Thermostat;
use crate::switch::{Channel, Switch};

/// One home under regulation: a thermostat plus the switches it drives.
///
/// # Examples
///
/// ```no_run
/// use thermalink::{Channel, Home, TasmotaSwitch};
/// use thermalink::sensor::CloudThermostat;
///
/// # async fn example() -> thermalink::Result<()> {
/// let sensor = CloudThermostat::builder()
///     .ip("192.168.1.20")
///     .serial("NN2-US-ABC1234D")
///     .email("user@example.com")
///     .password("hunter2")
///     .build();
///
/// let mut home = Home::new("living-room", sensor);
/// home.add_switch(TasmotaSwitch::new("192.168.1.30")?, Channel::three());
///
/// let mut handle = home.start().await?;
/// handle.set_desired_temperature(72.0);
///
/// if let Some(error) = handle.next_error().await {
///     eprintln!("regulation error: {error}");
/// }
///
/// handle.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Home<T: Thermostat, S: Switch> {
    name: String,
    thermostat: T,
    switches: Vec<RegulatedSwitch<S>>,
    config: RegulatorConfig,
}

impl<T, S> Home<T, S>
where
    T: Thermostat + Send + Sync + 'static,
    S: Switch + Send + 'static,
{
    /// Creates a home around the given thermostat, with no switches yet.
    #[must_use]
    pub fn new(name: impl Into<String>, thermostat: T) -> Self {
        Self {
            name: name.into(),
            thermostat,
            switches: Vec::new(),
            config: RegulatorConfig::default(),
        }
    }

    /// Overrides the regulation tuning.
    #[must_use]
    pub fn with_config(mut self, config: RegulatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers a switch channel for regulation.
    ///
    /// Switches are evaluated every cycle in registration order.
    pub fn add_switch(&mut self, device: S, channel: Channel) {
        self.switches.push(RegulatedSwitch { device, channel });
    }

    /// Returns the home's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Connects the thermostat and spawns the regulation loop.
    ///
    /// # Errors
    ///
    /// Returns the thermostat's onboarding or connection error; no
    /// background task is spawned on failure.
    pub async fn start(mut self) -> Result<HomeHandle> {
        self.thermostat.connect().await?;

        let (setpoint_tx, setpoint_rx) = watch::channel(None);
        let (error_tx, error_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let regulator = Regulator::new(
            self.thermostat,
            self.switches,
            self.config,
            setpoint_rx,
            error_tx,
            shutdown_rx,
        );
        let task = tokio::spawn(regulator.run());

        tracing::info!(home = %self.name, "home started");

        Ok(HomeHandle {
            setpoint_tx,
            error_rx,
            shutdown_tx,
            task,
        })
    }
}

/// Steering handle for a started [`Home`].
#[derive(Debug)]
pub struct HomeHandle {
    setpoint_tx: watch::Sender<Option<f64>>,
    error_rx: mpsc::UnboundedReceiver<Error>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl HomeHandle {
    /// Sets the desired temperature in degrees Fahrenheit.
    ///
    /// Never blocks; the newest value replaces any unread one and takes
    /// effect on the regulator's next cycle.
    pub fn set_desired_temperature(&self, fahrenheit: f64) {
        let _ = self.setpoint_tx.send(Some(fahrenheit));
    }

    /// Waits for the next regulation error.
    ///
    /// Returns `None` once the home has shut down and all buffered errors
    /// have been drained.
    pub async fn next_error(&mut self) -> Option<Error> {
        self.error_rx.recv().await
    }

    /// Returns a buffered regulation error, if one is waiting.
    pub fn try_next_error(&mut self) -> Option<Error> {
        self.error_rx.try_recv().ok()
    }

    /// Stops the regulation loop and disconnects the thermostat.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
        tracing::info!("home shut down");
    }
}
