// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Live publish/subscribe session with the physical sensor device.
//!
//! Once connected, two background tasks run until shutdown:
//!
//! - the **publisher** asks the device to report its state once a second on
//!   the command topic;
//! - the **event-loop** task drives the MQTT connection and records each
//!   status message into the shared reading slot.
//!
//! The event-loop task is the only writer of the reading; everything else
//! only reads through the lock. Malformed status payloads are logged and
//! dropped -- the feed tolerates transient corrupt frames.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::Deserialize;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::error::{OnboardingError, SensorError};
use crate::sensor::deci_kelvin_to_fahrenheit;

/// Bounded wait for the broker handshake to complete.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Interval between "report your state" requests.
const STATE_REQUEST_INTERVAL: Duration = Duration::from_secs(1);

/// Payload published to ask the device for its current state.
const STATE_REQUEST: &str = "REQUEST-CURRENT-STATE";

/// Global counter for generating unique client IDs.
static CLIENT_ID_COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);

/// Status message published by the device on its status topic.
#[derive(Debug, Clone, Deserialize)]
pub struct ClimateMessage {
    /// Message kind, e.g. `CURRENT-STATE`.
    #[serde(default)]
    pub msg: String,
    /// Device-reported message time.
    pub time: DateTime<Utc>,
    /// Sensor readings.
    pub data: ClimateData,
}

/// Raw sensor readings carried by a [`ClimateMessage`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClimateData {
    /// Temperature in deci-Kelvin, as a decimal string.
    #[serde(default)]
    pub tact: String,
    /// Relative humidity percentage.
    #[serde(default)]
    pub hact: String,
    /// Particulate matter reading.
    #[serde(default)]
    pub pact: String,
    /// Volatile organic compounds reading.
    #[serde(default)]
    pub vact: String,
    /// Sleep timer state.
    #[serde(default)]
    pub sltm: String,
}

/// The last reading received from the subscription feed.
#[derive(Debug, Clone)]
pub struct ClimateReading {
    /// Raw encoded temperature value (deci-Kelvin decimal string).
    pub raw_value: String,
    /// When the reading was received.
    pub observed_at: DateTime<Utc>,
}

/// An authenticated publish/subscribe session with one sensor device.
///
/// Created by [`SensorSession::connect`]; dropped or explicitly
/// [`shutdown`](SensorSession::shutdown) to stop the background tasks.
#[derive(Debug)]
pub struct SensorSession {
    client: AsyncClient,
    reading: Arc<RwLock<Option<ClimateReading>>>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SensorSession {
    /// Opens a session to the device at `tcp://{ip}:{port}`, authenticating
    /// with the device serial and its decrypted local secret.
    ///
    /// # Errors
    ///
    /// Returns [`OnboardingError::ConnectFailed`] if the broker handshake
    /// does not complete within a short bounded wait.
    pub async fn connect(
        ip: &str,
        port: u16,
        serial: &str,
        secret: &str,
        product_type: &str,
    ) -> Result<Self, OnboardingError> {
        let counter =
            CLIENT_ID_COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let client_id = format!("thermalink_{}_{}", std::process::id(), counter);

        let mut options = MqttOptions::new(&client_id, ip, port);
        options.set_keep_alive(Duration::from_secs(30));
        options.set_credentials(serial, secret);

        let (client, event_loop) = AsyncClient::new(options, 10);

        let status_topic = format!("{product_type}/{serial}/status/current");
        let command_topic = format!("{product_type}/{serial}/command");

        client
            .subscribe(&status_topic, QoS::AtMostOnce)
            .await
            .map_err(|e| OnboardingError::ConnectFailed(e.to_string()))?;

        let reading = Arc::new(RwLock::new(None));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (connected_tx, connected_rx) = oneshot::channel();

        let event_task = tokio::spawn(run_event_loop(
            event_loop,
            status_topic,
            serial.to_string(),
            Arc::clone(&reading),
            shutdown_rx.clone(),
            connected_tx,
        ));

        // Bounded wait for the broker to acknowledge the connection.
        match tokio::time::timeout(CONNECT_TIMEOUT, connected_rx).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) | Err(_) => {
                event_task.abort();
                return Err(OnboardingError::ConnectFailed(format!(
                    "no broker acknowledgement from {ip}:{port} within {CONNECT_TIMEOUT:?}"
                )));
            }
        }

        let publish_task = tokio::spawn(run_state_requests(
            client.clone(),
            command_topic,
            shutdown_rx,
        ));

        tracing::debug!(serial = %serial, ip = %ip, port = port, "sensor session established");

        Ok(Self {
            client,
            reading,
            shutdown_tx,
            tasks: vec![event_task, publish_task],
        })
    }

    /// Returns the current temperature in degrees Fahrenheit.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::NoReadingYet`] until the first status message
    /// arrives, or [`SensorError::Decode`] if the raw value is not numeric.
    pub fn current_temperature(&self) -> Result<f64, SensorError> {
        let fahrenheit = temperature_from(self.reading.read().as_ref())?;
        tracing::debug!(fahrenheit, "current temperature");
        Ok(fahrenheit)
    }

    /// Returns a copy of the last reading, if any has arrived.
    #[must_use]
    pub fn last_reading(&self) -> Option<ClimateReading> {
        self.reading.read().clone()
    }

    /// Stops the background tasks and closes the session.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.client.disconnect().await;
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        tracing::debug!("sensor session shut down");
    }
}

/// Records one inbound publish into the shared reading slot.
///
/// Only well-formed status messages on the session's status topic are
/// recorded; malformed frames are logged and dropped, leaving the previous
/// reading intact.
fn record_status(
    status_topic: &str,
    serial: &str,
    topic: &str,
    payload: &[u8],
    reading: &RwLock<Option<ClimateReading>>,
) {
    if topic != status_topic {
        return;
    }
    match serde_json::from_slice::<ClimateMessage>(payload) {
        Ok(message) => {
            *reading.write() = Some(ClimateReading {
                raw_value: message.data.tact.clone(),
                observed_at: Utc::now(),
            });
        }
        Err(e) => {
            // Transient corrupt frames are expected; drop them.
            tracing::warn!(
                serial = %serial,
                error = %e,
                "malformed status message dropped"
            );
        }
    }
}

/// Resolves a cached reading into degrees Fahrenheit.
fn temperature_from(reading: Option<&ClimateReading>) -> Result<f64, SensorError> {
    let reading = reading.ok_or(SensorError::NoReadingYet)?;
    let raw: f64 = reading.raw_value.parse().map_err(|_| SensorError::Decode {
        raw: reading.raw_value.clone(),
    })?;
    Ok(deci_kelvin_to_fahrenheit(raw))
}

/// Publishes a state request on a fixed interval until shutdown.
async fn run_state_requests(
    client: AsyncClient,
    command_topic: String,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(STATE_REQUEST_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = client
                    .publish(&command_topic, QoS::AtMostOnce, false, STATE_REQUEST)
                    .await
                {
                    tracing::warn!(error = %e, "failed to publish state request");
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
    tracing::debug!("state request task stopped");
}

/// Drives the MQTT connection and records inbound status messages.
///
/// Sole writer of the shared reading slot.
async fn run_event_loop(
    mut event_loop: EventLoop,
    status_topic: String,
    serial: String,
    reading: Arc<RwLock<Option<ClimateReading>>>,
    mut shutdown_rx: watch::Receiver<bool>,
    connected_tx: oneshot::Sender<()>,
) {
    let mut connected_tx = Some(connected_tx);

    loop {
        tokio::select! {
            event = event_loop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    tracing::debug!(serial = %serial, "broker acknowledged connection");
                    if let Some(tx) = connected_tx.take() {
                        let _ = tx.send(());
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    record_status(&status_topic, &serial, &publish.topic, &publish.payload, &reading);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(serial = %serial, error = %e, "sensor event loop error");
                    break;
                }
            },
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
    tracing::debug!(serial = %serial, "sensor event loop stopped");
}
