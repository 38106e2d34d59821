// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Deterministic thermostat for testing the regulation loop.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result, SensorError};
use crate::sensor::Thermostat;

/// A thermostat that reports a scripted temperature.
///
/// Cloning shares the underlying value, so a test can keep a handle and
/// change the reading while the regulator owns its own clone.
///
/// # Examples
///
/// ```
/// use thermalink::sensor::{MockThermostat, Thermostat};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let sensor = MockThermostat::new(72.0);
/// let handle = sensor.clone();
///
/// handle.set_temperature(75.0);
/// assert_eq!(sensor.current_temperature().await.unwrap(), 75.0);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MockThermostat {
    temperature: Arc<Mutex<Option<f64>>>,
}

impl MockThermostat {
    /// Creates a mock reporting the given temperature in Fahrenheit.
    #[must_use]
    pub fn new(temperature: f64) -> Self {
        Self {
            temperature: Arc::new(Mutex::new(Some(temperature))),
        }
    }

    /// Creates a mock with no reading yet.
    #[must_use]
    pub fn without_reading() -> Self {
        Self {
            temperature: Arc::new(Mutex::new(None)),
        }
    }

    /// Changes the reported temperature.
    pub fn set_temperature(&self, temperature: f64) {
        *self.temperature.lock() = Some(temperature);
    }

    /// Drops the reading, as if no message had arrived yet.
    pub fn clear_reading(&self) {
        *self.temperature.lock() = None;
    }
}

impl Thermostat for MockThermostat {
    async fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&mut self) {}

    async fn current_temperature(&self) -> Result<f64> {
        (*self.temperature.lock()).ok_or(Error::Sensor(SensorError::NoReadingYet))
    }
}
