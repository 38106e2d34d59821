// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Thermostat device abstraction for the room temperature feed.
//!
//! A [`Thermostat`] is anything that can be connected and asked for the
//! current room temperature. Two implementations ship with the library:
//!
//! - [`CloudThermostat`]: the real cloud-onboarded device, composed of the
//!   onboarding client and a live publish/subscribe session;
//! - [`MockThermostat`]: a deterministic stand-in for testing the
//!   regulation loop without networking.

mod cloud_link;
mod mock;
mod session;

pub use cloud_link::{CloudThermostat, CloudThermostatBuilder};
pub use mock::MockThermostat;
pub use session::{ClimateMessage, ClimateReading, SensorSession};

use std::future::Future;

use crate::error::Result;

/// Capability trait for room temperature sensors.
pub trait Thermostat {
    /// Establishes the live temperature feed.
    ///
    /// # Errors
    ///
    /// Returns error if onboarding or the session handshake fails; setup
    /// failures are fatal and never retried automatically.
    fn connect(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Tears the feed down, stopping any background tasks.
    fn disconnect(&mut self) -> impl Future<Output = ()> + Send;

    /// Returns the current room temperature in degrees Fahrenheit.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::NoReadingYet`](crate::error::SensorError::NoReadingYet)
    /// until the first reading arrives -- an expected transient, not a hard
    /// failure -- and a decode error if the feed delivered a non-numeric
    /// value.
    fn current_temperature(&self) -> impl Future<Output = Result<f64>> + Send;
}

/// Converts a raw deci-Kelvin reading to degrees Fahrenheit.
///
/// The sensor transmits temperature as Kelvin x 10 in a decimal string;
/// `2960` means 296.0 K.
#[must_use]
pub fn deci_kelvin_to_fahrenheit(raw: f64) -> f64 {
    (raw / 10.0 - 273.15) * 9.0 / 5.0 + 32.0
}
