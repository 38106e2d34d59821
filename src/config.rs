// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! YAML configuration for assembling a home.
//!
//! ```yaml
//! name: living-room
//! thermostat:
//!   ip: 192.168.1.20
//!   serial: NN2-US-ABC1234D
//!   email: user@example.com
//!   password: hunter2
//! switches:
//!   - uri: 192.168.1.30
//!     channel: 3
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::sensor::CloudThermostat;
use crate::switch::{Channel, TasmotaSwitch};

/// Root of the configuration file: one home.
#[derive(Debug, Clone, Deserialize)]
pub struct HomeConfig {
    /// Human-readable home name.
    pub name: String,
    /// The temperature sensor.
    pub thermostat: ThermostatConfig,
    /// Switches under regulation, in evaluation order.
    #[serde(default)]
    pub switches: Vec<SwitchConfig>,
}

/// Connection parameters for the cloud-onboarded thermostat.
#[derive(Debug, Clone, Deserialize)]
pub struct ThermostatConfig {
    /// Device IP on the local network.
    pub ip: String,
    /// Device session port; defaults to 1883.
    #[serde(default)]
    pub port: Option<u16>,
    /// Device serial number.
    pub serial: String,
    /// Cloud account email.
    pub email: String,
    /// Cloud account password.
    pub password: String,
    /// Cloud API endpoint override.
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// One relay switch channel.
#[derive(Debug, Clone, Deserialize)]
pub struct SwitchConfig {
    /// Switch base URI or bare host.
    pub uri: String,
    /// Relay channel number (1 through 3).
    pub channel: u8,
    /// Status cache validity in seconds.
    #[serde(default)]
    pub validity_window_secs: Option<u64>,
    /// Manual override hold-off in seconds.
    #[serde(default)]
    pub override_window_secs: Option<u64>,
}

impl HomeConfig {
    /// Loads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Yaml`] if it does not parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&raw)?)
    }
}

impl ThermostatConfig {
    /// Builds the thermostat device described by this section.
    #[must_use]
    pub fn build(&self) -> CloudThermostat {
        let mut builder = CloudThermostat::builder()
            .ip(&self.ip)
            .serial(&self.serial)
            .email(&self.email)
            .password(&self.password);
        if let Some(port) = self.port {
            builder = builder.port(port);
        }
        if let Some(endpoint) = &self.endpoint {
            builder = builder.endpoint(endpoint);
        }
        builder.build()
    }
}

impl SwitchConfig {
    /// Builds the switch device and channel described by this section.
    ///
    /// # Errors
    ///
    /// Returns [`SwitchError::UnsupportedChannel`](crate::error::SwitchError::UnsupportedChannel)
    /// if the channel number is out of range.
    pub fn build(&self) -> crate::error::Result<(TasmotaSwitch, Channel)> {
        let channel = Channel::new(self.channel)?;
        let mut switch = TasmotaSwitch::new(&self.uri)?;
        if let Some(secs) = self.validity_window_secs {
            switch = switch.with_validity_window(Duration::from_secs(secs));
        }
        if let Some(secs) = self.override_window_secs {
            switch = switch.with_override_window(Duration::from_secs(secs));
        }
        Ok((switch, channel))
    }
}
