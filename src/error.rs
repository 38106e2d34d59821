// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `thermalink` library.
//!
//! This module provides the error hierarchy for failures across the library:
//! cloud onboarding, the sensor feed, relay control, and configuration.
//!
//! Only onboarding and configuration failures are fatal; everything the
//! regulation loop can hit at runtime is recoverable and reported on the
//! coordinator's error channel instead of aborting.

use thiserror::Error;

use crate::switch::{Channel, SwitchStatus};

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred while onboarding or connecting a sensor device.
    #[error("onboarding error: {0}")]
    Onboarding(#[from] OnboardingError),

    /// Error occurred while reading the temperature feed.
    #[error("sensor error: {0}")]
    Sensor(#[from] SensorError),

    /// Error occurred while polling or commanding a relay.
    #[error("switch error: {0}")]
    Switch(#[from] SwitchError),

    /// Error occurred while loading configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors from the cloud onboarding and session connect sequence.
///
/// These are fatal to device setup: they surface to the caller that
/// initiated `connect` and are never retried automatically.
#[derive(Debug, Error)]
pub enum OnboardingError {
    /// A required device parameter is empty or missing.
    #[error("required device parameter not set: {field}")]
    Configuration {
        /// Name of the missing parameter.
        field: &'static str,
    },

    /// The cloud rejected the account credentials or returned an
    /// unusable response body.
    #[error("cloud authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The configured serial was not present in the account manifest.
    #[error("device with serial {serial} not found in account manifest")]
    DeviceNotFound {
        /// The serial that was searched for.
        serial: String,
    },

    /// The encrypted local credential blob could not be decrypted.
    #[error("malformed local credential: {0}")]
    MalformedCredential(String),

    /// The device session handshake did not complete in time.
    #[error("device connection failed: {0}")]
    ConnectFailed(String),

    /// HTTP transport failure while talking to the cloud.
    #[error("cloud request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Errors from the live temperature feed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SensorError {
    /// No status message has arrived on the subscription yet.
    ///
    /// This is an expected transient immediately after connecting; callers
    /// should treat it as "not ready" and retry on the next cycle.
    #[error("no temperature reading received yet")]
    NoReadingYet,

    /// The raw reading was not a decimal number.
    #[error("temperature reading {raw:?} is not numeric")]
    Decode {
        /// The raw encoded value that failed to parse.
        raw: String,
    },
}

/// Errors from relay polling and power commands.
#[derive(Debug, Error)]
pub enum SwitchError {
    /// Channel index outside the supported 1..=3 range.
    #[error("channel {0} is not supported -- only 1, 2 and 3 exist")]
    UnsupportedChannel(u8),

    /// HTTP transport failure while talking to the relay.
    #[error("relay request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The relay returned a payload that is not valid JSON.
    #[error("relay response parse error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The relay did not report the requested state after a power command.
    #[error("channel {channel} not reporting as {requested} after command")]
    CommandNotAcknowledged {
        /// The channel that was commanded.
        channel: Channel,
        /// The state that was requested.
        requested: SwitchStatus,
    },
}

/// Errors from the configuration loader.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid YAML.
    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_names_field() {
        let err = OnboardingError::Configuration { field: "serial" };
        assert_eq!(err.to_string(), "required device parameter not set: serial");
    }

    #[test]
    fn error_from_sensor_error() {
        let err: Error = SensorError::NoReadingYet.into();
        assert!(matches!(err, Error::Sensor(SensorError::NoReadingYet)));
    }

    #[test]
    fn unsupported_channel_display() {
        let err = SwitchError::UnsupportedChannel(7);
        assert_eq!(
            err.to_string(),
            "channel 7 is not supported -- only 1, 2 and 3 exist"
        );
    }

    #[test]
    fn command_not_acknowledged_display() {
        let err = SwitchError::CommandNotAcknowledged {
            channel: Channel::three(),
            requested: SwitchStatus::On,
        };
        assert_eq!(
            err.to_string(),
            "channel 3 not reporting as ON after command"
        );
    }
}
