// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The real cloud-onboarded thermostat device.
//!
//! Composes the [`CloudClient`] onboarding sequence with a live
//! [`SensorSession`]: authenticate, locate the device in the account
//! manifest, decrypt its local secret, then open the publish/subscribe
//! session against the device itself.

use std::fmt;

use crate::cloud::{CloudClient, DEFAULT_ENDPOINT};
use crate::error::{Error, OnboardingError, Result, SensorError};
use crate::sensor::session::SensorSession;
use crate::sensor::Thermostat;

/// Default device session port.
const DEFAULT_PORT: u16 = 1883;

/// A cloud-onboarded temperature sensor on the local network.
///
/// # Examples
///
/// ```no_run
/// use thermalink::sensor::{CloudThermostat, Thermostat};
///
/// # async fn example() -> thermalink::Result<()> {
/// let mut sensor = CloudThermostat::builder()
///     .ip("192.168.1.20")
///     .serial("NN2-US-ABC1234D")
///     .email("user@example.com")
///     .password("hunter2")
///     .build();
///
/// sensor.connect().await?;
/// let fahrenheit = sensor.current_temperature().await?;
/// # Ok(())
/// # }
/// ```
pub struct CloudThermostat {
    ip: String,
    port: u16,
    serial: String,
    email: String,
    password: String,
    endpoint: String,
    product_type: Option<String>,
    session: Option<SensorSession>,
}

impl fmt::Debug for CloudThermostat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudThermostat")
            .field("ip", &self.ip)
            .field("port", &self.port)
            .field("serial", &self.serial)
            .field("email", &self.email)
            .field("password", &"******")
            .field("connected", &self.session.is_some())
            .finish_non_exhaustive()
    }
}

impl CloudThermostat {
    /// Returns a builder for configuring the device.
    #[must_use]
    pub fn builder() -> CloudThermostatBuilder {
        CloudThermostatBuilder::new()
    }

    /// Returns the product type resolved from the manifest, once connected.
    #[must_use]
    pub fn product_type(&self) -> Option<&str> {
        self.product_type.as_deref()
    }

    /// Returns true once a session is established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    fn validate(&self) -> std::result::Result<(), OnboardingError> {
        if self.email.is_empty() {
            return Err(OnboardingError::Configuration { field: "email" });
        }
        if self.password.is_empty() {
            return Err(OnboardingError::Configuration { field: "password" });
        }
        if self.ip.is_empty() {
            return Err(OnboardingError::Configuration { field: "ip" });
        }
        if self.port == 0 {
            return Err(OnboardingError::Configuration { field: "port" });
        }
        if self.serial.is_empty() {
            return Err(OnboardingError::Configuration { field: "serial" });
        }
        Ok(())
    }
}

impl Thermostat for CloudThermostat {
    async fn connect(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }
        self.validate()?;

        let cloud = CloudClient::with_endpoint(&self.endpoint)?;
        let credentials = cloud.authenticate(&self.email, &self.password).await?;
        let manifest = cloud.fetch_manifest(&credentials).await?;
        let (entry, secret) = cloud.resolve(&self.serial, &manifest)?;

        let session = SensorSession::connect(
            &self.ip,
            self.port,
            &entry.serial,
            &secret,
            &entry.product_type,
        )
        .await?;

        self.product_type = Some(entry.product_type.clone());
        self.session = Some(session);

        tracing::info!(
            ip = %self.ip,
            port = self.port,
            serial = %self.serial,
            email = %self.email,
            password = "******",
            "thermostat connected"
        );
        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            session.shutdown().await;
            tracing::info!(serial = %self.serial, "thermostat disconnected");
        }
    }

    async fn current_temperature(&self) -> Result<f64> {
        let session = self
            .session
            .as_ref()
            .ok_or(Error::Sensor(SensorError::NoReadingYet))?;
        session.current_temperature().map_err(Error::Sensor)
    }
}

/// Builder for [`CloudThermostat`].
///
/// Field presence is validated at `connect` time, not here, so a device can
/// be constructed straight from (possibly incomplete) configuration and
/// fail with a named `Configuration` error when actually used.
#[derive(Debug, Default)]
pub struct CloudThermostatBuilder {
    ip: String,
    port: Option<u16>,
    serial: String,
    email: String,
    password: String,
    endpoint: Option<String>,
}

impl CloudThermostatBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the device's local IP address.
    #[must_use]
    pub fn ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = ip.into();
        self
    }

    /// Sets the device session port (defaults to 1883).
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the device serial number.
    #[must_use]
    pub fn serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = serial.into();
        self
    }

    /// Sets the cloud account email.
    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    /// Sets the cloud account password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Overrides the cloud API endpoint (defaults to the vendor endpoint).
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Builds the device.
    #[must_use]
    pub fn build(self) -> CloudThermostat {
        CloudThermostat {
            ip: self.ip,
            port: self.port.unwrap_or(DEFAULT_PORT),
            serial: self.serial,
            email: self.email,
            password: self.password,
            endpoint: self.endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            product_type: None,
            session: None,
        }
    }
}
