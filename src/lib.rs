// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `ThermaLink` - A Rust library for regulating Tasmota relays from a
//! cloud-onboarded climate sensor.
//!
//! The library wires three pieces together:
//!
//! - **Thermostat**: a cloud-onboarded temperature sensor; the library
//!   authenticates against the vendor cloud, locates the device in the
//!   account manifest, decrypts its local credential, and keeps a live
//!   publish/subscribe session feeding the current room temperature.
//! - **Switch**: a Tasmota-powered relay controlled over its local HTTP
//!   command interface, with status caching and manual-override detection.
//! - **Home**: the coordinator that runs a hysteresis regulation loop
//!   driving the switches toward a desired temperature.
//!
//! # Quick Start
//!
//! ## Regulating a Home
//!
//! ```no_run
//! use thermalink::{Channel, Home, TasmotaSwitch};
//! use thermalink::sensor::CloudThermostat;
//!
//! #[tokio::main]
//! async fn main() -> thermalink::Result<()> {
//!     let sensor = CloudThermostat::builder()
//!         .ip("192.168.1.20")
//!         .serial("NN2-US-ABC1234D")
//!         .email("user@example.com")
//!         .password("hunter2")
//!         .build();
//!
//!     let mut home = Home::new("living-room", sensor);
//!     home.add_switch(TasmotaSwitch::new("192.168.1.30")?, Channel::three());
//!
//!     let handle = home.start().await?;
//!     handle.set_desired_temperature(72.0);
//!
//!     // ... the regulation loop now runs in the background ...
//!
//!     handle.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Driving a Relay Directly
//!
//! ```no_run
//! use thermalink::{Channel, Switch, TasmotaSwitch};
//!
//! #[tokio::main]
//! async fn main() -> thermalink::Result<()> {
//!     let mut relay = TasmotaSwitch::new("192.168.1.30")?;
//!
//!     let status = relay.current_status(Channel::three()).await?;
//!     println!("channel 3 is {status}");
//!
//!     relay.turn_on(Channel::three()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Loading a Home from Configuration
//!
//! ```no_run
//! use thermalink::{Home, HomeConfig};
//!
//! #[tokio::main]
//! async fn main() -> thermalink::Result<()> {
//!     let config = HomeConfig::load("thermalink.yaml")?;
//!
//!     let mut home = Home::new(&config.name, config.thermostat.build());
//!     for section in &config.switches {
//!         let (switch, channel) = section.build()?;
//!         home.add_switch(switch, channel);
//!     }
//!
//!     let handle = home.start().await?;
//!     handle.set_desired_temperature(72.0);
//!     handle.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod cloud;
pub mod config;
mod credential;
pub mod error;
mod home;
pub mod regulator;
pub mod sensor;
pub mod switch;

pub use cloud::{CloudClient, DeviceCredentials, ManifestEntry};
pub use config::{HomeConfig, SwitchConfig, ThermostatConfig};
pub use error::{ConfigError, Error, OnboardingError, Result, SensorError, SwitchError};
pub use home::{Home, HomeHandle};
pub use regulator::{RegulatorConfig, DEFAULT_CYCLE_INTERVAL, TEMPERATURE_PADDING};
pub use sensor::{CloudThermostat, MockThermostat, Thermostat};
pub use switch::{Channel, Switch, SwitchStatus, TasmotaSwitch};
