// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Switch device abstraction for networked power relays.
//!
//! A [`Switch`] is anything that can report and set the power state of its
//! channels. The shipped implementation is [`TasmotaSwitch`], which polls a
//! Tasmota-flashed relay over HTTP with response caching and manual-override
//! tracking. The regulation loop only ever talks to the trait, so tests can
//! substitute a scripted switch.

mod tasmota;

pub use tasmota::TasmotaSwitch;

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use crate::error::SwitchError;

/// Resolved power state of one relay channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwitchStatus {
    /// The channel is powered.
    On,
    /// The channel is unpowered.
    Off,
    /// The relay reported something unrecognized, or nothing, for this
    /// channel. Treated as "not ON" by the regulation loop.
    Other,
}

impl SwitchStatus {
    /// Returns the relay command string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::On => "ON",
            Self::Off => "OFF",
            Self::Other => "OTHER",
        }
    }
}

impl fmt::Display for SwitchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SwitchStatus {
    type Err = std::convert::Infallible;

    /// Never fails: anything that is not `ON`/`OFF` resolves to
    /// [`SwitchStatus::Other`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "ON" => Self::On,
            "OFF" => Self::Off,
            _ => Self::Other,
        })
    }
}

/// Index of a power channel on a multi-relay switch.
///
/// The supported relays expose three independently addressable channels,
/// indexed 1 through 3.
///
/// # Examples
///
/// ```
/// use thermalink::switch::Channel;
///
/// let ch = Channel::new(3).unwrap();
/// assert_eq!(ch.value(), 3);
/// assert!(Channel::new(4).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Channel(u8);

impl Channel {
    /// Highest valid channel index.
    pub const MAX: u8 = 3;

    /// Creates a new channel index.
    ///
    /// # Errors
    ///
    /// Returns [`SwitchError::UnsupportedChannel`] if `index` is outside
    /// 1..=3.
    pub fn new(index: u8) -> Result<Self, SwitchError> {
        if index == 0 || index > Self::MAX {
            return Err(SwitchError::UnsupportedChannel(index));
        }
        Ok(Self(index))
    }

    /// Channel 1.
    #[must_use]
    pub const fn one() -> Self {
        Self(1)
    }

    /// Channel 2.
    #[must_use]
    pub const fn two() -> Self {
        Self(2)
    }

    /// Channel 3.
    #[must_use]
    pub const fn three() -> Self {
        Self(3)
    }

    /// Returns the numeric channel index.
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.0
    }

    /// Returns the zero-based array slot for this channel.
    #[must_use]
    pub(crate) const fn slot(&self) -> usize {
        (self.0 - 1) as usize
    }

    /// Returns the relay's JSON field name for this channel.
    #[must_use]
    pub fn field_name(&self) -> String {
        format!("POWER{}", self.0)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Capability trait for controllable power switches.
///
/// Implementations own their cache and override state exclusively, so the
/// methods take `&mut self` and no cross-switch locking is needed.
pub trait Switch {
    /// Returns the current status of a channel, refreshing from the device
    /// when the cached status has gone stale.
    ///
    /// # Errors
    ///
    /// Returns error on transport or decode failures; these are recoverable
    /// and the next call refreshes again.
    fn current_status(
        &mut self,
        channel: Channel,
    ) -> impl Future<Output = Result<SwitchStatus, SwitchError>> + Send;

    /// Turns a channel on, verifying the device acknowledged the new state.
    ///
    /// # Errors
    ///
    /// Returns error on transport/decode failures or when the device does
    /// not report the channel as `ON` afterwards.
    fn turn_on(&mut self, channel: Channel)
    -> impl Future<Output = Result<(), SwitchError>> + Send;

    /// Turns a channel off, verifying the device acknowledged the new state.
    ///
    /// # Errors
    ///
    /// Returns error on transport/decode failures or when the device does
    /// not report the channel as `OFF` afterwards.
    fn turn_off(
        &mut self,
        channel: Channel,
    ) -> impl Future<Output = Result<(), SwitchError>> + Send;

    /// Returns true while a detected manual actuation suppresses automated
    /// control of this switch.
    fn override_active(&self) -> bool;
}
