// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tasmota relay switch with status caching and manual-override tracking.
//!
//! The relay is polled over its web API (`/cm?cmnd=state`); responses are
//! cached for a validity window so the regulation loop does not hammer the
//! device every cycle. Divergence between the state automation last
//! commanded and the state the relay reports means a human toggled the
//! switch by hand; automated control is then suppressed for the override
//! window.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;

use super::{Channel, Switch, SwitchStatus};
use crate::error::SwitchError;

/// How long a fetched relay status stays valid before a refresh is forced.
pub const DEFAULT_VALIDITY_WINDOW: Duration = Duration::from_secs(30);

/// How long a detected manual actuation suppresses automated control.
pub const DEFAULT_OVERRIDE_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Timeout applied to every relay request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Status payload returned by the relay's `state` command.
///
/// The full payload carries uptime, wifi and load data as well; only the
/// power fields matter here.
#[derive(Debug, Deserialize)]
struct RelayState {
    #[serde(rename = "POWER1")]
    power1: Option<String>,
    #[serde(rename = "POWER2")]
    power2: Option<String>,
    #[serde(rename = "POWER3")]
    power3: Option<String>,
}

impl RelayState {
    fn resolved(&self) -> [SwitchStatus; 3] {
        [&self.power1, &self.power2, &self.power3].map(|field| {
            field
                .as_deref()
                .map_or(SwitchStatus::Other, |s| s.parse().unwrap_or(SwitchStatus::Other))
        })
    }
}

/// Cached result of the last status fetch.
#[derive(Debug)]
struct StatusCache {
    channels: [SwitchStatus; 3],
    fetched_at: Option<Instant>,
    last_fetch_ok: bool,
}

impl StatusCache {
    fn new() -> Self {
        Self {
            channels: [SwitchStatus::Other; 3],
            fetched_at: None,
            last_fetch_ok: false,
        }
    }

    /// Fresh means the last fetch succeeded and the window has not elapsed.
    /// Stale the instant `now >= fetched_at + window`.
    fn is_fresh(&self, window: Duration) -> bool {
        self.last_fetch_ok
            && self
                .fetched_at
                .is_some_and(|at| Instant::now() < at + window)
    }
}

/// Manual-override bookkeeping.
#[derive(Debug, Default)]
struct OverrideState {
    active: bool,
    started_at: Option<Instant>,
}

/// A Tasmota-flashed power relay with up to three channels.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use thermalink::switch::{Channel, Switch, TasmotaSwitch};
///
/// # async fn example() -> thermalink::Result<()> {
/// let mut relay = TasmotaSwitch::new("192.168.1.40")?
///     .with_validity_window(Duration::from_secs(5));
///
/// let status = relay.current_status(Channel::three()).await?;
/// relay.turn_on(Channel::three()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TasmotaSwitch {
    base_url: String,
    client: Client,
    validity_window: Duration,
    override_window: Duration,
    cache: StatusCache,
    /// Last state automation intended per channel; `None` until observed
    /// or commanded for the first time.
    intent: [Option<SwitchStatus>; 3],
    override_state: OverrideState,
}

impl TasmotaSwitch {
    /// Creates a switch for the relay at the given host or URI.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn new(uri: impl Into<String>) -> Result<Self, SwitchError> {
        let uri = uri.into();
        let base_url = if uri.starts_with("http://") || uri.starts_with("https://") {
            uri
        } else {
            format!("http://{uri}")
        };

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(SwitchError::Transport)?;

        Ok(Self {
            base_url,
            client,
            validity_window: DEFAULT_VALIDITY_WINDOW,
            override_window: DEFAULT_OVERRIDE_WINDOW,
            cache: StatusCache::new(),
            intent: [None; 3],
            override_state: OverrideState::default(),
        })
    }

    /// Sets how long a fetched status stays valid.
    #[must_use]
    pub fn with_validity_window(mut self, window: Duration) -> Self {
        self.validity_window = window;
        self
    }

    /// Sets how long a manual actuation suppresses automated control.
    #[must_use]
    pub fn with_override_window(mut self, window: Duration) -> Self {
        self.override_window = window;
        self
    }

    /// Returns the relay's base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn command_url(&self, command: &str) -> String {
        format!("{}/cm?cmnd={}", self.base_url, urlencoding::encode(command))
    }

    /// Fetches the relay state and updates the cache.
    ///
    /// A failed fetch poisons the cache so the next call refreshes again.
    async fn refresh(&mut self) -> Result<(), SwitchError> {
        let url = self.command_url("state");
        tracing::debug!(url = %url, "refreshing relay status");

        let result = async {
            let body = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(SwitchError::Transport)?
                .error_for_status()
                .map_err(SwitchError::Transport)?
                .text()
                .await
                .map_err(SwitchError::Transport)?;

            let state: RelayState = serde_json::from_str(&body).map_err(SwitchError::Decode)?;
            Ok::<RelayState, SwitchError>(state)
        }
        .await;

        match result {
            Ok(state) => {
                self.cache.channels = state.resolved();
                self.cache.fetched_at = Some(Instant::now());
                self.cache.last_fetch_ok = true;

                // First successful observation becomes the automation
                // baseline, so later hand-toggles register as divergence.
                for slot in 0..3 {
                    if self.intent[slot].is_none() {
                        self.intent[slot] = Some(self.cache.channels[slot]);
                    }
                }

                self.evaluate_override_entry();
                Ok(())
            }
            Err(e) => {
                self.cache.last_fetch_ok = false;
                Err(e)
            }
        }
    }

    /// Enters override when any channel diverges from its intended state.
    fn evaluate_override_entry(&mut self) {
        if self.override_state.active {
            return;
        }
        for slot in 0..3 {
            if let Some(intended) = self.intent[slot]
                && self.cache.channels[slot] != intended
            {
                self.override_state.active = true;
                self.override_state.started_at = Some(Instant::now());
                tracing::info!(
                    relay = %self.base_url,
                    channel = slot + 1,
                    observed = %self.cache.channels[slot],
                    intended = %intended,
                    "manual override detected, suspending automated control"
                );
                return;
            }
        }
    }

    /// Clears an expired override, regardless of relay status, and adopts
    /// the observed state as the new automation baseline so the same
    /// divergence does not immediately re-trigger.
    fn expire_override(&mut self) {
        if self.override_state.active
            && let Some(started) = self.override_state.started_at
            && Instant::now() >= started + self.override_window
        {
            self.override_state.active = false;
            self.override_state.started_at = None;
            for slot in 0..3 {
                if self.intent[slot].is_some() {
                    self.intent[slot] = Some(self.cache.channels[slot]);
                }
            }
            tracing::info!(relay = %self.base_url, "manual override window elapsed, resuming automated control");
        }
    }

    /// Issues a power command; a positive acknowledgement updates the
    /// commanded channel's cached state and intent in place.
    async fn set_power(&mut self, channel: Channel, state: SwitchStatus) -> Result<(), SwitchError> {
        // Refresh first so a hand-toggle right before the command still
        // registers as an override.
        self.current_status(channel).await?;

        let command = format!("POWER{} {}", channel.value(), state.as_str());
        let url = self.command_url(&command);
        tracing::debug!(url = %url, "sending relay power command");

        let body = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(SwitchError::Transport)?
            .error_for_status()
            .map_err(SwitchError::Transport)?
            .text()
            .await
            .map_err(SwitchError::Transport)?;

        let ack: HashMap<String, String> =
            serde_json::from_str(&body).map_err(SwitchError::Decode)?;

        let acked = ack
            .get(&channel.field_name())
            .map(|s| s.parse::<SwitchStatus>().unwrap_or(SwitchStatus::Other));

        if acked == Some(state) {
            // The ack confirms the commanded channel only; update it in
            // place without renewing the cache's age, since the other
            // channels were not re-confirmed.
            self.intent[channel.slot()] = Some(state);
            self.cache.channels[channel.slot()] = state;
            Ok(())
        } else {
            tracing::warn!(
                relay = %self.base_url,
                channel = %channel,
                requested = %state,
                acknowledged = ?ack.get(&channel.field_name()),
                "relay did not acknowledge power command"
            );
            Err(SwitchError::CommandNotAcknowledged {
                channel,
                requested: state,
            })
        }
    }
}

impl Switch for TasmotaSwitch {
    async fn current_status(&mut self, channel: Channel) -> Result<SwitchStatus, SwitchError> {
        self.expire_override();

        if self.cache.is_fresh(self.validity_window) {
            tracing::debug!(relay = %self.base_url, channel = %channel, "using cached relay status");
            return Ok(self.cache.channels[channel.slot()]);
        }

        self.refresh().await?;
        Ok(self.cache.channels[channel.slot()])
    }

    async fn turn_on(&mut self, channel: Channel) -> Result<(), SwitchError> {
        self.set_power(channel, SwitchStatus::On).await
    }

    async fn turn_off(&mut self, channel: Channel) -> Result<(), SwitchError> {
        self.set_power(channel, SwitchStatus::Off).await
    }

    fn override_active(&self) -> bool {
        self.override_state.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_http_prefix() {
        let relay = TasmotaSwitch::new("192.168.1.40").unwrap();
        assert_eq!(relay.base_url(), "http://192.168.1.40");
    }

    #[test]
    fn base_url_keeps_explicit_scheme() {
        let relay = TasmotaSwitch::new("https://relay.local").unwrap();
        assert_eq!(relay.base_url(), "https://relay.local");
    }

    #[test]
    fn command_url_encodes_spaces() {
        let relay = TasmotaSwitch::new("192.168.1.40").unwrap();
        assert_eq!(
            relay.command_url("POWER3 ON"),
            "http://192.168.1.40/cm?cmnd=POWER3%20ON"
        );
    }

    #[test]
    fn relay_state_missing_fields_resolve_to_other() {
        let state: RelayState = serde_json::from_str(r#"{"POWER1": "ON"}"#).unwrap();
        assert_eq!(
            state.resolved(),
            [SwitchStatus::On, SwitchStatus::Other, SwitchStatus::Other]
        );
    }

    #[test]
    fn empty_cache_is_never_fresh() {
        let cache = StatusCache::new();
        assert!(!cache.is_fresh(Duration::from_secs(3600)));
    }

    #[test]
    fn failed_fetch_poisons_cache() {
        let mut cache = StatusCache::new();
        cache.fetched_at = Some(Instant::now());
        cache.last_fetch_ok = false;
        assert!(!cache.is_fresh(Duration::from_secs(3600)));
    }

    #[test]
    fn zero_window_is_immediately_stale() {
        let mut cache = StatusCache::new();
        cache.fetched_at = Some(Instant::now());
        cache.last_fetch_ok = true;
        assert!(!cache.is_fresh(Duration::ZERO));
    }

    #[test]
    fn override_expiry_adopts_observed_state() {
        let mut relay = TasmotaSwitch::new("192.168.1.40")
            .unwrap()
            .with_override_window(Duration::ZERO);
        relay.cache.channels = [SwitchStatus::Off, SwitchStatus::Off, SwitchStatus::On];
        relay.intent = [Some(SwitchStatus::Off); 3];
        relay.override_state.active = true;
        relay.override_state.started_at = Some(Instant::now());

        relay.expire_override();

        assert!(!relay.override_active());
        assert_eq!(relay.intent[2], Some(SwitchStatus::On));
    }
}
