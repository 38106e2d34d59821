// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cloud onboarding client for the vendor device API.
//!
//! Onboarding is a three-step sequence, run once per device at connect time:
//!
//! 1. [`CloudClient::authenticate`] exchanges the account email/password for
//!    an intermediate credential pair.
//! 2. [`CloudClient::fetch_manifest`] lists the account's registered devices
//!    using those credentials as basic auth.
//! 3. [`CloudClient::resolve`] locates the target device by serial and
//!    decrypts its local session secret.
//!
//! None of the intermediate artifacts are persisted; the decrypted secret is
//! handed straight to the device session and never logged.

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::credential::decrypt_local_credential;
use crate::error::OnboardingError;

/// Default vendor API endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.cp.dyson.com";

/// Timeout applied to every cloud request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Intermediate credential pair returned by the cloud login endpoint.
///
/// Valid only for the manifest fetch that follows; never persisted.
#[derive(Clone, Deserialize)]
pub struct DeviceCredentials {
    /// Account identifier used as the basic-auth username.
    #[serde(rename = "Account")]
    pub account: String,
    /// Opaque session password used as the basic-auth password.
    #[serde(rename = "Password")]
    pub password: String,
}

impl fmt::Debug for DeviceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceCredentials")
            .field("account", &self.account)
            .field("password", &"******")
            .finish()
    }
}

/// One device descriptor from the account manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestEntry {
    /// Whether the device is active on the account.
    #[serde(rename = "Active", default)]
    pub active: bool,
    /// Device serial number.
    #[serde(rename = "Serial")]
    pub serial: String,
    /// User-assigned device name.
    #[serde(rename = "Name", default)]
    pub name: String,
    /// Temperature scale configured on the device.
    #[serde(rename = "ScaleUnit", default)]
    pub scale_unit: String,
    /// Firmware version string.
    #[serde(rename = "Version", default)]
    pub version: String,
    /// Encrypted local session credential blob.
    #[serde(rename = "LocalCredentials", default)]
    pub local_credentials: String,
    /// Whether the device auto-updates its firmware.
    #[serde(rename = "AutoUpdate", default)]
    pub auto_update: bool,
    /// Whether newer firmware is available.
    #[serde(rename = "NewVersionAvailable", default)]
    pub new_version_available: bool,
    /// Product type code; first segment of the device's MQTT topics.
    #[serde(rename = "ProductType", default)]
    pub product_type: String,
}

/// Client for the vendor cloud API.
///
/// # Examples
///
/// ```no_run
/// use thermalink::cloud::CloudClient;
///
/// # async fn example() -> thermalink::Result<()> {
/// let cloud = CloudClient::new()?;
/// let credentials = cloud.authenticate("user@example.com", "hunter2").await?;
/// let manifest = cloud.fetch_manifest(&credentials).await?;
/// let (entry, secret) = cloud.resolve("NN2-US-ABC1234D", &manifest)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CloudClient {
    endpoint: String,
    client: Client,
}

impl CloudClient {
    /// Creates a client against the default vendor endpoint.
    ///
    /// # Errors
    ///
    /// Returns error if the underlying HTTP client cannot be created.
    pub fn new() -> Result<Self, OnboardingError> {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    /// Creates a client against a custom endpoint.
    ///
    /// Mostly useful for pointing at a test server.
    ///
    /// # Errors
    ///
    /// Returns error if the underlying HTTP client cannot be created.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self, OnboardingError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(OnboardingError::Transport)?;

        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    /// Returns the configured endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Exchanges the account email/password for intermediate credentials.
    ///
    /// # Errors
    ///
    /// Returns [`OnboardingError::AuthenticationFailed`] on a non-success
    /// status or an unparseable response body, and
    /// [`OnboardingError::Transport`] if the request itself fails.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<DeviceCredentials, OnboardingError> {
        let url = format!(
            "{}/v1/userregistration/authenticate?country=US",
            self.endpoint
        );

        tracing::debug!(url = %url, email = %email, "authenticating against cloud");

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "Email": email, "Password": password }))
            .send()
            .await
            .map_err(OnboardingError::Transport)?;

        if !response.status().is_success() {
            return Err(OnboardingError::AuthenticationFailed(format!(
                "login rejected with HTTP {} -- check email {email} and password",
                response.status().as_u16()
            )));
        }

        let credentials: DeviceCredentials = response.json().await.map_err(|e| {
            OnboardingError::AuthenticationFailed(format!("unusable login response: {e}"))
        })?;

        tracing::debug!(account = %credentials.account, "obtained intermediate credentials");
        Ok(credentials)
    }

    /// Fetches the account's device manifest.
    ///
    /// # Errors
    ///
    /// Returns [`OnboardingError::AuthenticationFailed`] on a non-success
    /// status or an unparseable body, and [`OnboardingError::Transport`] if
    /// the request itself fails.
    pub async fn fetch_manifest(
        &self,
        credentials: &DeviceCredentials,
    ) -> Result<Vec<ManifestEntry>, OnboardingError> {
        let url = format!("{}/v1/provisioningservice/manifest", self.endpoint);

        tracing::debug!(url = %url, "fetching device manifest");

        let response = self
            .client
            .get(&url)
            .basic_auth(&credentials.account, Some(&credentials.password))
            .send()
            .await
            .map_err(OnboardingError::Transport)?;

        if !response.status().is_success() {
            return Err(OnboardingError::AuthenticationFailed(format!(
                "manifest fetch rejected with HTTP {} for account {}",
                response.status().as_u16(),
                credentials.account
            )));
        }

        let manifest: Vec<ManifestEntry> = response.json().await.map_err(|e| {
            OnboardingError::AuthenticationFailed(format!("unusable manifest response: {e}"))
        })?;

        tracing::debug!(devices = manifest.len(), "manifest received");
        Ok(manifest)
    }

    /// Locates a device by serial and decrypts its local session secret.
    ///
    /// # Errors
    ///
    /// Returns [`OnboardingError::DeviceNotFound`] if no entry matches the
    /// serial, or [`OnboardingError::MalformedCredential`] if the entry's
    /// credential blob cannot be decrypted.
    pub fn resolve<'a>(
        &self,
        serial: &str,
        manifest: &'a [ManifestEntry],
    ) -> Result<(&'a ManifestEntry, String), OnboardingError> {
        let entry = manifest
            .iter()
            .find(|entry| entry.serial == serial)
            .ok_or_else(|| OnboardingError::DeviceNotFound {
                serial: serial.to_string(),
            })?;

        let secret = decrypt_local_credential(&entry.local_credentials)?;

        tracing::debug!(
            serial = %entry.serial,
            product_type = %entry.product_type,
            "resolved device from manifest"
        );
        Ok((entry, secret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(serial: &str) -> ManifestEntry {
        ManifestEntry {
            active: true,
            serial: serial.to_string(),
            name: "Office".to_string(),
            scale_unit: "CELSIUS".to_string(),
            version: "21.03.08".to_string(),
            local_credentials: String::new(),
            auto_update: true,
            new_version_available: false,
            product_type: "475".to_string(),
        }
    }

    #[test]
    fn resolve_unknown_serial_is_device_not_found() {
        let cloud = CloudClient::with_endpoint("http://localhost").unwrap();
        let manifest = vec![entry("AAA-US-0000000A")];

        let err = cloud.resolve("BBB-US-1111111B", &manifest).unwrap_err();
        assert!(matches!(
            err,
            OnboardingError::DeviceNotFound { serial } if serial == "BBB-US-1111111B"
        ));
    }

    #[test]
    fn resolve_propagates_malformed_credential() {
        let cloud = CloudClient::with_endpoint("http://localhost").unwrap();
        let mut bad = entry("AAA-US-0000000A");
        bad.local_credentials = "%%%not-base64%%%".to_string();

        let err = cloud.resolve("AAA-US-0000000A", &[bad]).unwrap_err();
        assert!(matches!(err, OnboardingError::MalformedCredential(_)));
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let creds = DeviceCredentials {
            account: "acct-1".to_string(),
            password: "topsecret".to_string(),
        };
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("acct-1"));
        assert!(!rendered.contains("topsecret"));
    }

    #[test]
    fn manifest_entry_deserializes_vendor_fields() {
        let json = r#"{
            "Active": true,
            "Serial": "NN2-US-ABC1234D",
            "Name": "Bedroom",
            "ScaleUnit": "CELSIUS",
            "Version": "21.03.08",
            "LocalCredentials": "abc=",
            "AutoUpdate": true,
            "NewVersionAvailable": false,
            "ProductType": "475"
        }"#;
        let entry: ManifestEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.serial, "NN2-US-ABC1234D");
        assert_eq!(entry.product_type, "475");
        assert!(entry.active);
    }
}
