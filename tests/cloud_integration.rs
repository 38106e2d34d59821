// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the cloud onboarding sequence using wiremock.

use thermalink::{CloudClient, DeviceCredentials, OnboardingError};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Credential blob whose decrypted JSON carries the device password
/// `super-secret-device-password`.
const CREDENTIAL_BLOB: &str =
    "byH6lSNJdZ3sJ/28IGisGNHMAZspDpiGgxwJsgJIOL3QuaNM5sJqQGFwUjd5R6QsDVbbfDeMNpmgvMfMBnDnJg==";

fn manifest_entry(serial: &str) -> serde_json::Value {
    serde_json::json!({
        "Active": true,
        "Serial": serial,
        "Name": "Bedroom",
        "ScaleUnit": "SU0",
        "Version": "21.03.08",
        "LocalCredentials": CREDENTIAL_BLOB,
        "AutoUpdate": true,
        "NewVersionAvailable": false,
        "ProductType": "455"
    })
}

// ============================================================================
// Authentication Tests
// ============================================================================

mod authentication {
    use super::*;

    #[tokio::test]
    async fn exchanges_login_for_credentials() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/userregistration/authenticate"))
            .and(query_param("country", "US"))
            .and(body_json(serde_json::json!({
                "Email": "user@example.com",
                "Password": "hunter2"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Account": "a1b2-account",
                "Password": "p3p4-password"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let cloud = CloudClient::with_endpoint(mock_server.uri()).unwrap();
        let credentials = cloud
            .authenticate("user@example.com", "hunter2")
            .await
            .unwrap();

        assert_eq!(credentials.account, "a1b2-account");
        assert_eq!(credentials.password, "p3p4-password");
    }

    #[tokio::test]
    async fn rejected_login_is_authentication_failed() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/userregistration/authenticate"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let cloud = CloudClient::with_endpoint(mock_server.uri()).unwrap();
        let err = cloud
            .authenticate("user@example.com", "wrong")
            .await
            .unwrap_err();

        assert!(matches!(err, OnboardingError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn unparseable_login_response_is_authentication_failed() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/userregistration/authenticate"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let cloud = CloudClient::with_endpoint(mock_server.uri()).unwrap();
        let err = cloud
            .authenticate("user@example.com", "hunter2")
            .await
            .unwrap_err();

        assert!(matches!(err, OnboardingError::AuthenticationFailed(_)));
    }
}

// ============================================================================
// Manifest Tests
// ============================================================================

mod manifest {
    use super::*;

    fn credentials() -> DeviceCredentials {
        DeviceCredentials {
            account: "a1b2-account".to_string(),
            password: "p3p4-password".to_string(),
        }
    }

    #[tokio::test]
    async fn fetches_manifest_with_basic_auth() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/provisioningservice/manifest"))
            .and(header(
                "authorization",
                "Basic YTFiMi1hY2NvdW50OnAzcDQtcGFzc3dvcmQ=",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                manifest_entry("NN2-US-ABC1234D"),
                manifest_entry("NN2-US-XYZ9876E")
            ])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let cloud = CloudClient::with_endpoint(mock_server.uri()).unwrap();
        let manifest = cloud.fetch_manifest(&credentials()).await.unwrap();

        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest[0].serial, "NN2-US-ABC1234D");
        assert_eq!(manifest[0].product_type, "455");
    }

    #[tokio::test]
    async fn rejected_manifest_fetch_is_authentication_failed() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/provisioningservice/manifest"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&mock_server)
            .await;

        let cloud = CloudClient::with_endpoint(mock_server.uri()).unwrap();
        let err = cloud.fetch_manifest(&credentials()).await.unwrap_err();

        assert!(matches!(err, OnboardingError::AuthenticationFailed(_)));
    }
}

// ============================================================================
// Resolve Tests
// ============================================================================

mod resolve {
    use super::*;

    #[tokio::test]
    async fn full_sequence_yields_decrypted_secret() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/userregistration/authenticate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Account": "a1b2-account",
                "Password": "p3p4-password"
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/provisioningservice/manifest"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([manifest_entry("NN2-US-ABC1234D")])),
            )
            .mount(&mock_server)
            .await;

        let cloud = CloudClient::with_endpoint(mock_server.uri()).unwrap();
        let credentials = cloud.authenticate("user@example.com", "hunter2").await.unwrap();
        let manifest = cloud.fetch_manifest(&credentials).await.unwrap();
        let (entry, secret) = cloud.resolve("NN2-US-ABC1234D", &manifest).unwrap();

        assert_eq!(entry.product_type, "455");
        assert_eq!(secret, "super-secret-device-password");
    }

    #[tokio::test]
    async fn unknown_serial_is_device_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/provisioningservice/manifest"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([manifest_entry("NN2-US-ABC1234D")])),
            )
            .mount(&mock_server)
            .await;

        let cloud = CloudClient::with_endpoint(mock_server.uri()).unwrap();
        let credentials = DeviceCredentials {
            account: "a1b2-account".to_string(),
            password: "p3p4-password".to_string(),
        };
        let manifest = cloud.fetch_manifest(&credentials).await.unwrap();
        let err = cloud.resolve("NN2-US-MISSING", &manifest).unwrap_err();

        assert!(matches!(
            err,
            OnboardingError::DeviceNotFound { serial } if serial == "NN2-US-MISSING"
        ));
    }
}
