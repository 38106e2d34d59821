// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decryption of the vendor's encrypted local device credential.
//!
//! The cloud manifest carries each device's local session password as a
//! base64-encoded, AES-128-CBC-encrypted, PKCS7-padded JSON blob. The key
//! and initialization vector are fixed constants of the vendor protocol --
//! every device in the field uses the same pair, so compatibility requires
//! reproducing them exactly. This is a known weakness of the protocol, not
//! secret material chosen by this library.
//!
//! Decryption is a pure function with no side effects; neither the input
//! blob nor the extracted secret is ever logged.

use std::collections::HashMap;

use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, KeyIvInit};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::error::OnboardingError;

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// Fixed protocol key, mandated by the vendor's local-credential scheme.
const CREDENTIAL_KEY: [u8; 16] = [
    0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
    0x10,
];

/// Fixed all-zero initialization vector, likewise protocol-mandated.
const CREDENTIAL_IV: [u8; 16] = [0u8; 16];

/// JSON field holding the device session password inside the decrypted blob.
const SECRET_FIELD: &str = "apPasswordHash";

/// Decrypts an encrypted local credential blob into the plaintext device
/// session secret.
///
/// # Errors
///
/// Returns [`OnboardingError::MalformedCredential`] if the blob is not valid
/// base64, is not a whole number of cipher blocks, carries an impossible
/// PKCS7 padding length, or does not decrypt to a JSON document containing
/// the secret field. All of these typically mean the blob was corrupted in
/// transit or produced for a different protocol revision.
pub fn decrypt_local_credential(encrypted: &str) -> Result<String, OnboardingError> {
    let mut data = BASE64
        .decode(encrypted)
        .map_err(|e| OnboardingError::MalformedCredential(format!("invalid base64: {e}")))?;

    if data.is_empty() || data.len() % 16 != 0 {
        return Err(OnboardingError::MalformedCredential(format!(
            "ciphertext length {} is not a whole number of blocks",
            data.len()
        )));
    }

    Aes128CbcDec::new(&CREDENTIAL_KEY.into(), &CREDENTIAL_IV.into())
        .decrypt_padded_mut::<NoPadding>(&mut data)
        .map_err(|_| OnboardingError::MalformedCredential("block decryption failed".into()))?;

    let plaintext = unpad(&data)?;

    let fields: HashMap<String, String> = serde_json::from_slice(plaintext).map_err(|_| {
        OnboardingError::MalformedCredential(
            "decrypted payload is not a JSON object -- wrong key or corrupt blob".into(),
        )
    })?;

    fields.get(SECRET_FIELD).cloned().ok_or_else(|| {
        OnboardingError::MalformedCredential(format!(
            "decrypted payload has no {SECRET_FIELD} field"
        ))
    })
}

/// Strips PKCS7 padding from a decrypted buffer.
fn unpad(data: &[u8]) -> Result<&[u8], OnboardingError> {
    if data.len() <= 1 {
        return Err(OnboardingError::MalformedCredential(
            "decrypted payload too short to be padded".into(),
        ));
    }
    let padding = usize::from(data[data.len() - 1]);
    if padding > data.len() {
        return Err(OnboardingError::MalformedCredential(
            "padding length exceeds payload -- wrong key or corrupt blob".into(),
        ));
    }
    Ok(&data[..data.len() - padding])
}
