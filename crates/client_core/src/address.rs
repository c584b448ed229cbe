//! Reversible room id <-> channel address transform.
//!
//! Room ids embed display names (often Hangul), so the id is taken as UTF-8
//! bytes and base64-encoded with the URL-safe alphabet and no padding, which
//! keeps the address usable as a single path segment.

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD},
    Engine as _,
};
use shared::{domain::RoomId, error::AddressError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelAddress(String);

impl ChannelAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChannelAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn encode(room_id: &RoomId) -> ChannelAddress {
    ChannelAddress(URL_SAFE_NO_PAD.encode(room_id.as_str().as_bytes()))
}

/// Accepts URL-safe base64 with or without padding, then standard base64.
pub fn decode(address: &str) -> Result<RoomId, AddressError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(AddressError::Empty);
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(address)
        .or_else(|_| URL_SAFE.decode(address))
        .or_else(|_| STANDARD.decode(address))
        .map_err(|err| AddressError::NotBase64(err.to_string()))?;

    String::from_utf8(bytes)
        .map(RoomId::from)
        .map_err(|err| AddressError::NotUtf8(err.to_string()))
}

#[cfg(test)]
#[path = "tests/address_tests.rs"]
mod tests;
