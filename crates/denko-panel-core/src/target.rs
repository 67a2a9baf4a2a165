//! Device address and preset slot.

use crate::{Error, Result, PRESET_COUNT};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Query parameter that carries the device address in share links.
pub const ADDRESS_QUERY_KEY: &str = "esp-ip";

/// Preset slot on the device (1-4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PresetId(u8);

impl PresetId {
    /// Creates a preset identifier, checking the slot range.
    pub fn new(id: u8) -> Result<Self> {
        if (1..=PRESET_COUNT).contains(&id) {
            Ok(Self(id))
        } else {
            Err(Error::InvalidPreset(id.to_string()))
        }
    }

    /// Returns all preset slots in order.
    pub fn all() -> impl Iterator<Item = PresetId> {
        (1..=PRESET_COUNT).map(PresetId)
    }

    /// Returns the slot number.
    pub fn get(&self) -> u8 {
        self.0
    }
}

impl Default for PresetId {
    fn default() -> Self {
        Self(1)
    }
}

impl FromStr for PresetId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u8>()
            .map_err(|_| Error::InvalidPreset(s.to_string()))
            .and_then(Self::new)
    }
}

impl fmt::Display for PresetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for PresetId {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<PresetId> for u8 {
    fn from(id: PresetId) -> Self {
        id.0
    }
}

/// Where a job sends its frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTarget {
    address: String,
    preset: PresetId,
}

impl DeviceTarget {
    /// Creates a target, normalizing the address.
    ///
    /// Accepts `host`, `host:port`, or the same with an `http://` prefix
    /// and trailing slashes.
    pub fn new(address: &str, preset: PresetId) -> Result<Self> {
        let address = normalize_address(address);
        if address.is_empty() {
            return Err(Error::EmptyAddress);
        }
        Ok(Self { address, preset })
    }

    /// Returns the normalized device address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the preset slot.
    pub fn preset(&self) -> PresetId {
        self.preset
    }

    /// Returns `http://{address}`.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.address)
    }

    /// URL of the per-frame upload endpoint.
    pub fn frames_url(&self) -> String {
        format!("{}/presets/{}/frames", self.base_url(), self.preset)
    }

    /// URL of the preset configuration endpoint.
    pub fn preset_url(&self) -> String {
        format!("{}/presets/{}", self.base_url(), self.preset)
    }

    /// URL of the legacy single-frame endpoint.
    pub fn contents_url(&self) -> String {
        format!("{}/contents/{}", self.base_url(), self.preset)
    }

    /// Builds a link to `base` that carries this target's address.
    pub fn share_link(&self, base: &str) -> Result<String> {
        let mut url = Url::parse(base).map_err(|e| Error::InvalidLink(e.to_string()))?;
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != ADDRESS_QUERY_KEY)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .append_pair(ADDRESS_QUERY_KEY, &self.address);
        Ok(url.to_string())
    }
}

/// Extracts the device address from a share link, if it carries one.
pub fn address_from_link(link: &str) -> Result<Option<String>> {
    let url = Url::parse(link).map_err(|e| Error::InvalidLink(e.to_string()))?;
    Ok(url
        .query_pairs()
        .find(|(k, _)| k == ADDRESS_QUERY_KEY)
        .map(|(_, v)| normalize_address(&v))
        .filter(|a| !a.is_empty()))
}

fn normalize_address(address: &str) -> String {
    let trimmed = address.trim();
    let without_scheme = trimmed.strip_prefix("http://").unwrap_or(trimmed);
    without_scheme.trim_end_matches('/').to_string()
}
