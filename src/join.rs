//! Join code generation for voter onboarding
//!
//! This module provides the short code and vote URL new voters use to
//! join a session. Codes are displayed in octal format to make them
//! easier to communicate verbally; the scannable image for the join URL
//! is rendered by the serving layer, which exposes [`JoinInfo`] through
//! its one read endpoint.

use std::{fmt::Display, num::ParseIntError, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};

/// Minimum value for generated join codes (in octal: 10000)
const MIN_VALUE: u16 = 0o10_000;
/// Maximum value for generated join codes (in octal: 100000)
const MAX_VALUE: u16 = 0o100_000;

/// A short joining code for a voting session
///
/// Join codes are generated randomly within a range that always displays
/// as a 5-digit octal number, reducing confusion when the code is read
/// aloud off the shared display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JoinCode(u16);

impl JoinCode {
    /// Creates a new random join code
    pub fn new() -> Self {
        Self(fastrand::u16(MIN_VALUE..MAX_VALUE))
    }
}

impl Default for JoinCode {
    /// Creates a new random join code (same as `new()`)
    fn default() -> Self {
        Self::new()
    }
}

impl Display for JoinCode {
    /// Formats the join code as a 5-digit octal number
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:05o}", self.0)
    }
}

impl Serialize for JoinCode {
    /// Serializes the join code as an octal string
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for JoinCode {
    /// Deserializes a join code from an octal string
    fn deserialize<D>(deserializer: D) -> Result<JoinCode, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        JoinCode::from_str(&s).map_err(|e| serde::de::Error::custom(e.to_string()))
    }
}

impl FromStr for JoinCode {
    type Err = ParseIntError;

    /// Parses a join code from an octal string representation
    ///
    /// # Errors
    ///
    /// Returns a `ParseIntError` if the string cannot be parsed as a
    /// valid octal number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(u16::from_str_radix(s, 8)?))
    }
}

/// Payload of the join endpoint
///
/// The serving layer returns this alongside a scannable rendering of
/// `url`; the coordinator itself never touches HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinInfo {
    /// The session's join code
    pub code: JoinCode,
    /// The URL a voter's phone opens to start voting
    pub url: String,
}

impl JoinInfo {
    /// Builds the join payload for a session hosted at `base_url`
    pub fn new(base_url: &str, code: JoinCode) -> Self {
        Self {
            code,
            url: format!("{}/vote/{code}", base_url.trim_end_matches('/')),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_code_new_in_range() {
        for _ in 0..100 {
            let code = JoinCode::new();
            assert!(code.0 >= MIN_VALUE);
            assert!(code.0 < MAX_VALUE);
        }
    }

    #[test]
    fn test_join_code_display_format() {
        assert_eq!(JoinCode(MIN_VALUE).to_string(), "10000");
        assert_eq!(JoinCode(MAX_VALUE - 1).to_string(), "77777");
    }

    #[test]
    fn test_join_code_from_str() {
        assert_eq!(JoinCode::from_str("12345").unwrap(), JoinCode(0o12345));
        assert!(JoinCode::from_str("888").is_err());
        assert!(JoinCode::from_str("invalid").is_err());
        assert!(JoinCode::from_str("").is_err());
    }

    #[test]
    fn test_join_code_serialization() {
        let code = JoinCode(0o12345);
        let serialized = serde_json::to_string(&code).unwrap();
        assert_eq!(serialized, "\"12345\"");

        let deserialized: JoinCode = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, code);
    }

    #[test]
    fn test_join_info_url() {
        let info = JoinInfo::new("https://example.com/", JoinCode(0o12345));
        assert_eq!(info.url, "https://example.com/vote/12345");

        let bare = JoinInfo::new("http://10.0.0.5:3000", JoinCode(0o12345));
        assert_eq!(bare.url, "http://10.0.0.5:3000/vote/12345");
    }
}
