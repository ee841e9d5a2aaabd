//! Go-style duration strings (`500ms`, `10s`, `1m30s`).

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A duration written in a manifest as a string such as `1m30s`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ManifestDuration(pub Duration);

impl ManifestDuration {
    /// Parse a duration string made of `<number><unit>` segments.
    ///
    /// Supported units: `ms`, `s`, `m`, `h`.
    pub fn parse(input: &str) -> Result<Self, String> {
        let s = input.trim();
        if s.is_empty() {
            return Err("invalid duration: empty string".to_string());
        }
        if s == "0" {
            return Ok(Self(Duration::ZERO));
        }

        let mut total = Duration::ZERO;
        let mut rest = s;
        while !rest.is_empty() {
            let digits = rest
                .find(|c: char| !c.is_ascii_digit())
                .ok_or_else(|| format!("invalid duration {}: missing unit", input))?;
            if digits == 0 {
                return Err(format!("invalid duration {}", input));
            }
            let value: u64 = rest[..digits]
                .parse()
                .map_err(|_| format!("invalid duration {}", input))?;
            rest = &rest[digits..];

            let unit_len = rest
                .find(|c: char| c.is_ascii_digit())
                .unwrap_or(rest.len());
            let segment = match &rest[..unit_len] {
                "ms" => Some(Duration::from_millis(value)),
                "s" => Some(Duration::from_secs(value)),
                "m" => value.checked_mul(60).map(Duration::from_secs),
                "h" => value.checked_mul(3600).map(Duration::from_secs),
                unit => return Err(format!("invalid duration {}: unknown unit {:?}", input, unit)),
            };
            total = segment
                .and_then(|segment| total.checked_add(segment))
                .ok_or_else(|| format!("invalid duration {}", input))?;
            rest = &rest[unit_len..];
        }

        Ok(Self(total))
    }

    /// Create from whole seconds.
    pub fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    /// Create from milliseconds.
    pub fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    /// Check whether the duration is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl TryFrom<String> for ManifestDuration {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ManifestDuration> for String {
    fn from(value: ManifestDuration) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ManifestDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.0.as_millis();
        if millis == 0 {
            return write!(f, "0s");
        }
        if millis % 1000 != 0 {
            return write!(f, "{}ms", millis);
        }

        let mut secs = self.0.as_secs();
        let hours = secs / 3600;
        secs %= 3600;
        let minutes = secs / 60;
        secs %= 60;

        if hours > 0 {
            write!(f, "{}h", hours)?;
        }
        if minutes > 0 {
            write!(f, "{}m", minutes)?;
        }
        if secs > 0 {
            write!(f, "{}s", secs)?;
        }
        Ok(())
    }
}
