//! FortiOS firmware version
//!
//! The CMDB schema changes between firmware releases, so a few wire encodings
//! depend on the version reported by the device.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid FortiOS version: {0:?}")]
pub struct ParseVersionError(String);

/// `major.minor.patch` as reported by `/api/v2/monitor/system/status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl DeviceVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// True when this version predates `other`. An unparsable `other` never matches.
    pub fn is_older_than(&self, other: &str) -> bool {
        other
            .parse::<DeviceVersion>()
            .map(|other| *self < other)
            .unwrap_or(false)
    }
}

impl FromStr for DeviceVersion {
    type Err = ParseVersionError;

    /// Accepts `v7.2.4`, `7.2.4`, `7.2` and `7`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseVersionError(s.to_string());
        let trimmed = s.trim().trim_start_matches(['v', 'V']);
        if trimmed.is_empty() {
            return Err(err());
        }

        let mut parts = [0u32; 3];
        let mut count = 0;
        for part in trimmed.split('.') {
            if count == parts.len() {
                return Err(err());
            }
            parts[count] = part.parse().map_err(|_| err())?;
            count += 1;
        }

        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

impl fmt::Display for DeviceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_prefix() {
        assert_eq!("v7.2.4".parse(), Ok(DeviceVersion::new(7, 2, 4)));
        assert_eq!("6.4".parse(), Ok(DeviceVersion::new(6, 4, 0)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<DeviceVersion>().is_err());
        assert!("v7.x".parse::<DeviceVersion>().is_err());
        assert!("7.0.1.2".parse::<DeviceVersion>().is_err());
    }

    #[test]
    fn test_ordering() {
        let v = DeviceVersion::new(7, 0, 0);
        assert!(v.is_older_than("7.0.1"));
        assert!(!v.is_older_than("6.4.12"));
        assert!(!v.is_older_than("not-a-version"));
        assert_eq!(v.to_string(), "7.0.0");
    }
}
