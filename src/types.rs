//! Type-safe wrappers using new-type pattern
//!
//! This module provides validated value types for the token client, so that
//! range and format errors are caught before any USB transfer is issued.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::error::{TokenError, TokenResult};

/// A snapshot of the token's real-time clock, with every field validated.
///
/// The device stores the clock as packed BCD; this type holds the plain
/// decimal values and is only constructible through [`DeviceClock::new`], so
/// an instance is always encodable as valid BCD digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceClock {
    /// Seconds, 0-59
    pub second: u8,
    /// Minutes, 0-59
    pub minute: u8,
    /// Hours, 0-23
    pub hour: u8,
    /// Day of week, 1-7 with Monday = 1
    pub weekday: u8,
    /// Day of month, 1-31
    pub day: u8,
    /// Month, 1-12
    pub month: u8,
    /// Absolute year, 2000-2099 (stored on the wire as year - 2000)
    pub year: u16,
}

impl DeviceClock {
    /// Create a new `DeviceClock` after range-checking every field.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::OutOfRangeField`] naming the first field outside
    /// its valid decimal range.
    pub fn new(
        second: u8,
        minute: u8,
        hour: u8,
        weekday: u8,
        day: u8,
        month: u8,
        year: u16,
    ) -> TokenResult<Self> {
        check_range("second", second as i64, 0, 59)?;
        check_range("minute", minute as i64, 0, 59)?;
        check_range("hour", hour as i64, 0, 23)?;
        check_range("weekday", weekday as i64, 1, 7)?;
        check_range("day", day as i64, 1, 31)?;
        check_range("month", month as i64, 1, 12)?;
        check_range("year", year as i64, 2000, 2099)?;

        Ok(DeviceClock {
            second,
            minute,
            hour,
            weekday,
            day,
            month,
            year,
        })
    }

    /// Build a clock snapshot from a timezone-naive timestamp (UTC by
    /// convention; the device has no timezone concept).
    ///
    /// The weekday is derived from the date, stored as 1-7 with Monday = 1.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::OutOfRangeField`] when the year falls outside
    /// the device's 2000-2099 window.
    pub fn from_datetime(t: NaiveDateTime) -> TokenResult<Self> {
        let year = t.year() as i64;
        check_range("year", year, 2000, 2099)?;

        Self::new(
            t.second() as u8,
            t.minute() as u8,
            t.hour() as u8,
            t.weekday().num_days_from_monday() as u8 + 1,
            t.day() as u8,
            t.month() as u8,
            year as u16,
        )
    }
}

fn check_range(field: &'static str, value: i64, min: i64, max: i64) -> TokenResult<()> {
    if value < min || value > max {
        return Err(TokenError::OutOfRangeField { field, value });
    }
    Ok(())
}

/// A TOTP shared secret, decoded from base32 text and length-checked.
///
/// Input is case-insensitive and spaces are ignored, since enrollment pages
/// usually present the secret in spaced lowercase groups. The decoded secret
/// must fit the device's 40-byte register.
#[derive(Clone, PartialEq, Eq)]
pub struct Base32Secret(Vec<u8>);

impl Base32Secret {
    /// Maximum decoded secret length the device accepts.
    pub const MAX_LEN: usize = 40;

    /// Parse a base32 secret string.
    ///
    /// Normalizes the input (uppercase, strip ASCII spaces), then decodes it
    /// with the standard RFC 4648 base32 alphabet.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidBase32`] for characters outside the
    /// alphabet or bad padding, and [`TokenError::SecretTooLong`] when the
    /// decoded secret exceeds [`Self::MAX_LEN`] bytes. Both checks run before
    /// any device interaction.
    pub fn parse(text: &str) -> TokenResult<Self> {
        let normalized: String = text
            .chars()
            .filter(|c| *c != ' ')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        let bytes = data_encoding::BASE32
            .decode(normalized.as_bytes())
            .map_err(|e| TokenError::InvalidBase32(e.to_string()))?;

        if bytes.len() > Self::MAX_LEN {
            return Err(TokenError::SecretTooLong(bytes.len()));
        }

        Ok(Base32Secret(bytes))
    }

    /// Decoded secret bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Decoded length in bytes (0-40).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for Base32Secret {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Secret material stays out of debug output.
impl fmt::Debug for Base32Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Base32Secret({} bytes)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_clock_validation() {
        assert!(DeviceClock::new(59, 59, 23, 7, 31, 12, 2099).is_ok());
        assert!(DeviceClock::new(0, 0, 0, 1, 1, 1, 2000).is_ok());

        let err = DeviceClock::new(60, 0, 0, 1, 1, 1, 2024).unwrap_err();
        assert!(matches!(
            err,
            TokenError::OutOfRangeField {
                field: "second",
                value: 60
            }
        ));

        assert!(DeviceClock::new(0, 0, 24, 1, 1, 1, 2024).is_err());
        assert!(DeviceClock::new(0, 0, 0, 0, 1, 1, 2024).is_err());
        assert!(DeviceClock::new(0, 0, 0, 8, 1, 1, 2024).is_err());
        assert!(DeviceClock::new(0, 0, 0, 1, 0, 1, 2024).is_err());
        assert!(DeviceClock::new(0, 0, 0, 1, 1, 13, 2024).is_err());
        assert!(DeviceClock::new(0, 0, 0, 1, 1, 1, 1999).is_err());
        assert!(DeviceClock::new(0, 0, 0, 1, 1, 1, 2100).is_err());
    }

    #[test]
    fn test_from_datetime_weekday() {
        // 2024-03-15 is a Friday: ISO weekday index 4, stored as 5.
        let t = chrono::NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(9, 5, 7)
            .unwrap();
        let clock = DeviceClock::from_datetime(t).unwrap();
        assert_eq!(clock.weekday, 5);
        assert_eq!(clock.second, 7);
        assert_eq!(clock.year, 2024);
    }

    #[test]
    fn test_secret_normalization() {
        let canonical = Base32Secret::parse("BJT2CV2JTBT6RR27").unwrap();
        let spaced_lower = Base32Secret::parse("bjt2 cv2j tbt6 rr27").unwrap();
        assert_eq!(canonical.as_bytes(), spaced_lower.as_bytes());
        assert_eq!(canonical.len(), 10);
    }

    #[test]
    fn test_secret_rejects_invalid_alphabet() {
        // '1' and '8' are outside the RFC 4648 base32 alphabet.
        assert!(matches!(
            Base32Secret::parse("BJT1CV2JTBT6RR27"),
            Err(TokenError::InvalidBase32(_))
        ));
        assert!(matches!(
            Base32Secret::parse("BJT8CV2JTBT6RR27"),
            Err(TokenError::InvalidBase32(_))
        ));
    }

    #[test]
    fn test_secret_too_long() {
        let encoded = data_encoding::BASE32.encode(&[0xAAu8; 41]);
        assert!(matches!(
            Base32Secret::parse(&encoded),
            Err(TokenError::SecretTooLong(41))
        ));

        // 40 bytes is the limit, not past it.
        let encoded = data_encoding::BASE32.encode(&[0xAAu8; 40]);
        assert!(Base32Secret::parse(&encoded).is_ok());
    }

    #[test]
    fn test_secret_debug_redacted() {
        let secret = Base32Secret::parse("BJT2CV2JTBT6RR27").unwrap();
        let debug = format!("{secret:?}");
        assert_eq!(debug, "Base32Secret(10 bytes)");
    }
}
