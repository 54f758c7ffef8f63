//! Control-transfer wire protocol for the token.
//!
//! The token exposes two register blocks over vendor control transfers: the
//! real-time clock and the TOTP shared secret. This module owns the byte
//! layout of both directions; the transport layer moves the buffers.
//!
//! # Clock register block
//!
//! Read response (9 bytes, BCD with reserved high bits per byte):
//!
//! ```text
//! Offset  Field    Tens mask
//! 0       (unused)
//! 1       second   0x7
//! 2       minute   0x7
//! 3       hour     0x3
//! 4       weekday  (written, never read back)
//! 5       day      0x3
//! 6       month    0x1
//! 7       year     0xF  (absolute year = 2000 + value)
//! 8       (unused)
//! ```
//!
//! Write payload (9 bytes): `[2, BCD(second + 1), BCD(minute), BCD(hour),
//! weekday, BCD(day), BCD(month), BCD(year - 2000), 3]`. The +1 on the
//! seconds field compensates for transfer latency and the device's tick
//! boundary; it is part of the wire contract, not an accident.
//!
//! # Secret register block
//!
//! Write payload (42 bytes): `[3, len, secret bytes, zero padding]` with
//! `len` at most 40.

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{TokenError, TokenResult};
use crate::types::{Base32Secret, DeviceClock};

/// Control request types and codes.
pub mod request {
    /// Device-to-host register read (direction IN | vendor class).
    pub const TYPE_IN: u8 = 0xA0;
    /// Host-to-device register write.
    pub const TYPE_OUT: u8 = 0x20;
    /// Read a register block.
    pub const READ: u8 = 0x01;
    /// Write a register block.
    pub const WRITE: u8 = 0x09;
}

/// wValue register selectors.
pub mod register {
    /// Real-time clock block.
    pub const CLOCK: u16 = 0x0002;
    /// Shared secret block.
    pub const SECRET: u16 = 0x0003;
}

/// Command tags carried inside write payloads.
mod tag {
    /// Byte 0 of a set-clock payload.
    pub const SET_CLOCK: u8 = 2;
    /// Byte 0 of a set-secret payload.
    pub const SET_SECRET: u8 = 3;
    /// Trailer byte of a set-clock payload.
    pub const CLOCK_TRAILER: u8 = 3;
}

/// Size of the clock register block in both directions.
pub const CLOCK_LEN: usize = 9;

/// Size of the set-secret payload: tag + length + 40-byte register.
pub const SECRET_PAYLOAD_LEN: usize = 42;

/// Pack a two-digit decimal value (0-99) into a BCD byte.
pub fn encode_bcd(v: u8) -> u8 {
    debug_assert!(v <= 99);
    ((v / 10) << 4) | (v % 10)
}

/// Unpack a BCD byte, keeping only `tens_mask` bits of the high nibble.
///
/// Each clock byte reserves some high bits for other device state, so every
/// field carries its own mask.
pub fn decode_bcd(b: u8, tens_mask: u8) -> u8 {
    (b & 0x0F) + ((b >> 4) & tens_mask) * 10
}

/// Encode a set-clock payload.
///
/// The clock was range-checked on construction, so encoding cannot fail.
/// Note that `second + 1` may encode as BCD 60 (0x60) when the source second
/// is 59; the device absorbs it at the next tick.
pub fn encode_clock(clock: &DeviceClock) -> [u8; CLOCK_LEN] {
    [
        tag::SET_CLOCK,
        encode_bcd(clock.second + 1),
        encode_bcd(clock.minute),
        encode_bcd(clock.hour),
        clock.weekday,
        encode_bcd(clock.day),
        encode_bcd(clock.month),
        encode_bcd((clock.year - 2000) as u8),
        tag::CLOCK_TRAILER,
    ]
}

/// Decode a clock register read into a timezone-naive timestamp.
///
/// Byte 4 (weekday on the write side) is not decoded. The masked fields can
/// still spell an impossible date if the device returns garbage; that
/// surfaces as a [`TokenError::TransferError`].
pub fn decode_clock(buf: &[u8]) -> TokenResult<NaiveDateTime> {
    if buf.len() < CLOCK_LEN {
        return Err(TokenError::TransferError(format!(
            "short clock read: {} bytes, expected {CLOCK_LEN}",
            buf.len()
        )));
    }

    let second = decode_bcd(buf[1], 0x7);
    let minute = decode_bcd(buf[2], 0x7);
    let hour = decode_bcd(buf[3], 0x3);
    let day = decode_bcd(buf[5], 0x3);
    let month = decode_bcd(buf[6], 0x1);
    let year = 2000 + decode_bcd(buf[7], 0xF) as i32;

    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
        .and_then(|d| d.and_hms_opt(hour as u32, minute as u32, second as u32))
        .ok_or_else(|| {
            TokenError::TransferError(format!("implausible clock fields in response: {buf:02x?}"))
        })
}

/// Build a set-secret payload: tag, decoded length, secret bytes, zero
/// padding out to the full 42 bytes.
pub fn secret_payload(secret: &Base32Secret) -> [u8; SECRET_PAYLOAD_LEN] {
    let bytes = secret.as_bytes();
    let mut payload = [0u8; SECRET_PAYLOAD_LEN];
    payload[0] = tag::SET_SECRET;
    payload[1] = bytes.len() as u8;
    payload[2..2 + bytes.len()].copy_from_slice(bytes);
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bcd_round_trip_within_masks() {
        // (tens_mask, highest value the mask can carry back)
        for &(mask, max) in &[(0x7u8, 79u8), (0x3, 39), (0x1, 19), (0xF, 99)] {
            for v in 0..=max {
                assert_eq!(decode_bcd(encode_bcd(v), mask), v, "v={v} mask={mask}");
            }
        }
    }

    #[test]
    fn test_bcd_known_values() {
        assert_eq!(encode_bcd(0), 0x00);
        assert_eq!(encode_bcd(9), 0x09);
        assert_eq!(encode_bcd(10), 0x10);
        assert_eq!(encode_bcd(59), 0x59);
        assert_eq!(encode_bcd(60), 0x60);
        assert_eq!(decode_bcd(0x59, 0x7), 59);
        // Reserved high bits are masked off before interpreting.
        assert_eq!(decode_bcd(0x80 | 0x23, 0x3), 23);
    }
}
