//! High-level operations on the token.
//!
//! [`Token`] wraps a [`ControlTransport`] and speaks the register protocol
//! from [`crate::protocol`]: read the clock, set the clock, provision the
//! shared secret. Each script-style invocation performs one or two transfers
//! and drops the handle.

use chrono::{NaiveDateTime, Utc};

use crate::error::{TokenError, TokenResult};
use crate::protocol::{self, register, request};
use crate::types::{Base32Secret, DeviceClock};
use crate::usb::{ControlTransport, DeviceId, UsbTransport};

/// Device clock next to host clock, with the signed drift between them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockComparison {
    /// Device time (UTC by convention).
    pub device: NaiveDateTime,
    /// Host time (UTC) sampled right after the read.
    pub host: NaiveDateTime,
    /// `device - host` in seconds; positive means the device runs ahead.
    pub drift_seconds: f64,
}

/// A connected token.
pub struct Token<T: ControlTransport> {
    transport: T,
}

impl Token<UsbTransport> {
    /// Connect to the token identified by `id` over USB.
    pub fn connect(id: DeviceId) -> TokenResult<Self> {
        Ok(Token::new(UsbTransport::open(id)?))
    }
}

impl<T: ControlTransport> Token<T> {
    /// Wrap an already-open transport.
    pub fn new(transport: T) -> Self {
        Token { transport }
    }

    /// Consume the token and hand back the underlying transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Read the device clock.
    ///
    /// # Errors
    ///
    /// [`TokenError::TransferError`] on any transfer failure or a short
    /// read; there is no partial-result recovery.
    pub fn read_clock(&mut self) -> TokenResult<NaiveDateTime> {
        let mut buf = [0u8; protocol::CLOCK_LEN];
        let read = self.transport.read(
            request::TYPE_IN,
            request::READ,
            register::CLOCK,
            0,
            &mut buf,
        )?;

        if read < protocol::CLOCK_LEN {
            return Err(TokenError::TransferError(format!(
                "short clock read: {read} bytes, expected {}",
                protocol::CLOCK_LEN
            )));
        }

        protocol::decode_clock(&buf)
    }

    /// Set the device clock to `clock`.
    ///
    /// Overwrites the device's persisted clock state. The payload carries the
    /// seconds field offset by +1 (see [`crate::protocol`]).
    pub fn write_clock(&mut self, clock: &DeviceClock) -> TokenResult<()> {
        let payload = protocol::encode_clock(clock);
        self.transport.write(
            request::TYPE_OUT,
            request::WRITE,
            register::CLOCK,
            0,
            &payload,
        )
    }

    /// Set the device clock to the host's current UTC time and return the
    /// timestamp that was written.
    pub fn set_clock_to_host_time(&mut self) -> TokenResult<NaiveDateTime> {
        let now = Utc::now().naive_utc();
        let clock = DeviceClock::from_datetime(now)?;
        self.write_clock(&clock)?;
        Ok(now)
    }

    /// Provision `secret` as the device's TOTP shared secret.
    ///
    /// One-way write: the device performs no confirmation read-back. The
    /// secret was validated at parse time, so nothing here can leave the
    /// device mid-update.
    pub fn set_secret(&mut self, secret: &Base32Secret) -> TokenResult<()> {
        let payload = protocol::secret_payload(secret);
        self.transport.write(
            request::TYPE_OUT,
            request::WRITE,
            register::SECRET,
            0,
            &payload,
        )
    }

    /// Read the device clock and compare it against host UTC time.
    pub fn compare_host_time(&mut self) -> TokenResult<ClockComparison> {
        let device = self.read_clock()?;
        let host = Utc::now().naive_utc();
        let drift_seconds = (device - host).num_milliseconds() as f64 / 1000.0;

        Ok(ClockComparison {
            device,
            host,
            drift_seconds,
        })
    }
}
