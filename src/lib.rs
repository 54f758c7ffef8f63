//! usbmfa host library
//!
//! Host-side client for a USB hardware token that implements RFC 6238
//! time-based one-time passwords on a microcontroller. The token computes
//! OTP codes and keeps its own real-time clock; this crate only drives the
//! vendor control-transfer protocol to read/set that clock and to provision
//! the shared secret.

pub mod error;
pub mod protocol;
pub mod token;
pub mod types;
pub mod usb;

pub use error::{TokenError, TokenResult};
pub use token::{ClockComparison, Token};
pub use types::{Base32Secret, DeviceClock};
pub use usb::{ControlTransport, DeviceId, UsbTransport};
