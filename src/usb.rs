//! USB transport for the token.
//!
//! Finds the token by vendor/product id, takes interface 0 away from the
//! kernel driver if one is bound, and exposes the two control-transfer
//! directions behind the [`ControlTransport`] trait so the higher layers can
//! run against a mock in tests.

use std::time::Duration;

use rusb::{Context, DeviceHandle, UsbContext};

use crate::error::{TokenError, TokenResult};

/// Vendor id of the token.
pub const VENDOR_ID: u16 = 0x4242;
/// Product id of the token.
pub const PRODUCT_ID: u16 = 0xe131;

/// The token speaks on interface 0 only.
const INTERFACE: u8 = 0;

/// Timeout for all control transfers.
const USB_TIMEOUT: Duration = Duration::from_secs(5);

/// USB identity of a token, passed explicitly so tests and unusual setups can
/// substitute their own ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceId {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl Default for DeviceId {
    fn default() -> Self {
        DeviceId {
            vendor_id: VENDOR_ID,
            product_id: PRODUCT_ID,
        }
    }
}

/// The control-transfer seam between the token client and the USB stack.
pub trait ControlTransport {
    /// Device-to-host control transfer. Returns the number of bytes read.
    fn read(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
    ) -> TokenResult<usize>;

    /// Host-to-device control transfer carrying `data`. A short write is an
    /// error; the device only applies a command after the full payload.
    fn write(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> TokenResult<()>;
}

/// rusb-backed transport holding an exclusive claim on interface 0.
pub struct UsbTransport {
    handle: DeviceHandle<Context>,
    /// Whether we detached the kernel driver and owe it a reattach on drop.
    detached_kernel_driver: bool,
}

impl UsbTransport {
    /// Open the token identified by `id`.
    ///
    /// Detaching the kernel driver changes the host's view of the device for
    /// everyone; [`Drop`] reattaches it on a best-effort basis.
    ///
    /// # Errors
    ///
    /// [`TokenError::DeviceNotFound`] when no matching device is present,
    /// [`TokenError::AccessDenied`] when opening, detaching, or claiming
    /// fails (typically insufficient privileges). No retries.
    pub fn open(id: DeviceId) -> TokenResult<Self> {
        let context = Context::new().map_err(|e| {
            TokenError::AccessDenied(format!("failed to create USB context: {e}"))
        })?;

        let devices = context.devices().map_err(|e| {
            TokenError::AccessDenied(format!("failed to enumerate USB devices: {e}"))
        })?;

        for device in devices.iter() {
            let desc = match device.device_descriptor() {
                Ok(d) => d,
                Err(_) => continue,
            };

            if desc.vendor_id() != id.vendor_id || desc.product_id() != id.product_id {
                continue;
            }

            log::debug!(
                "found token: VID={:04x} PID={:04x} bus={} addr={}",
                desc.vendor_id(),
                desc.product_id(),
                device.bus_number(),
                device.address()
            );

            let mut handle = device.open().map_err(|e| {
                TokenError::AccessDenied(format!("failed to open USB device: {e}"))
            })?;

            #[cfg(target_os = "linux")]
            let detached = {
                let active = handle.kernel_driver_active(INTERFACE).unwrap_or(false);
                if active {
                    handle.detach_kernel_driver(INTERFACE).map_err(|e| {
                        TokenError::AccessDenied(format!("failed to detach kernel driver: {e}"))
                    })?;
                    log::debug!("detached kernel driver from interface {INTERFACE}");
                }
                active
            };
            #[cfg(not(target_os = "linux"))]
            let detached = false;

            handle.claim_interface(INTERFACE).map_err(|e| {
                TokenError::AccessDenied(format!("failed to claim interface {INTERFACE}: {e}"))
            })?;

            return Ok(UsbTransport {
                handle,
                detached_kernel_driver: detached,
            });
        }

        Err(TokenError::DeviceNotFound {
            vendor_id: id.vendor_id,
            product_id: id.product_id,
        })
    }
}

impl ControlTransport for UsbTransport {
    fn read(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
    ) -> TokenResult<usize> {
        self.handle
            .read_control(request_type, request, value, index, buf, USB_TIMEOUT)
            .map_err(|e| TokenError::TransferError(format!("control read failed: {e}")))
    }

    fn write(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> TokenResult<()> {
        let written = self
            .handle
            .write_control(request_type, request, value, index, data, USB_TIMEOUT)
            .map_err(|e| TokenError::TransferError(format!("control write failed: {e}")))?;

        if written != data.len() {
            return Err(TokenError::TransferError(format!(
                "incomplete control write: {written}/{} bytes",
                data.len()
            )));
        }

        Ok(())
    }
}

impl Drop for UsbTransport {
    fn drop(&mut self) {
        let _ = self.handle.release_interface(INTERFACE);

        // Only ever true on Linux; leaves the host as we found it.
        if self.detached_kernel_driver {
            let _ = self.handle.attach_kernel_driver(INTERFACE);
        }
    }
}
