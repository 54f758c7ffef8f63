//! Error types for token operations.

use thiserror::Error;

/// Result type for token operations
pub type TokenResult<T> = Result<T, TokenError>;

/// Errors surfaced by the host-side token client.
///
/// There is no retry layer: every failure propagates straight to the caller,
/// which is expected to exit non-zero with the message below.
#[derive(Error, Debug, miette::Diagnostic)]
pub enum TokenError {
    #[error("no token found (vendor 0x{vendor_id:04x}, product 0x{product_id:04x})")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("USB transfer failed: {0}")]
    TransferError(String),

    #[error("invalid base32 secret: {0}")]
    InvalidBase32(String),

    #[error("decoded secret is {0} bytes, device limit is 40")]
    SecretTooLong(usize),

    #[error("{field} out of range: {value}")]
    OutOfRangeField { field: &'static str, value: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = TokenError::DeviceNotFound {
            vendor_id: 0x4242,
            product_id: 0xe131,
        };
        assert_eq!(
            error.to_string(),
            "no token found (vendor 0x4242, product 0xe131)"
        );

        let error = TokenError::SecretTooLong(41);
        assert_eq!(
            error.to_string(),
            "decoded secret is 41 bytes, device limit is 40"
        );

        let error = TokenError::OutOfRangeField {
            field: "hour",
            value: 24,
        };
        assert_eq!(error.to_string(), "hour out of range: 24");
    }
}
