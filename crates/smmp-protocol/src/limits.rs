//! Wire size limits.
//!
//! Checked before deserializing anything from the network so crafted
//! length prefixes cannot trigger oversized allocations.

/// Maximum application payload size in bytes (8 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 8 * 1024 * 1024;

/// Maximum DER certificate size in bytes.
pub const MAX_CERTIFICATE_SIZE: usize = 16 * 1024;

/// Maximum DER ECDSA signature size in bytes.
pub const MAX_SIGNATURE_SIZE: usize = 256;

/// Maximum size of a serialized frame, envelope included.
pub const MAX_FRAME_SIZE: usize = MAX_PAYLOAD_SIZE + MAX_CERTIFICATE_SIZE + 4096;

use crate::{ProtocolError, Result};

/// Reject input larger than `max` before it reaches the deserializer.
pub(crate) fn check_size(size: usize, max: usize) -> Result<()> {
    if size > max {
        return Err(ProtocolError::Oversized { size, max });
    }
    Ok(())
}
