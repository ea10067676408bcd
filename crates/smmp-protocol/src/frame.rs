//! The outer protocol frame.
//!
//! Every buffer handed to or received from the transport is a `Frame`: a
//! kind tag plus the serialized envelope (or subscription subject) it
//! carries.

use serde::{Deserialize, Serialize};

use crate::limits::{check_size, MAX_FRAME_SIZE};
use crate::{ProtocolError, Result};

/// What a frame's content contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameKind {
    /// A serialized [`Envelope`](crate::Envelope).
    ApplicationMessage,
    /// A serialized [`AckEnvelope`](crate::AckEnvelope).
    Ack,
    /// A subject registration (subscription) notice.
    Register,
    /// A subject deregistration notice.
    Unregister,
}

impl std::fmt::Display for FrameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApplicationMessage => write!(f, "ApplicationMessage"),
            Self::Ack => write!(f, "Ack"),
            Self::Register => write!(f, "Register"),
            Self::Unregister => write!(f, "Unregister"),
        }
    }
}

/// An outer protocol frame: kind tag plus opaque content bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// The content's kind.
    pub kind: FrameKind,
    /// The serialized inner structure.
    pub content: Vec<u8>,
}

impl Frame {
    /// Wrap serialized content in a frame.
    pub fn new(kind: FrameKind, content: Vec<u8>) -> Self {
        Self { kind, content }
    }

    /// Serialize the frame for the wire.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    /// Deserialize a frame received from the wire.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Oversized`] for inputs above
    /// [`MAX_FRAME_SIZE`] and [`ProtocolError::Serialization`] for anything
    /// that does not decode to a frame.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        check_size(bytes.len(), MAX_FRAME_SIZE)?;
        bincode::deserialize(bytes).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_roundtrip() {
        let frame = Frame::new(FrameKind::Ack, vec![1, 2, 3]);
        let bytes = frame.to_bytes().unwrap();
        assert_eq!(Frame::from_bytes(&bytes).unwrap(), frame);
    }

    #[test]
    fn rejects_oversized_input() {
        let bytes = vec![0u8; MAX_FRAME_SIZE + 1];
        assert!(matches!(
            Frame::from_bytes(&bytes),
            Err(ProtocolError::Oversized { .. })
        ));
    }

    #[test]
    fn rejects_truncated_input() {
        let frame = Frame::new(FrameKind::ApplicationMessage, vec![9; 64]);
        let bytes = frame.to_bytes().unwrap();
        assert!(Frame::from_bytes(&bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn unknown_kind_tag_fails_to_decode() {
        // A variant index past the enum's range.
        let mut bytes = Frame::new(FrameKind::Ack, vec![]).to_bytes().unwrap();
        bytes[0] = 0xff;
        assert!(Frame::from_bytes(&bytes).is_err());
    }
}
