//! Object serialization
//!
//! The store only ever sees opaque bytes. A [`Codec`] turns caller objects
//! into those bytes and back. Both sides of an exchange must agree on the
//! codec, so it is part of the shared configuration.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while encoding or decoding objects
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to encode object as {codec}: {message}")]
    Encode { codec: Codec, message: String },

    #[error("Failed to decode {codec} payload: {message}")]
    Decode { codec: Codec, message: String },
}

/// Supported payload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    /// serde_json; self-describing, readable on disk
    #[default]
    Json,
    /// bincode; compact, requires both sides to share the exact type
    Bincode,
}

impl Codec {
    pub fn encode<T: Serialize + ?Sized>(&self, object: &T) -> CodecResult<Vec<u8>> {
        match self {
            Codec::Json => serde_json::to_vec(object).map_err(|e| CodecError::Encode {
                codec: *self,
                message: e.to_string(),
            }),
            Codec::Bincode => bincode::serialize(object).map_err(|e| CodecError::Encode {
                codec: *self,
                message: e.to_string(),
            }),
        }
    }

    pub fn decode<T: DeserializeOwned>(&self, payload: &[u8]) -> CodecResult<T> {
        match self {
            Codec::Json => serde_json::from_slice(payload).map_err(|e| CodecError::Decode {
                codec: *self,
                message: e.to_string(),
            }),
            Codec::Bincode => bincode::deserialize(payload).map_err(|e| CodecError::Decode {
                codec: *self,
                message: e.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Codec::Json => write!(f, "json"),
            Codec::Bincode => write!(f, "bincode"),
        }
    }
}

impl std::str::FromStr for Codec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Codec::Json),
            "bincode" => Ok(Codec::Bincode),
            _ => Err(format!("Invalid codec: {}. Valid options: json, bincode", s)),
        }
    }
}
