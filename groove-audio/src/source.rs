//! Capabilities the engine needs from its surroundings: decoding audio and
//! resolving noise asset references to bytes.

use thiserror::Error;

use crate::buffer::AudioBuffer;

/// Errors that can occur while decoding audio
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("unsupported or unreadable audio: {0}")]
    Unsupported(String),

    #[error("no audio track found")]
    NoAudioTrack,

    #[error("decoded stream is empty")]
    Empty,

    #[error("resample failed: {0}")]
    Resample(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while fetching a noise asset
#[derive(Error, Debug)]
pub enum AssetLoadError {
    #[error("asset not found: {0}")]
    NotFound(String),

    #[error("failed to read asset {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode asset {name}: {source}")]
    Decode {
        name: String,
        #[source]
        source: DecodeError,
    },
}

/// Turns encoded bytes into a float buffer at the engine's rate and channel count
pub trait AudioDecoder: Send + Sync {
    /// `hint` is an optional file extension (`"wav"`, `"mp3"`, ...)
    fn decode(&self, bytes: &[u8], hint: Option<&str>) -> Result<AudioBuffer, DecodeError>;
}

/// Resolves a noise file reference (e.g. `crackle13.wav`) to its bytes
pub trait AssetSource: Send + Sync {
    fn fetch(&self, name: &str) -> Result<Vec<u8>, AssetLoadError>;
}

/// Extension of a file name, lowercased
pub fn extension_hint(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() || ext.contains('/') {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_hint() {
        assert_eq!(extension_hint("crackle13.WAV").as_deref(), Some("wav"));
        assert_eq!(extension_hint("dir.v2/track"), None);
        assert_eq!(extension_hint("noext"), None);
    }
}
