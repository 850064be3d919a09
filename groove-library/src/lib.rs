//! Collaborators around the groove engine: decoding files, finding noise
//! assets on disk, and persisted settings

mod assets;
mod config;
mod loader;

pub use assets::AssetDirectory;
pub use config::{Config, ConfigError};
pub use loader::{conform_channels, LoadedTrack, TrackLoader, TrackMetadata};
