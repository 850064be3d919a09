//! Settings persistence for groove
//!
//! Plain `key = value` lines with `#` comments. Unknown keys are ignored and
//! malformed values keep their defaults.

use std::fs;
use std::path::{Path, PathBuf};

use groove_audio::{MasteringMode, RenderMode, DEFAULT_RENDER_SEED};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid value '{value}' for {key}")]
    Parse { key: String, value: String },
}

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Engine sample rate in Hz
    pub sample_rate: u32,
    pub channels: u16,
    /// Directory holding `crackle/<name>` noise files
    pub asset_root: PathBuf,
    pub default_preset: String,
    pub mastering: MasteringMode,
    pub export_mode: RenderMode,
    pub render_seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            asset_root: Self::default_asset_root(),
            default_preset: "mellow-vintage".to_string(),
            mastering: MasteringMode::Neutral,
            export_mode: RenderMode::FullChain,
            render_seed: DEFAULT_RENDER_SEED,
        }
    }
}

fn export_mode_name(mode: RenderMode) -> &'static str {
    match mode {
        RenderMode::FullChain => "full",
        RenderMode::PitchOnly => "pitch-only",
    }
}

fn parse_seed(value: &str) -> Option<u64> {
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

impl Config {
    /// Load config from the default location
    ///
    /// Returns the defaults if the file is missing or unreadable.
    pub fn load() -> Self {
        let path = Self::config_path();
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "using default config");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.serialize())?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("groove")
            .join("config.txt")
    }

    fn default_asset_root() -> PathBuf {
        dirs::data_dir()
            .map(|d| d.join("groove").join("assets"))
            .unwrap_or_else(|| PathBuf::from("assets"))
    }

    /// Set one key. Unknown keys are accepted and ignored.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::Parse {
            key: key.to_string(),
            value: value.to_string(),
        };

        match key {
            "sample_rate" => {
                self.sample_rate = value.parse::<u32>().ok().filter(|&r| r > 0).ok_or_else(invalid)?;
            }
            "channels" => {
                self.channels = value.parse::<u16>().ok().filter(|&c| c > 0).ok_or_else(invalid)?;
            }
            "asset_root" => {
                if value.is_empty() {
                    return Err(invalid());
                }
                self.asset_root = PathBuf::from(value);
            }
            "default_preset" => {
                if groove_audio::presets::find(value).is_none() {
                    return Err(invalid());
                }
                self.default_preset = value.to_string();
            }
            "mastering" => {
                self.mastering = MasteringMode::from_name(value).ok_or_else(invalid)?;
            }
            "export_mode" => {
                self.export_mode = match value {
                    "full" => RenderMode::FullChain,
                    "pitch-only" => RenderMode::PitchOnly,
                    _ => return Err(invalid()),
                };
            }
            "render_seed" => {
                self.render_seed = parse_seed(value).ok_or_else(invalid)?;
            }
            _ => debug!(key, "ignoring unknown config key"),
        }
        Ok(())
    }

    /// Parse config from `key = value` lines
    pub fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                if let Err(e) = config.set(key.trim(), value.trim()) {
                    warn!("{}, keeping default", e);
                }
            }
        }

        config
    }

    pub fn serialize(&self) -> String {
        let lines = [
            "# groove configuration".to_string(),
            format!("sample_rate={}", self.sample_rate),
            format!("channels={}", self.channels),
            format!("asset_root={}", self.asset_root.display()),
            format!("default_preset={}", self.default_preset),
            format!("mastering={}", self.mastering),
            format!("export_mode={}", export_mode_name(self.export_mode)),
            format!("render_seed={:#x}", self.render_seed),
        ];
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        assert_eq!(Config::parse(""), Config::default());
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.channels, 2);
        assert_eq!(config.default_preset, "mellow-vintage");
        assert_eq!(config.render_seed, 0x5EED);
        assert_eq!(config.export_mode, RenderMode::FullChain);
    }

    #[test]
    fn test_parse_with_comments() {
        let content = "# Comment\nsample_rate = 48000\nmastering=blueNote\n# Another\nexport_mode=pitch-only";
        let config = Config::parse(content);
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.mastering, MasteringMode::BlueNote);
        assert_eq!(config.export_mode, RenderMode::PitchOnly);
    }

    #[test]
    fn test_malformed_values_keep_defaults() {
        let config = Config::parse("sample_rate=fast\nchannels=0\ndefault_preset=shiny\nfoo=bar");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_seed_formats() {
        assert_eq!(Config::parse("render_seed=42").render_seed, 42);
        assert_eq!(Config::parse("render_seed=0xff").render_seed, 255);
        let mut config = Config::default();
        assert!(matches!(config.set("render_seed", "0xzz"), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.txt");

        let config = Config {
            sample_rate: 22050,
            channels: 1,
            asset_root: PathBuf::from("/srv/groove"),
            default_preset: "vinyl-erosion".to_string(),
            mastering: MasteringMode::AbbeyRoad,
            export_mode: RenderMode::PitchOnly,
            render_seed: 7,
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::load_from(&dir.path().join("absent.txt")),
            Err(ConfigError::Io(_))
        ));
    }
}
