//! Noise asset lookup on disk
//!
//! References like `crackle13.wav` (or `/crackle/crackle13.wav`) resolve to
//! `<root>/crackle/crackle13.wav`. Anything that could escape the crackle
//! directory is rejected as not found.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use groove_audio::{AssetLoadError, AssetSource};
use tracing::debug;

const CRACKLE_DIR: &str = "crackle";

#[derive(Debug, Clone)]
pub struct AssetDirectory {
    root: PathBuf,
}

impl AssetDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path for a noise reference
    pub fn path_for(&self, name: &str) -> Result<PathBuf, AssetLoadError> {
        let file = name
            .strip_prefix("/crackle/")
            .or_else(|| name.strip_prefix("crackle/"))
            .unwrap_or(name);

        let unsafe_name = file.is_empty()
            || file == "."
            || file == ".."
            || file.contains('/')
            || file.contains('\\');
        if unsafe_name {
            return Err(AssetLoadError::NotFound(name.to_string()));
        }
        Ok(self.root.join(CRACKLE_DIR).join(file))
    }
}

impl AssetSource for AssetDirectory {
    fn fetch(&self, name: &str) -> Result<Vec<u8>, AssetLoadError> {
        let path = self.path_for(name)?;
        debug!(path = %path.display(), "reading asset");
        fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => AssetLoadError::NotFound(name.to_string()),
            _ => AssetLoadError::Io {
                name: name.to_string(),
                source,
            },
        })
    }
}
