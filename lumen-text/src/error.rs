//! Error type shared by the resolver, the atlas and the SDF font loader.

use std::path::PathBuf;

use font_kit::error::{FontLoadingError, GlyphLoadingError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FontError {
    #[error("Font not found: {name}")]
    NotFound { name: String },
    #[error("Failed to fetch {name}: {reason}")]
    Fetch { name: String, reason: String },
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to load font {}: {source}", path.display())]
    Loading {
        path: PathBuf,
        #[source]
        source: FontLoadingError,
    },
    #[error("Glyph error: {0}")]
    Glyph(#[from] GlyphLoadingError),
    #[error("Font has no glyph for {0:?}")]
    MissingGlyph(char),
    #[error("Atlas full: no room for a {width}×{height} region")]
    AtlasFull { width: u32, height: u32 },
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl FontError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn not_found(name: &str) -> Self {
        Self::NotFound {
            name: name.to_owned(),
        }
    }
}
