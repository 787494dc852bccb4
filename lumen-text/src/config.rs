//! Font cache configuration.
//!
//! Everything has a usable default. [`FontConfig::from_env`] layers the
//! `LUMEN_*` environment variables on top of the defaults:
//!
//! | Variable            | Field          | Format                      |
//! |---------------------|----------------|-----------------------------|
//! | `LUMEN_FONT_PATH`   | `search_dirs`  | platform path list (`a:b`)  |
//! | `LUMEN_FONT_CACHE`  | `cache_dir`    | directory                   |
//! | `LUMEN_ATLAS_SIZE`  | `atlas_size`   | integer, pixels             |

use std::env;
use std::path::PathBuf;

use crate::atlas::ATLAS_PADDING;
use crate::error::FontError;

/// Width and height of the shared atlas unless configured otherwise.
pub const DEFAULT_ATLAS_SIZE: u32 = 1024;

/// Printable ASCII, loaded into every font on construction.
pub const DEFAULT_PRELOAD: &str = " !\"#$%&'()*+,-./0123456789:;<=>?@\
ABCDEFGHIJKLMNOPQRSTUVWXYZ[\\]^_`abcdefghijklmnopqrstuvwxyz{|}~";

/// Signed-distance-field rasterization parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct SdfParams {
    /// Em size in atlas pixels.
    pub size: u32,
    /// Hi-res rasterization factor. Glyphs are rendered at
    /// `size * oversample` and box-filtered down.
    pub oversample: u32,
    /// Distance (atlas pixels) covered by the `[0, 1]` value ramp on each
    /// side of the outline. Also the padding around each glyph bitmap.
    pub spread: f32,
    /// Characters rasterized when a font is constructed.
    pub preload: String,
}

impl Default for SdfParams {
    fn default() -> Self {
        Self {
            size: 32,
            oversample: 4,
            spread: 4.0,
            preload: DEFAULT_PRELOAD.to_owned(),
        }
    }
}

impl SdfParams {
    /// Side of the largest region one em-sized glyph can need.
    pub fn cell_size(&self) -> u32 {
        self.size + 2 * self.spread.ceil() as u32 + ATLAS_PADDING
    }
}

/// Font cache configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct FontConfig {
    /// Side length of the square shared atlas.
    pub atlas_size: u32,
    /// Directories searched, in order, for font files.
    pub search_dirs: Vec<PathBuf>,
    /// Whether installed system fonts are consulted after `search_dirs`.
    pub system_fonts: bool,
    /// Destination for fetched fonts. Also searched after `search_dirs`.
    pub cache_dir: Option<PathBuf>,
    pub sdf: SdfParams,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            atlas_size: DEFAULT_ATLAS_SIZE,
            search_dirs: Vec::new(),
            system_fonts: true,
            cache_dir: None,
            sdf: SdfParams::default(),
        }
    }
}

impl FontConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, FontError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the `LUMEN_*`
    /// keys.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, FontError> {
        let mut config = Self::default();

        if let Some(paths) = lookup("LUMEN_FONT_PATH") {
            config.search_dirs = env::split_paths(&paths)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
        }
        if let Some(dir) = lookup("LUMEN_FONT_CACHE").filter(|d| !d.is_empty()) {
            config.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(size) = lookup("LUMEN_ATLAS_SIZE") {
            config.atlas_size = size.trim().parse().map_err(|_| {
                FontError::InvalidConfig(format!("LUMEN_ATLAS_SIZE is not a size: {size:?}"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dirs.push(dir.into());
        self
    }

    pub fn with_atlas_size(mut self, size: u32) -> Self {
        self.atlas_size = size;
        self
    }

    pub fn with_system_fonts(mut self, enabled: bool) -> Self {
        self.system_fonts = enabled;
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn with_sdf(mut self, sdf: SdfParams) -> Self {
        self.sdf = sdf;
        self
    }

    /// Reject settings the atlas or the rasterizer cannot work with.
    pub fn validate(&self) -> Result<(), FontError> {
        let sdf = &self.sdf;
        if sdf.size == 0 {
            return Err(FontError::InvalidConfig("glyph size must be non-zero".into()));
        }
        if sdf.oversample == 0 {
            return Err(FontError::InvalidConfig("oversample must be non-zero".into()));
        }
        if !(sdf.spread.is_finite() && sdf.spread > 0.0) {
            return Err(FontError::InvalidConfig(format!(
                "spread must be positive, got {}",
                sdf.spread
            )));
        }
        if self.atlas_size < sdf.cell_size() {
            return Err(FontError::InvalidConfig(format!(
                "atlas of {0}×{0} cannot hold a {1}px glyph cell",
                self.atlas_size,
                sdf.cell_size()
            )));
        }
        Ok(())
    }
}

// ===================================================================
// Tests
// ===================================================================
