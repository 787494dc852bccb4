//! Installed font files, indexed by file name.
//!
//! Wraps `font-kit` for OS-level font enumeration. Only file-backed
//! fonts are indexed, under their base file name, so the resolver can
//! answer "is `DejaVuSans.ttf` installed anywhere?" with one hash lookup.
//!
//! ## Architecture
//!
//! ```text
//! SystemFonts
//!   ├── by_file_name: HashMap<OsString, PathBuf>   (first path wins)
//!   └── find("DejaVuSans.ttf") → Option<&Path>      (O(1))
//! ```

use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use font_kit::handle::Handle;
use font_kit::source::SystemSource;

/// Index of installed font files.
///
/// Call [`SystemFonts::discover()`] once; enumeration goes through the
/// platform font service and is comparatively slow.
pub struct SystemFonts {
    /// Base file name → full path.
    by_file_name: HashMap<OsString, PathBuf>,

    /// How long discovery took (for diagnostics).
    discovery_time_ms: f64,
}

impl SystemFonts {
    /// Enumerate installed fonts.
    ///
    /// A platform without a usable font service yields an empty index.
    pub fn discover() -> Self {
        let start = Instant::now();
        let source = SystemSource::new();

        let paths = match source.all_fonts() {
            Ok(handles) => handles
                .into_iter()
                .filter_map(|handle| match handle {
                    Handle::Path { path, .. } => Some(path),
                    Handle::Memory { .. } => None,
                })
                .collect(),
            Err(err) => {
                log::warn!("SystemFonts: enumeration failed: {err:?}");
                Vec::new()
            }
        };

        let mut fonts = Self::from_paths(paths);
        fonts.discovery_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        log::info!(
            "SystemFonts: indexed {} font files ({:.1}ms)",
            fonts.len(),
            fonts.discovery_time_ms,
        );
        fonts
    }

    /// Build an index from explicit paths. The first path seen for a
    /// file name wins.
    pub fn from_paths(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut by_file_name = HashMap::new();
        for path in paths {
            if let Some(name) = path.file_name() {
                by_file_name.entry(name.to_owned()).or_insert_with(|| path.clone());
            }
        }
        Self {
            by_file_name,
            discovery_time_ms: 0.0,
        }
    }

    /// Number of distinct file names indexed.
    pub fn len(&self) -> usize {
        self.by_file_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_file_name.is_empty()
    }

    /// Discovery time in milliseconds.
    pub fn discovery_time_ms(&self) -> f64 {
        self.discovery_time_ms
    }

    /// Path of the installed font with this base file name.
    pub fn find(&self, file_name: &OsStr) -> Option<&Path> {
        self.by_file_name.get(file_name).map(PathBuf::as_path)
    }

    /// All indexed file names (sorted).
    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .by_file_name
            .keys()
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

impl fmt::Display for SystemFonts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SystemFonts({} files, {:.1}ms)",
            self.by_file_name.len(),
            self.discovery_time_ms,
        )
    }
}

// ===================================================================
// Tests
// ===================================================================
