//! Font manager: one font cache and one atlas, shared by every handle.
//!
//! A [`FontManager`] is created once by the application and cloned to
//! wherever fonts are needed. Clones are views onto the same state: a
//! font requested through any of them is loaded at most once, and every
//! font packs its glyphs into the same [`Atlas`].
//!
//! ```text
//! get("fonts/Inter.ttf")
//!     │ resolver
//!     ▼
//! /abs/path/Inter.ttf ──► key "Inter.ttf" ──► cache hit ──► Arc<Font>
//!                                                │ miss
//!                                                ▼
//!                              atlas (created once) ──► factory ──► insert
//! ```
//!
//! Fonts are keyed by **base file name only**, so `a/Inter.ttf` and
//! `b/Inter.ttf` share one entry: whichever is loaded first wins.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Instant;

use crate::atlas::{self, Atlas, SharedAtlas};
use crate::config::{FontConfig, DEFAULT_ATLAS_SIZE};
use crate::error::FontError;
use crate::resolve::DataResolver;
use crate::sdf::SdfFactory;

/// A cached font. Every `get` of the same key returns a clone of the
/// same `Arc`.
pub type FontHandle<F> = Arc<F>;

/// Snapshot of the cache contents.
pub type FontCache<F> = HashMap<FontKey, FontHandle<F>>;

// ── Cache key ───────────────────────────────────────────────────────

/// Cache key: the base file name of a resolved font path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontKey(String);

impl FontKey {
    /// Key for a resolved path. A path without a final component (`/`,
    /// `..`) keys on the whole path.
    pub fn from_path(path: &Path) -> Self {
        let name = match path.file_name() {
            Some(name) => name.to_string_lossy(),
            None => path.to_string_lossy(),
        };
        Self(name.into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FontKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::borrow::Borrow<str> for FontKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ── Collaborators ───────────────────────────────────────────────────

/// Turns a requested font name into a local file path.
///
/// Errors are handed to the caller of [`FontManager::get`] unchanged.
pub trait FontResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Result<PathBuf, FontError>;
}

impl<T> FontResolver for T
where
    T: Fn(&str) -> Result<PathBuf, FontError> + Send + Sync,
{
    fn resolve(&self, name: &str) -> Result<PathBuf, FontError> {
        self(name)
    }
}

/// Builds a font from a file, packing its glyphs into the shared atlas.
///
/// Called at most once per cache key. Errors are handed to the caller of
/// [`FontManager::get`] unchanged and nothing is cached.
pub trait FontFactory: Send + Sync {
    type Font: Send + Sync;

    fn make_font(&self, path: &Path, atlas: &SharedAtlas) -> Result<Self::Font, FontError>;
}

// ── Manager ─────────────────────────────────────────────────────────

struct Shared<F: FontFactory> {
    resolver: Box<dyn FontResolver>,
    factory: F,
    atlas_size: u32,
    atlas: OnceLock<SharedAtlas>,
    cache: Mutex<FontCache<F::Font>>,
}

/// Shared font cache and atlas.
///
/// Cloning is cheap and yields another view of the same cache.
pub struct FontManager<F: FontFactory = SdfFactory> {
    shared: Arc<Shared<F>>,
}

impl<F: FontFactory> Clone for FontManager<F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl FontManager<SdfFactory> {
    /// SDF fonts resolved through the configured directories.
    pub fn from_config(config: FontConfig) -> Result<Self, FontError> {
        config.validate()?;
        let resolver = DataResolver::from_config(&config);
        let factory = SdfFactory::new(config.sdf);
        Ok(Self::with_atlas_size(resolver, factory, config.atlas_size))
    }
}

impl<F: FontFactory> FontManager<F> {
    /// Manager with a default-sized (1024×1024) atlas.
    pub fn new(resolver: impl FontResolver + 'static, factory: F) -> Self {
        Self::with_atlas_size(resolver, factory, DEFAULT_ATLAS_SIZE)
    }

    /// Manager whose atlas, once created, is `atlas_size` pixels square.
    pub fn with_atlas_size(
        resolver: impl FontResolver + 'static,
        factory: F,
        atlas_size: u32,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                resolver: Box::new(resolver),
                factory,
                atlas_size,
                atlas: OnceLock::new(),
                cache: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Get a font, loading it on first request.
    ///
    /// The name is resolved on every call; only the base file name of
    /// the result is used to look up the cache. On a miss the shared
    /// atlas is created if needed and the factory builds the font. The
    /// cache lock is held across construction, so concurrent first
    /// requests for one key build it once.
    pub fn get(&self, name: &str) -> Result<FontHandle<F::Font>, FontError> {
        let path = self.shared.resolver.resolve(name)?;
        let key = FontKey::from_path(&path);

        let mut cache = self.lock_cache();
        if let Some(font) = cache.get(&key) {
            log::debug!("FontManager: cache hit for {key}");
            return Ok(Arc::clone(font));
        }

        let atlas = self.atlas();
        let start = Instant::now();
        let font = Arc::new(self.shared.factory.make_font(&path, &atlas)?);
        log::info!(
            "FontManager: loaded {} as {key} ({:.1}ms)",
            path.display(),
            start.elapsed().as_secs_f64() * 1000.0,
        );

        cache.insert(key, Arc::clone(&font));
        Ok(font)
    }

    /// The shared atlas, created on first access.
    pub fn atlas(&self) -> SharedAtlas {
        Arc::clone(self.shared.atlas.get_or_init(|| {
            let size = self.shared.atlas_size;
            log::info!("FontManager: creating {size}×{size} atlas");
            Atlas::new(size).shared()
        }))
    }

    /// Whether the atlas has been created yet.
    pub fn has_atlas(&self) -> bool {
        self.shared.atlas.get().is_some()
    }

    /// Snapshot of the cache. The handles are the live cached fonts.
    pub fn cache(&self) -> FontCache<F::Font> {
        self.lock_cache().clone()
    }

    /// Cached font for a key, without resolving anything.
    pub fn cached(&self, key: &str) -> Option<FontHandle<F::Font>> {
        self.lock_cache().get(key).cloned()
    }

    /// Whether a font is cached under this key.
    pub fn contains(&self, key: &str) -> bool {
        self.lock_cache().contains_key(key)
    }

    /// Number of cached fonts.
    pub fn len(&self) -> usize {
        self.lock_cache().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_cache().is_empty()
    }

    /// Cached keys (sorted).
    pub fn keys(&self) -> Vec<FontKey> {
        let mut keys: Vec<FontKey> = self.lock_cache().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// The factory fonts are built with.
    pub fn factory(&self) -> &F {
        &self.shared.factory
    }

    /// Whether two handles view the same cache.
    pub fn same_cache(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    // Entries are only inserted after construction succeeds, so a
    // poisoned lock still guards a consistent map.
    fn lock_cache(&self) -> MutexGuard<'_, FontCache<F::Font>> {
        self.shared.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<F: FontFactory> fmt::Debug for FontManager<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontManager")
            .field("fonts", &self.keys())
            .field("atlas_size", &self.shared.atlas_size)
            .field("has_atlas", &self.has_atlas())
            .finish()
    }
}

fn atlas_usage(atlas: &SharedAtlas) -> (usize, f32) {
    let atlas = atlas::lock(atlas);
    (atlas.region_count(), atlas.occupancy())
}

impl<F: FontFactory> fmt::Display for FontManager<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fonts = self.len();
        match self.shared.atlas.get() {
            Some(shared) => {
                let (regions, occupancy) = atlas_usage(shared);
                write!(
                    f,
                    "FontManager({fonts} fonts, {regions} regions, {:.1}% of atlas)",
                    occupancy * 100.0,
                )
            }
            None => write!(f, "FontManager({fonts} fonts, no atlas)"),
        }
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Factory that counts calls and reserves one 8×8 region per font.
    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    #[derive(Debug)]
    struct Stub {
        path: PathBuf,
    }

    impl FontFactory for Counting {
        type Font = Stub;

        fn make_font(&self, path: &Path, atlas: &SharedAtlas) -> Result<Stub, FontError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            atlas::lock(atlas)
                .allocate(8, 8)
                .ok_or(FontError::AtlasFull { width: 8, height: 8 })?;
            Ok(Stub { path: path.to_path_buf() })
        }
    }

    fn identity(name: &str) -> Result<PathBuf, FontError> {
        Ok(PathBuf::from(name))
    }

    #[test]
    fn test_key_is_base_file_name() {
        assert_eq!(FontKey::from_path(Path::new("/a/b/Inter.ttf")).as_str(), "Inter.ttf");
        assert_eq!(FontKey::from_path(Path::new("Inter.ttf")).as_str(), "Inter.ttf");
        assert_eq!(FontKey::from_path(Path::new("/")).as_str(), "/");
    }

    #[test]
    fn test_miss_then_hit() {
        let manager = FontManager::new(identity, Counting::default());
        assert!(!manager.has_atlas());

        let first = manager.get("foo.ttf").unwrap();
        assert!(manager.has_atlas());
        assert_eq!(manager.factory().calls.load(Ordering::SeqCst), 1);

        let second = manager.get("foo.ttf").unwrap();
        assert_eq!(manager.factory().calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_base_name_aliasing() {
        let manager = FontManager::new(identity, Counting::default());
        let a = manager.get("dir1/Arial.ttf").unwrap();
        let b = manager.get("dir2/Arial.ttf").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.path, PathBuf::from("dir1/Arial.ttf"));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_atlas_created_once() {
        let manager = FontManager::new(identity, Counting::default());
        let first = manager.atlas();
        for _ in 0..5 {
            assert!(Arc::ptr_eq(&first, &manager.atlas()));
        }
        assert_eq!(atlas::lock(&first).size, 1024);
    }

    #[test]
    fn test_clones_share_state() {
        let manager = FontManager::new(identity, Counting::default());
        let other = manager.clone();
        assert!(manager.same_cache(&other));

        let font = other.get("shared.ttf").unwrap();
        assert!(manager.contains("shared.ttf"));
        assert!(Arc::ptr_eq(&font, &manager.cached("shared.ttf").unwrap()));
        assert!(Arc::ptr_eq(&manager.atlas(), &other.atlas()));
    }

    #[test]
    fn test_separate_managers_do_not_share() {
        let a = FontManager::new(identity, Counting::default());
        let b = FontManager::new(identity, Counting::default());
        assert!(!a.same_cache(&b));
        a.get("x.ttf").unwrap();
        assert!(b.is_empty());
    }

    #[test]
    fn test_resolution_error_leaves_cache_unchanged() {
        let manager = FontManager::new(
            |name: &str| -> Result<PathBuf, FontError> {
                Err(FontError::NotFound { name: name.to_owned() })
            },
            Counting::default(),
        );
        let err = manager.get("nope.ttf").unwrap_err();
        assert!(matches!(err, FontError::NotFound { ref name } if name == "nope.ttf"));
        assert!(manager.is_empty());
        assert!(!manager.has_atlas());
        assert_eq!(manager.factory().calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_construction_error_not_cached() {
        // 8x8 + padding fits only once in a 12px atlas.
        let manager = FontManager::with_atlas_size(identity, Counting::default(), 12);
        manager.get("one.ttf").unwrap();

        let err = manager.get("two.ttf").unwrap_err();
        assert!(matches!(err, FontError::AtlasFull { .. }));
        assert!(!manager.contains("two.ttf"));
        assert_eq!(manager.len(), 1);

        // A retry calls the factory again rather than returning a stale entry.
        assert!(manager.get("two.ttf").is_err());
        assert_eq!(manager.factory().calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_cache_snapshot() {
        let manager = FontManager::new(identity, Counting::default());
        let font = manager.get("a.ttf").unwrap();
        manager.get("b.ttf").unwrap();

        let cache = manager.cache();
        assert_eq!(cache.len(), 2);
        assert!(Arc::ptr_eq(&cache["a.ttf"], &font));
        assert_eq!(
            manager.keys(),
            vec![FontKey::from_path(Path::new("a.ttf")), FontKey::from_path(Path::new("b.ttf"))]
        );
    }

    #[test]
    fn test_display() {
        let manager = FontManager::new(identity, Counting::default());
        assert_eq!(format!("{manager}"), "FontManager(0 fonts, no atlas)");
        manager.get("a.ttf").unwrap();
        let display = format!("{manager}");
        assert!(display.starts_with("FontManager(1 fonts, 1 regions"));
    }
}
