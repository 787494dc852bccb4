//! Font name → local file resolution.
//!
//! [`DataResolver`] looks for a requested font, in order:
//!
//! 1. the name itself, when it is an existing file path;
//! 2. each search directory, as `<dir>/<name>` then `<dir>/<base name>`;
//! 3. the fetch cache directory (fonts fetched by earlier runs);
//! 4. installed system fonts with the same file name;
//! 5. the [`FontFetcher`], which downloads `<base name>` into the cache
//!    directory.
//!
//! Found paths are canonicalized.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::config::FontConfig;
use crate::error::FontError;
use crate::manager::FontResolver;
use crate::system::SystemFonts;

/// Retrieves a font file that is not available locally.
///
/// No network client ships with this crate; applications plug in their
/// own (or a closure).
pub trait FontFetcher: Send + Sync {
    /// Write the font called `name` to `dest`.
    fn fetch(&self, name: &str, dest: &Path) -> Result<(), FontError>;
}

impl<T> FontFetcher for T
where
    T: Fn(&str, &Path) -> Result<(), FontError> + Send + Sync,
{
    fn fetch(&self, name: &str, dest: &Path) -> Result<(), FontError> {
        self(name, dest)
    }
}

/// Resolver over local directories, system fonts and an optional fetcher.
#[derive(Default)]
pub struct DataResolver {
    search_dirs: Vec<PathBuf>,
    system_fonts: bool,
    cache_dir: Option<PathBuf>,
    fetcher: Option<Box<dyn FontFetcher>>,
    /// Indexed on first use.
    system_index: OnceLock<SystemFonts>,
}

impl DataResolver {
    /// Resolver that only accepts existing file paths.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &FontConfig) -> Self {
        Self {
            search_dirs: config.search_dirs.clone(),
            system_fonts: config.system_fonts,
            cache_dir: config.cache_dir.clone(),
            ..Self::default()
        }
    }

    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dirs.push(dir.into());
        self
    }

    pub fn with_system_fonts(mut self, enabled: bool) -> Self {
        self.system_fonts = enabled;
        self
    }

    /// Fetch missing fonts into `cache_dir`.
    pub fn with_fetcher(
        mut self,
        cache_dir: impl Into<PathBuf>,
        fetcher: impl FontFetcher + 'static,
    ) -> Self {
        self.cache_dir = Some(cache_dir.into());
        self.fetcher = Some(Box::new(fetcher));
        self
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    fn find_local(&self, name: &str, base: &OsStr) -> Option<PathBuf> {
        let direct = Path::new(name);
        if direct.is_file() {
            return Some(direct.to_path_buf());
        }

        self.search_dirs
            .iter()
            .chain(self.cache_dir.as_ref())
            .flat_map(|dir| [dir.join(name), dir.join(base)])
            .find(|candidate| candidate.is_file())
    }

    fn find_system(&self, base: &OsStr) -> Option<PathBuf> {
        if !self.system_fonts {
            return None;
        }
        self.system_index
            .get_or_init(SystemFonts::discover)
            .find(base)
            .map(Path::to_path_buf)
    }

    fn fetch(&self, name: &str, base: &OsStr) -> Result<Option<PathBuf>, FontError> {
        let (Some(fetcher), Some(cache_dir)) = (&self.fetcher, &self.cache_dir) else {
            return Ok(None);
        };

        fs::create_dir_all(cache_dir).map_err(|e| FontError::io(cache_dir, e))?;
        let dest = cache_dir.join(base);
        let base = base.to_string_lossy();
        log::info!("DataResolver: fetching {base} into {}", cache_dir.display());
        fetcher.fetch(&base, &dest)?;

        if !dest.is_file() {
            return Err(FontError::Fetch {
                name: name.to_owned(),
                reason: format!("fetcher did not produce {}", dest.display()),
            });
        }
        Ok(Some(dest))
    }
}

impl FontResolver for DataResolver {
    fn resolve(&self, name: &str) -> Result<PathBuf, FontError> {
        let Some(base) = Path::new(name).file_name() else {
            return Err(FontError::not_found(name));
        };

        let found = match self.find_local(name, base) {
            Some(path) => path,
            None => match self.find_system(base) {
                Some(path) => path,
                None => self.fetch(name, base)?.ok_or_else(|| FontError::not_found(name))?,
            },
        };

        log::debug!("DataResolver: {name} → {}", found.display());
        fs::canonicalize(&found).map_err(|e| FontError::io(found, e))
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"not really a font").unwrap();
    }

    fn resolver() -> DataResolver {
        DataResolver::new().with_system_fonts(false)
    }

    #[test]
    fn test_existing_path_resolves_to_itself() {
        let dir = tempfile::tempdir().unwrap();
        let font = dir.path().join("Direct.ttf");
        touch(&font);

        let resolved = resolver().resolve(font.to_str().unwrap()).unwrap();
        assert_eq!(resolved, fs::canonicalize(&font).unwrap());
    }

    #[test]
    fn test_search_dirs_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        touch(&first.join("Shared.ttf"));
        touch(&second.join("Shared.ttf"));
        touch(&second.join("OnlySecond.ttf"));

        let resolver = resolver().with_search_dir(&first).with_search_dir(&second);
        assert_eq!(
            resolver.resolve("Shared.ttf").unwrap(),
            fs::canonicalize(first.join("Shared.ttf")).unwrap()
        );
        assert_eq!(
            resolver.resolve("OnlySecond.ttf").unwrap(),
            fs::canonicalize(second.join("OnlySecond.ttf")).unwrap()
        );
    }

    #[test]
    fn test_relative_name_then_base_name() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("serif/Body.ttf"));
        touch(&dir.path().join("Flat.ttf"));

        let resolver = resolver().with_search_dir(dir.path());
        assert!(resolver.resolve("serif/Body.ttf").unwrap().ends_with("serif/Body.ttf"));
        // Directory part not found under the search dir, base name is.
        assert!(resolver.resolve("elsewhere/Flat.ttf").unwrap().ends_with("Flat.ttf"));
    }

    #[test]
    fn test_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolver()
            .with_search_dir(dir.path())
            .resolve("Missing.ttf")
            .unwrap_err();
        assert!(matches!(err, FontError::NotFound { ref name } if name == "Missing.ttf"));
    }

    #[test]
    fn test_empty_name_not_found() {
        assert!(matches!(resolver().resolve(""), Err(FontError::NotFound { .. })));
        assert!(matches!(resolver().resolve(".."), Err(FontError::NotFound { .. })));
    }

    #[test]
    fn test_fetch_into_cache_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache");
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let resolver = resolver().with_fetcher(&cache, move |name: &str, dest: &Path| {
            counter.fetch_add(1, Ordering::SeqCst);
            assert_eq!(name, "Remote.ttf");
            fs::write(dest, b"fetched").map_err(|e| FontError::io(dest, e))
        });

        let path = resolver.resolve("fonts/Remote.ttf").unwrap();
        assert_eq!(path, fs::canonicalize(cache.join("Remote.ttf")).unwrap());

        // Second lookup finds the cached download.
        resolver.resolve("Remote.ttf").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fetch_error_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver().with_fetcher(dir.path(), |name: &str, _: &Path| -> Result<(), FontError> {
            Err(FontError::Fetch {
                name: name.to_owned(),
                reason: "offline".into(),
            })
        });
        let err = resolver.resolve("Remote.ttf").unwrap_err();
        assert!(matches!(err, FontError::Fetch { ref reason, .. } if reason == "offline"));
    }

    #[test]
    fn test_fetch_without_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver().with_fetcher(dir.path(), |_: &str, _: &Path| -> Result<(), FontError> {
            Ok(())
        });
        assert!(matches!(
            resolver.resolve("Ghost.ttf"),
            Err(FontError::Fetch { .. })
        ));
    }

    #[test]
    fn test_from_config() {
        let config = FontConfig::default()
            .with_search_dir("/opt/fonts")
            .with_system_fonts(false);
        let resolver = DataResolver::from_config(&config);
        assert_eq!(resolver.search_dirs(), &[PathBuf::from("/opt/fonts")]);
        assert!(!resolver.system_fonts);
    }
}
