//! # lumen-text
//!
//! Font cache for the Lumen renderer. Every font file is loaded once per
//! [`FontManager`], and all fonts pack their glyphs, as signed distance
//! fields, into one shared single-channel float atlas.
//!
//! ## Architecture
//!
//! ```text
//! FontManager (clone = same cache)
//!     │ get("Inter.ttf")
//!     ▼
//! DataResolver ──► path ──► key "Inter.ttf" ──► cached Arc<SdfFont>
//!                                    │ miss
//!                                    ▼
//!                          SdfFactory ──► SdfFont ──► glyph SDFs ──► Atlas
//! ```
//!
//! - **`manager`** — Font cache, lazily created shared atlas, collaborator traits.
//! - **`atlas`** — CPU-side `f32` texture atlas with shelf packing.
//! - **`resolve`** — Name → path lookup (search dirs, system fonts, fetch hook).
//! - **`sdf`** — Signed-distance-field glyph rasterization via `font-kit`.
//! - **`system`** — Index of installed font files.
//! - **`config`** — `FontConfig` / `SdfParams`, with `LUMEN_*` overrides.

pub mod atlas;
pub mod config;
pub mod error;
pub mod manager;
pub mod resolve;
pub mod sdf;
pub mod system;

// Re-exports for ergonomic use.
pub use atlas::{Atlas, AtlasRect, AtlasRegion, SharedAtlas};
pub use config::{FontConfig, SdfParams, DEFAULT_ATLAS_SIZE};
pub use error::FontError;
pub use manager::{FontCache, FontFactory, FontHandle, FontKey, FontManager, FontResolver};
pub use resolve::{DataResolver, FontFetcher};
pub use sdf::{Glyph, LineMetrics, SdfFactory, SdfFont};
pub use system::SystemFonts;
