//! Signed-distance-field fonts packed into the shared atlas.
//!
//! Each glyph is rasterized by `font-kit` at `size × oversample` pixels,
//! turned into a signed distance field with an exact Euclidean distance
//! transform, box-filtered back down to `size` and written into an atlas
//! region. Texel values are `0.5` on the outline, rising to `1.0` inside
//! and falling to `0.0` outside over `spread` pixels.
//!
//! ```text
//! coverage (hi-res) ──► EDT inside/outside ──► ramp [0,1] ──► downsample ──► atlas
//! ```

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use font_kit::canvas::{Canvas, Format, RasterizationOptions};
use font_kit::font::Font;
use font_kit::hinting::HintingOptions;
use pathfinder_geometry::transform2d::Transform2F;
use pathfinder_geometry::vector::{vec2f, vec2i};

use crate::atlas::{self, AtlasRegion, SharedAtlas};
use crate::config::SdfParams;
use crate::error::FontError;
use crate::manager::FontFactory;

/// Squared distance standing in for "no seed pixel in this line".
const FAR: f64 = 1e20;

/// Vertical font metrics, in atlas pixels at the SDF em size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineMetrics {
    /// Distance from baseline to the top of the tallest glyphs.
    pub ascender: f32,
    /// Distance from baseline to the bottom (negative below the baseline).
    pub descender: f32,
    pub line_gap: f32,
    /// Baseline-to-baseline distance.
    pub height: f32,
}

/// One glyph of an [`SdfFont`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Glyph {
    pub charcode: char,
    /// Bitmap size in atlas pixels, spread padding included.
    pub width: u32,
    pub height: u32,
    /// Left edge and top edge of the bitmap relative to the pen position
    /// on the baseline (y up).
    pub offset: (f32, f32),
    /// Horizontal advance in atlas pixels.
    pub advance: f32,
    /// Texture coordinates; `None` for glyphs without ink (spaces).
    pub region: Option<AtlasRegion>,
}

/// Coverage of one glyph rendered at hi-res, padded for the distance ramp.
struct Raster {
    width: usize,
    height: usize,
    coverage: Vec<f32>,
    /// Top-left corner relative to the pen position (y down, hi-res px).
    origin: (i32, i32),
}

/// A font whose glyphs live in the shared atlas as distance fields.
///
/// Glyphs are rasterized once, either when the font is built (the
/// configured preload set) or on first request.
pub struct SdfFont {
    path: PathBuf,
    family: String,
    /// Raw font file, reparsed whenever glyphs are added.
    data: Arc<Vec<u8>>,
    units_per_em: f32,
    metrics: LineMetrics,
    params: SdfParams,
    atlas: SharedAtlas,
    glyphs: Mutex<HashMap<char, Glyph>>,
}

impl SdfFont {
    /// Load the font at `path` and rasterize the preload set into `atlas`.
    ///
    /// Preload characters the font has no glyph for are skipped.
    pub fn new(path: &Path, atlas: &SharedAtlas, params: SdfParams) -> Result<Self, FontError> {
        let data = Arc::new(fs::read(path).map_err(|e| FontError::io(path, e))?);
        let font = parse(path, &data)?;

        let m = font.metrics();
        let units_per_em = m.units_per_em.max(1) as f32;
        let scale = params.size as f32 / units_per_em;
        let metrics = LineMetrics {
            ascender: m.ascent * scale,
            descender: m.descent * scale,
            line_gap: m.line_gap * scale,
            height: (m.ascent - m.descent + m.line_gap) * scale,
        };

        let sdf = Self {
            path: path.to_path_buf(),
            family: font.family_name(),
            data,
            units_per_em,
            metrics,
            params,
            atlas: Arc::clone(atlas),
            glyphs: Mutex::new(HashMap::new()),
        };

        let loaded = sdf.load_with(&font, &sdf.params.preload, true)?;
        log::debug!("SdfFont: {} preloaded {loaded} glyphs", sdf.family);
        Ok(sdf)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn metrics(&self) -> LineMetrics {
        self.metrics
    }

    pub fn params(&self) -> &SdfParams {
        &self.params
    }

    /// The atlas this font's glyphs are packed into.
    pub fn atlas(&self) -> &SharedAtlas {
        &self.atlas
    }

    /// Number of glyphs rasterized so far.
    pub fn glyph_count(&self) -> usize {
        self.lock_glyphs().len()
    }

    /// Already rasterized glyph, if any.
    pub fn get(&self, c: char) -> Option<Glyph> {
        self.lock_glyphs().get(&c).copied()
    }

    /// Glyph for `c`, rasterizing it on first use.
    pub fn glyph(&self, c: char) -> Result<Glyph, FontError> {
        if let Some(glyph) = self.get(c) {
            return Ok(glyph);
        }
        let mut buf = [0u8; 4];
        self.load(c.encode_utf8(&mut buf))?;
        self.get(c).ok_or(FontError::MissingGlyph(c))
    }

    /// Rasterize every character of `chars` not loaded yet. Returns how
    /// many were added.
    pub fn load(&self, chars: &str) -> Result<usize, FontError> {
        {
            let glyphs = self.lock_glyphs();
            if chars.chars().all(|c| glyphs.contains_key(&c)) {
                return Ok(0);
            }
        }
        let font = parse(&self.path, &self.data)?;
        self.load_with(&font, chars, false)
    }

    fn load_with(&self, font: &Font, chars: &str, skip_missing: bool) -> Result<usize, FontError> {
        let mut glyphs = self.lock_glyphs();
        let mut loaded = 0;
        for c in chars.chars() {
            if glyphs.contains_key(&c) {
                continue;
            }
            let glyph = match self.rasterize(font, c) {
                Ok(glyph) => glyph,
                Err(FontError::MissingGlyph(_)) if skip_missing => {
                    log::debug!("SdfFont: {} has no glyph for {c:?}", self.family);
                    continue;
                }
                Err(err) => return Err(err),
            };
            glyphs.insert(c, glyph);
            loaded += 1;
        }
        Ok(loaded)
    }

    fn rasterize(&self, font: &Font, c: char) -> Result<Glyph, FontError> {
        let glyph_id = font.glyph_for_char(c).ok_or(FontError::MissingGlyph(c))?;
        let factor = self.params.oversample;
        let advance = font.advance(glyph_id)?.x() * self.params.size as f32 / self.units_per_em;

        let point_size = (self.params.size * factor) as f32;
        let pad = (self.params.spread * factor as f32).ceil() as i32;
        let Some(raster) = rasterize_hires(font, glyph_id, point_size, pad, factor as i32)? else {
            return Ok(Glyph {
                charcode: c,
                width: 0,
                height: 0,
                offset: (0.0, 0.0),
                advance,
                region: None,
            });
        };

        let spread = self.params.spread * factor as f32;
        let field = signed_distance_field(&raster.coverage, raster.width, raster.height, spread);
        let (bitmap, width, height) =
            downsample(&field, raster.width, raster.height, factor as usize);
        let (width, height) = (width as u32, height as u32);

        let region = {
            let mut atlas = atlas::lock(&self.atlas);
            let rect = atlas
                .allocate(width, height)
                .ok_or(FontError::AtlasFull { width, height })?;
            atlas.set_region(&rect, &bitmap);
            atlas.region(&rect)
        };

        Ok(Glyph {
            charcode: c,
            width,
            height,
            offset: (
                raster.origin.0 as f32 / factor as f32,
                -raster.origin.1 as f32 / factor as f32,
            ),
            advance,
            region: Some(region),
        })
    }

    fn lock_glyphs(&self) -> MutexGuard<'_, HashMap<char, Glyph>> {
        self.glyphs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for SdfFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SdfFont")
            .field("path", &self.path)
            .field("family", &self.family)
            .field("size", &self.params.size)
            .field("glyphs", &self.glyph_count())
            .finish()
    }
}

/// Builds [`SdfFont`]s for the font manager.
#[derive(Clone, Debug, Default)]
pub struct SdfFactory {
    params: SdfParams,
}

impl SdfFactory {
    pub fn new(params: SdfParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SdfParams {
        &self.params
    }
}

impl FontFactory for SdfFactory {
    type Font = SdfFont;

    fn make_font(&self, path: &Path, atlas: &SharedAtlas) -> Result<SdfFont, FontError> {
        SdfFont::new(path, atlas, self.params.clone())
    }
}

// ── Rasterization internals ─────────────────────────────────────────

fn parse(path: &Path, data: &Arc<Vec<u8>>) -> Result<Font, FontError> {
    Font::from_bytes(Arc::clone(data), 0).map_err(|source| FontError::Loading {
        path: path.to_path_buf(),
        source,
    })
}

/// Render a glyph's coverage with `pad` empty pixels on every side, the
/// canvas rounded up to a multiple of `factor`. `None` for inkless glyphs.
fn rasterize_hires(
    font: &Font,
    glyph_id: u32,
    point_size: f32,
    pad: i32,
    factor: i32,
) -> Result<Option<Raster>, FontError> {
    let bounds = font.raster_bounds(
        glyph_id,
        point_size,
        Transform2F::default(),
        HintingOptions::None,
        RasterizationOptions::GrayscaleAa,
    )?;
    if bounds.width() <= 0 || bounds.height() <= 0 {
        return Ok(None);
    }

    let width = round_up(bounds.width() + 2 * pad, factor);
    let height = round_up(bounds.height() + 2 * pad, factor);
    let origin = (bounds.origin_x() - pad, bounds.origin_y() - pad);

    let mut canvas = Canvas::new(vec2i(width, height), Format::A8);
    font.rasterize_glyph(
        &mut canvas,
        glyph_id,
        point_size,
        Transform2F::from_translation(vec2f(-origin.0 as f32, -origin.1 as f32)),
        HintingOptions::None,
        RasterizationOptions::GrayscaleAa,
    )?;

    let (width, height) = (width as usize, height as usize);
    let coverage = canvas
        .pixels
        .chunks(canvas.stride)
        .take(height)
        .flat_map(|row| row[..width].iter().map(|&p| p as f32 / 255.0))
        .collect();

    Ok(Some(Raster {
        width,
        height,
        coverage,
        origin,
    }))
}

fn round_up(value: i32, multiple: i32) -> i32 {
    (value + multiple - 1) / multiple * multiple
}

/// Distance field of a coverage bitmap.
///
/// Pixels with coverage ≥ 0.5 are inside. The signed distance (pixels,
/// positive inside, measured to the pixel boundary) is mapped to
/// `0.5 + d / (2 * spread)` and clamped to `[0, 1]`.
pub fn signed_distance_field(coverage: &[f32], width: usize, height: usize, spread: f32) -> Vec<f32> {
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let inside: Vec<bool> = coverage.iter().map(|&c| c >= 0.5).collect();
    let to_inside = distance_to(&inside, true, width, height);
    let to_outside = distance_to(&inside, false, width, height);

    to_inside
        .iter()
        .zip(&to_outside)
        .map(|(&di, &dout)| {
            let d = if dout > 0.0 { dout - 0.5 } else { 0.5 - di };
            (0.5 + d / (2.0 * spread)).clamp(0.0, 1.0)
        })
        .collect()
}

/// Euclidean distance from every pixel to the nearest pixel whose mask
/// value equals `target`.
fn distance_to(mask: &[bool], target: bool, width: usize, height: usize) -> Vec<f32> {
    let mut grid: Vec<f64> = mask
        .iter()
        .map(|&m| if m == target { 0.0 } else { FAR })
        .collect();
    squared_edt(&mut grid, width, height);
    grid.into_iter().map(|d| d.sqrt() as f32).collect()
}

/// In-place 2D squared Euclidean distance transform (Felzenszwalb &
/// Huttenlocher): one 1D pass down every column, then along every row.
fn squared_edt(grid: &mut [f64], width: usize, height: usize) {
    let n = width.max(height);
    let mut f = vec![0.0; n];
    let mut d = vec![0.0; n];
    let mut v = vec![0usize; n];
    let mut z = vec![0.0; n + 1];

    for x in 0..width {
        for y in 0..height {
            f[y] = grid[y * width + x];
        }
        edt_1d(&f[..height], &mut d[..height], &mut v, &mut z);
        for y in 0..height {
            grid[y * width + x] = d[y];
        }
    }

    for row in grid.chunks_exact_mut(width) {
        f[..width].copy_from_slice(row);
        edt_1d(&f[..width], &mut d[..width], &mut v, &mut z);
        row.copy_from_slice(&d[..width]);
    }
}

/// Lower envelope of the parabolas rooted at `(q, f[q])`.
fn edt_1d(f: &[f64], d: &mut [f64], v: &mut [usize], z: &mut [f64]) {
    let n = f.len();
    if n == 0 {
        return;
    }

    let mut k = 0;
    v[0] = 0;
    z[0] = f64::NEG_INFINITY;
    z[1] = f64::INFINITY;
    for q in 1..n {
        let qf = q as f64;
        let mut s;
        loop {
            let p = v[k] as f64;
            s = ((f[q] + qf * qf) - (f[v[k]] + p * p)) / (2.0 * qf - 2.0 * p);
            // z[0] is -inf, so this stops at k = 0 at the latest.
            if s > z[k] {
                break;
            }
            k -= 1;
        }
        k += 1;
        v[k] = q;
        z[k] = s;
        z[k + 1] = f64::INFINITY;
    }

    k = 0;
    for (q, out) in d.iter_mut().enumerate() {
        let qf = q as f64;
        while z[k + 1] < qf {
            k += 1;
        }
        let p = v[k] as f64;
        *out = (qf - p) * (qf - p) + f[v[k]];
    }
}

/// Box-filter by `factor` in both directions. Dimensions must be
/// multiples of `factor`.
fn downsample(field: &[f32], width: usize, height: usize, factor: usize) -> (Vec<f32>, usize, usize) {
    let (out_w, out_h) = (width / factor, height / factor);
    let norm = (factor * factor) as f32;
    let mut out = vec![0.0; out_w * out_h];

    for oy in 0..out_h {
        for ox in 0..out_w {
            let mut sum = 0.0;
            for y in oy * factor..(oy + 1) * factor {
                let row = &field[y * width..(y + 1) * width];
                sum += row[ox * factor..(ox + 1) * factor].iter().sum::<f32>();
            }
            out[oy * out_w + ox] = sum / norm;
        }
    }
    (out, out_w, out_h)
}

// ===================================================================
// Tests
// ===================================================================
