//! Glyph atlas: the single-channel float texture every font packs into.
//!
//! Uses a simple row-based "shelf" packing algorithm. Each row (shelf)
//! has a fixed height determined by the glyph that opened it. When a
//! region doesn't fit any existing shelf, a new shelf is started below
//! the last one.
//!
//! Pixels are `f32` distance values (one channel), zero-initialized. The
//! whole buffer can be handed to the GPU as raw bytes via
//! [`Atlas::as_bytes`]. Regions are never freed: fonts live for the life
//! of the cache that owns them.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::DEFAULT_ATLAS_SIZE;

/// Gap left to the right of and below every region, in pixels.
pub const ATLAS_PADDING: u32 = 1;

/// The atlas as shared between the font manager and every font.
pub type SharedAtlas = Arc<Mutex<Atlas>>;

/// Lock a shared atlas.
///
/// A panic while the lock was held can at worst leave a half-written
/// glyph region behind, which nothing references.
pub fn lock(atlas: &SharedAtlas) -> MutexGuard<'_, Atlas> {
    atlas.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A region within the atlas texture (UV coordinates normalized to [0,1]).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AtlasRegion {
    /// Top-left U coordinate.
    pub u_min: f32,
    /// Top-left V coordinate.
    pub v_min: f32,
    /// Bottom-right U coordinate.
    pub u_max: f32,
    /// Bottom-right V coordinate.
    pub v_max: f32,
}

/// Pixel-space rectangle within the atlas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AtlasRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Shelf (row) in the atlas.
struct Shelf {
    /// Y offset of this shelf.
    y: u32,
    /// Height of this shelf, padding included.
    height: u32,
    /// Next free X position.
    cursor_x: u32,
}

/// CPU-side glyph atlas.
pub struct Atlas {
    /// Atlas texture width and height in pixels (always square).
    pub size: u32,
    /// Single-channel pixel data, row-major (size * size values).
    pub data: Vec<f32>,
    /// Whether data has changed since last GPU upload.
    pub dirty: bool,
    /// Shelf rows.
    shelves: Vec<Shelf>,
    /// Number of regions handed out.
    region_count: usize,
    /// Pixels handed out, padding excluded.
    allocated_area: u64,
}

impl Default for Atlas {
    /// A 1024×1024 atlas.
    fn default() -> Self {
        Self::new(DEFAULT_ATLAS_SIZE)
    }
}

impl Atlas {
    /// Create a new atlas with the given size (width = height = size).
    pub fn new(size: u32) -> Self {
        let pixel_count = (size as usize) * (size as usize);
        Self {
            size,
            data: vec![0.0; pixel_count],
            dirty: false,
            shelves: Vec::new(),
            region_count: 0,
            allocated_area: 0,
        }
    }

    /// Wrap the atlas for sharing.
    pub fn shared(self) -> SharedAtlas {
        Arc::new(Mutex::new(self))
    }

    /// Number of regions allocated so far.
    pub fn region_count(&self) -> usize {
        self.region_count
    }

    /// Pixels covered by allocated regions (padding excluded).
    pub fn allocated_area(&self) -> u64 {
        self.allocated_area
    }

    /// Fraction of the texture covered by allocated regions.
    pub fn occupancy(&self) -> f32 {
        let total = self.size as f64 * self.size as f64;
        if total == 0.0 {
            return 0.0;
        }
        (self.allocated_area as f64 / total) as f32
    }

    /// Value at `(x, y)`, or `None` outside the texture.
    pub fn pixel(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.size || y >= self.size {
            return None;
        }
        self.data.get((y * self.size + x) as usize).copied()
    }

    /// Raw texture bytes for upload (native-endian `f32`, R32Float).
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    /// Clear the dirty flag, returning whether it was set.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Reserve a `width`×`height` region using shelf packing.
    ///
    /// Returns `None` when the atlas has no room left. Empty regions are
    /// always granted and take no space.
    pub fn allocate(&mut self, width: u32, height: u32) -> Option<AtlasRect> {
        if width == 0 || height == 0 {
            return Some(AtlasRect { x: 0, y: 0, width: 0, height: 0 });
        }

        let padded_w = width + ATLAS_PADDING;
        let padded_h = height + ATLAS_PADDING;

        if padded_w > self.size {
            return None; // Wider than the atlas.
        }

        // Try existing shelves.
        let size = self.size;
        let found = self
            .shelves
            .iter_mut()
            .find(|s| s.height >= padded_h && s.cursor_x + padded_w <= size)
            .map(|shelf| {
                let rect = AtlasRect { x: shelf.cursor_x, y: shelf.y, width, height };
                shelf.cursor_x += padded_w;
                rect
            });

        let rect = match found {
            Some(rect) => rect,
            None => {
                // Start a new shelf.
                let shelf_y = self.shelves.last().map(|s| s.y + s.height).unwrap_or(0);
                if shelf_y + padded_h > self.size {
                    return None; // Atlas full.
                }
                self.shelves.push(Shelf {
                    y: shelf_y,
                    height: padded_h,
                    cursor_x: padded_w,
                });
                AtlasRect { x: 0, y: shelf_y, width, height }
            }
        };

        self.region_count += 1;
        self.allocated_area += width as u64 * height as u64;
        Some(rect)
    }

    /// Copy a row-major single-channel bitmap into `rect`.
    ///
    /// `bitmap` must hold `rect.width * rect.height` values; extra values
    /// are ignored, missing rows are left untouched.
    pub fn set_region(&mut self, rect: &AtlasRect, bitmap: &[f32]) {
        if rect.x + rect.width > self.size || rect.y + rect.height > self.size {
            log::warn!("Atlas: region {rect:?} lies outside the {}px texture", self.size);
            return;
        }

        let width = rect.width as usize;
        if width == 0 {
            return;
        }
        for (row, src) in bitmap.chunks_exact(width).take(rect.height as usize).enumerate() {
            let dst = ((rect.y as usize + row) * self.size as usize) + rect.x as usize;
            self.data[dst..dst + width].copy_from_slice(src);
        }
        self.dirty = true;
    }

    /// Convert pixel rect to normalized UV region.
    pub fn region(&self, rect: &AtlasRect) -> AtlasRegion {
        let inv = 1.0 / self.size as f32;
        AtlasRegion {
            u_min: rect.x as f32 * inv,
            v_min: rect.y as f32 * inv,
            u_max: (rect.x + rect.width) as f32 * inv,
            v_max: (rect.y + rect.height) as f32 * inv,
        }
    }
}

// ===================================================================
// Tests
// ===================================================================
