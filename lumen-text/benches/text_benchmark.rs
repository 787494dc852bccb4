use std::hint::black_box;
use std::path::{Path, PathBuf};

use criterion::{criterion_group, criterion_main, Criterion};
use lumen_text::sdf::signed_distance_field;
use lumen_text::{Atlas, FontError, FontFactory, FontManager, SdfFont, SdfParams, SharedAtlas};

/// Factory that builds nothing, so cache lookups are measured alone.
struct Empty;

impl FontFactory for Empty {
    type Font = ();

    fn make_font(&self, _: &Path, _: &SharedAtlas) -> Result<(), FontError> {
        Ok(())
    }
}

fn identity(name: &str) -> Result<PathBuf, FontError> {
    Ok(PathBuf::from(name))
}

fn system_font() -> Option<PathBuf> {
    use font_kit::family_name::FamilyName;
    use font_kit::handle::Handle;
    use font_kit::properties::Properties;
    use font_kit::source::SystemSource;

    match SystemSource::new()
        .select_best_match(&[FamilyName::SansSerif], &Properties::new())
        .ok()?
    {
        Handle::Path { path, .. } => Some(path),
        Handle::Memory { .. } => None,
    }
}

fn bench_cache_hit(c: &mut Criterion) {
    let manager = FontManager::new(identity, Empty);
    for i in 0..64 {
        manager.get(&format!("fonts/Font{i}.ttf")).unwrap();
    }

    c.bench_function("cache_hit", |b| {
        b.iter(|| manager.get(black_box("fonts/Font17.ttf")).unwrap());
    });
}

fn bench_atlas_allocate(c: &mut Criterion) {
    c.bench_function("atlas_allocate_16x16", |b| {
        let mut atlas = Atlas::new(1024);
        b.iter(|| {
            if atlas.allocate(black_box(16), black_box(16)).is_none() {
                atlas = Atlas::new(1024);
            }
        });
    });
}

fn bench_atlas_set_region(c: &mut Criterion) {
    let mut atlas = Atlas::new(1024);
    let rect = atlas.allocate(40, 40).unwrap();
    let bitmap = vec![0.5f32; 40 * 40];

    c.bench_function("atlas_set_region_40x40", |b| {
        b.iter(|| atlas.set_region(black_box(&rect), black_box(&bitmap)));
    });
}

fn bench_signed_distance_field(c: &mut Criterion) {
    // Filled disc in a 160×160 canvas, roughly one glyph at 4× oversampling.
    let size = 160usize;
    let coverage: Vec<f32> = (0..size * size)
        .map(|i| {
            let (x, y) = ((i % size) as f32 - 80.0, (i / size) as f32 - 80.0);
            if x * x + y * y < 50.0 * 50.0 { 1.0 } else { 0.0 }
        })
        .collect();

    c.bench_function("sdf_160x160", |b| {
        b.iter(|| signed_distance_field(black_box(&coverage), size, size, 16.0));
    });
}

fn bench_sdf_font_load(c: &mut Criterion) {
    let Some(path) = system_font() else {
        return;
    };
    let params = SdfParams::default();

    c.bench_function("sdf_font_load_ascii", |b| {
        b.iter(|| {
            let atlas = Atlas::new(1024).shared();
            SdfFont::new(black_box(&path), &atlas, params.clone()).unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_cache_hit,
    bench_atlas_allocate,
    bench_atlas_set_region,
    bench_signed_distance_field,
    bench_sdf_font_load,
);
criterion_main!(benches);
