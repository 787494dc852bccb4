//! Lumen font tool. Loads fonts through one shared font cache and
//! reports what ended up in the atlas.
//!
//! Settings come from `LUMEN_*` environment variables, overridden by the
//! command line. Set `RUST_LOG=debug` to watch cache hits and misses.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use lumen_text::{atlas, FontConfig, FontError, FontManager};

#[derive(Parser)]
#[command(version, about = "Load fonts into the shared SDF glyph atlas")]
struct Cli {
    /// Font file names or paths to load.
    #[arg(required = true, value_name = "FONT")]
    fonts: Vec<String>,

    /// Extra directory to search for fonts (repeatable, searched first).
    #[arg(long = "font-dir", value_name = "DIR")]
    font_dirs: Vec<PathBuf>,

    /// Side length of the square atlas in pixels.
    #[arg(long, value_name = "PIXELS")]
    atlas_size: Option<u32>,

    /// Glyph em size in atlas pixels.
    #[arg(long, value_name = "PIXELS")]
    glyph_size: Option<u32>,

    /// Characters to load in addition to the preload set.
    #[arg(long, value_name = "TEXT")]
    chars: Option<String>,

    /// Only search the given directories, not installed system fonts.
    #[arg(long)]
    no_system_fonts: bool,
}

impl Cli {
    fn config(&self) -> Result<FontConfig, FontError> {
        let mut config = FontConfig::from_env()?;

        let mut dirs = self.font_dirs.clone();
        dirs.append(&mut config.search_dirs);
        config.search_dirs = dirs;

        if let Some(size) = self.atlas_size {
            config.atlas_size = size;
        }
        if let Some(size) = self.glyph_size {
            config.sdf.size = size;
        }
        if self.no_system_fonts {
            config.system_fonts = false;
        }
        config.validate()?;
        Ok(config)
    }
}

fn run(cli: &Cli) -> Result<(), FontError> {
    let manager = FontManager::from_config(cli.config()?)?;

    for name in &cli.fonts {
        let font = manager.get(name)?;
        if let Some(chars) = &cli.chars {
            font.load(chars)?;
        }
        let metrics = font.metrics();
        println!(
            "{name}: {} ({}): {} glyphs, ascender {:.1}, descender {:.1}, line height {:.1}",
            font.family(),
            font.path().display(),
            font.glyph_count(),
            metrics.ascender,
            metrics.descender,
            metrics.height,
        );
    }

    let fonts = manager.len();
    let shared = manager.atlas();
    let atlas = atlas::lock(&shared);
    println!(
        "{fonts} fonts cached; atlas {}×{}: {} regions, {:.1}% used",
        atlas.size,
        atlas.size,
        atlas.region_count(),
        atlas.occupancy() * 100.0,
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();
    info!("Loading {} font(s)", cli.fonts.len());

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            eprintln!("lumen-cli: {err}");
            ExitCode::FAILURE
        }
    }
}
