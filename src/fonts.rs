//! TrueType font discovery for chart text.
//!
//! The bitmap backend draws text through `ab_glyph`, which only knows fonts
//! that were registered at runtime. The first chart rendered by the process
//! decides which font file is used; later calls reuse it, even when they ask
//! for a different file.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use plotters::style::{register_font, FontStyle};
use tracing::{debug, warn};

/// Family name every chart asks plotters for.
pub const FONT_FAMILY: &str = "sans-serif";

/// Common locations of a sans-serif TrueType font.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

static REGISTERED: OnceLock<Option<PathBuf>> = OnceLock::new();

fn try_register(path: &Path) -> bool {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            debug!(path = %path.display(), %err, "font not readable");
            return false;
        }
    };

    // plotters keeps a reference for the life of the process.
    let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
    match register_font(FONT_FAMILY, FontStyle::Normal, bytes) {
        Ok(()) => true,
        Err(_) => {
            warn!(path = %path.display(), "not a usable TrueType font");
            false
        }
    }
}

fn candidates(preferred: Option<&Path>) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = preferred.map(Path::to_path_buf).into_iter().collect();
    out.extend(SYSTEM_FONTS.iter().map(PathBuf::from));
    out
}

/// True when a later request names a font other than the one registered.
fn ignores_request(registered: Option<&Path>, preferred: Option<&Path>) -> bool {
    match preferred {
        Some(wanted) => registered != Some(wanted),
        None => false,
    }
}

/// Make [`FONT_FAMILY`] drawable, trying `preferred` first and then the
/// well-known system locations.
///
/// Returns the registered font file, or `None` when no font could be found,
/// in which case charts are drawn without text. Only the first call in the
/// process registers anything; a later `preferred` that differs is logged and
/// ignored.
pub fn ensure_font(preferred: Option<&Path>) -> Option<&'static Path> {
    let mut first = false;
    let registered = REGISTERED
        .get_or_init(|| {
            first = true;
            let found = candidates(preferred)
                .into_iter()
                .filter(|p| p.is_file())
                .find(|p| try_register(p));
            match &found {
                Some(path) => debug!(path = %path.display(), "registered chart font"),
                None => warn!("no TrueType font found; charts will be drawn without text"),
            }
            found
        })
        .as_deref();

    if !first && ignores_request(registered, preferred) {
        warn!(
            requested = ?preferred,
            registered = ?registered,
            "chart font already chosen for this process; requested font ignored"
        );
    }
    registered
}
