//! Check system capabilities.

use slidecast_capture_engine::{GstMediaRecorder, PREFERRED_PAIRINGS};
use slidecast_common::config::AppConfig;
use slidecast_render_engine::raster::FontSet;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Slidecast System Check");
    println!("{}", "=".repeat(50));

    let mut ready = true;

    // Codec pairing
    match GstMediaRecorder::negotiate() {
        Ok(pairing) => println!("[OK] Recorder: {}", pairing.mime_type),
        Err(e) => {
            ready = false;
            println!("[FAIL] Recorder: {e}");
            println!(
                "       Tried: {}",
                PREFERRED_PAIRINGS
                    .iter()
                    .map(|p| p.mime_type)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }

    // Fonts
    match FontSet::load(&config.fonts) {
        Ok(_) => {
            let show = |p: Option<std::path::PathBuf>| {
                p.map(|p| p.display().to_string())
                    .unwrap_or_else(|| "regular fallback".to_string())
            };
            println!("[OK] Fonts:");
            println!("     Regular: {}", show(config.fonts.resolve_regular()));
            println!("     Bold: {}", show(config.fonts.resolve_bold()));
            println!("     Monospace: {}", show(config.fonts.resolve_monospace()));
        }
        Err(e) => {
            ready = false;
            println!("[FAIL] Fonts: {e}");
        }
    }

    // Source document snapshots
    check_pdf();

    println!();
    if ready {
        println!("All required capabilities are available. Slidecast is ready.");
    } else {
        println!("Some required capabilities are missing. See above for fixes.");
    }

    Ok(())
}

#[cfg(feature = "pdf")]
fn check_pdf() {
    let rasterizer = slidecast_source_loader::pdfium::PdfiumRasterizer::new();
    if rasterizer.is_available() {
        println!("[OK] PDF snapshots: pdfium");
    } else {
        println!("[WARN] PDF snapshots: pdfium library not found; snapshots will be skipped");
    }
}

#[cfg(not(feature = "pdf"))]
fn check_pdf() {
    println!("[WARN] PDF snapshots: built without pdf support");
}
