//! Export a lecture draft to video.

use std::io::Write;
use std::path::PathBuf;

use slidecast_common::config::AppConfig;
use slidecast_lecture_model::{ExportOptions, LectureDraft};
use slidecast_render_engine::export::{export_lecture, ExportProgress, ExportStage, NativeBackend};

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<u32>,
    pub slide_duration_ms: Option<u64>,
}

pub fn resolve_options(config: &AppConfig, overrides: &Overrides) -> ExportOptions {
    let defaults = &config.export;
    ExportOptions {
        width: overrides.width.unwrap_or(defaults.width),
        height: overrides.height.unwrap_or(defaults.height),
        fps: overrides.fps.unwrap_or(defaults.fps),
        default_slide_duration_ms: overrides
            .slide_duration_ms
            .unwrap_or(defaults.default_slide_duration_ms),
    }
}

pub async fn run(
    config: &AppConfig,
    path: PathBuf,
    output: Option<PathBuf>,
    overrides: Overrides,
    json_progress: bool,
) -> anyhow::Result<()> {
    println!("Exporting draft: {}", path.display());

    let draft =
        LectureDraft::load(&path).map_err(|e| anyhow::anyhow!("Failed to load draft: {e}"))?;
    let options = resolve_options(config, &overrides);
    options
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid export options: {e}"))?;

    let output_path = output.unwrap_or_else(|| path.with_extension("webm"));
    let media_dir = path.parent().filter(|p| !p.as_os_str().is_empty());

    println!("  Title: {}", draft.title);
    println!("  Slides: {}", draft.slides.len());
    println!("  Output: {}", output_path.display());
    println!(
        "  Resolution: {}x{} @ {}fps",
        options.width, options.height, options.fps
    );

    let backend = NativeBackend::from_config(config, media_dir)
        .map_err(|e| anyhow::anyhow!("Export backend unavailable: {e}"))?;

    let progress_cb: Box<dyn Fn(ExportProgress) + Send> = if json_progress {
        Box::new(|p| {
            if let Ok(line) = serde_json::to_string(&p) {
                println!("{line}");
            }
        })
    } else {
        Box::new(|p| {
            if p.stage == ExportStage::Rendering {
                print!(
                    "\r  Progress: {:.1}% (slide {}/{}, {} frames, {:.1}s)  ",
                    p.progress * 100.0,
                    p.slide_index + 1,
                    p.total_slides,
                    p.frames_rendered,
                    p.elapsed.as_secs_f64(),
                );
                let _ = std::io::stdout().flush();
            }
        })
    };

    let blob = export_lecture(&draft, &options, &backend, Some(progress_cb))
        .await
        .map_err(|e| anyhow::anyhow!("Export failed: {e}"))?;

    blob.write_to(&output_path)?;
    println!(
        "\nExport complete: {} ({} bytes, {})",
        output_path.display(),
        blob.len(),
        blob.mime_type
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_win_over_config() {
        let config = AppConfig::default();
        let options = resolve_options(
            &config,
            &Overrides {
                fps: Some(12),
                slide_duration_ms: Some(2500),
                ..Overrides::default()
            },
        );
        assert_eq!(options.width, config.export.width);
        assert_eq!(options.height, config.export.height);
        assert_eq!(options.fps, 12);
        assert_eq!(options.default_slide_duration_ms, 2500);
    }
}
