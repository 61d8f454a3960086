//! Validate a lecture draft.

use std::path::PathBuf;

use slidecast_lecture_model::LectureDraft;
use slidecast_render_engine::theme::is_known_theme;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    println!("Validating draft at: {}", path.display());

    let draft =
        LectureDraft::load(&path).map_err(|e| anyhow::anyhow!("Failed to load draft: {e}"))?;

    println!("  Title: {}", draft.title);
    println!("  Slides: {}", draft.slides.len());
    println!(
        "  Source document: {}",
        if draft.has_source_document() { "embedded" } else { "none" }
    );

    let mut issues = draft.validate();
    for (idx, slide) in draft.slides.iter().enumerate() {
        if let Some(theme) = slide.visual_theme_id.as_deref() {
            if !is_known_theme(theme) {
                issues.push(format!(
                    "Slide {} uses unknown theme '{theme}'; the base theme will be used",
                    idx + 1
                ));
            }
        }
    }

    if issues.is_empty() {
        println!("\nDraft is valid.");
    } else {
        println!("\nValidation issues:");
        for issue in &issues {
            println!("  - {issue}");
        }
        println!(
            "\n{} issue(s) found. Export will still run; affected slides degrade.",
            issues.len()
        );
    }

    Ok(())
}
