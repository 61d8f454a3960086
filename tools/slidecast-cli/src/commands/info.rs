//! Show lecture draft information.

use std::path::PathBuf;

use slidecast_lecture_model::LectureDraft;
use slidecast_render_engine::theme::theme_for;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    let draft =
        LectureDraft::load(&path).map_err(|e| anyhow::anyhow!("Failed to load draft: {e}"))?;

    println!("Draft: {}", draft.title);
    println!("  ID: {}", draft.id);
    if !draft.summary.trim().is_empty() {
        println!("  Summary: {}", draft.summary.trim());
    }
    match draft.source_document_bytes() {
        Ok(Some(bytes)) => println!("  Source document: {} bytes", bytes.len()),
        Ok(None) => println!("  Source document: none"),
        Err(e) => println!("  Source document: unreadable ({e})"),
    }
    println!("  Quiz: {}", if draft.quiz.is_some() { "yes" } else { "no" });
    println!();

    println!("Slides:");
    for (idx, slide) in draft.slides.iter().enumerate() {
        println!("  {:>2}. {}", idx + 1, slide.display_heading());
        println!("      Theme: {}", theme_for(slide.visual_theme_id.as_deref()).id);
        if let Some(image) = slide.image_ref() {
            println!("      Image: {}", short(image));
        }
        if let Some(audio) = slide.audio_ref() {
            println!("      Narration audio: {}", short(audio));
        }
        if let Some(page) = slide.requested_page() {
            println!("      Source page: {page}");
        }
        if let Some(code) = slide.code() {
            println!(
                "      Code: {} line(s){}",
                code.lines().count(),
                slide
                    .snippet_language
                    .as_deref()
                    .map(|l| format!(" ({l})"))
                    .unwrap_or_default()
            );
        }
    }

    Ok(())
}

fn short(locator: &str) -> String {
    slidecast_render_engine::fetch::display_locator(locator)
}
